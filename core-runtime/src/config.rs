//! # Bridge Configuration Module
//!
//! Provides configuration management for the sensor bridge.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! `BridgeConfig` holding the channel names, the plugin-supplied hooks and the
//! policies that used to differ between plugin revisions:
//!
//! - [`DuplicatePolicy`] - overwrite same-named subscriptions, or reject
//!   colliding identifiers
//! - [`CancelDiscipline`] - remove cancelled subscriptions, or only mark them
//!   inactive
//! - [`InitializationPolicy`] - construct the sensor at registration, or on
//!   the first call
//!
//! The builder validates fail-fast so that a misconfigured plugin is caught at
//! startup rather than on the first call from the host.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{BridgeConfig, DuplicatePolicy};
//! use std::sync::Arc;
//!
//! let config = BridgeConfig::builder()
//!     .method_channel("awareframework_core/method")
//!     .event_channel("awareframework_core/event")
//!     .duplicate_policy(DuplicatePolicy::RejectDuplicateId)
//!     .sensor_initializer(Arc::new(MyInitializer))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::BridgeConfig;
//!
//! // No sensor initializer: fails with an actionable message
//! let config = BridgeConfig::builder()
//!     .method_channel("demo/method")
//!     .event_channel("demo/event")
//!     .build()
//!     .expect("Should fail - missing sensor initializer");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{MethodHandler, SensorInitializer};
use std::collections::HashSet;
use std::sync::Arc;

/// Default capacity of the lifecycle event bus.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

const MAX_EVENT_BUFFER_SIZE: usize = 10_000;

/// How the stream registry treats a subscribe that collides with an existing
/// subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Subscriptions are keyed by event name; a new subscription evicts every
    /// existing one with the same name.
    #[default]
    OverwriteByName,
    /// Subscriptions are keyed by identifier; a colliding identifier is
    /// rejected and the existing subscription is left untouched. Several
    /// subscriptions may share an event name (fan-out delivery).
    RejectDuplicateId,
}

impl DuplicatePolicy {
    /// Argument key naming the subscription in `cancel_broadcast_stream`.
    pub fn cancel_key(&self) -> &'static str {
        match self {
            DuplicatePolicy::OverwriteByName => "name",
            DuplicatePolicy::RejectDuplicateId => "id",
        }
    }
}

/// What cancelling a subscription does to the registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelDiscipline {
    /// The entry is dropped from the registry.
    #[default]
    Remove,
    /// The entry stays in the registry with `listening = false` and no longer
    /// receives events.
    Deactivate,
}

/// When the bridge asks the plugin's [`SensorInitializer`] for a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitializationPolicy {
    /// During registration, before any call arrives.
    Eager,
    /// On the first method call; reused afterwards.
    #[default]
    Lazy,
}

/// Settings owned by the stream registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryConfig {
    pub duplicate_policy: DuplicatePolicy,
    pub cancel_discipline: CancelDiscipline,
}

impl RegistryConfig {
    pub fn new(duplicate_policy: DuplicatePolicy, cancel_discipline: CancelDiscipline) -> Self {
        Self {
            duplicate_policy,
            cancel_discipline,
        }
    }
}

/// Complete configuration for one bridge instance.
///
/// Use [`BridgeConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct BridgeConfig {
    /// Name of the request/response channel
    pub method_channel: String,

    /// Names of the broadcast channels
    pub event_channels: Vec<String>,

    /// Stream registry policies
    pub registry: RegistryConfig,

    /// When the sensor is constructed
    pub initialization: InitializationPolicy,

    /// Plugin-supplied sensor factory (required)
    pub sensor_initializer: Arc<dyn SensorInitializer>,

    /// Optional begin/end hooks around every call
    pub method_handler: Option<Arc<dyn MethodHandler>>,

    /// Answer `is_enable` with `false` when no sensor exists instead of
    /// leaving the caller unanswered
    pub reply_when_capability_absent: bool,

    /// Lifecycle event bus capacity
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("method_channel", &self.method_channel)
            .field("event_channels", &self.event_channels)
            .field("registry", &self.registry)
            .field("initialization", &self.initialization)
            .field("sensor_initializer", &"SensorInitializer { ... }")
            .field(
                "method_handler",
                &self.method_handler.as_ref().map(|_| "MethodHandler { ... }"),
            )
            .field(
                "reply_when_capability_absent",
                &self.reply_when_capability_absent,
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl BridgeConfig {
    /// Creates a new builder for constructing a `BridgeConfig`.
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }

    /// Creates a builder preloaded with the conventional channel names
    /// `<plugin>/method` and `<plugin>/event`.
    ///
    /// ```
    /// use core_runtime::config::BridgeConfig;
    ///
    /// let builder = BridgeConfig::for_plugin("awareframework_core");
    /// ```
    pub fn for_plugin(plugin: &str) -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
            .method_channel(format!("{}/method", plugin))
            .event_channel(format!("{}/event", plugin))
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Channel names are non-empty and contain no whitespace
    /// - At least one event channel is configured
    /// - No channel name is used twice
    /// - The event bus capacity is reasonable (> 0 and <= 10,000)
    pub fn validate(&self) -> Result<()> {
        validate_channel_name(&self.method_channel)?;

        if self.event_channels.is_empty() {
            return Err(Error::Config(
                "At least one event channel is required. Use .event_channel() to add one."
                    .to_string(),
            ));
        }

        let mut seen = HashSet::new();
        seen.insert(self.method_channel.as_str());
        for channel in &self.event_channels {
            validate_channel_name(channel)?;
            if !seen.insert(channel.as_str()) {
                return Err(Error::InvalidChannel {
                    channel: channel.clone(),
                    reason: "channel name is already in use by this bridge".to_string(),
                });
            }
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size exceeds maximum of {}",
                MAX_EVENT_BUFFER_SIZE
            )));
        }

        Ok(())
    }
}

fn validate_channel_name(channel: &str) -> Result<()> {
    if channel.is_empty() {
        return Err(Error::InvalidChannel {
            channel: channel.to_string(),
            reason: "channel name cannot be empty".to_string(),
        });
    }

    if channel.chars().any(char::is_whitespace) {
        return Err(Error::InvalidChannel {
            channel: channel.to_string(),
            reason: "channel name cannot contain whitespace".to_string(),
        });
    }

    Ok(())
}

fn sensor_initializer_missing_error(policy: InitializationPolicy) -> Error {
    let when = match policy {
        InitializationPolicy::Eager => "during registration",
        InitializationPolicy::Lazy => "on the first method call",
    };

    Error::CapabilityMissing {
        capability: "SensorInitializer".to_string(),
        message: format!(
            "A SensorInitializer is required to construct the sensor {}. \
             Implement SensorInitializer for your plugin and pass it with .sensor_initializer().",
            when
        ),
    }
}

/// Builder for constructing [`BridgeConfig`] instances.
#[derive(Default)]
pub struct BridgeConfigBuilder {
    method_channel: Option<String>,
    event_channels: Vec<String>,
    registry: RegistryConfig,
    initialization: InitializationPolicy,
    sensor_initializer: Option<Arc<dyn SensorInitializer>>,
    method_handler: Option<Arc<dyn MethodHandler>>,
    reply_when_capability_absent: bool,
    event_buffer_size: Option<usize>,
}

impl BridgeConfigBuilder {
    /// Sets the method channel name.
    pub fn method_channel(mut self, name: impl Into<String>) -> Self {
        self.method_channel = Some(name.into());
        self
    }

    /// Adds one event channel.
    pub fn event_channel(mut self, name: impl Into<String>) -> Self {
        self.event_channels.push(name.into());
        self
    }

    /// Adds several event channels.
    pub fn event_channels<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event_channels
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Default: [`DuplicatePolicy::OverwriteByName`]
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.registry.duplicate_policy = policy;
        self
    }

    /// Default: [`CancelDiscipline::Remove`]
    pub fn cancel_discipline(mut self, discipline: CancelDiscipline) -> Self {
        self.registry.cancel_discipline = discipline;
        self
    }

    /// Default: [`InitializationPolicy::Lazy`]
    pub fn initialization(mut self, policy: InitializationPolicy) -> Self {
        self.initialization = policy;
        self
    }

    /// Sets the sensor factory (required).
    pub fn sensor_initializer(mut self, initializer: Arc<dyn SensorInitializer>) -> Self {
        self.sensor_initializer = Some(initializer);
        self
    }

    /// Sets the begin/end method hooks (optional).
    pub fn method_handler(mut self, handler: Arc<dyn MethodHandler>) -> Self {
        self.method_handler = Some(handler);
        self
    }

    /// Default: false
    pub fn reply_when_capability_absent(mut self, reply: bool) -> Self {
        self.reply_when_capability_absent = reply;
        self
    }

    /// Default: [`DEFAULT_EVENT_BUFFER_SIZE`]
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `BridgeConfig` instance.
    ///
    /// # Errors
    ///
    /// - `Config` when the method channel is missing or values are invalid
    /// - `InvalidChannel` for malformed or reused channel names
    /// - `CapabilityMissing` when no sensor initializer is set
    pub fn build(self) -> Result<BridgeConfig> {
        let method_channel = self.method_channel.ok_or_else(|| {
            Error::Config(
                "Method channel is required. Use .method_channel() to set it.".to_string(),
            )
        })?;

        let sensor_initializer = self
            .sensor_initializer
            .ok_or_else(|| sensor_initializer_missing_error(self.initialization))?;

        let config = BridgeConfig {
            method_channel,
            event_channels: self.event_channels,
            registry: self.registry,
            initialization: self.initialization,
            sensor_initializer,
            method_handler: self.method_handler,
            reply_when_capability_absent: self.reply_when_capability_absent,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{InitializationTrigger, SensorCapability};

    struct NullInitializer;

    impl SensorInitializer for NullInitializer {
        fn initialize_sensor(
            &self,
            _trigger: InitializationTrigger<'_>,
        ) -> Option<Arc<dyn SensorCapability>> {
            None
        }
    }

    fn base() -> BridgeConfigBuilder {
        BridgeConfig::builder()
            .method_channel("demo/method")
            .event_channel("demo/event")
            .sensor_initializer(Arc::new(NullInitializer))
    }

    #[test]
    fn test_builder_defaults() {
        let config = base().build().unwrap();

        assert_eq!(config.method_channel, "demo/method");
        assert_eq!(config.event_channels, vec!["demo/event".to_string()]);
        assert_eq!(config.registry.duplicate_policy, DuplicatePolicy::OverwriteByName);
        assert_eq!(config.registry.cancel_discipline, CancelDiscipline::Remove);
        assert_eq!(config.initialization, InitializationPolicy::Lazy);
        assert!(config.method_handler.is_none());
        assert!(!config.reply_when_capability_absent);
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
    }

    #[test]
    fn test_for_plugin_channel_names() {
        let config = BridgeConfig::for_plugin("awareframework_core")
            .sensor_initializer(Arc::new(NullInitializer))
            .build()
            .unwrap();

        assert_eq!(config.method_channel, "awareframework_core/method");
        assert_eq!(config.event_channels, vec!["awareframework_core/event"]);
    }

    #[test]
    fn test_builder_requires_method_channel() {
        let result = BridgeConfig::builder()
            .event_channel("demo/event")
            .sensor_initializer(Arc::new(NullInitializer))
            .build();

        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("Method channel is required")),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_builder_requires_event_channel() {
        let result = BridgeConfig::builder()
            .method_channel("demo/method")
            .sensor_initializer(Arc::new(NullInitializer))
            .build();

        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("event channel")));
    }

    #[test]
    fn test_builder_requires_sensor_initializer() {
        let result = BridgeConfig::builder()
            .method_channel("demo/method")
            .event_channel("demo/event")
            .initialization(InitializationPolicy::Eager)
            .build();

        match result {
            Err(Error::CapabilityMissing {
                capability,
                message,
            }) => {
                assert_eq!(capability, "SensorInitializer");
                assert!(message.contains("during registration"));
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_validate_rejects_reused_channel() {
        let result = base().event_channel("demo/method").build();
        assert!(matches!(
            result,
            Err(Error::InvalidChannel { channel, .. }) if channel == "demo/method"
        ));

        let result = base().event_channel("demo/event").build();
        assert!(matches!(result, Err(Error::InvalidChannel { .. })));
    }

    #[test]
    fn test_validate_rejects_malformed_channel_names() {
        let result = base().event_channel("").build();
        assert!(matches!(result, Err(Error::InvalidChannel { .. })));

        let result = base().event_channel("demo event").build();
        assert!(matches!(
            result,
            Err(Error::InvalidChannel { reason, .. }) if reason.contains("whitespace")
        ));
    }

    #[test]
    fn test_validate_event_buffer_size() {
        assert!(matches!(
            base().event_buffer_size(0).build(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            base().event_buffer_size(10_001).build(),
            Err(Error::Config(_))
        ));
        assert!(base().event_buffer_size(10_000).build().is_ok());
    }

    #[test]
    fn test_builder_with_policies() {
        let config = base()
            .event_channels(["demo/gyro", "demo/accel"])
            .duplicate_policy(DuplicatePolicy::RejectDuplicateId)
            .cancel_discipline(CancelDiscipline::Deactivate)
            .initialization(InitializationPolicy::Eager)
            .reply_when_capability_absent(true)
            .build()
            .unwrap();

        assert_eq!(config.event_channels.len(), 3);
        assert_eq!(
            config.registry,
            RegistryConfig::new(DuplicatePolicy::RejectDuplicateId, CancelDiscipline::Deactivate)
        );
        assert_eq!(config.initialization, InitializationPolicy::Eager);
        assert!(config.reply_when_capability_absent);
    }

    #[test]
    fn test_cancel_key_follows_policy() {
        assert_eq!(DuplicatePolicy::OverwriteByName.cancel_key(), "name");
        assert_eq!(DuplicatePolicy::RejectDuplicateId.cancel_key(), "id");
    }

    #[test]
    fn test_debug_hides_hooks() {
        let config = base().build().unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("SensorInitializer { ... }"));
        assert!(debug.contains("demo/method"));
    }
}
