//! Bridge Core
//!
//! [`SensorBridge`] is the one object a plugin registers with its host. It
//! owns the dispatcher, the stream registry and the sensor handle, and moves
//! through:
//!
//! ```text
//! Unregistered -> Registered { sensor absent } -> Registered { sensor present }
//! Unregistered -> Registered { sensor present }              (eager construction)
//! Registered   -> Unregistered                                (teardown)
//! ```

use std::sync::{Arc, Weak};

use bridge_traits::{
    ChannelError, EventSink, HostChannelTransport, InitializationTrigger, MethodCall,
    MethodCallHandler, MethodResponse, SensorCapability, StreamHandler,
};
use core_runtime::config::{BridgeConfig, InitializationPolicy};
use core_runtime::events::{BridgeEvent, EventBus, LifecycleEvent, Receiver, StreamEvent};
use core_streams::{RegistryError, StreamRegistry, Subscribed, Subscription, SubscriptionRequest};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::dispatcher::MethodDispatcher;
use crate::error::{CoreError, Result};

/// Error code answered to calls that arrive while the bridge is not
/// registered.
pub const UNAVAILABLE_CODE: &str = "UNAVAILABLE";

/// Externally visible bridge state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Unregistered,
    Registered { sensor_present: bool },
}

enum Slot {
    Unregistered,
    Registered {
        transport: Arc<dyn HostChannelTransport>,
        sensor: Option<Arc<dyn SensorCapability>>,
    },
}

struct Inner {
    config: BridgeConfig,
    registry: Arc<StreamRegistry>,
    dispatcher: MethodDispatcher,
    events: EventBus,
    slot: Mutex<Slot>,
    // Held for the whole of register/teardown.
    lifecycle: Mutex<()>,
}

/// Sensor bridge handle. Clones share one bridge.
///
/// The host transport only holds weak references to the bridge, so dropping
/// the last handle releases it even without `teardown`. Calls that reach a
/// dropped bridge are answered `UNAVAILABLE`.
#[derive(Clone)]
pub struct SensorBridge {
    inner: Arc<Inner>,
}

impl SensorBridge {
    /// # Errors
    ///
    /// `Runtime` when `config` fails validation.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new(config.event_buffer_size);
        let registry = Arc::new(StreamRegistry::new(config.registry));
        let dispatcher = MethodDispatcher::new(
            registry.clone(),
            events.clone(),
            config.method_handler.clone(),
            config.reply_when_capability_absent,
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                registry,
                dispatcher,
                events,
                slot: Mutex::new(Slot::Unregistered),
                lifecycle: Mutex::new(()),
            }),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// Binds the method channel and every event channel on `transport`.
    ///
    /// Under [`InitializationPolicy::Eager`] the sensor is built here.
    ///
    /// # Errors
    ///
    /// `AlreadyRegistered` if the bridge is registered; `Bridge` if the
    /// transport refuses a binding, in which case nothing stays bound.
    pub fn register(&self, transport: Arc<dyn HostChannelTransport>) -> Result<()> {
        let _lifecycle = self.inner.lifecycle.lock();
        let config = &self.inner.config;

        if self.is_registered() {
            return Err(CoreError::AlreadyRegistered(config.method_channel.clone()));
        }

        if let Err(err) = self.bind(transport.as_ref()) {
            warn!(error = %err, "Channel binding failed; rolling back");
            let _ = self.unbind(transport.as_ref());
            return Err(err);
        }

        let sensor = match config.initialization {
            InitializationPolicy::Eager => config
                .sensor_initializer
                .initialize_sensor(InitializationTrigger::Registration),
            InitializationPolicy::Lazy => None,
        };
        let sensor_present = sensor.is_some();

        *self.inner.slot.lock() = Slot::Registered { transport, sensor };

        info!(
            method_channel = %config.method_channel,
            event_channels = config.event_channels.len(),
            initialization = ?config.initialization,
            sensor_present,
            "Bridge registered"
        );
        self.inner
            .events
            .emit(BridgeEvent::Lifecycle(LifecycleEvent::Registered {
                method_channel: config.method_channel.clone(),
                event_channels: config.event_channels.clone(),
            }));
        if sensor_present {
            self.emit_initialized("registration");
        }

        Ok(())
    }

    /// Unbinds every channel, releases the sensor and clears the registry.
    /// Listening sinks are told the stream ended. Calling it on an
    /// unregistered bridge does nothing.
    ///
    /// # Errors
    ///
    /// The first error the transport returned while unbinding. The bridge is
    /// unregistered regardless.
    pub fn teardown(&self) -> Result<()> {
        let _lifecycle = self.inner.lifecycle.lock();

        let previous = std::mem::replace(&mut *self.inner.slot.lock(), Slot::Unregistered);
        let Slot::Registered { transport, sensor } = previous else {
            debug!("Teardown of an unregistered bridge ignored");
            return Ok(());
        };
        drop(sensor);

        let outcome = self.unbind(transport.as_ref());

        let drained = self.inner.registry.clear();
        for subscription in drained.iter().filter(|s| s.is_listening()) {
            subscription.sink().end_of_stream();
        }

        info!(subscriptions = drained.len(), "Bridge torn down");
        self.inner
            .events
            .emit(BridgeEvent::Lifecycle(LifecycleEvent::TornDown));

        outcome
    }

    pub fn is_registered(&self) -> bool {
        matches!(*self.inner.slot.lock(), Slot::Registered { .. })
    }

    pub fn state(&self) -> BridgeState {
        match &*self.inner.slot.lock() {
            Slot::Unregistered => BridgeState::Unregistered,
            Slot::Registered { sensor, .. } => BridgeState::Registered {
                sensor_present: sensor.is_some(),
            },
        }
    }

    /// Handles one control-channel call.
    ///
    /// An unregistered bridge answers `UNAVAILABLE` without running hooks or
    /// touching the sensor.
    pub fn dispatch(&self, call: &MethodCall) -> MethodResponse {
        if !self.is_registered() {
            warn!(method = %call.method, "Call on an unregistered bridge");
            return MethodResponse::error(UNAVAILABLE_CODE, CoreError::NotRegistered.to_string());
        }

        self.inner
            .dispatcher
            .dispatch(call, |call| self.resolve_sensor(call))
    }

    /// Adds a listener. Events reported by the registry are published on the
    /// lifecycle bus.
    ///
    /// # Errors
    ///
    /// `NotRegistered` on an unregistered bridge; `Registry` when the
    /// identifier is already listening.
    pub fn subscribe(
        &self,
        event_name: &str,
        identifier: Option<&str>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Subscription> {
        if !self.is_registered() {
            return Err(CoreError::NotRegistered);
        }

        match self.inner.registry.subscribe(event_name, identifier, sink) {
            Ok(Subscribed {
                subscription,
                evicted,
            }) => {
                if evicted > 0 {
                    self.inner
                        .events
                        .emit(BridgeEvent::Stream(StreamEvent::Replaced {
                            event_name: event_name.to_string(),
                            evicted,
                        }));
                }
                self.inner
                    .events
                    .emit(BridgeEvent::Stream(StreamEvent::Subscribed {
                        event_name: event_name.to_string(),
                        identifier: identifier.map(str::to_string),
                    }));
                Ok(subscription)
            }
            Err(err) => {
                let RegistryError::DuplicateIdentifier {
                    event_name,
                    identifier,
                } = &err;
                self.inner
                    .events
                    .emit(BridgeEvent::Stream(StreamEvent::Rejected {
                        event_name: event_name.clone(),
                        identifier: identifier.clone(),
                    }));
                Err(err.into())
            }
        }
    }

    /// Listening subscriptions for `event_name`; the sensor integration
    /// pushes its readings to these.
    pub fn subscriptions(&self, event_name: &str) -> Vec<Subscription> {
        self.inner.registry.lookup(event_name)
    }

    /// Sends `payload` to every listener of `event_name`. Safe to call from
    /// any thread. Returns the number of sinks written.
    pub fn emit(&self, event_name: &str, payload: Value) -> usize {
        self.inner.registry.emit(event_name, payload)
    }

    pub fn emit_error(
        &self,
        event_name: &str,
        code: &str,
        message: &str,
        details: Option<Value>,
    ) -> usize {
        self.inner
            .registry
            .emit_error(event_name, code, message, details)
    }

    /// Installs a ready-made sensor, replacing any current one.
    ///
    /// # Errors
    ///
    /// `NotRegistered` on an unregistered bridge.
    pub fn set_capability(&self, sensor: Arc<dyn SensorCapability>) -> Result<()> {
        match &mut *self.inner.slot.lock() {
            Slot::Registered { sensor: current, .. } => *current = Some(sensor),
            Slot::Unregistered => return Err(CoreError::NotRegistered),
        }
        self.emit_initialized("injected");
        Ok(())
    }

    pub fn capability(&self) -> Option<Arc<dyn SensorCapability>> {
        match &*self.inner.slot.lock() {
            Slot::Registered { sensor, .. } => sensor.clone(),
            Slot::Unregistered => None,
        }
    }

    /// Subscribes to lifecycle events. Past events are not replayed.
    pub fn events(&self) -> Receiver<BridgeEvent> {
        self.inner.events.subscribe()
    }

    /// Current sensor, building it first under the lazy policy. The
    /// initializer runs without the slot lock held.
    fn resolve_sensor(&self, call: &MethodCall) -> Option<Arc<dyn SensorCapability>> {
        if let Some(sensor) = self.capability() {
            return Some(sensor);
        }
        if self.inner.config.initialization != InitializationPolicy::Lazy {
            return None;
        }

        let built = self
            .inner
            .config
            .sensor_initializer
            .initialize_sensor(InitializationTrigger::MethodCall(call));
        let Some(built) = built else {
            debug!(method = %call.method, "Initializer produced no sensor");
            return None;
        };

        let mut slot = self.inner.slot.lock();
        let Slot::Registered { sensor, .. } = &mut *slot else {
            return None;
        };
        if let Some(existing) = sensor {
            return Some(existing.clone());
        }
        *sensor = Some(built.clone());
        drop(slot);

        self.emit_initialized(&call.method);
        Some(built)
    }

    fn emit_initialized(&self, trigger: &str) {
        debug!(trigger, "Sensor initialized");
        self.inner
            .events
            .emit(BridgeEvent::Lifecycle(LifecycleEvent::CapabilityInitialized {
                trigger: trigger.to_string(),
            }));
    }

    fn bind(&self, transport: &dyn HostChannelTransport) -> Result<()> {
        let config = &self.inner.config;
        let handler = Arc::new(ChannelHandler {
            bridge: Arc::downgrade(&self.inner),
        });

        transport.set_method_call_handler(&config.method_channel, Some(handler.clone()))?;
        for channel in &config.event_channels {
            transport.set_stream_handler(channel, Some(handler.clone()))?;
        }
        Ok(())
    }

    /// Unbinds every channel, continuing past failures.
    fn unbind(&self, transport: &dyn HostChannelTransport) -> Result<()> {
        let config = &self.inner.config;
        let mut outcome = transport
            .set_method_call_handler(&config.method_channel, None)
            .map_err(CoreError::from);

        for channel in &config.event_channels {
            if let Err(err) = transport.set_stream_handler(channel, None) {
                warn!(channel = %channel, error = %err, "Failed to unbind event channel");
                if outcome.is_ok() {
                    outcome = Err(err.into());
                }
            }
        }
        outcome
    }
}

impl MethodCallHandler for SensorBridge {
    fn on_method_call(&self, call: &MethodCall) -> MethodResponse {
        self.dispatch(call)
    }
}

impl StreamHandler for SensorBridge {
    /// Malformed listen arguments are ignored.
    fn on_listen(
        &self,
        arguments: Option<&Value>,
        sink: Arc<dyn EventSink>,
    ) -> std::result::Result<(), ChannelError> {
        let Some(request) = SubscriptionRequest::from_arguments(arguments) else {
            debug!("Listen without a string name; ignored");
            return Ok(());
        };

        match self.subscribe(&request.event_name, request.identifier.as_deref(), sink) {
            Ok(_) => Ok(()),
            Err(CoreError::Registry(err)) => Err(err.into()),
            Err(err) => Err(ChannelError::new(UNAVAILABLE_CODE, err.to_string())),
        }
    }

    /// Cancellation goes through `cancel_broadcast_stream`; a listener
    /// detaching at the transport level changes nothing.
    fn on_cancel(&self, _arguments: Option<&Value>) -> std::result::Result<(), ChannelError> {
        debug!("Transport-level cancel ignored");
        Ok(())
    }
}

/// What the transport holds while the bridge is registered.
struct ChannelHandler {
    bridge: Weak<Inner>,
}

impl ChannelHandler {
    fn bridge(&self) -> Option<SensorBridge> {
        self.bridge.upgrade().map(|inner| SensorBridge { inner })
    }
}

impl MethodCallHandler for ChannelHandler {
    fn on_method_call(&self, call: &MethodCall) -> MethodResponse {
        match self.bridge() {
            Some(bridge) => bridge.dispatch(call),
            None => MethodResponse::error(UNAVAILABLE_CODE, CoreError::NotRegistered.to_string()),
        }
    }
}

impl StreamHandler for ChannelHandler {
    fn on_listen(
        &self,
        arguments: Option<&Value>,
        sink: Arc<dyn EventSink>,
    ) -> std::result::Result<(), ChannelError> {
        match self.bridge() {
            Some(bridge) => bridge.on_listen(arguments, sink),
            None => Err(ChannelError::new(
                UNAVAILABLE_CODE,
                CoreError::NotRegistered.to_string(),
            )),
        }
    }

    fn on_cancel(&self, arguments: Option<&Value>) -> std::result::Result<(), ChannelError> {
        match self.bridge() {
            Some(bridge) => bridge.on_cancel(arguments),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for SensorBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorBridge")
            .field("method_channel", &self.inner.config.method_channel)
            .field("state", &self.state())
            .field("subscriptions", &self.inner.registry.len())
            .finish()
    }
}
