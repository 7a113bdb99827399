//! Method Dispatcher
//!
//! Maps a control-channel call onto the sensor or the stream registry.
//!
//! Every dispatch runs the plugin's begin hook, resolves the call, then runs
//! the end hook, each exactly once, whichever branch was taken. Malformed
//! arguments never fail a recognised call; they fall back to the operation's
//! default.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bridge_traits::{MethodCall, MethodHandler, MethodResponse, SensorCapability};
use core_runtime::events::{BridgeEvent, EventBus, MethodEvent, StreamEvent};
use core_runtime::logging::redact_if_sensitive;
use core_runtime::config::DuplicatePolicy;
use core_streams::{StreamKey, StreamRegistry};
use tracing::{debug, warn};

/// The control-channel operations this bridge understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorMethod {
    Start,
    Stop,
    Sync,
    Enable,
    Disable,
    IsEnable,
    SetLabel,
    CancelBroadcastStream,
}

impl SensorMethod {
    pub const ALL: [SensorMethod; 8] = [
        SensorMethod::Start,
        SensorMethod::Stop,
        SensorMethod::Sync,
        SensorMethod::Enable,
        SensorMethod::Disable,
        SensorMethod::IsEnable,
        SensorMethod::SetLabel,
        SensorMethod::CancelBroadcastStream,
    ];

    /// Wire name of the call.
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorMethod::Start => "start",
            SensorMethod::Stop => "stop",
            SensorMethod::Sync => "sync",
            SensorMethod::Enable => "enable",
            SensorMethod::Disable => "disable",
            SensorMethod::IsEnable => "is_enable",
            SensorMethod::SetLabel => "set_label",
            SensorMethod::CancelBroadcastStream => "cancel_broadcast_stream",
        }
    }
}

impl fmt::Display for SensorMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned for call names outside [`SensorMethod::ALL`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMethod(pub String);

impl FromStr for SensorMethod {
    type Err = UnknownMethod;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        SensorMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == name)
            .ok_or_else(|| UnknownMethod(name.to_string()))
    }
}

pub struct MethodDispatcher {
    registry: Arc<StreamRegistry>,
    events: EventBus,
    hooks: Option<Arc<dyn MethodHandler>>,
    reply_when_capability_absent: bool,
}

impl MethodDispatcher {
    pub fn new(
        registry: Arc<StreamRegistry>,
        events: EventBus,
        hooks: Option<Arc<dyn MethodHandler>>,
        reply_when_capability_absent: bool,
    ) -> Self {
        Self {
            registry,
            events,
            hooks,
            reply_when_capability_absent,
        }
    }

    /// Handles one call.
    ///
    /// `resolve_sensor` is asked for the sensor once per recognised call,
    /// after the begin hook; unknown names never reach it.
    pub fn dispatch<F>(&self, call: &MethodCall, resolve_sensor: F) -> MethodResponse
    where
        F: FnOnce(&MethodCall) -> Option<Arc<dyn SensorCapability>>,
    {
        debug!(method = %call.method, "Method call");

        if let Some(hooks) = &self.hooks {
            hooks.begin_method_handle(call);
        }

        let response = match call.method.parse::<SensorMethod>() {
            Ok(method) => {
                let sensor = resolve_sensor(call);
                self.handle(method, call, sensor)
            }
            Err(UnknownMethod(name)) => {
                debug!(method = %name, "Method not implemented");
                self.events
                    .emit(BridgeEvent::Method(MethodEvent::NotImplemented { method: name }));
                MethodResponse::NotImplemented
            }
        };

        if let Some(hooks) = &self.hooks {
            hooks.end_method_handle(call);
        }

        response
    }

    fn handle(
        &self,
        method: SensorMethod,
        call: &MethodCall,
        sensor: Option<Arc<dyn SensorCapability>>,
    ) -> MethodResponse {
        if method == SensorMethod::CancelBroadcastStream {
            return self.cancel_stream(call);
        }

        let Some(sensor) = sensor else {
            return self.sensor_absent(method);
        };

        match method {
            SensorMethod::Start => sensor.start(),
            SensorMethod::Stop => sensor.stop(),
            SensorMethod::Sync => sensor.sync(call.bool_argument("force").unwrap_or(false)),
            SensorMethod::Enable => sensor.enable(),
            SensorMethod::Disable => sensor.disable(),
            SensorMethod::IsEnable => return MethodResponse::value(sensor.is_enabled()),
            SensorMethod::SetLabel => match call.str_argument("label") {
                Some(label) => {
                    debug!(label = %redact_if_sensitive("label", label), "Setting label");
                    sensor.set_label(label);
                }
                None => debug!("set_label without a string label; ignored"),
            },
            SensorMethod::CancelBroadcastStream => {}
        }

        MethodResponse::empty()
    }

    fn sensor_absent(&self, method: SensorMethod) -> MethodResponse {
        if method != SensorMethod::IsEnable {
            debug!(%method, "No sensor; call ignored");
            return MethodResponse::empty();
        }

        self.events.emit(BridgeEvent::Method(MethodEvent::CapabilityAbsent {
            method: method.as_str().to_string(),
        }));

        if self.reply_when_capability_absent {
            MethodResponse::value(false)
        } else {
            warn!(%method, "No sensor; caller left unanswered");
            MethodResponse::NoReply
        }
    }

    fn cancel_stream(&self, call: &MethodCall) -> MethodResponse {
        let policy = self.registry.config().duplicate_policy;
        match cancel_target(policy, call) {
            Some(key) => {
                let affected = self.registry.cancel(key);
                self.events.emit(BridgeEvent::Stream(StreamEvent::Cancelled {
                    key: key.as_str().to_string(),
                    affected,
                }));
            }
            None => debug!(
                argument = policy.cancel_key(),
                "cancel_broadcast_stream without a key; ignored"
            ),
        }
        MethodResponse::empty()
    }
}

/// Registry key named by cancel arguments. Identifier-keyed registries take
/// `id`, or `name` for a listener that subscribed without one.
fn cancel_target(policy: DuplicatePolicy, call: &MethodCall) -> Option<StreamKey<'_>> {
    match policy {
        DuplicatePolicy::OverwriteByName => call.str_argument("name").map(StreamKey::Name),
        DuplicatePolicy::RejectDuplicateId => call
            .str_argument("id")
            .map(StreamKey::Id)
            .or_else(|| call.str_argument("name").map(StreamKey::Name)),
    }
}

impl fmt::Debug for MethodDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDispatcher")
            .field("registry", &self.registry.config())
            .field("has_hooks", &self.hooks.is_some())
            .field(
                "reply_when_capability_absent",
                &self.reply_when_capability_absent,
            )
            .finish()
    }
}
