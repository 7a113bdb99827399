//! Host Channel Contracts
//!
//! Abstractions over the host runtime's two channel types:
//! - a request/response **method channel** delivering one named call at a time
//! - one or more **event channels** a caller subscribes to for a broadcast stream
//!
//! The host transport (Flutter engine messenger, JNI glue, a desktop in-process
//! messenger) owns serialization and thread marshaling. The core only sees a
//! decoded [`MethodCall`] and hands back a [`MethodResponse`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{error::Result, platform::PlatformSendSync};

/// A decoded method-channel call.
///
/// `arguments` is whatever the caller sent; well-formed calls carry a JSON
/// object, but nothing guarantees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    /// Call name, e.g. `"start"` or `"cancel_broadcast_stream"`
    pub method: String,
    /// Raw call arguments
    #[serde(default)]
    pub arguments: Option<Value>,
}

impl MethodCall {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            arguments: None,
        }
    }

    pub fn with_arguments(mut self, arguments: Value) -> Self {
        self.arguments = Some(arguments);
        self
    }

    /// Returns the arguments as a mapping, if they are one.
    pub fn argument_map(&self) -> Option<&Map<String, Value>> {
        self.arguments.as_ref().and_then(Value::as_object)
    }

    /// Looks up a single named argument.
    pub fn argument(&self, key: &str) -> Option<&Value> {
        self.argument_map().and_then(|args| args.get(key))
    }

    /// Reads a boolean argument; `None` when missing or not a boolean.
    pub fn bool_argument(&self, key: &str) -> Option<bool> {
        self.argument(key).and_then(Value::as_bool)
    }

    /// Reads a string argument; `None` when missing or not a string.
    pub fn str_argument(&self, key: &str) -> Option<&str> {
        self.argument(key).and_then(Value::as_str)
    }
}

/// Outcome of a method-channel call as seen by the host transport.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    /// Answer the caller, optionally with a payload (`None` replies null)
    Success(Option<Value>),
    /// Answer the caller with a structured error
    Error {
        code: String,
        message: String,
        details: Option<Value>,
    },
    /// The call name is not handled by this bridge
    NotImplemented,
    /// The caller is never answered
    NoReply,
}

impl MethodResponse {
    /// Null reply.
    pub fn empty() -> Self {
        Self::Success(None)
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Self::Success(Some(value.into()))
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Whether the transport will send anything back to the caller.
    pub fn is_answered(&self) -> bool {
        !matches!(self, Self::NoReply)
    }
}

/// Structured error surfaced to a channel caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelError {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<Value>,
}

impl ChannelError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ChannelError {}

/// Write handle for one broadcast-channel listener.
///
/// Sinks may be written from any thread. Writes after the host has severed
/// the stream must be silently dropped by the implementation.
pub trait EventSink: PlatformSendSync {
    /// Deliver one event payload
    fn success(&self, event: Value);

    /// Deliver an error event; the stream stays open
    fn error(&self, code: &str, message: &str, details: Option<Value>);

    /// Signal that no further events will follow
    fn end_of_stream(&self);
}

/// Receiver of method-channel calls.
///
/// The host transport guarantees calls arrive one at a time.
pub trait MethodCallHandler: PlatformSendSync {
    fn on_method_call(&self, call: &MethodCall) -> MethodResponse;
}

/// Receiver of event-channel listen/cancel requests.
pub trait StreamHandler: PlatformSendSync {
    /// A caller started listening with `arguments`; `sink` stays valid until
    /// the caller cancels or the transport severs the stream.
    fn on_listen(
        &self,
        arguments: Option<&Value>,
        sink: Arc<dyn EventSink>,
    ) -> std::result::Result<(), ChannelError>;

    /// A caller stopped listening.
    fn on_cancel(&self, arguments: Option<&Value>) -> std::result::Result<(), ChannelError>;
}

/// Host channel transport
///
/// Binds handlers to named channels on the host messenger:
/// - **Android**: `MethodChannel` / `EventChannel` on the engine's binary messenger
/// - **iOS**: `FlutterMethodChannel` / `FlutterEventChannel` via the plugin registrar
/// - **Desktop**: in-process messenger (see `bridge-desktop`)
///
/// Passing `None` unbinds the channel.
pub trait HostChannelTransport: PlatformSendSync {
    fn set_method_call_handler(
        &self,
        channel: &str,
        handler: Option<Arc<dyn MethodCallHandler>>,
    ) -> Result<()>;

    fn set_stream_handler(
        &self,
        channel: &str,
        handler: Option<Arc<dyn StreamHandler>>,
    ) -> Result<()>;
}
