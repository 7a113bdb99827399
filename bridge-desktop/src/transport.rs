//! In-process Host Channel Transport

use std::collections::HashMap;
use std::sync::Arc;

use bridge_traits::{
    error::{BridgeError, Result},
    EventSink, HostChannelTransport, MethodCall, MethodCallHandler, MethodResponse, StreamHandler,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, warn};

use crate::sink::{event_channel, EventStream};

/// Channel messenger for desktop hosts and tests.
///
/// Plays the role of the engine messenger on mobile: handlers are bound to
/// channel names, and inbound traffic is delivered one request at a time.
/// Handler maps are only locked long enough to look a handler up, so a
/// handler may rebind or unbind channels while it runs.
#[derive(Default)]
pub struct LocalTransport {
    method_handlers: RwLock<HashMap<String, Arc<dyn MethodCallHandler>>>,
    stream_handlers: RwLock<HashMap<String, Arc<dyn StreamHandler>>>,
    gate: Mutex<()>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers a call on `channel` and returns the handler's response.
    ///
    /// # Errors
    ///
    /// `ChannelNotBound` when no method handler is bound to `channel`.
    pub fn invoke(&self, channel: &str, call: &MethodCall) -> Result<MethodResponse> {
        let handler = self
            .method_handlers
            .read()
            .get(channel)
            .cloned()
            .ok_or_else(|| BridgeError::ChannelNotBound(channel.to_string()))?;

        let _serialized = self.gate.lock();
        let response = handler.on_method_call(call);
        debug!(channel, method = %call.method, answered = response.is_answered(), "Call delivered");
        Ok(response)
    }

    /// Starts listening on `channel`.
    ///
    /// A listen the handler refuses still yields a stream: it carries the
    /// handler's error and then ends, the way a mobile event channel reports
    /// a failed subscription.
    ///
    /// # Errors
    ///
    /// `ChannelNotBound` when no stream handler is bound to `channel`.
    pub fn listen(&self, channel: &str, arguments: Option<Value>) -> Result<EventStream> {
        let handler = self.stream_handler(channel)?;
        let (sink, stream) = event_channel();

        let _serialized = self.gate.lock();
        if let Err(error) = handler.on_listen(arguments.as_ref(), sink.clone()) {
            warn!(channel, code = %error.code, "Listen refused");
            sink.error(&error.code, &error.message, error.details);
            sink.end_of_stream();
        }
        Ok(stream)
    }

    /// Tells the handler on `channel` that a listener went away.
    ///
    /// # Errors
    ///
    /// `ChannelNotBound` for an unbound channel, `Channel` when the handler
    /// refuses.
    pub fn cancel(&self, channel: &str, arguments: Option<Value>) -> Result<()> {
        let handler = self.stream_handler(channel)?;

        let _serialized = self.gate.lock();
        handler.on_cancel(arguments.as_ref())?;
        Ok(())
    }

    pub fn is_method_channel_bound(&self, channel: &str) -> bool {
        self.method_handlers.read().contains_key(channel)
    }

    pub fn is_stream_channel_bound(&self, channel: &str) -> bool {
        self.stream_handlers.read().contains_key(channel)
    }

    /// Number of bound channels of either kind.
    pub fn bound_channels(&self) -> usize {
        self.method_handlers.read().len() + self.stream_handlers.read().len()
    }

    fn stream_handler(&self, channel: &str) -> Result<Arc<dyn StreamHandler>> {
        self.stream_handlers
            .read()
            .get(channel)
            .cloned()
            .ok_or_else(|| BridgeError::ChannelNotBound(channel.to_string()))
    }
}

impl HostChannelTransport for LocalTransport {
    fn set_method_call_handler(
        &self,
        channel: &str,
        handler: Option<Arc<dyn MethodCallHandler>>,
    ) -> Result<()> {
        let mut handlers = self.method_handlers.write();
        match handler {
            Some(handler) => {
                handlers.insert(channel.to_string(), handler);
                debug!(channel, "Method channel bound");
            }
            None => {
                handlers.remove(channel);
                debug!(channel, "Method channel unbound");
            }
        }
        Ok(())
    }

    fn set_stream_handler(
        &self,
        channel: &str,
        handler: Option<Arc<dyn StreamHandler>>,
    ) -> Result<()> {
        let mut handlers = self.stream_handlers.write();
        match handler {
            Some(handler) => {
                handlers.insert(channel.to_string(), handler);
                debug!(channel, "Event channel bound");
            }
            None => {
                handlers.remove(channel);
                debug!(channel, "Event channel unbound");
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut method_channels: Vec<String> =
            self.method_handlers.read().keys().cloned().collect();
        let mut event_channels: Vec<String> = self.stream_handlers.read().keys().cloned().collect();
        method_channels.sort();
        event_channels.sort();
        f.debug_struct("LocalTransport")
            .field("method_channels", &method_channels)
            .field("event_channels", &event_channels)
            .finish()
    }
}
