//! # Lifecycle Event Bus
//!
//! Publishes what the bridge does (registration, sensor construction,
//! subscription changes, unhandled calls) over `tokio::sync::broadcast`, so a
//! plugin or a test can observe the bridge without wrapping it.
//!
//! These events describe the bridge itself. Sensor payloads never travel over
//! this bus; they go straight to the subscribed sinks.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{BridgeEvent, EventBus, LifecycleEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(BridgeEvent::Lifecycle(LifecycleEvent::TornDown));
//! assert_eq!(
//!     rx.recv().await.unwrap(),
//!     BridgeEvent::Lifecycle(LifecycleEvent::TornDown)
//! );
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Receivers that fall behind get `RecvError::Lagged(n)` and can keep
//! reading; `RecvError::Closed` means the bridge was dropped.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::RecvError;
pub use tokio::sync::broadcast::Receiver;

pub use crate::config::DEFAULT_EVENT_BUFFER_SIZE;

/// Top-level bridge event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum BridgeEvent {
    Lifecycle(LifecycleEvent),
    Stream(StreamEvent),
    Method(MethodEvent),
}

impl BridgeEvent {
    pub fn description(&self) -> &str {
        match self {
            BridgeEvent::Lifecycle(e) => e.description(),
            BridgeEvent::Stream(e) => e.description(),
            BridgeEvent::Method(e) => e.description(),
        }
    }
}

/// Bridge registration and sensor construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LifecycleEvent {
    /// Handlers bound on the host transport.
    Registered {
        method_channel: String,
        event_channels: Vec<String>,
    },
    /// The sensor initializer produced a sensor.
    CapabilityInitialized {
        /// `"registration"` or the method name that triggered construction
        trigger: String,
    },
    /// Handlers unbound, sensor released, registry cleared.
    TornDown,
}

impl LifecycleEvent {
    fn description(&self) -> &str {
        match self {
            LifecycleEvent::Registered { .. } => "Bridge registered",
            LifecycleEvent::CapabilityInitialized { .. } => "Sensor initialized",
            LifecycleEvent::TornDown => "Bridge torn down",
        }
    }
}

/// Stream registry changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum StreamEvent {
    Subscribed {
        event_name: String,
        identifier: Option<String>,
    },
    /// A same-named subscription was evicted by a newer one.
    Replaced { event_name: String, evicted: usize },
    /// A subscribe collided with an existing identifier.
    Rejected {
        event_name: String,
        identifier: String,
    },
    Cancelled { key: String, affected: usize },
}

impl StreamEvent {
    fn description(&self) -> &str {
        match self {
            StreamEvent::Subscribed { .. } => "Stream subscribed",
            StreamEvent::Replaced { .. } => "Stream overwritten",
            StreamEvent::Rejected { .. } => "Duplicate stream identifier rejected",
            StreamEvent::Cancelled { .. } => "Stream cancelled",
        }
    }
}

/// Method channel outcomes worth surfacing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum MethodEvent {
    NotImplemented { method: String },
    /// `is_enable` arrived before any sensor existed.
    CapabilityAbsent { method: String },
}

impl MethodEvent {
    fn description(&self) -> &str {
        match self {
            MethodEvent::NotImplemented { .. } => "Method not implemented",
            MethodEvent::CapabilityAbsent { .. } => "Sensor not initialized",
        }
    }
}

/// Central bus for bridge events.
///
/// Cloning shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BridgeEvent>,
}

impl EventBus {
    /// `capacity` is the number of events buffered per receiver before it
    /// lags.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event and returns how many receivers got it.
    ///
    /// Having no receivers is normal for a bridge nobody observes, so it
    /// returns 0 instead of failing.
    pub fn emit(&self, event: BridgeEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<BridgeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

type EventFilter = Box<dyn Fn(&BridgeEvent) -> bool + Send + Sync>;

/// A receiver with an optional filter.
///
/// ```rust
/// use core_runtime::events::{BridgeEvent, EventBus, EventStream};
///
/// let bus = EventBus::default();
/// let streams_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, BridgeEvent::Stream(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<BridgeEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<BridgeEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&BridgeEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &BridgeEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<BridgeEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns `None` if no matching event is currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<BridgeEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
