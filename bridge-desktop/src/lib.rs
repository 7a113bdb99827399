//! # Desktop Bridge Implementations
//!
//! In-process implementations of the host contracts for desktop platforms
//! (macOS, Windows, Linux) and for tests.
//!
//! ## Overview
//!
//! On mobile the engine messenger owns the channels. On desktop nothing does,
//! so this crate provides:
//! - `LocalTransport`, a `HostChannelTransport` that delivers calls and
//!   listen/cancel requests one at a time
//! - `ChannelEventSink` / `EventStream`, an `EventSink` whose events are read
//!   back as a `futures::Stream`
//! - `InMemorySensor`, a `SensorCapability` that records its control calls,
//!   and `InMemoryInitializer` to hand it to a bridge
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{InMemoryInitializer, LocalTransport};
//! use bridge_traits::MethodCall;
//! use std::sync::Arc;
//!
//! let transport = Arc::new(LocalTransport::new());
//! // register a bridge on `transport`, then:
//! let response = transport.invoke("demo/method", &MethodCall::new("start"))?;
//! let mut events = transport.listen("demo/event", Some(json!({ "name": "light" })))?;
//! ```

mod sensor;
mod sink;
mod transport;

pub use sensor::{InMemoryInitializer, InMemorySensor, SensorSnapshot};
pub use sink::{event_channel, ChannelEventSink, EventStream, StreamItem};
pub use transport::LocalTransport;
