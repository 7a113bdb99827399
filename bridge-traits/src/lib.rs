//! # Host Bridge Traits
//!
//! Contracts between the sensor bridge core and the host runtime it is
//! embedded in.
//!
//! ## Overview
//!
//! The bridge exposes one sensor to a remote caller over a method channel
//! (request/response) and one or more event channels (broadcast). Everything
//! that differs per host lives behind the traits in this crate:
//!
//! ### Channels
//! - [`HostChannelTransport`](channel::HostChannelTransport) - Binds handlers to named host channels
//! - [`MethodCallHandler`](channel::MethodCallHandler) - Receives decoded method calls
//! - [`StreamHandler`](channel::StreamHandler) - Receives listen/cancel requests for event channels
//! - [`EventSink`](channel::EventSink) - Write handle for one listener
//!
//! ### Sensor
//! - [`SensorCapability`](sensor::SensorCapability) - The wrapped sensor
//! - [`SensorInitializer`](sensor::SensorInitializer) - Plugin-supplied sensor factory
//! - [`MethodHandler`](sensor::MethodHandler) - Begin/end hooks around every call
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Transport | Status |
//! |----------|-----------|--------|
//! | Desktop  | `bridge-desktop` (in-process) | ✅ Available |
//! | Android  | Engine `BinaryMessenger` via JNI | 📋 Planned |
//! | iOS      | `FlutterPluginRegistrar` via C ABI | 📋 Planned |
//!
//! ## Thread Safety
//!
//! Sensors emit events from background threads while calls arrive on the
//! host's platform thread, so every trait here requires `Send + Sync` on
//! native targets (see [`platform`]).

pub mod channel;
pub mod error;
pub mod logging;
pub mod platform;
pub mod sensor;

pub use error::BridgeError;

// Re-export commonly used types
pub use channel::{
    ChannelError, EventSink, HostChannelTransport, MethodCall, MethodCallHandler, MethodResponse,
    StreamHandler,
};
pub use logging::{LogEntry, LogLevel, LoggerSink, StderrLogger};
pub use sensor::{InitializationTrigger, MethodHandler, SensorCapability, SensorInitializer};
