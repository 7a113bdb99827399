//! # Sensor Bridge Core
//!
//! Exposes one sensor to a remote caller over a method channel and one or
//! more event channels.
//!
//! ## Overview
//!
//! - [`SensorBridge`] is registered with a
//!   [`HostChannelTransport`](bridge_traits::HostChannelTransport) and owns
//!   the sensor handle and its construction policy
//! - [`MethodDispatcher`] maps the control calls (`start`, `stop`, `sync`,
//!   `enable`, `disable`, `is_enable`, `set_label`,
//!   `cancel_broadcast_stream`) onto the sensor or the stream registry
//! - listeners live in a [`StreamRegistry`](core_streams::StreamRegistry)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::BridgeConfig;
//! use core_service::SensorBridge;
//!
//! let config = BridgeConfig::for_plugin("awareframework_core")
//!     .sensor_initializer(Arc::new(MyInitializer))
//!     .build()?;
//! let bridge = SensorBridge::new(config)?;
//! bridge.register(transport)?;
//!
//! // From the sampling thread:
//! bridge.emit("accelerometer", json!({ "x": 0.1, "y": 9.8, "z": 0.0 }));
//! ```

pub mod bridge;
pub mod dispatcher;
pub mod error;

pub use bridge::{BridgeState, SensorBridge, UNAVAILABLE_CODE};
pub use dispatcher::{MethodDispatcher, SensorMethod, UnknownMethod};
pub use error::{CoreError, Result};
