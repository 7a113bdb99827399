//! # Broadcast Stream Registry
//!
//! Tracks who is listening on the bridge's event channels and resolves an
//! event name to the sinks that should receive it.
//!
//! ## Overview
//!
//! - [`Subscription`] binds an event name (and optionally an identifier) to
//!   an [`EventSink`](bridge_traits::EventSink)
//! - [`StreamRegistry`] owns the subscriptions; its behaviour on duplicates
//!   and on cancel follows [`RegistryConfig`](core_runtime::config::RegistryConfig)
//!
//! ## Thread Safety
//!
//! Subscribes and cancels arrive from the control channel while the sensor
//! emits from its own threads. Every registry operation takes one short lock
//! over the collection; sink writes happen after the lock is released, so a
//! slow consumer never blocks registry mutation.

pub mod error;
pub mod registry;
pub mod subscription;

pub use error::{RegistryError, Result};
pub use registry::{StreamRegistry, Subscribed};
pub use subscription::{StreamKey, Subscription, SubscriptionRequest};
