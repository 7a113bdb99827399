//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the sensor bridge:
//! - Logging and tracing infrastructure
//! - Bridge configuration (channel names, registry and initialization policies)
//! - Lifecycle event bus
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the registry and service
//! crates depend on. It establishes the configuration builder, logging
//! conventions, and event broadcasting used throughout the bridge.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
