//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (e.g., `core-service`, `bridge-desktop`). Host plugins can
//! depend on `sensor-bridge-workspace` and enable the documented features
//! without needing to wire each crate individually.

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;
#[cfg(feature = "desktop-shims")]
pub use core_service;
