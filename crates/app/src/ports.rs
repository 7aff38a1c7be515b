//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the behaviors and the outside world.
//! They are defined here (in `app`) so that both the behaviors and the
//! adapters can depend on them without creating circular dependencies.

pub mod device_hub;

pub use device_hub::{DeviceHub, Subscription};
