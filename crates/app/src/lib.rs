//! # lumo-app
//!
//! Application layer — the two lighting behaviors and the **port** they
//! drive.
//!
//! ## Responsibilities
//! - Define the `DeviceHub` port that adapters implement (subscribe to
//!   state changes, read state, issue light commands)
//! - Provide in-process infrastructure that needs no IO (timers)
//! - Run each behavior instance as its own task:
//!   - `BrightnessCycler` — hold a switch to cycle brightness, click to toggle
//!   - `MotionLightController` — motion/manual/timer state machine per light
//!
//! ## Dependency rule
//! Depends on `lumo-domain` only (plus `tokio` for tasks, channels and time).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod brightness_cycler;
pub mod motion_light;
pub mod ports;
pub mod timer;

mod subscriptions;

#[cfg(test)]
mod test_support;
