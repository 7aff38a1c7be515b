//! # lumo-domain
//!
//! Pure domain model for the lumo lighting behaviors.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Entities** as seen through the device hub (state + attributes)
//! - Define **State changes** (what subscribers receive)
//! - Define **Light commands** (`turn_on`, `turn_off`, `toggle`)
//! - Brightness stepping between bounds (the cycling arithmetic)
//! - The motion-light state machine and its transition table
//! - Instance configuration and its validation
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod brightness;
pub mod config;
pub mod entity;
pub mod event;
pub mod motion;
pub mod service;
