//! Virtual device implementations — lights and everything else.
//!
//! Entities in the `light` domain become a [`VirtualLight`] that reacts to
//! light commands; every other entity is a [`VirtualSensor`] driven from
//! outside.

mod light;
mod sensor;

pub use light::{DEFAULT_BRIGHTNESS, VirtualLight};
pub use sensor::VirtualSensor;

use lumo_domain::entity::{AttributeValue, EntitySnapshot, EntityState};
use lumo_domain::id::EntityId;
use lumo_domain::time::Timestamp;

/// Wrapper enum for the concrete virtual device types.
#[derive(Debug, Clone)]
pub enum VirtualDevice {
    Light(VirtualLight),
    Sensor(VirtualSensor),
}

impl VirtualDevice {
    /// Pick the device kind from the entity's domain.
    #[must_use]
    pub fn new(entity_id: EntityId, state: EntityState) -> Self {
        if entity_id.domain() == "light" {
            Self::Light(VirtualLight::new(entity_id, state))
        } else {
            Self::Sensor(VirtualSensor::new(entity_id, state))
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> &EntitySnapshot {
        match self {
            Self::Light(d) => d.snapshot(),
            Self::Sensor(d) => d.snapshot(),
        }
    }

    pub fn set_state(&mut self, state: EntityState, ts: Timestamp) {
        match self {
            Self::Light(d) => d.set_state(state, ts),
            Self::Sensor(d) => d.set_state(state, ts),
        }
    }

    pub fn set_attribute(&mut self, key: String, value: AttributeValue) {
        match self {
            Self::Light(d) => d.set_attribute(key, value),
            Self::Sensor(d) => d.set_attribute(key, value),
        }
    }
}
