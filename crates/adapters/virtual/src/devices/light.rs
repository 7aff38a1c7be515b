//! Virtual light — responds to `turn_on`, `turn_off`, `toggle`, remembers
//! its last brightness.

use std::collections::HashMap;

use lumo_domain::entity::{AttributeValue, BRIGHTNESS, EntitySnapshot, EntityState};
use lumo_domain::id::EntityId;
use lumo_domain::service::LightCommand;
use lumo_domain::time::{Timestamp, now};

/// Brightness a light comes on at when it never had one.
pub const DEFAULT_BRIGHTNESS: u8 = 255;

/// A simulated dimmable light.
///
/// The brightness attribute is only present while the light is on, like a
/// real light reporting through the hub.
#[derive(Debug, Clone)]
pub struct VirtualLight {
    snapshot: EntitySnapshot,
    last_brightness: u8,
}

impl VirtualLight {
    #[must_use]
    pub fn new(entity_id: EntityId, state: EntityState) -> Self {
        let mut light = Self {
            snapshot: EntitySnapshot {
                entity_id,
                state: EntityState::Off,
                attributes: HashMap::new(),
                last_changed: now(),
            },
            last_brightness: DEFAULT_BRIGHTNESS,
        };
        light.set_state(state, now());
        light
    }

    #[must_use]
    pub fn snapshot(&self) -> &EntitySnapshot {
        &self.snapshot
    }

    /// Apply a light command.
    pub fn handle_command(&mut self, command: LightCommand, ts: Timestamp) {
        match command {
            LightCommand::TurnOn { brightness } => self.turn_on(brightness, ts),
            LightCommand::TurnOff => self.turn_off(ts),
            LightCommand::Toggle if self.snapshot.state.is_on() => self.turn_off(ts),
            LightCommand::Toggle => self.turn_on(None, ts),
        }
    }

    /// Force a state from outside, as if the light was operated by hand.
    pub fn set_state(&mut self, state: EntityState, ts: Timestamp) {
        match state {
            EntityState::On => self.turn_on(None, ts),
            EntityState::Off => self.turn_off(ts),
            other => {
                self.snapshot.attributes.remove(BRIGHTNESS);
                self.snapshot.update_state(other, ts);
            }
        }
    }

    /// Set a raw attribute. Setting `brightness` also updates the level the
    /// light comes back on at.
    pub fn set_attribute(&mut self, key: String, value: AttributeValue) {
        if key == BRIGHTNESS
            && let Some(level) = value.as_i64().and_then(|v| u8::try_from(v).ok())
        {
            self.last_brightness = level;
        }
        self.snapshot.attributes.insert(key, value);
    }

    fn turn_on(&mut self, brightness: Option<u8>, ts: Timestamp) {
        let level = brightness.unwrap_or(self.last_brightness);
        self.last_brightness = level;
        self.snapshot
            .attributes
            .insert(BRIGHTNESS.to_string(), AttributeValue::from(level));
        self.snapshot.update_state(EntityState::On, ts);
    }

    fn turn_off(&mut self, ts: Timestamp) {
        self.snapshot.attributes.remove(BRIGHTNESS);
        self.snapshot.update_state(EntityState::Off, ts);
    }
}
