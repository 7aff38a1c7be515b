//! Virtual sensor — any non-light entity (switch, binary sensor, numeric
//! sensor). Its state is only ever driven from outside.

use std::collections::HashMap;

use lumo_domain::entity::{AttributeValue, EntitySnapshot, EntityState};
use lumo_domain::id::EntityId;
use lumo_domain::time::{Timestamp, now};

/// A simulated read-only entity.
#[derive(Debug, Clone)]
pub struct VirtualSensor {
    snapshot: EntitySnapshot,
}

impl VirtualSensor {
    #[must_use]
    pub fn new(entity_id: EntityId, state: EntityState) -> Self {
        Self {
            snapshot: EntitySnapshot {
                entity_id,
                state,
                attributes: HashMap::new(),
                last_changed: now(),
            },
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> &EntitySnapshot {
        &self.snapshot
    }

    pub fn set_state(&mut self, state: EntityState, ts: Timestamp) {
        self.snapshot.update_state(state, ts);
    }

    pub fn set_attribute(&mut self, key: String, value: AttributeValue) {
        self.snapshot.attributes.insert(key, value);
    }
}
