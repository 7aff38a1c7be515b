//! State change — what a hub subscription delivers.

use serde::{Deserialize, Serialize};

use crate::entity::EntityState;
use crate::id::EntityId;
use crate::time::{Timestamp, now};

/// One reported state change of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub entity_id: EntityId,
    /// `None` when the entity had no known state before.
    pub old: Option<EntityState>,
    pub new: EntityState,
    pub timestamp: Timestamp,
}

impl StateChange {
    /// Create a state change stamped with the current time.
    #[must_use]
    pub fn new(entity_id: EntityId, old: Option<EntityState>, new: EntityState) -> Self {
        Self {
            entity_id,
            old,
            new,
            timestamp: now(),
        }
    }

    /// Whether this change passes an optional subscription filter.
    #[must_use]
    pub fn matches(&self, filter: Option<&EntityState>) -> bool {
        filter.is_none_or(|expected| &self.new == expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(new: EntityState) -> StateChange {
        StateChange::new(
            EntityId::parse("binary_sensor.pushbutton").unwrap(),
            Some(EntityState::Off),
            new,
        )
    }

    #[test]
    fn should_match_everything_without_filter() {
        assert!(change(EntityState::On).matches(None));
        assert!(change(EntityState::Off).matches(None));
    }

    #[test]
    fn should_match_only_filtered_new_state() {
        assert!(change(EntityState::On).matches(Some(&EntityState::On)));
        assert!(!change(EntityState::Off).matches(Some(&EntityState::On)));
    }
}
