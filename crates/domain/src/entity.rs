//! Entity — an addressable light, switch or sensor as seen through the hub.
//!
//! lumo never owns entities; it only reads [`EntitySnapshot`]s from the
//! device hub and issues commands against their ids.

mod attribute_value;
mod state;

pub use attribute_value::AttributeValue;
pub use state::EntityState;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::EntityId;
use crate::time::{Timestamp, now};

/// Attribute key under which lights report their brightness (0–255).
pub const BRIGHTNESS: &str = "brightness";

/// Point-in-time view of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub entity_id: EntityId,
    pub state: EntityState,
    #[serde(default)]
    pub attributes: HashMap<String, AttributeValue>,
    pub last_changed: Timestamp,
}

impl EntitySnapshot {
    /// Create a builder for constructing an [`EntitySnapshot`].
    #[must_use]
    pub fn builder() -> EntitySnapshotBuilder {
        EntitySnapshotBuilder::default()
    }

    #[must_use]
    pub fn get_attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Current brightness, or `None` while the light has not reported one
    /// (for instance mid-transition) or reports something out of range.
    /// Fractional levels are truncated.
    #[must_use]
    pub fn brightness(&self) -> Option<u8> {
        self.get_attribute(BRIGHTNESS)
            .and_then(AttributeValue::as_i64)
            .and_then(|v| u8::try_from(v).ok())
    }

    /// Replace the state, bumping `last_changed` only if it actually changed.
    pub fn update_state(&mut self, state: EntityState, ts: Timestamp) {
        if self.state != state {
            self.state = state;
            self.last_changed = ts;
        }
    }
}

/// Step-by-step builder for [`EntitySnapshot`].
#[derive(Debug, Default)]
pub struct EntitySnapshotBuilder {
    entity_id: Option<String>,
    state: EntityState,
    attributes: HashMap<String, AttributeValue>,
}

impl EntitySnapshotBuilder {
    #[must_use]
    pub fn entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    #[must_use]
    pub fn state(mut self, state: EntityState) -> Self {
        self.state = state;
        self
    }

    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Consume the builder and validate the entity id.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingField`] when no id was given and
    /// [`ValidationError::InvalidEntityId`] when it is malformed.
    pub fn build(self) -> Result<EntitySnapshot, ValidationError> {
        let raw = self
            .entity_id
            .ok_or(ValidationError::MissingField("entity_id"))?;
        Ok(EntitySnapshot {
            entity_id: EntityId::parse(raw)?,
            state: self.state,
            attributes: self.attributes,
            last_changed: now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_build_snapshot_with_attributes() {
        let snapshot = EntitySnapshot::builder()
            .entity_id("light.bedside")
            .state(EntityState::On)
            .attribute(BRIGHTNESS, 120u8)
            .build()
            .unwrap();
        assert_eq!(snapshot.entity_id.as_str(), "light.bedside");
        assert_eq!(snapshot.brightness(), Some(120));
    }

    #[test]
    fn should_require_entity_id() {
        let result = EntitySnapshot::builder().build();
        assert_eq!(result, Err(ValidationError::MissingField("entity_id")));
    }

    #[test]
    fn should_report_missing_brightness_as_none() {
        let snapshot = EntitySnapshot::builder()
            .entity_id("light.bedside")
            .state(EntityState::On)
            .build()
            .unwrap();
        assert_eq!(snapshot.brightness(), None);
    }

    #[test]
    fn should_ignore_out_of_range_brightness() {
        let snapshot = EntitySnapshot::builder()
            .entity_id("light.bedside")
            .attribute(BRIGHTNESS, AttributeValue::Int(400))
            .build()
            .unwrap();
        assert_eq!(snapshot.brightness(), None);
    }

    #[test]
    fn should_truncate_fractional_brightness() {
        let snapshot = EntitySnapshot::builder()
            .entity_id("light.bedside")
            .state(EntityState::On)
            .attribute(BRIGHTNESS, AttributeValue::Float(127.6))
            .build()
            .unwrap();
        assert_eq!(snapshot.brightness(), Some(127));
    }

    #[test]
    fn should_only_bump_last_changed_on_real_change() {
        let mut snapshot = EntitySnapshot::builder()
            .entity_id("switch.hall")
            .state(EntityState::Off)
            .build()
            .unwrap();
        let original = snapshot.last_changed;
        let later = original + chrono::Duration::seconds(5);

        snapshot.update_state(EntityState::Off, later);
        assert_eq!(snapshot.last_changed, original);

        snapshot.update_state(EntityState::On, later);
        assert_eq!(snapshot.last_changed, later);
        assert_eq!(snapshot.state, EntityState::On);
    }
}
