//! # lumo-adapter-virtual
//!
//! In-memory [`DeviceHub`] that simulates the entities the behaviors talk
//! to. Used by the integration tests and by `lumod` when no real hub is
//! attached.
//!
//! ## Simulated entities
//!
//! | Domain | Device | Behaviour |
//! |--------|--------|-----------|
//! | `light` | [`VirtualLight`](devices::VirtualLight) | Responds to `turn_on` / `turn_off` / `toggle`, reports `brightness` while on |
//! | anything else | [`VirtualSensor`](devices::VirtualSensor) | Holds whatever state the driver sets |
//!
//! The *driver* side ([`VirtualHub::set_state`], [`VirtualHub::set_attribute`])
//! stands in for the physical world: pressing a switch, a motion sensor
//! tripping, the sun coming up.
//!
//! ## Dependency rule
//!
//! Depends on `lumo-app` (port traits) and `lumo-domain` only.

pub mod devices;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use lumo_app::ports::{DeviceHub, Subscription};
use lumo_domain::entity::{AttributeValue, EntitySnapshot, EntityState};
use lumo_domain::error::LumoError;
use lumo_domain::event::StateChange;
use lumo_domain::id::{EntityId, SubscriptionId};
use lumo_domain::service::LightCommand;
use lumo_domain::time::now;

use devices::VirtualDevice;

/// Errors raised by the virtual hub.
#[derive(Debug, thiserror::Error)]
pub enum VirtualHubError {
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    #[error("entity {0} is not a light")]
    NotALight(EntityId),
}

struct Subscriber {
    id: SubscriptionId,
    entity_id: EntityId,
    filter: Option<EntityState>,
    tx: mpsc::UnboundedSender<StateChange>,
}

#[derive(Default)]
struct Inner {
    devices: HashMap<EntityId, VirtualDevice>,
    subscribers: Vec<Subscriber>,
}

impl Inner {
    /// Deliver `change` to every matching subscriber, dropping those whose
    /// receiver is gone.
    fn notify(&mut self, change: &StateChange) {
        self.subscribers.retain(|sub| {
            if sub.entity_id != change.entity_id || !change.matches(sub.filter.as_ref()) {
                return true;
            }
            sub.tx.send(change.clone()).is_ok()
        });
    }

    /// Run `update` on a device and notify subscribers if its state moved.
    fn update<F>(&mut self, entity_id: &EntityId, update: F) -> Result<(), VirtualHubError>
    where
        F: FnOnce(&mut VirtualDevice) -> Result<(), VirtualHubError>,
    {
        let device = self
            .devices
            .get_mut(entity_id)
            .ok_or_else(|| VirtualHubError::UnknownEntity(entity_id.clone()))?;
        let old = device.snapshot().state.clone();
        update(device)?;
        let new = device.snapshot().state.clone();

        if old != new {
            tracing::debug!(%entity_id, %old, %new, "virtual entity changed");
            self.notify(&StateChange::new(entity_id.clone(), Some(old), new));
        }
        Ok(())
    }
}

/// Simulated device hub.
#[derive(Default)]
pub struct VirtualHub {
    inner: Mutex<Inner>,
}

impl VirtualHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`add_entity`](Self::add_entity).
    #[must_use]
    pub fn with_entity(self, entity_id: EntityId, state: EntityState) -> Self {
        self.add_entity(entity_id, state);
        self
    }

    /// Register an entity, replacing any previous one with the same id.
    /// Lights come up at full brightness when seeded `on`.
    pub fn add_entity(&self, entity_id: EntityId, state: EntityState) {
        let device = VirtualDevice::new(entity_id.clone(), state);
        self.lock().devices.insert(entity_id, device);
    }

    /// Whether the hub knows `entity_id`.
    #[must_use]
    pub fn contains(&self, entity_id: &EntityId) -> bool {
        self.lock().devices.contains_key(entity_id)
    }

    /// Every registered entity id, sorted.
    #[must_use]
    pub fn entity_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.lock().devices.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Current snapshot of an entity.
    #[must_use]
    pub fn snapshot(&self, entity_id: &EntityId) -> Option<EntitySnapshot> {
        self.lock()
            .devices
            .get(entity_id)
            .map(|d| d.snapshot().clone())
    }

    /// Drive an entity's state from outside. Subscribers are notified when
    /// the state actually changes.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualHubError::UnknownEntity`] if the entity was never
    /// registered.
    pub fn set_state(
        &self,
        entity_id: &EntityId,
        state: impl Into<EntityState>,
    ) -> Result<(), VirtualHubError> {
        let state = state.into();
        self.lock().update(entity_id, |device| {
            device.set_state(state, now());
            Ok(())
        })
    }

    /// Set an attribute without touching the state. No notification is sent.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualHubError::UnknownEntity`] if the entity was never
    /// registered.
    pub fn set_attribute(
        &self,
        entity_id: &EntityId,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Result<(), VirtualHubError> {
        let mut inner = self.lock();
        let device = inner
            .devices
            .get_mut(entity_id)
            .ok_or_else(|| VirtualHubError::UnknownEntity(entity_id.clone()))?;
        device.set_attribute(key.into(), value.into());
        Ok(())
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply_command(
        &self,
        entity_id: &EntityId,
        command: LightCommand,
    ) -> Result<(), VirtualHubError> {
        self.lock().update(entity_id, |device| match device {
            VirtualDevice::Light(light) => {
                light.handle_command(command, now());
                Ok(())
            }
            VirtualDevice::Sensor(_) => Err(VirtualHubError::NotALight(entity_id.clone())),
        })
    }
}

impl DeviceHub for VirtualHub {
    fn subscribe(
        &self,
        entity_id: &EntityId,
        filter: Option<EntityState>,
    ) -> impl Future<Output = Result<Subscription, LumoError>> + Send {
        let (tx, changes) = mpsc::unbounded_channel();
        let id = SubscriptionId::new();
        self.lock().subscribers.push(Subscriber {
            id,
            entity_id: entity_id.clone(),
            filter,
            tx,
        });
        tracing::trace!(%entity_id, subscription = %id, "virtual subscription added");

        let subscription = Subscription {
            id,
            entity_id: entity_id.clone(),
            changes,
        };
        async { Ok(subscription) }
    }

    fn unsubscribe(&self, id: SubscriptionId) -> impl Future<Output = Result<(), LumoError>> + Send {
        self.lock().subscribers.retain(|sub| sub.id != id);
        async { Ok(()) }
    }

    fn get_state(
        &self,
        entity_id: &EntityId,
    ) -> impl Future<Output = Result<Option<EntitySnapshot>, LumoError>> + Send {
        let snapshot = self.snapshot(entity_id);
        async { Ok(snapshot) }
    }

    fn call_service(
        &self,
        entity_id: &EntityId,
        command: LightCommand,
    ) -> impl Future<Output = Result<(), LumoError>> + Send {
        tracing::debug!(%entity_id, service = command.service(), %command, "virtual service call");
        let result = self
            .apply_command(entity_id, command)
            .map_err(LumoError::hub);
        async { result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> EntityId {
        EntityId::parse(raw).unwrap()
    }

    fn hub() -> VirtualHub {
        VirtualHub::new()
            .with_entity(id("light.bedside"), EntityState::Off)
            .with_entity(id("binary_sensor.switch_158"), EntityState::Off)
            .with_entity(id("sensor.hall_lux"), EntityState::from("12"))
    }

    #[tokio::test]
    async fn should_pick_device_kind_from_domain() {
        let hub = hub();
        assert!(
            hub.call_service(&id("light.bedside"), LightCommand::ON)
                .await
                .is_ok()
        );
        let err = hub
            .call_service(&id("binary_sensor.switch_158"), LightCommand::ON)
            .await
            .unwrap_err();
        assert!(matches!(err, LumoError::Hub(_)));
    }

    #[tokio::test]
    async fn should_return_none_for_unknown_entity() {
        let hub = hub();
        assert!(hub.get_state(&id("light.kitchen")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_reject_commands_for_unknown_entity() {
        let hub = hub();
        let result = hub
            .call_service(&id("light.kitchen"), LightCommand::TurnOff)
            .await;
        assert!(matches!(result, Err(LumoError::Hub(_))));
    }

    #[tokio::test]
    async fn should_deliver_changes_to_subscribers() {
        let hub = hub();
        let switch = id("binary_sensor.switch_158");
        let mut sub = hub.subscribe(&switch, None).await.unwrap();

        hub.set_state(&switch, "on").unwrap();

        let change = sub.changes.recv().await.unwrap();
        assert_eq!(change.entity_id, switch);
        assert_eq!(change.old, Some(EntityState::Off));
        assert_eq!(change.new, EntityState::On);
    }

    #[tokio::test]
    async fn should_not_notify_when_state_is_unchanged() {
        let hub = hub();
        let switch = id("binary_sensor.switch_158");
        let mut sub = hub.subscribe(&switch, None).await.unwrap();

        hub.set_state(&switch, "off").unwrap();
        hub.set_state(&switch, "on").unwrap();

        assert_eq!(sub.changes.recv().await.unwrap().new, EntityState::On);
        assert!(sub.changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_apply_subscription_filter() {
        let hub = hub();
        let switch = id("binary_sensor.switch_158");
        let mut sub = hub
            .subscribe(&switch, Some(EntityState::On))
            .await
            .unwrap();

        hub.set_state(&switch, "on").unwrap();
        hub.set_state(&switch, "off").unwrap();
        hub.set_state(&switch, "on").unwrap();

        assert_eq!(sub.changes.recv().await.unwrap().new, EntityState::On);
        assert_eq!(sub.changes.recv().await.unwrap().new, EntityState::On);
        assert!(sub.changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_stop_delivering_after_unsubscribe() {
        let hub = hub();
        let switch = id("binary_sensor.switch_158");
        let mut sub = hub.subscribe(&switch, None).await.unwrap();

        hub.unsubscribe(sub.id).await.unwrap();
        hub.unsubscribe(sub.id).await.unwrap();
        hub.set_state(&switch, "on").unwrap();

        assert_eq!(hub.subscriber_count(), 0);
        assert!(sub.changes.recv().await.is_none());
    }

    #[tokio::test]
    async fn should_notify_light_subscribers_on_command() {
        let hub = hub();
        let light = id("light.bedside");
        let mut sub = hub.subscribe(&light, None).await.unwrap();

        hub.call_service(&light, LightCommand::Toggle).await.unwrap();

        assert_eq!(sub.changes.recv().await.unwrap().new, EntityState::On);
        let snapshot = hub.get_state(&light).await.unwrap().unwrap();
        assert_eq!(snapshot.brightness(), Some(devices::DEFAULT_BRIGHTNESS));
    }

    #[tokio::test]
    async fn should_set_brightness_without_notifying() {
        let hub = hub();
        let light = id("light.bedside");
        hub.call_service(&light, LightCommand::ON).await.unwrap();
        let mut sub = hub.subscribe(&light, None).await.unwrap();

        hub.set_attribute(&light, "brightness", 30u8).unwrap();

        assert_eq!(hub.snapshot(&light).unwrap().brightness(), Some(30));
        assert!(sub.changes.try_recv().is_err());
    }

    #[test]
    fn should_fail_to_drive_unknown_entity() {
        let hub = hub();
        assert!(matches!(
            hub.set_state(&id("switch.nowhere"), "on"),
            Err(VirtualHubError::UnknownEntity(_))
        ));
    }

    #[test]
    fn should_list_entities_sorted() {
        let hub = hub();
        let ids: Vec<_> = hub.entity_ids().into_iter().map(String::from).collect();
        assert_eq!(
            ids,
            vec!["binary_sensor.switch_158", "light.bedside", "sensor.hall_lux"]
        );
    }
}
