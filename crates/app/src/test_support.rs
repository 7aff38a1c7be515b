//! In-memory hub for behavior tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use tokio::sync::mpsc;

use lumo_domain::entity::{AttributeValue, BRIGHTNESS, EntitySnapshot, EntityState};
use lumo_domain::error::LumoError;
use lumo_domain::event::StateChange;
use lumo_domain::id::{EntityId, SubscriptionId};
use lumo_domain::service::LightCommand;

use crate::ports::{DeviceHub, Subscription};

struct Subscriber {
    id: SubscriptionId,
    entity_id: EntityId,
    filter: Option<EntityState>,
    tx: mpsc::UnboundedSender<StateChange>,
}

#[derive(Default)]
struct Inner {
    entities: HashMap<EntityId, EntitySnapshot>,
    subscribers: Vec<Subscriber>,
    commands: Vec<(EntityId, LightCommand)>,
}

#[derive(Default)]
pub(crate) struct FakeHub {
    inner: Mutex<Inner>,
}

pub(crate) fn id(raw: &str) -> EntityId {
    EntityId::parse(raw).unwrap()
}

impl FakeHub {
    /// Set an entity's state and notify subscribers.
    pub(crate) fn set(&self, entity_id: &str, state: impl Into<EntityState>) {
        let entity_id = id(entity_id);
        let new = state.into();
        let mut inner = self.inner.lock().unwrap();
        let old = match inner.entities.get_mut(&entity_id) {
            Some(snapshot) => {
                let old = snapshot.state.clone();
                snapshot.update_state(new.clone(), lumo_domain::time::now());
                Some(old)
            }
            None => {
                let snapshot = EntitySnapshot::builder()
                    .entity_id(entity_id.as_str())
                    .state(new.clone())
                    .build()
                    .unwrap();
                inner.entities.insert(entity_id.clone(), snapshot);
                None
            }
        };
        Self::notify(&mut inner, &StateChange::new(entity_id, old, new));
    }

    pub(crate) fn set_brightness(&self, entity_id: &str, brightness: Option<u8>) {
        let mut inner = self.inner.lock().unwrap();
        let snapshot = inner.entities.get_mut(&id(entity_id)).unwrap();
        match brightness {
            Some(b) => {
                snapshot
                    .attributes
                    .insert(BRIGHTNESS.to_string(), AttributeValue::from(b));
            }
            None => {
                snapshot.attributes.remove(BRIGHTNESS);
            }
        }
    }

    pub(crate) fn brightness(&self, entity_id: &str) -> Option<u8> {
        let inner = self.inner.lock().unwrap();
        inner.entities.get(&id(entity_id)).and_then(EntitySnapshot::brightness)
    }

    pub(crate) fn commands(&self) -> Vec<LightCommand> {
        let inner = self.inner.lock().unwrap();
        inner.commands.iter().map(|(_, c)| *c).collect()
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap().subscribers.len()
    }

    fn notify(inner: &mut Inner, change: &StateChange) {
        inner.subscribers.retain(|sub| {
            if sub.entity_id != change.entity_id || !change.matches(sub.filter.as_ref()) {
                return true;
            }
            sub.tx.send(change.clone()).is_ok()
        });
    }
}

impl DeviceHub for FakeHub {
    fn subscribe(
        &self,
        entity_id: &EntityId,
        filter: Option<EntityState>,
    ) -> impl Future<Output = Result<Subscription, LumoError>> + Send {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriptionId::new();
        self.inner.lock().unwrap().subscribers.push(Subscriber {
            id,
            entity_id: entity_id.clone(),
            filter,
            tx,
        });
        let subscription = Subscription {
            id,
            entity_id: entity_id.clone(),
            changes: rx,
        };
        async { Ok(subscription) }
    }

    fn unsubscribe(
        &self,
        id: SubscriptionId,
    ) -> impl Future<Output = Result<(), LumoError>> + Send {
        self.inner
            .lock()
            .unwrap()
            .subscribers
            .retain(|sub| sub.id != id);
        async { Ok(()) }
    }

    fn get_state(
        &self,
        entity_id: &EntityId,
    ) -> impl Future<Output = Result<Option<EntitySnapshot>, LumoError>> + Send {
        let snapshot = self.inner.lock().unwrap().entities.get(entity_id).cloned();
        async { Ok(snapshot) }
    }

    fn call_service(
        &self,
        entity_id: &EntityId,
        command: LightCommand,
    ) -> impl Future<Output = Result<(), LumoError>> + Send {
        let mut inner = self.inner.lock().unwrap();
        inner.commands.push((entity_id.clone(), command));
        if let Some(snapshot) = inner.entities.get_mut(entity_id) {
            let next = match command {
                LightCommand::TurnOn { brightness } => {
                    if let Some(b) = brightness {
                        snapshot
                            .attributes
                            .insert(BRIGHTNESS.to_string(), AttributeValue::from(b));
                    }
                    EntityState::On
                }
                LightCommand::TurnOff => EntityState::Off,
                LightCommand::Toggle if snapshot.state.is_on() => EntityState::Off,
                LightCommand::Toggle => EntityState::On,
            };
            snapshot.update_state(next, lumo_domain::time::now());
        }
        async { Ok(()) }
    }
}
