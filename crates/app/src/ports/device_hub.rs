//! Device hub port — the host automation runtime as seen by the behaviors.
//!
//! A hub owns every entity. Behaviors subscribe to the entities they watch,
//! read current state on demand and send fire-and-forget light commands.

use std::future::Future;

use tokio::sync::mpsc;

use lumo_domain::entity::{EntitySnapshot, EntityState};
use lumo_domain::error::LumoError;
use lumo_domain::event::StateChange;
use lumo_domain::id::{EntityId, SubscriptionId};
use lumo_domain::service::LightCommand;

/// A live state-change subscription.
///
/// Dropping the receiver stops delivery on the hub side at the next change;
/// holders that want a clean teardown call
/// [`DeviceHub::unsubscribe`] with [`id`](Self::id).
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub entity_id: EntityId,
    pub changes: mpsc::UnboundedReceiver<StateChange>,
}

/// Access to the host automation runtime.
pub trait DeviceHub: Send + Sync {
    /// Receive every reported state change of `entity_id`, or only those
    /// whose new state equals `filter`.
    fn subscribe(
        &self,
        entity_id: &EntityId,
        filter: Option<EntityState>,
    ) -> impl Future<Output = Result<Subscription, LumoError>> + Send;

    /// Stop a subscription. Unknown or already removed ids are a no-op.
    fn unsubscribe(&self, id: SubscriptionId)
    -> impl Future<Output = Result<(), LumoError>> + Send;

    /// Current snapshot of an entity, `None` if the hub does not know it.
    fn get_state(
        &self,
        entity_id: &EntityId,
    ) -> impl Future<Output = Result<Option<EntitySnapshot>, LumoError>> + Send;

    /// Issue a command. No acknowledgment: success only means the hub
    /// accepted the request.
    fn call_service(
        &self,
        entity_id: &EntityId,
        command: LightCommand,
    ) -> impl Future<Output = Result<(), LumoError>> + Send;
}
