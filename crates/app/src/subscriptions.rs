//! A behavior's set of hub subscriptions, merged into one stream.

use std::hash::Hash;

use tokio_stream::StreamExt;
use tokio_stream::StreamMap;
use tokio_stream::wrappers::UnboundedReceiverStream;

use lumo_domain::entity::EntityState;
use lumo_domain::error::LumoError;
use lumo_domain::event::StateChange;
use lumo_domain::id::{EntityId, SubscriptionId};

use crate::ports::DeviceHub;

/// Subscriptions keyed by the role the entity plays for its owner.
///
/// Changes from all of them come out of [`next`](Self::next) one at a time,
/// which is what serializes a behavior's callbacks.
pub(crate) struct Subscriptions<K> {
    streams: StreamMap<K, UnboundedReceiverStream<StateChange>>,
    ids: Vec<SubscriptionId>,
}

impl<K> Subscriptions<K>
where
    K: Clone + Eq + Hash + Unpin,
{
    pub(crate) fn new() -> Self {
        Self {
            streams: StreamMap::new(),
            ids: Vec::new(),
        }
    }

    pub(crate) async fn add<H: DeviceHub>(
        &mut self,
        hub: &H,
        key: K,
        entity_id: &EntityId,
        filter: Option<EntityState>,
    ) -> Result<(), LumoError> {
        let subscription = hub.subscribe(entity_id, filter).await?;
        self.ids.push(subscription.id);
        self.streams
            .insert(key, UnboundedReceiverStream::new(subscription.changes));
        Ok(())
    }

    /// Next change from any subscription; `None` once every stream closed.
    pub(crate) async fn next(&mut self) -> Option<(K, StateChange)> {
        self.streams.next().await
    }

    /// Unsubscribe everything. Failures are logged, not returned: teardown
    /// keeps going.
    pub(crate) async fn release<H: DeviceHub>(self, hub: &H) {
        for id in self.ids {
            if let Err(err) = hub.unsubscribe(id).await {
                tracing::warn!(%err, subscription = %id, "failed to unsubscribe");
            }
        }
    }
}
