//! Event dispatcher: turns committed changes into channel broadcasts.
//!
//! The dispatcher is called from inside a unit of work. It resolves and formats the event while
//! the transaction is still open, so the payload reflects exactly the data being committed. It
//! then queues the broadcast with [`UnitOfWork::on_commit`]. Nothing is sent if the transaction
//! rolls back.
//!
//! Dispatch never fails the write. Every lookup or serialisation problem is logged and the
//! event is dropped.

use crate::change::Transition;
use crate::formatter::{AccessRequestPayload, ItemPayload, Notification};
use crate::model::{AccessRequestId, AccessRequestItem};
use crate::registry::{Channel, ChannelMessage, SubscriptionRegistry};
use crate::store::{rows, UnitOfWork};
use crate::{AccessError, AccessResult};
use std::sync::Arc;

/// Whether a request event announces a new request or an edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestAction {
    Created,
    Updated,
}

#[derive(Clone, Debug)]
pub struct EventDispatcher {
    registry: Arc<SubscriptionRegistry>,
}

impl EventDispatcher {
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Queues a `created`/`updated` event for the request's user channel.
    pub fn stage_access_request(
        &self,
        uow: &mut UnitOfWork<'_>,
        request_id: AccessRequestId,
        action: RequestAction,
    ) {
        match resolve_request_event(uow, request_id, action) {
            Ok((channel, message)) => self.queue(uow, channel, message),
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "failed to build access request event");
            }
        }
    }

    /// Queues a `status_updated` event for the entity that issued the item's request.
    ///
    /// `item` must already hold the newly written status.
    pub fn stage_item_transition(
        &self,
        uow: &mut UnitOfWork<'_>,
        transition: Transition,
        item: &AccessRequestItem,
    ) {
        tracing::debug!(
            item_id = %transition.item_id,
            from = %transition.from,
            to = %transition.to,
            "item status transition"
        );

        match resolve_item_event(uow, item) {
            Ok((channel, message)) => self.queue(uow, channel, message),
            Err(e) => {
                tracing::error!(item_id = %item.id, error = %e, "failed to build item status event");
            }
        }
    }

    fn queue(&self, uow: &mut UnitOfWork<'_>, channel: Channel, message: ChannelMessage) {
        let registry = self.registry.clone();
        uow.on_commit(move || {
            let delivered = registry.broadcast(channel, message);
            tracing::debug!(%channel, delivered, "dispatched event");
        });
    }
}

fn resolve_request_event(
    uow: &UnitOfWork<'_>,
    request_id: AccessRequestId,
    action: RequestAction,
) -> AccessResult<(Channel, ChannelMessage)> {
    let access_request = AccessRequestPayload::load(uow.conn(), request_id)?;
    let channel = Channel::User(access_request.user_id);
    let notification = match action {
        RequestAction::Created => Notification::Created { access_request },
        RequestAction::Updated => Notification::Updated { access_request },
    };

    let message = ChannelMessage::AccessRequestEvent {
        message: notification.to_json()?.into(),
    };
    Ok((channel, message))
}

fn resolve_item_event(
    uow: &UnitOfWork<'_>,
    item: &AccessRequestItem,
) -> AccessResult<(Channel, ChannelMessage)> {
    let entity_id = rows::entity_for_request(uow.conn(), item.access_request_id)?
        .ok_or(AccessError::AccessRequestNotFound(item.access_request_id))?;

    let notification = Notification::StatusUpdated {
        access_request_item: ItemPayload::from(item),
    };
    let message = ChannelMessage::AccessRequestItemEvent {
        message: notification.to_json()?.into(),
    };
    Ok((Channel::Entity(entity_id), message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::Transition;
    use crate::model::{DataType, EntityId, ItemStatus, UserId};
    use crate::registry::ConnectionId;
    use crate::store::Store;
    use chrono::Utc;
    use tokio::sync::mpsc::unbounded_channel;

    fn seed(store: &Store) -> (EntityId, UserId) {
        store
            .write(|uow| {
                uow.conn().execute(
                    "INSERT INTO entities (name, entity_type) VALUES ('Clinic', 'clinic')",
                    [],
                )?;
                uow.conn()
                    .execute("INSERT INTO users (username) VALUES ('ana')", [])?;
                Ok((EntityId(1), UserId(1)))
            })
            .expect("seed should succeed")
    }

    #[test]
    fn test_request_event_waits_for_commit() {
        let store = Store::open_in_memory().expect("store should open");
        let (entity_id, user_id) = seed(&store);
        let registry = Arc::new(SubscriptionRegistry::new());
        let dispatcher = EventDispatcher::new(registry.clone());

        let (tx, mut rx) = unbounded_channel();
        registry.subscribe(Channel::User(user_id), ConnectionId::new(), tx);

        store
            .write(|uow| {
                let request = rows::insert_request(uow.conn(), entity_id, user_id, "x", Utc::now())?;
                rows::insert_item(uow.conn(), request.id, DataType::PersonalInfo, Utc::now())?;
                dispatcher.stage_access_request(uow, request.id, RequestAction::Created);
                assert_eq!(uow.pending_callbacks(), 1);
                assert!(rx.try_recv().is_err(), "nothing is sent before commit");
                Ok(())
            })
            .expect("write should succeed");

        let msg = rx.try_recv().expect("event after commit");
        assert!(matches!(msg, ChannelMessage::AccessRequestEvent { .. }));
        let value: serde_json::Value = serde_json::from_str(msg.message()).unwrap();
        assert_eq!(value["action"], "created");
        assert_eq!(value["access_request"]["items"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_request_is_swallowed() {
        let store = Store::open_in_memory().expect("store should open");
        let dispatcher = EventDispatcher::new(Arc::new(SubscriptionRegistry::new()));

        store
            .write(|uow| {
                dispatcher.stage_access_request(uow, AccessRequestId(99), RequestAction::Updated);
                assert_eq!(uow.pending_callbacks(), 0);
                Ok(())
            })
            .expect("write must not fail because of dispatch");
    }

    #[test]
    fn test_item_event_goes_to_entity_channel() {
        let store = Store::open_in_memory().expect("store should open");
        let (entity_id, user_id) = seed(&store);
        let registry = Arc::new(SubscriptionRegistry::new());
        let dispatcher = EventDispatcher::new(registry.clone());

        let (entity_tx, mut entity_rx) = unbounded_channel();
        let (user_tx, mut user_rx) = unbounded_channel();
        registry.subscribe(Channel::Entity(entity_id), ConnectionId::new(), entity_tx);
        registry.subscribe(Channel::User(user_id), ConnectionId::new(), user_tx);

        store
            .write(|uow| {
                let request = rows::insert_request(uow.conn(), entity_id, user_id, "x", Utc::now())?;
                let mut item =
                    rows::insert_item(uow.conn(), request.id, DataType::MedicalInfo, Utc::now())?;
                item.status = ItemStatus::Approved;
                item.status_set_at = Some(Utc::now());
                rows::save_item(uow.conn(), &item)?;
                dispatcher.stage_item_transition(
                    uow,
                    Transition {
                        item_id: item.id,
                        from: ItemStatus::Pending,
                        to: ItemStatus::Approved,
                    },
                    &item,
                );
                Ok(())
            })
            .expect("write should succeed");

        let msg = entity_rx.try_recv().expect("entity should receive");
        assert!(matches!(msg, ChannelMessage::AccessRequestItemEvent { .. }));
        let value: serde_json::Value = serde_json::from_str(msg.message()).unwrap();
        assert_eq!(value["action"], "status_updated");
        assert_eq!(value["access_request_item"]["status"], "approved");
        assert!(user_rx.try_recv().is_err(), "user channel gets no item events");
    }

    #[test]
    fn test_rolled_back_transition_sends_nothing() {
        let store = Store::open_in_memory().expect("store should open");
        let (entity_id, user_id) = seed(&store);
        let registry = Arc::new(SubscriptionRegistry::new());
        let dispatcher = EventDispatcher::new(registry.clone());
        let (tx, mut rx) = unbounded_channel();
        registry.subscribe(Channel::User(user_id), ConnectionId::new(), tx);

        let result: AccessResult<()> = store.write(|uow| {
            let request = rows::insert_request(uow.conn(), entity_id, user_id, "x", Utc::now())?;
            dispatcher.stage_access_request(uow, request.id, RequestAction::Created);
            Err(AccessError::InvalidInput("abort".into()))
        });

        assert!(result.is_err());
        assert!(rx.try_recv().is_err());
    }
}
