//! Access request lifecycle.
//!
//! This module owns the write path that feeds notifications:
//!
//! - Creating a request inserts the request and one `pending` item per data type in one unit of
//!   work, then stages a `created` event for the user's channel.
//! - Editing a request's purpose stages an `updated` event.
//! - Every item save goes through [`AccessService::update_item`], which captures the stored
//!   status first and stages a `status_updated` event only on a real transition.
//!
//! Events are delivered after commit. A failure to deliver never changes the result returned
//! here.

use crate::change::ChangeDetector;
use crate::config::CoreConfig;
use crate::dispatcher::{EventDispatcher, RequestAction};
use crate::formatter::{AccessRequestPayload, ItemPayload};
use crate::model::{
    AccessRequestId, AccessRequestItem, DataType, EntityId, ItemId, ItemStatus, ItemUpdate,
    RequestFilter, UserId,
};
use crate::store::{rows, Store};
use crate::{AccessError, AccessResult};
use chrono::Utc;
use std::sync::Arc;

/// Service for creating access requests and deciding their items.
#[derive(Clone, Debug)]
pub struct AccessService {
    cfg: Arc<CoreConfig>,
    store: Arc<Store>,
    dispatcher: EventDispatcher,
}

impl AccessService {
    pub fn new(cfg: Arc<CoreConfig>, store: Arc<Store>, dispatcher: EventDispatcher) -> Self {
        Self {
            cfg,
            store,
            dispatcher,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    /// Creates a request from `entity_id` to `user_id` with one pending item per data type.
    ///
    /// Duplicate data types are kept; each produces its own item.
    ///
    /// # Arguments
    ///
    /// * `entity_id` - The requesting entity.
    /// * `user_id` - The owner of the requested data.
    /// * `purpose` - Free-text reason shown to the user.
    /// * `data_types` - Categories requested. Must not be empty.
    ///
    /// # Returns
    ///
    /// The stored request with its entity, user and items resolved.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::InvalidInput` if `data_types` is empty,
    /// `EntityNotFound`/`UserNotFound` if either side does not exist, or
    /// `AccessError::Database` if the write fails.
    pub fn create_access_request(
        &self,
        entity_id: EntityId,
        user_id: UserId,
        purpose: &str,
        data_types: &[DataType],
    ) -> AccessResult<AccessRequestPayload> {
        if data_types.is_empty() {
            return Err(AccessError::InvalidInput(
                "at least one data type must be requested".into(),
            ));
        }

        let payload = self.store.write(|uow| {
            if rows::get_entity(uow.conn(), entity_id)?.is_none() {
                return Err(AccessError::EntityNotFound(entity_id));
            }
            if rows::get_user(uow.conn(), user_id)?.is_none() {
                return Err(AccessError::UserNotFound(user_id));
            }

            let now = Utc::now();
            let request = rows::insert_request(uow.conn(), entity_id, user_id, purpose, now)?;
            for data_type in data_types {
                rows::insert_item(uow.conn(), request.id, *data_type, now)?;
            }

            self.dispatcher
                .stage_access_request(uow, request.id, RequestAction::Created);
            AccessRequestPayload::load(uow.conn(), request.id)
        })?;

        tracing::info!(
            request_id = %payload.id,
            entity_id = %entity_id,
            user_id = %user_id,
            items = payload.items.len(),
            "access request created"
        );
        Ok(payload)
    }

    pub fn get_access_request(&self, id: AccessRequestId) -> AccessResult<AccessRequestPayload> {
        self.store.read(|conn| AccessRequestPayload::load(conn, id))
    }

    pub fn list_access_requests(
        &self,
        filter: RequestFilter,
    ) -> AccessResult<Vec<AccessRequestPayload>> {
        self.store.read(|conn| {
            rows::list_requests(conn, filter)?
                .into_iter()
                .map(|request| AccessRequestPayload::load(conn, request.id))
                .collect()
        })
    }

    /// Replaces the purpose of a request and notifies the user with an `updated` event.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::AccessRequestNotFound` if the request does not exist.
    pub fn update_purpose(
        &self,
        id: AccessRequestId,
        purpose: &str,
    ) -> AccessResult<AccessRequestPayload> {
        self.store.write(|uow| {
            if rows::update_request_purpose(uow.conn(), id, purpose)? == 0 {
                return Err(AccessError::AccessRequestNotFound(id));
            }
            self.dispatcher
                .stage_access_request(uow, id, RequestAction::Updated);
            AccessRequestPayload::load(uow.conn(), id)
        })
    }

    /// Deletes a request and, by cascade, its items. No event is sent.
    pub fn delete_access_request(&self, id: AccessRequestId) -> AccessResult<()> {
        self.store.write(|uow| {
            if rows::delete_request(uow.conn(), id)? == 0 {
                return Err(AccessError::AccessRequestNotFound(id));
            }
            Ok(())
        })?;
        tracing::info!(request_id = %id, "access request deleted");
        Ok(())
    }

    /// Sets an item's status from caller input.
    ///
    /// Only `approved` and `rejected` are accepted. The value is checked before anything is
    /// written, so an invalid value can not produce a transition or an event.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::InvalidStatus` for any other value, or
    /// `AccessError::ItemNotFound` if the item does not exist.
    pub fn set_item_status(&self, item_id: ItemId, status: &str) -> AccessResult<ItemPayload> {
        let status = ItemStatus::parse_decision(status)?;
        let item = self.update_item(
            item_id,
            ItemUpdate {
                status: Some(status),
                rejection_reason: None,
            },
        )?;
        Ok(ItemPayload::from(&item))
    }

    /// Applies a field-level edit to an item.
    ///
    /// When `update.status` is set, `status_set_at` is refreshed to now. An event is staged
    /// only when the stored status actually changes.
    pub fn update_item(&self, item_id: ItemId, update: ItemUpdate) -> AccessResult<AccessRequestItem> {
        self.store.write(|uow| {
            let snapshot = ChangeDetector::capture(uow.conn(), item_id);
            let mut item =
                rows::get_item(uow.conn(), item_id)?.ok_or(AccessError::ItemNotFound(item_id))?;

            if let Some(status) = update.status {
                item.status = status;
                item.status_set_at = Some(Utc::now());
            }
            if let Some(reason) = update.rejection_reason {
                item.rejection_reason = reason;
            }
            rows::save_item(uow.conn(), &item)?;

            match snapshot.transition_to(item.status) {
                Some(transition) => {
                    self.dispatcher
                        .stage_item_transition(uow, transition, &item);
                }
                None => tracing::debug!(item_id = %item_id, "item saved without status change"),
            }
            Ok(item)
        })
    }

    /// Items of one request in the event item shape.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::AccessRequestNotFound` if the request does not exist.
    pub fn list_items(&self, request_id: AccessRequestId) -> AccessResult<Vec<ItemPayload>> {
        self.store.read(|conn| {
            if rows::get_request(conn, request_id)?.is_none() {
                return Err(AccessError::AccessRequestNotFound(request_id));
            }
            Ok(rows::items_for_request(conn, request_id)?
                .iter()
                .map(ItemPayload::from)
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Channel, ChannelMessage, ConnectionId};
    use crate::CoreServices;
    use serde_json::Value;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn services() -> (CoreServices, EntityId, UserId) {
        let cfg = Arc::new(
            CoreConfig::with_database_path("unused.db".into()).expect("config should be valid"),
        );
        let services = CoreServices::in_memory(cfg).expect("services should open");
        let (entity, user) = services
            .directory
            .seed_defaults()
            .expect("seed should succeed");
        (services, entity.id, user.id)
    }

    fn listen(services: &CoreServices, channel: Channel) -> UnboundedReceiver<ChannelMessage> {
        let (tx, rx) = unbounded_channel();
        services.registry.subscribe(channel, ConnectionId::new(), tx);
        rx
    }

    fn drain(rx: &mut UnboundedReceiver<ChannelMessage>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(serde_json::from_str(msg.message()).expect("event should be JSON"));
        }
        out
    }

    #[test]
    fn test_create_emits_one_created_event_with_pending_items() {
        let (services, entity_id, user_id) = services();
        let mut user_rx = listen(&services, Channel::User(user_id));

        let created = services
            .access
            .create_access_request(
                entity_id,
                user_id,
                "Annual review",
                &[DataType::PersonalInfo, DataType::MedicalInfo],
            )
            .expect("create should succeed");
        assert_eq!(created.items.len(), 2);

        let events = drain(&mut user_rx);
        assert_eq!(events.len(), 1, "exactly one created event");
        assert_eq!(events[0]["action"], "created");
        let items = events[0]["access_request"]["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i["status"] == "pending"));
        assert_eq!(items[0]["data_type"], "personal_info");
        assert_eq!(items[1]["data_type"], "medical_info");
    }

    #[test]
    fn test_create_rejects_empty_data_types() {
        let (services, entity_id, user_id) = services();
        let err = services
            .access
            .create_access_request(entity_id, user_id, "x", &[])
            .expect_err("empty list should fail");
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_create_for_unknown_user_writes_nothing() {
        let (services, entity_id, _) = services();
        let err = services
            .access
            .create_access_request(entity_id, UserId(404), "x", &[DataType::MedicalInfo])
            .expect_err("unknown user should fail");
        assert!(matches!(err, AccessError::UserNotFound(UserId(404))));
        assert!(services
            .access
            .list_access_requests(RequestFilter::default())
            .expect("list should succeed")
            .is_empty());
    }

    #[test]
    fn test_approve_emits_status_updated_to_entity() {
        let (services, entity_id, user_id) = services();
        let created = services
            .access
            .create_access_request(entity_id, user_id, "x", &[DataType::MedicalInfo])
            .expect("create should succeed");
        let mut entity_rx = listen(&services, Channel::Entity(entity_id));

        let item = services
            .access
            .set_item_status(created.items[0].id, "approved")
            .expect("set status should succeed");
        assert_eq!(item.status, ItemStatus::Approved);

        let events = drain(&mut entity_rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["action"], "status_updated");
        assert_eq!(events[0]["access_request_item"]["status"], "approved");
        assert_eq!(events[0]["access_request_item"]["data_type"], "medical_info");
        assert!(!events[0]["access_request_item"]["status_set_at"].is_null());
    }

    #[test]
    fn test_reject_emits_one_event() {
        let (services, entity_id, user_id) = services();
        let created = services
            .access
            .create_access_request(entity_id, user_id, "x", &[DataType::PersonalInfo])
            .expect("create should succeed");
        let mut entity_rx = listen(&services, Channel::Entity(entity_id));

        services
            .access
            .set_item_status(created.items[0].id, "rejected")
            .expect("set status should succeed");

        let events = drain(&mut entity_rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["access_request_item"]["status"], "rejected");
    }

    #[test]
    fn test_same_status_save_emits_nothing() {
        let (services, entity_id, user_id) = services();
        let created = services
            .access
            .create_access_request(entity_id, user_id, "x", &[DataType::PersonalInfo])
            .expect("create should succeed");
        let item_id = created.items[0].id;
        services
            .access
            .set_item_status(item_id, "approved")
            .expect("first decision should succeed");

        let mut entity_rx = listen(&services, Channel::Entity(entity_id));
        services
            .access
            .set_item_status(item_id, "approved")
            .expect("repeat should succeed");

        assert!(drain(&mut entity_rx).is_empty());
    }

    #[test]
    fn test_rejection_reason_edit_emits_nothing() {
        let (services, entity_id, user_id) = services();
        let created = services
            .access
            .create_access_request(entity_id, user_id, "x", &[DataType::PersonalInfo])
            .expect("create should succeed");
        let mut entity_rx = listen(&services, Channel::Entity(entity_id));

        let item = services
            .access
            .update_item(
                created.items[0].id,
                ItemUpdate {
                    status: None,
                    rejection_reason: Some(Some("not needed".into())),
                },
            )
            .expect("update should succeed");

        assert_eq!(item.rejection_reason.as_deref(), Some("not needed"));
        assert_eq!(item.status, ItemStatus::Pending);
        assert!(drain(&mut entity_rx).is_empty());
    }

    #[test]
    fn test_repeated_transitions_notify_every_change() {
        let (services, entity_id, user_id) = services();
        let created = services
            .access
            .create_access_request(entity_id, user_id, "x", &[DataType::PsychologicalInfo])
            .expect("create should succeed");
        let item_id = created.items[0].id;
        let mut entity_rx = listen(&services, Channel::Entity(entity_id));

        for status in ["approved", "rejected", "approved"] {
            services
                .access
                .set_item_status(item_id, status)
                .expect("set status should succeed");
        }

        let statuses: Vec<_> = drain(&mut entity_rx)
            .into_iter()
            .map(|e| e["access_request_item"]["status"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(statuses, vec!["approved", "rejected", "approved"]);
    }

    #[test]
    fn test_unsupported_status_is_rejected_before_write() {
        let (services, entity_id, user_id) = services();
        let created = services
            .access
            .create_access_request(entity_id, user_id, "x", &[DataType::MedicalInfo])
            .expect("create should succeed");
        let mut entity_rx = listen(&services, Channel::Entity(entity_id));

        let err = services
            .access
            .set_item_status(created.items[0].id, "archived")
            .expect_err("archived should be rejected");
        assert!(matches!(err, AccessError::InvalidStatus(_)));

        let items = services
            .access
            .list_items(created.id)
            .expect("list should succeed");
        assert_eq!(items[0].status, ItemStatus::Pending);
        assert_eq!(items[0].status_set_at, None);
        assert!(drain(&mut entity_rx).is_empty());
    }

    #[test]
    fn test_set_status_of_missing_item() {
        let (services, _, _) = services();
        let err = services
            .access
            .set_item_status(ItemId(999), "approved")
            .expect_err("missing item should fail");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_purpose_emits_updated_event() {
        let (services, entity_id, user_id) = services();
        let created = services
            .access
            .create_access_request(entity_id, user_id, "old", &[DataType::MedicalInfo])
            .expect("create should succeed");
        let mut user_rx = listen(&services, Channel::User(user_id));

        let updated = services
            .access
            .update_purpose(created.id, "new")
            .expect("update should succeed");
        assert_eq!(updated.purpose, "new");

        let events = drain(&mut user_rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["action"], "updated");
        assert_eq!(events[0]["access_request"]["purpose"], "new");
    }

    #[test]
    fn test_delete_removes_request_and_items() {
        let (services, entity_id, user_id) = services();
        let created = services
            .access
            .create_access_request(entity_id, user_id, "x", &[DataType::MedicalInfo])
            .expect("create should succeed");

        services
            .access
            .delete_access_request(created.id)
            .expect("delete should succeed");

        assert!(services.access.get_access_request(created.id).is_err());
        assert!(matches!(
            services.access.list_items(created.id),
            Err(AccessError::AccessRequestNotFound(_))
        ));
        assert!(matches!(
            services.access.delete_access_request(created.id),
            Err(AccessError::AccessRequestNotFound(_))
        ));
    }
}
