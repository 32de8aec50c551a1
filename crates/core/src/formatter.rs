//! Wire-level notification payloads.
//!
//! Payloads are built from store records and serialised once. The JSON shape is what dashboard
//! clients receive verbatim:
//!
//! ```json
//! {"action": "created", "access_request": {"id": 1, "entity_id": 1, "items": [ ... ], ...}}
//! {"action": "status_updated", "access_request_item": {"id": 3, "status": "approved", ...}}
//! ```
//!
//! Timestamps serialise as RFC 3339 strings; `status_set_at` is `null` until the first decision.

use crate::model::{
    AccessRequest, AccessRequestId, AccessRequestItem, DataType, Entity, EntityId, ItemId,
    ItemStatus, User, UserId,
};
use crate::store::rows;
use crate::{AccessError, AccessResult};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use utoipa::ToSchema;

/// One item as it appears inside every event and the item listing endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct ItemPayload {
    pub id: ItemId,
    pub access_request_id: AccessRequestId,
    pub data_type: DataType,
    pub data_type_display: String,
    pub status: ItemStatus,
    pub status_set_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&AccessRequestItem> for ItemPayload {
    fn from(item: &AccessRequestItem) -> Self {
        Self {
            id: item.id,
            access_request_id: item.access_request_id,
            data_type: item.data_type,
            data_type_display: item.data_type.label().to_string(),
            status: item.status,
            status_set_at: item.status_set_at,
            created_at: item.created_at,
        }
    }
}

/// A request with its resolved entity and user and every item's current status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct AccessRequestPayload {
    pub id: AccessRequestId,
    pub entity_id: EntityId,
    pub entity_name: String,
    pub user_id: UserId,
    pub user_username: String,
    pub requested_at: DateTime<Utc>,
    pub purpose: String,
    pub items: Vec<ItemPayload>,
}

impl AccessRequestPayload {
    pub fn new(
        request: &AccessRequest,
        entity: &Entity,
        user: &User,
        items: &[AccessRequestItem],
    ) -> Self {
        Self {
            id: request.id,
            entity_id: entity.id,
            entity_name: entity.name.clone(),
            user_id: user.id,
            user_username: user.username.clone(),
            requested_at: request.requested_at,
            purpose: request.purpose.clone(),
            items: items.iter().map(ItemPayload::from).collect(),
        }
    }

    /// Loads a request together with its entity, user and items.
    pub(crate) fn load(conn: &Connection, id: AccessRequestId) -> AccessResult<Self> {
        let request = rows::get_request(conn, id)?.ok_or(AccessError::AccessRequestNotFound(id))?;
        let entity = rows::get_entity(conn, request.entity_id)?
            .ok_or(AccessError::EntityNotFound(request.entity_id))?;
        let user = rows::get_user(conn, request.user_id)?
            .ok_or(AccessError::UserNotFound(request.user_id))?;
        let items = rows::items_for_request(conn, id)?;

        Ok(Self::new(&request, &entity, &user, &items))
    }
}

/// Every event kind a dashboard can receive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Notification {
    Created {
        access_request: AccessRequestPayload,
    },
    Updated {
        access_request: AccessRequestPayload,
    },
    StatusUpdated {
        access_request_item: ItemPayload,
    },
}

impl Notification {
    pub fn to_json(&self) -> AccessResult<String> {
        serde_json::to_string(self).map_err(AccessError::Serialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityType;
    use chrono::TimeZone;
    use serde_json::{json, Value};

    fn sample_item(status: ItemStatus, decided: bool) -> AccessRequestItem {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        AccessRequestItem {
            id: ItemId(3),
            access_request_id: AccessRequestId(1),
            data_type: DataType::MedicalInfo,
            status,
            status_set_at: decided.then(|| Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap()),
            created_at: created,
            rejection_reason: Some("not shown on the wire".into()),
        }
    }

    #[test]
    fn test_status_updated_shape() {
        let n = Notification::StatusUpdated {
            access_request_item: ItemPayload::from(&sample_item(ItemStatus::Approved, true)),
        };
        let value: Value = serde_json::from_str(&n.to_json().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "action": "status_updated",
                "access_request_item": {
                    "id": 3,
                    "access_request_id": 1,
                    "data_type": "medical_info",
                    "data_type_display": "Medical Information",
                    "status": "approved",
                    "status_set_at": "2024-05-02T10:00:00Z",
                    "created_at": "2024-05-01T09:30:00Z"
                }
            })
        );
    }

    #[test]
    fn test_created_shape_lists_items() {
        let requested = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let request = AccessRequest {
            id: AccessRequestId(1),
            entity_id: EntityId(2),
            user_id: UserId(5),
            requested_at: requested,
            purpose: "Annual review".into(),
        };
        let entity = Entity {
            id: EntityId(2),
            name: "Default Clinic".into(),
            entity_type: EntityType::Clinic,
            address: String::new(),
            phone: String::new(),
            email: None,
        };
        let user = User {
            id: UserId(5),
            username: "dummyuser".into(),
            first_name: String::new(),
            last_name: String::new(),
            email: None,
            phone_number: String::new(),
        };
        let items = vec![sample_item(ItemStatus::Pending, false)];

        let n = Notification::Created {
            access_request: AccessRequestPayload::new(&request, &entity, &user, &items),
        };
        let value: Value = serde_json::from_str(&n.to_json().unwrap()).unwrap();

        assert_eq!(value["action"], "created");
        assert_eq!(value["access_request"]["entity_name"], "Default Clinic");
        assert_eq!(value["access_request"]["user_username"], "dummyuser");
        assert_eq!(value["access_request"]["requested_at"], "2024-05-01T09:30:00Z");
        assert_eq!(value["access_request"]["items"][0]["status"], "pending");
        assert_eq!(value["access_request"]["items"][0]["status_set_at"], Value::Null);
        assert!(value["access_request"]["items"][0]
            .get("rejection_reason")
            .is_none());
    }
}
