//! Per-user documents keyed by data type.
//!
//! Each user holds at most one JSON object per [`DataType`]. Documents are stored as serialised
//! JSON text and handed back as [`serde_json::Value`]. Approval of an access request item is what
//! gates exposure: [`DocumentService::documents_for_request`] only returns content for approved
//! data types.

use crate::model::{AccessRequestId, DataType, ItemStatus, UserId};
use crate::store::{rows, Store};
use crate::{AccessError, AccessResult};
use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::ToSchema;

/// Data types of one request grouped by decision, with content for approved ones only.
#[derive(Clone, Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct RequestDocuments {
    pub pending: Vec<DataType>,
    pub rejected: Vec<DataType>,
    /// `null` for an approved type the user holds no document for.
    #[schema(value_type = Object)]
    pub approved: BTreeMap<DataType, Option<Value>>,
}

#[derive(Clone, Debug)]
pub struct DocumentService {
    store: Arc<Store>,
}

impl DocumentService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Every document the user holds, keyed by data type tag.
    pub fn get_all(&self, user_id: UserId) -> AccessResult<Map<String, Value>> {
        self.store.read(|conn| {
            ensure_user(conn, user_id)?;
            rows::list_documents(conn, user_id)?
                .into_iter()
                .map(|(data_type, body)| {
                    Ok::<_, AccessError>((data_type.as_str().to_string(), decode(&body)?))
                })
                .collect()
        })
    }

    pub fn get(&self, user_id: UserId, data_type: DataType) -> AccessResult<Value> {
        let body = self
            .store
            .read(|conn| rows::get_document(conn, user_id, data_type))?
            .ok_or(AccessError::DocumentNotFound { user_id, data_type })?;
        decode(&body)
    }

    /// Stores `document` as the user's `data_type` document, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::InvalidInput` unless `document` is a JSON object, or
    /// `AccessError::UserNotFound` if the user does not exist.
    pub fn put(&self, user_id: UserId, data_type: DataType, document: Value) -> AccessResult<Value> {
        if !document.is_object() {
            return Err(AccessError::InvalidInput(
                "document must be a JSON object".into(),
            ));
        }
        let body = serde_json::to_string(&document).map_err(AccessError::Serialization)?;

        self.store.write(|uow| {
            ensure_user(uow.conn(), user_id)?;
            rows::upsert_document(uow.conn(), user_id, data_type, &body, Utc::now())
        })?;
        tracing::info!(user_id = %user_id, data_type = %data_type, "document stored");
        Ok(document)
    }

    pub fn delete(&self, user_id: UserId, data_type: DataType) -> AccessResult<()> {
        self.store.write(|uow| {
            if rows::delete_document(uow.conn(), user_id, data_type)? == 0 {
                return Err(AccessError::DocumentNotFound { user_id, data_type });
            }
            Ok(())
        })
    }

    /// Groups a request's items by status and attaches document content to approved types.
    ///
    /// A data type requested more than once appears in exactly one group: approved if any of its
    /// items is approved, otherwise pending if any is still pending, otherwise rejected.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::AccessRequestNotFound` if the request does not exist.
    pub fn documents_for_request(
        &self,
        request_id: AccessRequestId,
    ) -> AccessResult<RequestDocuments> {
        self.store.read(|conn| {
            let request = rows::get_request(conn, request_id)?
                .ok_or(AccessError::AccessRequestNotFound(request_id))?;

            let mut per_type: Vec<(DataType, ItemStatus)> = Vec::new();
            for item in rows::items_for_request(conn, request_id)? {
                match per_type.iter_mut().find(|(t, _)| *t == item.data_type) {
                    Some((_, status)) => {
                        if precedence(item.status) > precedence(*status) {
                            *status = item.status;
                        }
                    }
                    None => per_type.push((item.data_type, item.status)),
                }
            }

            let mut grouped = RequestDocuments::default();
            for (data_type, status) in per_type {
                match status {
                    ItemStatus::Pending => grouped.pending.push(data_type),
                    ItemStatus::Rejected => grouped.rejected.push(data_type),
                    ItemStatus::Approved => {
                        let content = rows::get_document(conn, request.user_id, data_type)?
                            .map(|body| decode(&body))
                            .transpose()?;
                        grouped.approved.insert(data_type, content);
                    }
                }
            }
            Ok(grouped)
        })
    }
}

fn precedence(status: ItemStatus) -> u8 {
    match status {
        ItemStatus::Rejected => 0,
        ItemStatus::Pending => 1,
        ItemStatus::Approved => 2,
    }
}

fn ensure_user(conn: &Connection, user_id: UserId) -> AccessResult<()> {
    match rows::get_user(conn, user_id)? {
        Some(_) => Ok(()),
        None => Err(AccessError::UserNotFound(user_id)),
    }
}

fn decode(body: &str) -> AccessResult<Value> {
    serde_json::from_str(body).map_err(AccessError::Deserialization)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::CoreServices;
    use serde_json::json;

    fn services() -> (CoreServices, UserId) {
        let cfg = Arc::new(CoreConfig::with_database_path("unused.db".into()).unwrap());
        let services = CoreServices::in_memory(cfg).expect("services should open");
        let (_, user) = services.directory.seed_defaults().expect("seed should succeed");
        (services, user.id)
    }

    #[test]
    fn test_put_get_delete_document() {
        let (services, user_id) = services();
        let docs = &services.documents;

        docs.put(user_id, DataType::PersonalInfo, json!({"first_name": "John"}))
            .expect("put should succeed");
        assert_eq!(
            docs.get(user_id, DataType::PersonalInfo).expect("should exist"),
            json!({"first_name": "John"})
        );

        let all = docs.get_all(user_id).expect("get_all should succeed");
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("personal_info"));

        docs.delete(user_id, DataType::PersonalInfo)
            .expect("delete should succeed");
        assert!(docs.get(user_id, DataType::PersonalInfo).unwrap_err().is_not_found());
    }

    #[test]
    fn test_put_rejects_non_objects() {
        let (services, user_id) = services();
        for bad in [json!(null), json!([1, 2]), json!("text")] {
            let err = services
                .documents
                .put(user_id, DataType::MedicalInfo, bad)
                .expect_err("non-object should fail");
            assert!(err.is_invalid_input());
        }
    }

    #[test]
    fn test_put_for_unknown_user() {
        let (services, _) = services();
        let err = services
            .documents
            .put(UserId(77), DataType::MedicalInfo, json!({}))
            .expect_err("unknown user should fail");
        assert!(matches!(err, AccessError::UserNotFound(UserId(77))));
    }

    #[test]
    fn test_only_approved_types_expose_content() {
        let (services, user_id) = services();
        let entity_id = services.directory.list_entities().unwrap()[0].id;
        services
            .documents
            .put(user_id, DataType::PersonalInfo, json!({"first_name": "John"}))
            .unwrap();
        services
            .documents
            .put(user_id, DataType::MedicalInfo, json!({"allergies": ["pollen"]}))
            .unwrap();

        let request = services
            .access
            .create_access_request(
                entity_id,
                user_id,
                "x",
                &[
                    DataType::PersonalInfo,
                    DataType::MedicalInfo,
                    DataType::DentalQuestionnaire,
                ],
            )
            .unwrap();
        services
            .access
            .set_item_status(request.items[0].id, "approved")
            .unwrap();
        services
            .access
            .set_item_status(request.items[1].id, "rejected")
            .unwrap();

        let grouped = services
            .documents
            .documents_for_request(request.id)
            .expect("grouping should succeed");

        assert_eq!(grouped.pending, vec![DataType::DentalQuestionnaire]);
        assert_eq!(grouped.rejected, vec![DataType::MedicalInfo]);
        assert_eq!(
            grouped.approved.get(&DataType::PersonalInfo),
            Some(&Some(json!({"first_name": "John"})))
        );
        assert_eq!(grouped.approved.len(), 1);

        let wire = serde_json::to_value(&grouped).unwrap();
        assert_eq!(wire["approved"]["personal_info"]["first_name"], "John");
    }

    #[test]
    fn test_duplicate_types_land_in_one_group() {
        let (services, user_id) = services();
        let entity_id = services.directory.list_entities().unwrap()[0].id;
        let request = services
            .access
            .create_access_request(
                entity_id,
                user_id,
                "x",
                &[
                    DataType::MedicalInfo,
                    DataType::MedicalInfo,
                    DataType::PersonalInfo,
                    DataType::PersonalInfo,
                ],
            )
            .unwrap();
        services
            .access
            .set_item_status(request.items[1].id, "approved")
            .unwrap();
        services
            .access
            .set_item_status(request.items[2].id, "rejected")
            .unwrap();

        let grouped = services
            .documents
            .documents_for_request(request.id)
            .expect("grouping should succeed");

        assert_eq!(grouped.pending, vec![DataType::PersonalInfo]);
        assert!(grouped.rejected.is_empty());
        assert_eq!(grouped.approved.len(), 1);
        assert_eq!(grouped.approved.get(&DataType::MedicalInfo), Some(&None));
    }
}
