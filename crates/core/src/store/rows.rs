//! Row-level SQL for the status store.
//!
//! Every function takes a plain `&Connection` so it can run either inside a
//! [`UnitOfWork`](super::UnitOfWork) (via `uow.conn()`) or under [`Store::read`](super::Store::read).

use crate::model::{
    AccessRequest, AccessRequestId, AccessRequestItem, DataType, Entity, EntityId, ItemId,
    ItemStatus, NewEntity, NewUser, RequestFilter, User, UserId,
};
use crate::{AccessError, AccessResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

// ============================================================================
// ENTITIES
// ============================================================================

const ENTITY_COLUMNS: &str = "id, name, entity_type, address, phone, email";

fn entity_from_row(row: &Row<'_>) -> rusqlite::Result<Entity> {
    Ok(Entity {
        id: row.get(0)?,
        name: row.get(1)?,
        entity_type: row.get(2)?,
        address: row.get(3)?,
        phone: row.get(4)?,
        email: row.get(5)?,
    })
}

pub(crate) fn insert_entity(conn: &Connection, new: &NewEntity) -> AccessResult<Entity> {
    conn.execute(
        "INSERT INTO entities (name, entity_type, address, phone, email) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            new.name.as_str(),
            new.entity_type,
            new.address,
            new.phone,
            new.email.as_ref().map(|e| e.as_str()),
        ],
    )?;
    let id = EntityId(conn.last_insert_rowid());
    get_entity(conn, id)?.ok_or(AccessError::EntityNotFound(id))
}

pub(crate) fn get_entity(conn: &Connection, id: EntityId) -> AccessResult<Option<Entity>> {
    let sql = format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], entity_from_row).optional()?)
}

pub(crate) fn find_entity_by_name(conn: &Connection, name: &str) -> AccessResult<Option<Entity>> {
    let sql = format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE name = ?1 ORDER BY id LIMIT 1");
    Ok(conn.query_row(&sql, [name], entity_from_row).optional()?)
}

pub(crate) fn list_entities(conn: &Connection) -> AccessResult<Vec<Entity>> {
    let sql = format!("SELECT {ENTITY_COLUMNS} FROM entities ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], entity_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

// ============================================================================
// USERS
// ============================================================================

const USER_COLUMNS: &str = "id, username, first_name, last_name, email, phone_number";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        email: row.get(4)?,
        phone_number: row.get(5)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

pub(crate) fn insert_user(conn: &Connection, new: &NewUser) -> AccessResult<User> {
    let inserted = conn.execute(
        "INSERT INTO users (username, first_name, last_name, email, phone_number) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            new.username.as_str(),
            new.first_name,
            new.last_name,
            new.email.as_ref().map(|e| e.as_str()),
            new.phone_number,
        ],
    );

    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(AccessError::UsernameTaken(new.username.to_string()))
        }
        Err(e) => return Err(e.into()),
    }

    let id = UserId(conn.last_insert_rowid());
    get_user(conn, id)?.ok_or(AccessError::UserNotFound(id))
}

pub(crate) fn get_user(conn: &Connection, id: UserId) -> AccessResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], user_from_row).optional()?)
}

pub(crate) fn find_user_by_username(
    conn: &Connection,
    username: &str,
) -> AccessResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
    Ok(conn.query_row(&sql, [username], user_from_row).optional()?)
}

pub(crate) fn list_users(conn: &Connection) -> AccessResult<Vec<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], user_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

// ============================================================================
// ACCESS REQUESTS
// ============================================================================

const REQUEST_COLUMNS: &str = "id, entity_id, user_id, requested_at, purpose";

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<AccessRequest> {
    Ok(AccessRequest {
        id: row.get(0)?,
        entity_id: row.get(1)?,
        user_id: row.get(2)?,
        requested_at: row.get(3)?,
        purpose: row.get(4)?,
    })
}

pub(crate) fn insert_request(
    conn: &Connection,
    entity_id: EntityId,
    user_id: UserId,
    purpose: &str,
    requested_at: DateTime<Utc>,
) -> AccessResult<AccessRequest> {
    conn.execute(
        "INSERT INTO access_requests (entity_id, user_id, requested_at, purpose) VALUES (?1, ?2, ?3, ?4)",
        params![entity_id, user_id, requested_at, purpose],
    )?;
    let id = AccessRequestId(conn.last_insert_rowid());
    get_request(conn, id)?.ok_or(AccessError::AccessRequestNotFound(id))
}

pub(crate) fn get_request(
    conn: &Connection,
    id: AccessRequestId,
) -> AccessResult<Option<AccessRequest>> {
    let sql = format!("SELECT {REQUEST_COLUMNS} FROM access_requests WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], request_from_row).optional()?)
}

pub(crate) fn list_requests(
    conn: &Connection,
    filter: RequestFilter,
) -> AccessResult<Vec<AccessRequest>> {
    // NULL parameters disable the corresponding filter.
    let sql = format!(
        "SELECT {REQUEST_COLUMNS} FROM access_requests \
         WHERE (?1 IS NULL OR entity_id = ?1) AND (?2 IS NULL OR user_id = ?2) \
         ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![filter.entity_id, filter.user_id], request_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Returns the number of rows changed (0 when the request does not exist).
pub(crate) fn update_request_purpose(
    conn: &Connection,
    id: AccessRequestId,
    purpose: &str,
) -> AccessResult<usize> {
    Ok(conn.execute(
        "UPDATE access_requests SET purpose = ?1 WHERE id = ?2",
        params![purpose, id],
    )?)
}

/// Deletes a request; its items go with it through the foreign-key cascade.
pub(crate) fn delete_request(conn: &Connection, id: AccessRequestId) -> AccessResult<usize> {
    Ok(conn.execute("DELETE FROM access_requests WHERE id = ?1", [id])?)
}

pub(crate) fn entity_for_request(
    conn: &Connection,
    id: AccessRequestId,
) -> AccessResult<Option<EntityId>> {
    Ok(conn
        .query_row(
            "SELECT entity_id FROM access_requests WHERE id = ?1",
            [id],
            |row| row.get(0),
        )
        .optional()?)
}

// ============================================================================
// ACCESS REQUEST ITEMS
// ============================================================================

const ITEM_COLUMNS: &str =
    "id, access_request_id, data_type, status, status_set_at, created_at, rejection_reason";

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<AccessRequestItem> {
    Ok(AccessRequestItem {
        id: row.get(0)?,
        access_request_id: row.get(1)?,
        data_type: row.get(2)?,
        status: row.get(3)?,
        status_set_at: row.get(4)?,
        created_at: row.get(5)?,
        rejection_reason: row.get(6)?,
    })
}

/// Inserts a new `pending` item.
pub(crate) fn insert_item(
    conn: &Connection,
    request_id: AccessRequestId,
    data_type: DataType,
    created_at: DateTime<Utc>,
) -> AccessResult<AccessRequestItem> {
    conn.execute(
        "INSERT INTO access_request_items (access_request_id, data_type, status, created_at) \
         VALUES (?1, ?2, ?3, ?4)",
        params![request_id, data_type, ItemStatus::Pending, created_at],
    )?;
    let id = ItemId(conn.last_insert_rowid());
    get_item(conn, id)?.ok_or(AccessError::ItemNotFound(id))
}

pub(crate) fn get_item(conn: &Connection, id: ItemId) -> AccessResult<Option<AccessRequestItem>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM access_request_items WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], item_from_row).optional()?)
}

pub(crate) fn items_for_request(
    conn: &Connection,
    request_id: AccessRequestId,
) -> AccessResult<Vec<AccessRequestItem>> {
    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM access_request_items WHERE access_request_id = ?1 ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([request_id], item_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Only the stored status of an item; what the change detector compares against.
pub(crate) fn item_status(conn: &Connection, id: ItemId) -> AccessResult<Option<ItemStatus>> {
    Ok(conn
        .query_row(
            "SELECT status FROM access_request_items WHERE id = ?1",
            [id],
            |row| row.get(0),
        )
        .optional()?)
}

/// Writes the mutable columns of `item` back to its row.
pub(crate) fn save_item(conn: &Connection, item: &AccessRequestItem) -> AccessResult<usize> {
    Ok(conn.execute(
        "UPDATE access_request_items SET status = ?1, status_set_at = ?2, rejection_reason = ?3 \
         WHERE id = ?4",
        params![
            item.status,
            item.status_set_at,
            item.rejection_reason,
            item.id
        ],
    )?)
}

// ============================================================================
// USER DOCUMENTS
// ============================================================================

pub(crate) fn get_document(
    conn: &Connection,
    user_id: UserId,
    data_type: DataType,
) -> AccessResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT body FROM user_documents WHERE user_id = ?1 AND data_type = ?2",
            params![user_id, data_type],
            |row| row.get(0),
        )
        .optional()?)
}

pub(crate) fn list_documents(
    conn: &Connection,
    user_id: UserId,
) -> AccessResult<Vec<(DataType, String)>> {
    let mut stmt = conn.prepare(
        "SELECT data_type, body FROM user_documents WHERE user_id = ?1 ORDER BY data_type",
    )?;
    let rows = stmt.query_map([user_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub(crate) fn upsert_document(
    conn: &Connection,
    user_id: UserId,
    data_type: DataType,
    body: &str,
    updated_at: DateTime<Utc>,
) -> AccessResult<()> {
    conn.execute(
        "INSERT INTO user_documents (user_id, data_type, body, updated_at) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT(user_id, data_type) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
        params![user_id, data_type, body, updated_at],
    )?;
    Ok(())
}

pub(crate) fn delete_document(
    conn: &Connection,
    user_id: UserId,
    data_type: DataType,
) -> AccessResult<usize> {
    Ok(conn.execute(
        "DELETE FROM user_documents WHERE user_id = ?1 AND data_type = ?2",
        params![user_id, data_type],
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityType;
    use crate::store::Store;
    use alinea_types::NonEmptyText;

    fn seeded(store: &Store) -> (EntityId, UserId) {
        store
            .write(|uow| {
                let entity = insert_entity(
                    uow.conn(),
                    &NewEntity {
                        name: NonEmptyText::new("Clinic").expect("valid name"),
                        entity_type: EntityType::Clinic,
                        address: String::new(),
                        phone: String::new(),
                        email: None,
                    },
                )?;
                let user = insert_user(
                    uow.conn(),
                    &NewUser {
                        username: NonEmptyText::new("ana").expect("valid name"),
                        first_name: "Ana".into(),
                        last_name: "Lopez".into(),
                        email: None,
                        phone_number: String::new(),
                    },
                )?;
                Ok((entity.id, user.id))
            })
            .expect("seed should succeed")
    }

    #[test]
    fn test_duplicate_username_is_reported() {
        let store = Store::open_in_memory().expect("store should open");
        seeded(&store);

        let err = store
            .write(|uow| {
                insert_user(
                    uow.conn(),
                    &NewUser {
                        username: NonEmptyText::new("ana").expect("valid name"),
                        first_name: String::new(),
                        last_name: String::new(),
                        email: None,
                        phone_number: String::new(),
                    },
                )
            })
            .expect_err("duplicate username should fail");
        assert!(matches!(err, AccessError::UsernameTaken(name) if name == "ana"));
    }

    #[test]
    fn test_delete_request_cascades_to_items() {
        let store = Store::open_in_memory().expect("store should open");
        let (entity_id, user_id) = seeded(&store);
        let now = Utc::now();

        let request_id = store
            .write(|uow| {
                let request = insert_request(uow.conn(), entity_id, user_id, "checkup", now)?;
                insert_item(uow.conn(), request.id, DataType::PersonalInfo, now)?;
                insert_item(uow.conn(), request.id, DataType::MedicalInfo, now)?;
                Ok(request.id)
            })
            .expect("insert should succeed");

        let deleted = store
            .write(|uow| delete_request(uow.conn(), request_id))
            .expect("delete should succeed");
        assert_eq!(deleted, 1);

        let remaining = store
            .read(|conn| items_for_request(conn, request_id))
            .expect("query should succeed");
        assert!(remaining.is_empty(), "items should cascade");
    }

    #[test]
    fn test_list_requests_applies_filters() {
        let store = Store::open_in_memory().expect("store should open");
        let (entity_id, user_id) = seeded(&store);
        let now = Utc::now();

        store
            .write(|uow| {
                insert_request(uow.conn(), entity_id, user_id, "a", now)?;
                insert_request(uow.conn(), entity_id, user_id, "b", now)?;
                Ok(())
            })
            .expect("insert should succeed");

        let all = store
            .read(|conn| list_requests(conn, RequestFilter::default()))
            .expect("list should succeed");
        assert_eq!(all.len(), 2);

        let none = store
            .read(|conn| {
                list_requests(
                    conn,
                    RequestFilter {
                        entity_id: Some(EntityId(999)),
                        user_id: None,
                    },
                )
            })
            .expect("list should succeed");
        assert!(none.is_empty());
    }

    #[test]
    fn test_item_timestamps_survive_storage() {
        let store = Store::open_in_memory().expect("store should open");
        let (entity_id, user_id) = seeded(&store);
        let now = Utc::now();

        let item = store
            .write(|uow| {
                let request = insert_request(uow.conn(), entity_id, user_id, "x", now)?;
                insert_item(uow.conn(), request.id, DataType::DentalQuestionnaire, now)
            })
            .expect("insert should succeed");

        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.status_set_at, None);
        assert_eq!(item.created_at, now);
    }

    #[test]
    fn test_only_unique_constraints_count_as_duplicates() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        conn.execute_batch(
            "CREATE TABLE t (name TEXT NOT NULL UNIQUE, score INTEGER CHECK (score >= 0));
             INSERT INTO t (name, score) VALUES ('a', 1);",
        )
        .expect("schema should apply");

        let duplicate = conn
            .execute("INSERT INTO t (name, score) VALUES ('a', 2)", [])
            .expect_err("duplicate name should fail");
        assert!(is_unique_violation(&duplicate));

        let check = conn
            .execute("INSERT INTO t (name, score) VALUES ('b', -1)", [])
            .expect_err("negative score should fail");
        assert!(!is_unique_violation(&check));

        let not_null = conn
            .execute("INSERT INTO t (name, score) VALUES (NULL, 1)", [])
            .expect_err("null name should fail");
        assert!(!is_unique_violation(&not_null));
    }
}
