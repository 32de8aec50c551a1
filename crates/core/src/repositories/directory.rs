//! Entities and users.
//!
//! Both are created administratively. Entities are never edited once referenced by requests, so
//! the directory only creates and reads.

use crate::constants::{DEFAULT_ENTITY_NAME, DEFAULT_USERNAME};
use crate::model::{Entity, EntityId, EntityType, NewEntity, NewUser, User, UserId};
use crate::store::{rows, Store};
use crate::{AccessError, AccessResult};
use alinea_types::NonEmptyText;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct DirectoryService {
    store: Arc<Store>,
}

impl DirectoryService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn create_entity(&self, new: NewEntity) -> AccessResult<Entity> {
        let entity = self.store.write(|uow| rows::insert_entity(uow.conn(), &new))?;
        tracing::info!(entity_id = %entity.id, name = %entity.name, "entity created");
        Ok(entity)
    }

    pub fn get_entity(&self, id: EntityId) -> AccessResult<Entity> {
        self.store
            .read(|conn| rows::get_entity(conn, id))?
            .ok_or(AccessError::EntityNotFound(id))
    }

    pub fn list_entities(&self) -> AccessResult<Vec<Entity>> {
        self.store.read(rows::list_entities)
    }

    /// # Errors
    ///
    /// Returns `AccessError::UsernameTaken` if the username is already in use.
    pub fn create_user(&self, new: NewUser) -> AccessResult<User> {
        let user = self.store.write(|uow| rows::insert_user(uow.conn(), &new))?;
        tracing::info!(user_id = %user.id, username = %user.username, "user created");
        Ok(user)
    }

    pub fn get_user(&self, id: UserId) -> AccessResult<User> {
        self.store
            .read(|conn| rows::get_user(conn, id))?
            .ok_or(AccessError::UserNotFound(id))
    }

    pub fn list_users(&self) -> AccessResult<Vec<User>> {
        self.store.read(rows::list_users)
    }

    /// Ensures the default clinic and default user exist, creating whichever is missing.
    ///
    /// Safe to run repeatedly.
    pub fn seed_defaults(&self) -> AccessResult<(Entity, User)> {
        self.store.write(|uow| {
            let entity = match rows::find_entity_by_name(uow.conn(), DEFAULT_ENTITY_NAME)? {
                Some(entity) => entity,
                None => rows::insert_entity(
                    uow.conn(),
                    &NewEntity {
                        name: NonEmptyText::new(DEFAULT_ENTITY_NAME)?,
                        entity_type: EntityType::Clinic,
                        address: String::new(),
                        phone: String::new(),
                        email: None,
                    },
                )?,
            };

            let user = match rows::find_user_by_username(uow.conn(), DEFAULT_USERNAME)? {
                Some(user) => user,
                None => rows::insert_user(
                    uow.conn(),
                    &NewUser {
                        username: NonEmptyText::new(DEFAULT_USERNAME)?,
                        first_name: String::new(),
                        last_name: String::new(),
                        email: None,
                        phone_number: String::new(),
                    },
                )?,
            };

            Ok((entity, user))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alinea_types::EmailAddress;

    fn directory() -> DirectoryService {
        DirectoryService::new(Arc::new(Store::open_in_memory().expect("store should open")))
    }

    #[test]
    fn test_seed_is_idempotent() {
        let directory = directory();
        let (e1, u1) = directory.seed_defaults().expect("first seed should succeed");
        let (e2, u2) = directory.seed_defaults().expect("second seed should succeed");

        assert_eq!(e1, e2);
        assert_eq!(u1, u2);
        assert_eq!(e1.name, DEFAULT_ENTITY_NAME);
        assert_eq!(u1.username, DEFAULT_USERNAME);
        assert_eq!(directory.list_entities().unwrap().len(), 1);
        assert_eq!(directory.list_users().unwrap().len(), 1);
    }

    #[test]
    fn test_create_and_fetch_entity() {
        let directory = directory();
        let created = directory
            .create_entity(NewEntity {
                name: NonEmptyText::new("Smile Dental").unwrap(),
                entity_type: EntityType::Dentist,
                address: "1 High St".into(),
                phone: "0123".into(),
                email: Some(EmailAddress::parse("desk@smile.example").unwrap()),
            })
            .expect("create should succeed");

        let fetched = directory
            .get_entity(created.id)
            .expect("entity should exist");
        assert_eq!(fetched.entity_type, EntityType::Dentist);
        assert_eq!(fetched.email.as_deref(), Some("desk@smile.example"));
    }

    #[test]
    fn test_missing_user_is_not_found() {
        let directory = directory();
        let err = directory.get_user(UserId(12)).expect_err("should be missing");
        assert!(err.is_not_found());
    }
}
