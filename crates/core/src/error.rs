use crate::model::{AccessRequestId, DataType, EntityId, ItemId, UserId};
use alinea_types::TextError;

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid status: {0}")]
    InvalidStatus(String),
    #[error("unknown data type: {0}")]
    UnknownDataType(String),
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),
    #[error("invalid text: {0}")]
    Text(#[from] TextError),

    #[error("entity {0} not found")]
    EntityNotFound(EntityId),
    #[error("user {0} not found")]
    UserNotFound(UserId),
    #[error("access request {0} not found")]
    AccessRequestNotFound(AccessRequestId),
    #[error("access request item {0} not found")]
    ItemNotFound(ItemId),
    #[error("no {data_type} document for user {user_id}")]
    DocumentNotFound {
        user_id: UserId,
        data_type: DataType,
    },
    #[error("username is already taken: {0}")]
    UsernameTaken(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("status store lock was poisoned")]
    StorePoisoned,
    #[error("failed to create database directory: {0}")]
    DatabaseDirCreation(std::io::Error),
    #[error("failed to serialise payload: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialise stored document: {0}")]
    Deserialization(serde_json::Error),
    #[error("blocking task failed: {0}")]
    TaskJoin(String),
}

impl AccessError {
    /// True for errors caused by the caller's input rather than the store.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            AccessError::InvalidInput(_)
                | AccessError::InvalidStatus(_)
                | AccessError::UnknownDataType(_)
                | AccessError::UnknownEntityType(_)
                | AccessError::Text(_)
                | AccessError::UsernameTaken(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AccessError::EntityNotFound(_)
                | AccessError::UserNotFound(_)
                | AccessError::AccessRequestNotFound(_)
                | AccessError::ItemNotFound(_)
                | AccessError::DocumentNotFound { .. }
        )
    }
}

pub type AccessResult<T> = std::result::Result<T, AccessError>;
