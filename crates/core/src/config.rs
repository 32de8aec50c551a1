//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Request handling never reads process-wide environment variables.

use crate::constants::{DASHBOARD_REQUEST_PURPOSE, DEFAULT_DASHBOARD_USER_ID, DEFAULT_DATABASE_PATH};
use crate::model::UserId;
use crate::{AccessError, AccessResult};
use alinea_types::NonEmptyText;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    database_path: PathBuf,
    default_user_id: UserId,
    dashboard_purpose: NonEmptyText,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::InvalidInput` if `default_user_id` is not positive.
    pub fn new(
        database_path: PathBuf,
        default_user_id: UserId,
        dashboard_purpose: NonEmptyText,
    ) -> AccessResult<Self> {
        if default_user_id.0 <= 0 {
            return Err(AccessError::InvalidInput(
                "default dashboard user id must be positive".into(),
            ));
        }

        Ok(Self {
            database_path,
            default_user_id,
            dashboard_purpose,
        })
    }

    /// Configuration with the stock defaults for everything but the database path.
    pub fn with_database_path(database_path: PathBuf) -> AccessResult<Self> {
        Self::new(
            database_path,
            UserId(DEFAULT_DASHBOARD_USER_ID),
            NonEmptyText::new(DASHBOARD_REQUEST_PURPOSE)?,
        )
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// User targeted by dashboard commands that omit `user_id`.
    pub fn default_user_id(&self) -> UserId {
        self.default_user_id
    }

    pub fn dashboard_purpose(&self) -> &NonEmptyText {
        &self.dashboard_purpose
    }
}

/// Resolve the database path from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_DATABASE_PATH`].
pub fn database_path_from_env_value(value: Option<String>) -> PathBuf {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string())
        .into()
}

/// Parse the default dashboard user id from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_DASHBOARD_USER_ID`].
pub fn default_user_id_from_env_value(value: Option<String>) -> AccessResult<UserId> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(UserId(DEFAULT_DASHBOARD_USER_ID)),
        Some(v) => v
            .parse::<i64>()
            .map(UserId)
            .map_err(|_| AccessError::InvalidInput(format!("invalid user id: {v}"))),
    }
}
