//! Constants used throughout the Alinea core crate.

/// Default SQLite database file when no explicit path is configured.
pub const DEFAULT_DATABASE_PATH: &str = "alinea.db";

/// Purpose recorded on access requests created from an entity dashboard command.
pub const DASHBOARD_REQUEST_PURPOSE: &str = "Requested via WebSocket";

/// User a dashboard command targets when it does not name one.
pub const DEFAULT_DASHBOARD_USER_ID: i64 = 1;

/// Channel prefix for entity dashboards.
pub const ENTITY_CHANNEL_PREFIX: &str = "entity";

/// Channel prefix for user dashboards.
pub const USER_CHANNEL_PREFIX: &str = "user";

/// Name of the entity created by `seed_defaults`.
pub const DEFAULT_ENTITY_NAME: &str = "Default Clinic";

/// Username of the user created by `seed_defaults`.
pub const DEFAULT_USERNAME: &str = "dummyuser";
