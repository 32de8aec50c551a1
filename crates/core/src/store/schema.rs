//! Relational schema for the status store.

/// Applied on every open; all statements are idempotent.
pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS entities (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    address     TEXT NOT NULL DEFAULT '',
    phone       TEXT NOT NULL DEFAULT '',
    email       TEXT
);

CREATE TABLE IF NOT EXISTS users (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    username     TEXT NOT NULL UNIQUE,
    first_name   TEXT NOT NULL DEFAULT '',
    last_name    TEXT NOT NULL DEFAULT '',
    email        TEXT,
    phone_number TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS access_requests (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_id    INTEGER NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    user_id      INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    requested_at TEXT NOT NULL,
    purpose      TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS access_request_items (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    access_request_id INTEGER NOT NULL REFERENCES access_requests(id) ON DELETE CASCADE,
    data_type         TEXT NOT NULL,
    status            TEXT NOT NULL DEFAULT 'pending',
    status_set_at     TEXT,
    created_at        TEXT NOT NULL,
    rejection_reason  TEXT
);

CREATE INDEX IF NOT EXISTS idx_access_request_items_request
    ON access_request_items(access_request_id);

CREATE TABLE IF NOT EXISTS user_documents (
    user_id    INTEGER NOT NULL,
    data_type  TEXT NOT NULL,
    body       TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (user_id, data_type)
);
"#;
