//! Durable status store and its unit of work.
//!
//! The store owns a single SQLite connection behind a mutex. All writes go through
//! [`Store::write`], which runs a closure inside a transaction and hands it a [`UnitOfWork`].
//! Work that must only happen once the data is durable (notification dispatch) is queued on the
//! unit of work with [`UnitOfWork::on_commit`].
//!
//! ## Commit ordering
//!
//! ```text
//! write(f) ──▶ BEGIN ──▶ f(&mut uow) ──▶ COMMIT ──▶ release lock ──▶ run on_commit queue
//!                              │
//!                              └─ Err ──▶ ROLLBACK, queue dropped
//! ```
//!
//! Callbacks run after the lock is released so they may read the store again. A panicking
//! callback is caught and logged; it never reaches the writer and never stops later callbacks.

pub(crate) mod rows;
mod schema;

use crate::{AccessError, AccessResult};
use rusqlite::{Connection, Transaction};
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Work deferred until the enclosing transaction has committed.
pub type CommitCallback = Box<dyn FnOnce() + Send + 'static>;

/// SQLite-backed store for entities, users, access requests, items and user documents.
#[derive(Debug)]
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Opens (creating if needed) the database file at `path` and applies the schema.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::DatabaseDirCreation` if the parent directory cannot be created, or
    /// `AccessError::Database` if the file cannot be opened or the schema cannot be applied.
    pub fn open(path: &Path) -> AccessResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(AccessError::DatabaseDirCreation)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens a private in-memory database. Used by tests and throwaway tooling.
    pub fn open_in_memory() -> AccessResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> AccessResult<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(schema::SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> AccessResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| AccessError::StorePoisoned)
    }

    /// Runs a read-only closure against the connection.
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> AccessResult<T>) -> AccessResult<T> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Runs `f` inside a transaction.
    ///
    /// On `Ok` the transaction commits, the lock is released and then every callback queued with
    /// [`UnitOfWork::on_commit`] runs in registration order. On `Err` the transaction rolls back
    /// and the queued callbacks are dropped without running.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or `AccessError::Database` if begin/commit fails.
    pub fn write<T>(
        &self,
        f: impl FnOnce(&mut UnitOfWork<'_>) -> AccessResult<T>,
    ) -> AccessResult<T> {
        let (value, callbacks) = {
            let mut conn = self.lock()?;
            let tx = conn.transaction()?;
            let mut uow = UnitOfWork {
                tx,
                on_commit: Vec::new(),
            };

            let value = f(&mut uow)?;

            let UnitOfWork { tx, on_commit } = uow;
            tx.commit()?;
            (value, on_commit)
        };

        run_commit_callbacks(callbacks);
        Ok(value)
    }
}

fn run_commit_callbacks(callbacks: Vec<CommitCallback>) {
    for callback in callbacks {
        if catch_unwind(AssertUnwindSafe(callback)).is_err() {
            tracing::error!("post-commit callback panicked; continuing with remaining callbacks");
        }
    }
}

/// An open transaction plus the callbacks to run once it commits.
pub struct UnitOfWork<'conn> {
    tx: Transaction<'conn>,
    on_commit: Vec<CommitCallback>,
}

impl UnitOfWork<'_> {
    /// The transaction's connection, for queries that must see uncommitted writes.
    pub fn conn(&self) -> &Connection {
        &self.tx
    }

    /// Queues `callback` to run after this unit of work commits.
    pub fn on_commit(&mut self, callback: impl FnOnce() + Send + 'static) {
        self.on_commit.push(Box::new(callback));
    }

    pub fn pending_callbacks(&self) -> usize {
        self.on_commit.len()
    }
}
