//! Services over the status store.
//!
//! Each service holds an `Arc<Store>` and exposes the operations the API crates call. Services
//! are cheap to clone.

pub mod access;
pub mod directory;
pub mod documents;
