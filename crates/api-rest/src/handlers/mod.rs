//! REST handlers, grouped by resource.
//!
//! Core operations touch SQLite and are run on the blocking pool through [`blocking`].

pub mod directory;
pub mod documents;
pub mod items;
pub mod requests;

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use alinea_core::{AccessResult, CoreServices};

/// Runs a core operation on the blocking pool and converts its error.
pub(crate) async fn blocking<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&CoreServices) -> AccessResult<T> + Send + 'static,
{
    let core = state.core.clone();
    tokio::task::spawn_blocking(move || f(&core))
        .await
        .map_err(|e| {
            tracing::error!("Blocking task failed: {:?}", e);
            ApiError::internal()
        })?
        .map_err(ApiError::from)
}
