//! # Alinea Core
//!
//! Core logic for the Alinea access-control service.
//!
//! This crate contains the access request state machine and its notification fan-out:
//! - A SQLite status store with a unit of work that runs callbacks only after commit
//! - Change detection on item saves so only real status transitions notify
//! - Event formatting, a subscription registry and a dispatcher that routes events to channels
//! - The transport-independent half of live dashboard connections
//! - Entity/user directory and per-user documents
//!
//! **No API concerns**: HTTP, WebSocket framing and gRPC belong in `api-rest`, `api-grpc` and
//! `api-shared`.

pub mod change;
pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod formatter;
pub mod live;
pub mod model;
pub mod registry;
pub mod repositories;
pub mod store;

pub use alinea_types::{EmailAddress, NonEmptyText, TextError};
pub use config::CoreConfig;
pub use error::{AccessError, AccessResult};
pub use model::*;
pub use repositories::access::AccessService;
pub use repositories::directory::DirectoryService;
pub use repositories::documents::{DocumentService, RequestDocuments};

use dispatcher::EventDispatcher;
use registry::SubscriptionRegistry;
use std::sync::Arc;
use store::Store;

/// Everything a serving process needs, wired to one store and one registry.
///
/// Cloning is cheap and every clone shares the same store and registry, so a status change made
/// through one clone reaches dashboards connected through another.
#[derive(Clone, Debug)]
pub struct CoreServices {
    pub cfg: Arc<CoreConfig>,
    pub store: Arc<Store>,
    pub registry: Arc<SubscriptionRegistry>,
    pub dispatcher: EventDispatcher,
    pub access: AccessService,
    pub directory: DirectoryService,
    pub documents: DocumentService,
}

impl CoreServices {
    /// Opens the database at `cfg.database_path()` and builds the services around it.
    ///
    /// # Errors
    ///
    /// Returns an `AccessError` if the database cannot be opened or initialised.
    pub fn open(cfg: Arc<CoreConfig>) -> AccessResult<Self> {
        let store = Store::open(cfg.database_path())?;
        tracing::info!("++ Opened status store at {}", cfg.database_path().display());
        Ok(Self::from_store(cfg, Arc::new(store)))
    }

    /// Builds the services on a private in-memory database.
    pub fn in_memory(cfg: Arc<CoreConfig>) -> AccessResult<Self> {
        Ok(Self::from_store(cfg, Arc::new(Store::open_in_memory()?)))
    }

    pub fn from_store(cfg: Arc<CoreConfig>, store: Arc<Store>) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());
        let dispatcher = EventDispatcher::new(registry.clone());

        Self {
            access: AccessService::new(cfg.clone(), store.clone(), dispatcher.clone()),
            directory: DirectoryService::new(store.clone()),
            documents: DocumentService::new(store.clone()),
            cfg,
            store,
            registry,
            dispatcher,
        }
    }
}
