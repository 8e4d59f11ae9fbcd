//! Application wiring: store selection, hub and services.

use std::sync::Arc;

use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, StorageKind};
use crate::db::{InMemoryStorage, PgStorage, Storage};
use crate::error::{AppError, Result};
use crate::services::{CommentService, NotificationHub, PostService};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Arc<dyn Storage>,
    pub hub: Arc<NotificationHub>,
    pub posts: PostService,
    pub comments: CommentService,
}

impl AppState {
    /// Build the state from configuration, connecting to the database when
    /// the Postgres store is selected.
    pub async fn build(config: Config) -> Result<Self> {
        let storage: Arc<dyn Storage> = match config.storage.kind {
            StorageKind::InMemory => {
                info!("using in-memory storage");
                Arc::new(InMemoryStorage::new())
            }
            StorageKind::Postgres => {
                let db = config.storage.database.as_ref().ok_or_else(|| {
                    AppError::Config("postgres storage selected without database settings".into())
                })?;
                info!("using postgres storage");
                Arc::new(PgStorage::connect(db).await?)
            }
        };

        Ok(Self::with_storage(config, storage, Arc::new(SystemClock)))
    }

    /// Assemble around an existing store
    pub fn with_storage(config: Config, storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        let request_timeout = config.app.request_timeout();
        let hub = Arc::new(NotificationHub::new(
            config.subscriptions.channel_capacity,
            clock,
        ));

        Self {
            posts: PostService::new(Arc::clone(&storage), request_timeout),
            comments: CommentService::new(Arc::clone(&storage), Arc::clone(&hub), request_timeout),
            config: Arc::new(config),
            storage,
            hub,
        }
    }

    /// Release the store's resources, giving up after the shutdown timeout
    pub async fn shutdown(&self) {
        let timeout = self.config.app.shutdown_timeout();
        match tokio::time::timeout(timeout, self.storage.close()).await {
            Ok(()) => info!("storage closed"),
            Err(_) => warn!(
                timeout_ms = self.config.app.shutdown_timeout_ms,
                "storage did not close before the shutdown timeout"
            ),
        }
    }
}
