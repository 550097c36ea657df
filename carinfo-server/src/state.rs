//! Application state

use crate::error::{ApiError, ApiResult};
use carinfo_core::{Authorizer, Config, FileStore, Inventory, MemoryStore, Store};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Car and status records
    pub inventory: Arc<Inventory>,

    /// Source of allow/deny decisions
    pub authorizer: Arc<Authorizer>,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(store: Arc<dyn Store>, authorizer: Authorizer) -> Self {
        Self {
            inventory: Arc::new(Inventory::new(store)),
            authorizer: Arc::new(authorizer),
            start_time: Instant::now(),
        }
    }

    /// Build the store and authorizer described by `config`
    pub fn from_config(config: &Config) -> carinfo_core::Result<Self> {
        let store: Arc<dyn Store> = if config.server.ephemeral {
            info!("using in-memory store; data will not survive a restart");
            Arc::new(MemoryStore::new())
        } else {
            info!(path = %config.server.data_file.display(), "using file store");
            Arc::new(FileStore::new(&config.server.data_file))
        };
        let authorizer = config.policy.build_authorizer()?;
        info!(mode = authorizer.mode_name(), "authorizer configured");

        Ok(Self::new(store, authorizer))
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Run a store operation on the blocking pool
    pub async fn with_inventory<T, F>(&self, operation: &'static str, f: F) -> ApiResult<T>
    where
        F: FnOnce(&Inventory) -> carinfo_core::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inventory = Arc::clone(&self.inventory);
        let timer = crate::metrics::LatencyTimer::new(operation);

        let result = tokio::task::spawn_blocking(move || f(&inventory))
            .await
            .map_err(|e| ApiError::Internal(format!("store task failed: {}", e)))?;

        timer.record();
        result.map_err(ApiError::from)
    }
}
