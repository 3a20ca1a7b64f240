//! Per-identity store registry
//!
//! Owns the cached engine handles with an explicit lifecycle (`open`,
//! `close`, `close_all`, `destroy`) instead of a module-level handle map.
//! Opening an identity whose store is already open returns the cached handle;
//! concurrent duplicate opens of the same identity coalesce on a per-identity
//! latch so initialization runs once.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use tracing::info;

use crate::config::CoreConfig;
use crate::error::{LedgerError, LedgerResult};

use super::engine::LedgerEngine;

type EngineCell = Arc<OnceCell<Arc<LedgerEngine>>>;

/// Registry of open per-identity ledger stores
pub struct StoreRegistry {
    config: CoreConfig,
    cells: Mutex<HashMap<String, EngineCell>>,
}

impl StoreRegistry {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            cells: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Open the store for an identity, initializing it on first use
    ///
    /// Idempotent and race-safe: a second call while the first is still
    /// initializing awaits the same in-flight initialization instead of
    /// starting another.
    pub async fn open(&self, identity: &str) -> LedgerResult<Arc<LedgerEngine>> {
        let cell = {
            let mut cells = self.cells.lock().await;
            cells
                .entry(identity.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let engine = cell
            .get_or_try_init(|| async {
                LedgerEngine::open(&self.config.paths, identity)
                    .await
                    .map(Arc::new)
            })
            .await?;

        Ok(engine.clone())
    }

    /// The cached handle for an identity, if its store is open
    pub async fn get(&self, identity: &str) -> Option<Arc<LedgerEngine>> {
        let cells = self.cells.lock().await;
        cells.get(identity).and_then(|cell| cell.get().cloned())
    }

    /// Close an identity's store, dropping the cached handle
    ///
    /// Returns whether a handle existed. Documents are persisted on every
    /// write, so closing loses nothing.
    pub async fn close(&self, identity: &str) -> bool {
        let mut cells = self.cells.lock().await;
        let existed = cells.remove(identity).is_some();
        if existed {
            info!(identity, "ledger store closed");
        }
        existed
    }

    /// Close every open store
    pub async fn close_all(&self) {
        let mut cells = self.cells.lock().await;
        cells.clear();
    }

    /// Irreversibly delete an identity's store from disk
    pub async fn destroy(&self, identity: &str) -> LedgerResult<()> {
        self.close(identity).await;

        let dir = self.config.paths.store_dir(identity);
        if dir.exists() {
            std::fs::remove_dir_all(&dir).map_err(|e| {
                LedgerError::Storage(format!("Failed to remove {}: {}", dir.display(), e))
            })?;
        }
        info!(identity, "ledger store destroyed");
        Ok(())
    }
}
