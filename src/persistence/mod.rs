pub mod memory;
pub mod redb_store;
pub mod store;

pub use memory::MemoryStore;
pub use redb_store::{RedbStore, StoreError};
pub use store::{LedgerStore, PersistenceStore, SummaryStore, TransactionStore};

use std::sync::Arc;
use tracing::info;

use crate::config::{StorageBackend, StorageConfig};

/// Opens the configured backend.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn LedgerStore>, StoreError> {
    match config.backend {
        StorageBackend::Redb => {
            if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
            let redb = Arc::new(RedbStore::new(&config.path)?);
            info!(path = %config.path.display(), "Using redb storage");
            Ok(Arc::new(PersistenceStore::new(redb)))
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage, data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
