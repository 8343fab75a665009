//! Store backend selection

use crate::config::{Config, ConfigManager, StoreBackend};
use crate::error::CorralResult;
use crate::store::client::ResourceStore;
use crate::store::file::FileStore;
use crate::store::memory::MemoryStore;
use crate::store::retry::{RetryPolicy, RetryingStore};
use std::sync::Arc;
use tracing::debug;

/// Create the configured store backend, wrapped in the retry policy
pub fn create_store(config: &Config) -> CorralResult<Arc<dyn ResourceStore>> {
    let backend: Arc<dyn ResourceStore> = match config.store.backend {
        StoreBackend::Memory => {
            debug!("Using in-memory store");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::File => {
            let root = ConfigManager::state_dir(config).join("store");
            debug!("Using file store at {}", root.display());
            Arc::new(FileStore::new(root))
        }
    };

    Ok(Arc::new(RetryingStore::new(
        backend,
        RetryPolicy::from_config(&config.store),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn selects_backend_from_config() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.store.state_dir = Some(temp.path().to_path_buf());

        assert_eq!(create_store(&config).unwrap().backend_name(), "file");

        config.store.backend = StoreBackend::Memory;
        assert_eq!(create_store(&config).unwrap().backend_name(), "memory");
    }
}
