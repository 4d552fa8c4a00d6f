//! Key-value persistence for the sales coaching engine
//!
//! Backends for the core `KeyValueStore` trait:
//! - [`InMemoryStore`]: process-local, for development and tests
//! - [`FileStore`]: one JSON document per key under a directory
//! - [`ScyllaStore`]: shared ScyllaDB table for multi-instance deployments

pub mod client;
pub mod error;
pub mod file;
pub mod memory;
pub mod schema;
pub mod scylla_store;

pub use client::{ScyllaClient, ScyllaConfig};
pub use error::PersistenceError;
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use scylla_store::ScyllaStore;

use std::sync::Arc;

use sales_coach_config::{PersistenceBackend, PersistenceConfig};
use sales_coach_core::KeyValueStore;

/// Open the configured backend
pub async fn open_store(
    config: &PersistenceConfig,
) -> Result<Arc<dyn KeyValueStore>, PersistenceError> {
    let store: Arc<dyn KeyValueStore> = match config.backend {
        PersistenceBackend::Memory => Arc::new(InMemoryStore::new()),
        PersistenceBackend::File => Arc::new(FileStore::open(&config.data_dir).await?),
        PersistenceBackend::Scylla => {
            let client = ScyllaClient::connect(ScyllaConfig::from(config)).await?;
            client.ensure_schema().await?;
            Arc::new(ScyllaStore::new(client))
        }
    };

    tracing::info!(backend = store.backend_name(), "Persistence initialized");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory_and_file_backends() {
        let memory = open_store(&PersistenceConfig::default()).await.unwrap();
        assert_eq!(memory.backend_name(), "memory");

        let dir = tempfile::tempdir().unwrap();
        let config = PersistenceConfig {
            backend: PersistenceBackend::File,
            data_dir: dir.path().join("coach").to_string_lossy().into_owned(),
            ..Default::default()
        };
        let file = open_store(&config).await.unwrap();
        assert_eq!(file.backend_name(), "file");
        file.set("k", serde_json::json!(true)).await.unwrap();
        assert_eq!(file.list("").await.unwrap(), vec!["k"]);
    }
}
