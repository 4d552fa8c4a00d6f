//! Key-value persistence trait

use async_trait::async_trait;

use crate::Result;

/// Simple key-value store of JSON-serializable blobs
///
/// Implementations:
/// - `InMemoryStore` - process-local, lost on restart
/// - `FileStore` - one JSON file per key
/// - `ScyllaStore` - shared ScyllaDB table
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Get a value by key
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Insert or replace a value
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()>;

    /// Remove a key; removing a missing key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// List keys starting with `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Backend name for logging
    fn backend_name(&self) -> &str;
}
