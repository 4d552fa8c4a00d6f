//! ScyllaDB-backed key-value store

use async_trait::async_trait;
use chrono::Utc;

use sales_coach_core::{KeyValueStore, Result};

use crate::{PersistenceError, ScyllaClient};

/// `KeyValueStore` over the `kv_store` table
#[derive(Clone)]
pub struct ScyllaStore {
    client: ScyllaClient,
}

impl ScyllaStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KeyValueStore for ScyllaStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let query = format!(
            "SELECT value_json FROM {}.kv_store WHERE entry_key = ?",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (key,))
            .await
            .map_err(PersistenceError::from)?;

        if let Some(rows) = result.rows {
            if let Some(row) = rows.into_iter().next() {
                let (value_json,): (String,) = row
                    .into_typed()
                    .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
                let value = serde_json::from_str(&value_json).map_err(PersistenceError::from)?;
                return Ok(Some(value));
            }
        }

        Ok(None)
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let query = format!(
            "INSERT INTO {}.kv_store (entry_key, value_json, updated_at_ms) VALUES (?, ?, ?)",
            self.client.keyspace()
        );
        let value_json = serde_json::to_string(&value).map_err(PersistenceError::from)?;

        self.client
            .session()
            .query_unpaged(
                query,
                (key, &value_json, Utc::now().timestamp_millis()),
            )
            .await
            .map_err(PersistenceError::from)?;

        tracing::debug!(key, bytes = value_json.len(), "Value written to ScyllaDB");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let query = format!("DELETE FROM {}.kv_store WHERE entry_key = ?", self.client.keyspace());
        self.client
            .session()
            .query_unpaged(query, (key,))
            .await
            .map_err(PersistenceError::from)?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        // Partition keys cannot be range-scanned; the table holds few keys
        let query = format!("SELECT entry_key FROM {}.kv_store", self.client.keyspace());
        let result = self
            .client
            .session()
            .query_unpaged(query, &[])
            .await
            .map_err(PersistenceError::from)?;

        let mut keys = Vec::new();
        for row in result.rows.unwrap_or_default() {
            let (key,): (String,) = row
                .into_typed()
                .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn backend_name(&self) -> &str {
        "scylla"
    }
}
