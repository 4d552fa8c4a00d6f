//! Process-local key-value store

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use sales_coach_core::{KeyValueStore, Result};

/// In-memory `KeyValueStore`; contents are lost on restart
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<BTreeMap<String, serde_json::Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = InMemoryStore::new();
        assert!(store.get("coach/patterns").await.unwrap().is_none());

        store.set("coach/patterns", json!([1, 2])).await.unwrap();
        assert_eq!(store.get("coach/patterns").await.unwrap(), Some(json!([1, 2])));

        store.set("coach/patterns", json!([])).await.unwrap();
        assert_eq!(store.len(), 1);

        store.delete("coach/patterns").await.unwrap();
        store.delete("coach/patterns").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let store = InMemoryStore::new();
        store.set("coach/feedback", json!([])).await.unwrap();
        store.set("coach/patterns", json!([])).await.unwrap();
        store.set("history/call-1", json!({})).await.unwrap();

        assert_eq!(
            store.list("coach/").await.unwrap(),
            vec!["coach/feedback", "coach/patterns"]
        );
        assert_eq!(store.list("").await.unwrap().len(), 3);
    }
}
