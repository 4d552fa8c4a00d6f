//! JSON file-per-key store
//!
//! Keys are percent-encoded into file names so `list` can recover them.
//! Writes go to a hidden temp file that is renamed over the target.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use sales_coach_core::{KeyValueStore, Result};

use crate::PersistenceError;

const EXTENSION: &str = ".json";

/// Directory-backed `KeyValueStore`
pub struct FileStore {
    root: PathBuf,
    /// Serializes writers so temp files never collide
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`
    pub async fn open(root: impl AsRef<Path>) -> std::result::Result<Self, PersistenceError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        tracing::info!(root = %root.display(), "File store opened");
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}{}", encode_key(key), EXTENSION))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let value = serde_json::from_slice(&bytes).map_err(PersistenceError::from)?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::from(e).into()),
        }
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&value).map_err(PersistenceError::from)?;
        let target = self.path_for(key);
        let temp = self
            .root
            .join(format!(".{}{}.tmp", encode_key(key), EXTENSION));

        let _guard = self.write_lock.lock().await;
        tokio::fs::write(&temp, &bytes)
            .await
            .map_err(PersistenceError::from)?;
        tokio::fs::rename(&temp, &target)
            .await
            .map_err(PersistenceError::from)?;

        tracing::debug!(key, bytes = bytes.len(), "Value written");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PersistenceError::from(e).into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(PersistenceError::from)?;
        let mut keys = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(PersistenceError::from)? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            let Some(encoded) = name.strip_suffix(EXTENSION) else {
                continue;
            };
            if let Some(key) = decode_key(encoded) {
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn backend_name(&self) -> &str {
        "file"
    }
}

fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn decode_key(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
