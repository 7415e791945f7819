//! Key-value persistence backends.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{Error, Result};

/// Durable string key-value storage.
///
/// Reads never fail: an unreadable backend looks empty.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get the value stored under `key`.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// A JSON object file mapping keys to string values.
///
/// Every write rewrites the whole file through a temp file and a rename.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles on the file.
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> HashMap<String, Value> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "State file not found");
                return HashMap::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read state file");
                return HashMap::new();
            }
        };

        match serde_json::from_str::<HashMap<String, Value>>(&raw) {
            Ok(map) => map,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    raw_len = raw.len(),
                    error = %e,
                    "Ignoring corrupt state file"
                );
                HashMap::new()
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Option<String> {
        match self.load().await.remove(key)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            other => {
                warn!(key, value = %other, "Unexpected value type in state file");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut map = self.load().await;
        map.insert(key.to_string(), Value::String(value.to_string()));
        let json = serde_json::to_string_pretty(&map)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_path("creating directory", parent, e))?;
        }

        // Write atomically using a temp file
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, json)
            .await
            .map_err(|e| Error::io_path("writing", &temp_path, e))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::io_path("renaming", &temp_path, e))?;

        debug!(path = %self.path.display(), key, "State persisted");
        Ok(())
    }
}

/// In-process store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
