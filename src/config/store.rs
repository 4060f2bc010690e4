//! ConfigStore trait and the built-in implementations

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{CustodianError, Result};

/// Durable key/value storage for registry and admin-config state.
///
/// Values are opaque JSON. Implementations must tolerate frequent small
/// writes; the registry persists on every mutation.
pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// File-backed store persisting a single JSON object.
///
/// The whole map is rewritten on every `set`; state volume here is a
/// handful of small records, not a database.
pub struct JsonFileConfigStore {
    path: PathBuf,
    cache: Mutex<HashMap<String, Value>>,
}

impl JsonFileConfigStore {
    /// Open or create the store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let cache = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            HashMap::new()
        };

        Ok(Self {
            path,
            cache: Mutex::new(cache),
        })
    }

    fn flush(&self, snapshot: &HashMap<String, Value>) -> Result<()> {
        let raw = serde_json::to_string_pretty(snapshot)?;
        // Write-then-rename so a crash mid-write never truncates the store.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| CustodianError::Persistence(e.to_string()))?;
        Ok(())
    }
}

impl ConfigStore for JsonFileConfigStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.cache.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let snapshot = {
            let mut cache = self.cache.lock();
            cache.insert(key.to_string(), value);
            cache.clone()
        };
        self.flush(&snapshot)
    }
}

/// In-memory store for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryConfigStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryConfigStore::new();
        assert_eq!(store.get("missing").unwrap(), None);

        store.set("k", json!({"a": 1})).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(json!({"a": 1})));
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        {
            let store = JsonFileConfigStore::open(&path).unwrap();
            store.set("backup.locations", json!([{"id": "primary"}])).unwrap();
        }

        let reopened = JsonFileConfigStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("backup.locations").unwrap(),
            Some(json!([{"id": "primary"}]))
        );
    }

    #[test]
    fn file_store_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/state.json");
        let store = JsonFileConfigStore::open(&path).unwrap();
        store.set("k", json!(true)).unwrap();
        assert!(path.exists());
    }
}
