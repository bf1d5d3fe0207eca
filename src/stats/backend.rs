//! Keyed JSON storage: one value per key, read and written whole.
//!
//! [`FileStore`] keeps every key in one JSON object on disk and replaces the
//! file atomically (temp file, fsync, rename), so a reader never sees a
//! partial write. [`MemoryStore`] is the fallback when nothing persistent is
//! available; its clones share one map, which lets tests simulate a reload by
//! building a second recorder over a clone.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::core::errors::{Result, SmartNavError};

/// Async-free view of a browser-style `storage.local`.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// In-memory store. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<BTreeMap<String, Value>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every key, as clearing browser storage would.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.inner.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.inner.lock().insert(key.to_string(), value);
        Ok(())
    }
}

/// All keys in one JSON object file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self, key: &str) -> Result<BTreeMap<String, Value>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            // Invalid UTF-8 is corrupt content, not an I/O failure.
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Err(SmartNavError::Storage {
                    key: key.to_string(),
                    details: format!("{}: {e}", self.path.display()),
                });
            }
            Err(source) => return Err(SmartNavError::io(&self.path, source)),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| SmartNavError::Storage {
            key: key.to_string(),
            details: format!("{}: {e}", self.path.display()),
        })
    }

    fn write_all(&self, map: &BTreeMap<String, Value>) -> Result<()> {
        let io_err = |source| SmartNavError::io(&self.path, source);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(map)?;

        // Same directory, so the rename stays on one filesystem.
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path).map_err(io_err)?;
            file.write_all(json.as_bytes()).map_err(io_err)?;
            file.sync_all().map_err(io_err)?;
        }
        fs::rename(&tmp_path, &self.path).map_err(io_err)
    }

    /// Where an unreadable file is moved before it is replaced.
    #[must_use]
    pub fn quarantine_path(&self) -> PathBuf {
        self.path.with_extension("json.corrupt")
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read_all(key)?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.write_lock.lock();
        // A corrupt file is set aside and replaced so later writes persist.
        let mut map = match self.read_all(key) {
            Ok(map) => map,
            Err(SmartNavError::Storage { .. }) => {
                let aside = self.quarantine_path();
                fs::rename(&self.path, &aside).map_err(|source| SmartNavError::io(&aside, source))?;
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        map.insert(key.to_string(), value);
        self.write_all(&map)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        (**self).set(key, value)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        (**self).set(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_store_clones_share_state() {
        let a = MemoryStore::new();
        let b = a.clone();
        a.set("k", json!({"x": 1})).unwrap();
        assert_eq!(b.get("k").unwrap(), Some(json!({"x": 1})));
        b.clear();
        assert_eq!(a.get("k").unwrap(), None);
    }

    #[test]
    fn file_store_missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("storage.json"));
        assert_eq!(store.get("tabtabgo_stats").unwrap(), None);
    }

    #[test]
    fn file_store_keys_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let store = FileStore::new(&path);
        store.set("smarttabColor", json!("#ec4899")).unwrap();
        store.set("tabtabgo_stats", json!({"example.com/": {}})).unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get("smarttabColor").unwrap(), Some(json!("#ec4899")));
        assert!(reopened.get("tabtabgo_stats").unwrap().is_some());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn file_store_corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "{not json").unwrap();
        let err = FileStore::new(&path).get("tabtabgo_stats").unwrap_err();
        assert_eq!(err.code(), "SNV-2102");
    }

    #[test]
    fn file_store_write_replaces_a_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "{not json").unwrap();
        let store = FileStore::new(&path);

        store.set("tabtabgo_stats", json!({"example.com/": {}})).unwrap();
        assert_eq!(
            store.get("tabtabgo_stats").unwrap(),
            Some(json!({"example.com/": {}}))
        );
        assert_eq!(fs::read_to_string(store.quarantine_path()).unwrap(), "{not json");

        // Later writes merge as usual.
        store.set("smarttabColor", json!("#10b981")).unwrap();
        assert!(store.get("tabtabgo_stats").unwrap().is_some());
    }

    #[test]
    fn file_store_binary_garbage_is_corrupt_not_io() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, [0xff, 0xfe, 0x00, 0x9f]).unwrap();
        let store = FileStore::new(&path);
        assert_eq!(store.get("k").unwrap_err().code(), "SNV-2102");
        store.set("k", json!(1)).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(json!(1)));
    }
}
