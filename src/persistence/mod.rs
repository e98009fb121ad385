//! Blob store persistence
//!
//! The path library and the probability table are each persisted as one JSON
//! document under a fixed key. Writes replace the document wholesale; merging
//! with what is already stored is the reader's job (see `paths::merge`).
//!
//! Backends:
//! - `MemoryBlobStore`: in-process, used by tests and as a fallback
//! - `FileBlobStore`: one file per key in a directory (native)
//! - `LocalStorageBlobStore`: browser LocalStorage (wasm)

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Key of the recorded path library document
pub const PATHS_KEY: &str = "paths";
/// Key of the bucket probability table document
pub const PROBABILITIES_KEY: &str = "probabilities";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("write rejected for key {key}")]
    Rejected { key: String },
}

/// Narrow get/put contract over an external key-value store
pub trait BlobStore {
    /// Fetch the document stored under `key`; `Ok(None)` if nothing is stored
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replace the document stored under `key`
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Read and parse a JSON document.
///
/// Missing, unreadable or malformed documents all come back as `None`; the
/// fault is logged and the caller falls back to its defaults.
pub fn load_json<T: DeserializeOwned>(store: &dyn BlobStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            log::warn!("Failed to read '{}' from store: {}", key, e);
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Malformed '{}' document in store, ignoring: {}", key, e);
            None
        }
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    entries: RefCell<HashMap<String, String>>,
    fail_writes: Cell<bool>,
    writes: Cell<u32>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `put` fail (simulates an unreachable store)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> u32 {
        self.writes.get()
    }

    /// Raw stored document
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.fail_writes.get() {
            return Err(StoreError::Rejected {
                key: key.to_string(),
            });
        }
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}

/// Directory-backed store: `<dir>/<key>.json`
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl FileBlobStore {
    pub fn new(dir: impl Into<std::path::PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> std::path::PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl BlobStore for FileBlobStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        // Write to a temp file first so a crash never leaves half a document
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, self.path_for(key))?;
        Ok(())
    }
}

/// Browser LocalStorage store
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone)]
pub struct LocalStorageBlobStore {
    prefix: String,
}

#[cfg(target_arch = "wasm32")]
impl LocalStorageBlobStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn storage() -> Result<web_sys::Storage, StoreError> {
        web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()
            .ok_or_else(|| StoreError::Unavailable("LocalStorage not available".to_string()))
    }
}

#[cfg(target_arch = "wasm32")]
impl BlobStore for LocalStorageBlobStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Self::storage()?
            .get_item(&format!("{}{}", self.prefix, key))
            .map_err(|e| StoreError::Unavailable(format!("{e:?}")))
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        Self::storage()?
            .set_item(&format!("{}{}", self.prefix, key), value)
            .map_err(|_| StoreError::Rejected {
                key: key.to_string(),
            })
    }
}
