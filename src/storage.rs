//! Storage layer for duetask
//!
//! Persistent state is a small key-value space of JSON documents. The
//! file-backed store maps each key to one file in the data directory:
//!
//! ```text
//! <data dir>/
//!   duetask.toml        # Process configuration (see `config`)
//!   duetask.lock        # Held across a command's read-modify-write
//!   tasks.json          # Task list snapshot          (key "tasks")
//!   tasks.json.lock     # Advisory lock for tasks.json
//!   settings.json       # User settings               (key "settings")
//!   settings.json.lock
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};

/// Key holding the task list snapshot
pub const TASKS_KEY: &str = "tasks";

/// Key holding the user settings document
pub const SETTINGS_KEY: &str = "settings";

/// Lock file serializing whole commands against each other
pub const DATA_LOCK_FILE: &str = "duetask.lock";

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "DUETASK_DIR";

/// Load/save interface to persistent storage.
pub trait KeyValueStore: fmt::Debug + Send {
    /// Raw document for `key`, or `None` when nothing has been saved.
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Replace the document stored under `key`.
    fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Filesystem location backing the store, if any.
    fn location(&self) -> Option<&Path> {
        None
    }
}

/// Load and decode `key`, treating absence and corrupt data as "no saved data".
pub fn load_json_or_default<T>(kv: &dyn KeyValueStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match kv.load(key) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "discarding unparseable saved data");
                T::default()
            }
        },
        Ok(None) => T::default(),
        Err(err) => {
            warn!(key, error = %err, "saved data unreadable; using defaults");
            T::default()
        }
    }
}

/// Encode and save `value` under `key`.
pub fn save_json<T: Serialize>(kv: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    kv.save(key, &json)
}

/// Directory-backed store: one `<key>.json` file per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root` (created on first write).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the data directory: explicit path, then `DUETASK_DIR`, then
    /// the platform data directory.
    pub fn resolve_root(explicit: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path);
        }
        if let Some(raw) = std::env::var_os(DATA_DIR_ENV) {
            if !raw.is_empty() {
                return Ok(PathBuf::from(raw));
            }
        }
        directories::ProjectDirs::from("", "", "duetask")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| Error::NoDataDir("no home directory for this user".to_string()))
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the document holding `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    /// Path of the directory-wide lock file
    pub fn data_lock_path(&self) -> PathBuf {
        self.root.join(DATA_LOCK_FILE)
    }

    /// Take the directory-wide lock. Per-document locks only protect single
    /// reads and writes; this one spans a load, mutate, save sequence.
    pub fn lock_data(&self, timeout_ms: u64) -> Result<FileLock> {
        FileLock::acquire(self.data_lock_path(), timeout_ms)
    }

    fn validate_key(key: &str) -> Result<()> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        if valid {
            Ok(())
        } else {
            Err(Error::InvalidArgument(format!("invalid storage key '{key}'")))
        }
    }
}

impl KeyValueStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Self::validate_key(key)?;
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        lock::read_locked_str(&path, DEFAULT_LOCK_TIMEOUT_MS)
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        Self::validate_key(key)?;
        lock::write_atomic_locked(self.path_for(key), value.as_bytes(), DEFAULT_LOCK_TIMEOUT_MS)
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.root)
    }
}

/// In-memory store. Clones share the same contents, which lets two sessions
/// observe one "disk" across a simulated restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a raw document, bypassing serialization.
    pub fn insert_raw(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| Error::OperationFailed("memory store poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| Error::OperationFailed("memory store poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
