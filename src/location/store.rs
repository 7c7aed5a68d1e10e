//! Durable key-value slots for state that must survive restarts.
//!
//! Two slots are used: `breaker` and `last_fix`. Each holds one JSON
//! document. A missing or unreadable slot is treated as empty.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use tracing::warn;

pub const BREAKER_SLOT: &str = "breaker";
pub const CACHE_SLOT: &str = "last_fix";

pub trait StateStore: Send + Sync {
    fn load(&self, slot: &str) -> Option<String>;
    fn save(&self, slot: &str, json: &str);
    fn remove(&self, slot: &str);
}

/// Load and deserialize a slot, discarding corrupt contents.
pub(crate) fn load_json<T: serde::de::DeserializeOwned>(store: &dyn StateStore, slot: &str) -> Option<T> {
    let data = store.load(slot)?;
    match serde_json::from_str(&data) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(slot, error = %e, "Discarding unreadable state slot");
            None
        }
    }
}

pub(crate) fn save_json<T: serde::Serialize>(store: &dyn StateStore, slot: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => store.save(slot, &json),
        Err(e) => warn!(slot, error = %e, "Failed to serialize state slot"),
    }
}

/// One `<slot>.json` file per slot under a directory (default `~/.geofix`).
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Store rooted at the default location (~/.geofix).
    pub fn open_default() -> Self {
        Self::new(Self::default_dir())
    }

    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".geofix")
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slot))
    }
}

impl StateStore for FileStore {
    fn load(&self, slot: &str) -> Option<String> {
        fs::read_to_string(self.slot_path(slot)).ok()
    }

    fn save(&self, slot: &str, json: &str) {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            warn!(dir = %self.dir.display(), error = %e, "Cannot create state directory");
            return;
        }
        let path = self.slot_path(slot);
        let tmp = path.with_extension("tmp");
        let result = fs::write(&tmp, json).and_then(|_| fs::rename(&tmp, &path));
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Failed to persist state slot");
        }
    }

    fn remove(&self, slot: &str) {
        let path = self.slot_path(slot);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove state slot"),
        }
    }
}

/// Process-local store. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn load(&self, slot: &str) -> Option<String> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(slot)
            .cloned()
    }

    fn save(&self, slot: &str, json: &str) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(slot.to_string(), json.to_string());
    }

    fn remove(&self, slot: &str) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(slot);
    }
}
