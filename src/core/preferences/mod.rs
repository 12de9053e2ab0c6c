//! User preferences: the selected model and the optional backend credential.
//!
//! Values live in an injected [`PreferencesStore`], so the same [`Settings`]
//! front end works over the on-disk [`FileStore`] and the in-memory
//! [`MemoryStore`] used by tests and ephemeral sessions.

pub mod file;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub use file::FileStore;

pub const MODEL_KEY: &str = "model";
pub const CREDENTIAL_KEY: &str = "credential";
pub const DEFAULT_MODEL: &str = "meta-llama/Meta-Llama-3.1-8B-Instruct";

/// String-keyed storage with total get/set/remove operations.
///
/// Implementations must make a write visible to the next read on the same
/// store.
pub trait PreferencesStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferencesStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.remove(key);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    pub model: String,
    pub credential: Option<String>,
}

/// Typed access to the two persisted preferences.
#[derive(Clone)]
pub struct Settings {
    store: Arc<dyn PreferencesStore>,
}

impl Settings {
    pub fn new(store: Arc<dyn PreferencesStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn model(&self) -> String {
        self.store
            .get(MODEL_KEY)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    pub fn set_model(&self, value: &str) {
        self.store.set(MODEL_KEY, value);
    }

    pub fn credential(&self) -> Option<String> {
        self.store.get(CREDENTIAL_KEY)
    }

    /// Stores the trimmed credential. `None` or a blank value clears it.
    pub fn set_credential(&self, value: Option<&str>) {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(trimmed) => self.store.set(CREDENTIAL_KEY, trimmed),
            None => self.store.remove(CREDENTIAL_KEY),
        }
    }

    pub fn has_credential(&self) -> bool {
        self.credential().is_some()
    }

    pub fn preferences(&self) -> Preferences {
        Preferences {
            model: self.model(),
            credential: self.credential(),
        }
    }
}
