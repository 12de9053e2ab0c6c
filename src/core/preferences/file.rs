use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use tracing::warn;

use super::PreferencesStore;
use crate::core::config::data::path_display;
use crate::core::config::io::write_atomic;

pub const PREFERENCES_FILE_NAME: &str = "preferences.toml";

#[derive(Default)]
struct CacheState {
    values: Option<BTreeMap<String, String>>,
    modified: Option<SystemTime>,
}

/// Preferences persisted as a flat TOML table.
///
/// The table is cached and re-read whenever the file's modification time
/// changes, so edits made by another process are picked up on the next read.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<CacheState>,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: Mutex::new(CacheState::default()),
        }
    }

    fn refresh(&self, state: &mut CacheState) {
        let disk_modified = modified_time(&self.path);
        if state.values.is_some() && state.modified == disk_modified {
            return;
        }
        state.values = Some(read_table(&self.path));
        state.modified = disk_modified;
    }

    fn update<F>(&self, mutator: F)
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.refresh(&mut state);
        let values = state.values.get_or_insert_with(BTreeMap::new);
        mutator(values);

        if let Err(err) = write_table(&self.path, values) {
            warn!(
                path = %path_display(&self.path),
                error = %err,
                "Failed to persist preferences; keeping the change in memory only"
            );
        }
        state.modified = modified_time(&self.path);
    }
}

impl PreferencesStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.refresh(&mut state);
        state.values.as_ref().and_then(|values| values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        });
    }

    fn remove(&self, key: &str) {
        self.update(|values| {
            values.remove(key);
        });
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).ok()?.modified().ok()
}

fn read_table(path: &Path) -> BTreeMap<String, String> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(err) => {
            warn!(path = %path_display(path), error = %err, "Failed to read preferences");
            return BTreeMap::new();
        }
    };

    match toml::from_str(&contents) {
        Ok(values) => values,
        Err(err) => {
            warn!(path = %path_display(path), error = %err, "Ignoring unparsable preferences file");
            BTreeMap::new()
        }
    }
}

fn write_table(
    path: &Path,
    values: &BTreeMap<String, String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let contents = toml::to_string_pretty(values)?;
    write_atomic(path, contents.as_bytes())?;
    Ok(())
}
