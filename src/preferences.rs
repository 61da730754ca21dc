use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use crate::filesystem::atomic_write;

/// Key-value storage for client preferences.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), String>;
    fn remove(&self, key: &str) -> Result<(), String>;
}

/// Preferences kept only for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), String> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Preferences persisted as a flat JSON object.
///
/// Every change is written through immediately.
pub struct FilePreferenceStore {
    values: RwLock<BTreeMap<String, String>>,
    path: PathBuf,
}

impl FilePreferenceStore {
    /// Opens the store at `path`. A missing file is an empty store; a
    /// malformed one is reported.
    pub fn open(path: PathBuf) -> Result<Self, String> {
        let values = Self::load_from_file(&path)?;
        Ok(Self {
            values: RwLock::new(values),
            path,
        })
    }

    /// Default location: `{config_dir}/notes-browser/preferences.json`
    pub fn default_path() -> Result<PathBuf, String> {
        Ok(dirs::config_dir()
            .ok_or_else(|| "Could not determine config directory".to_string())?
            .join("notes-browser")
            .join("preferences.json"))
    }

    fn load_from_file(path: &Path) -> Result<BTreeMap<String, String>, String> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read preferences file: {}", e))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let json_value: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse preferences file: {}", e))?;

        // Non-string values are ignored rather than rejected
        Ok(json_value
            .as_object()
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create preferences directory: {}", e))?;
        }
        let content = serde_json::to_string_pretty(values)
            .map_err(|e| format!("Failed to serialize preferences: {}", e))?;
        atomic_write(&self.path, content.as_bytes())
            .map_err(|e| format!("Failed to write preferences file: {}", e))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        let mut values = self.values.write().unwrap();
        values.insert(key.to_string(), value.to_string());
        self.save(&values)
    }

    fn remove(&self, key: &str) -> Result<(), String> {
        let mut values = self.values.write().unwrap();
        if values.remove(key).is_some() {
            self.save(&values)?;
        }
        Ok(())
    }
}
