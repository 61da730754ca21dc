use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::models::Config;

/// ConfigManager handles loading, saving, and updating application configuration.
///
/// Features:
/// - Thread-safe access via RwLock
/// - Merges saved config with defaults for missing fields
pub struct ConfigManager {
    /// The current configuration
    config: RwLock<Config>,
    /// Path to the configuration file
    config_path: PathBuf,
}

impl ConfigManager {
    /// Creates a new ConfigManager with the given config file path.
    ///
    /// Loads existing configuration from disk, merging with defaults for any
    /// missing fields.
    ///
    /// # Arguments
    /// * `config_path` - Path to the config.json file
    ///
    /// # Returns
    /// * `Ok(ConfigManager)` - A new ConfigManager instance
    /// * `Err(String)` - If loading fails
    pub fn new(config_path: PathBuf) -> Result<Self, String> {
        let config = Self::load_from_file(&config_path)?;

        Ok(Self {
            config: RwLock::new(config),
            config_path,
        })
    }

    /// Default location: `{config_dir}/notes-browser/config.json`
    pub fn default_path() -> Result<PathBuf, String> {
        Ok(dirs::config_dir()
            .ok_or_else(|| "Could not determine config directory".to_string())?
            .join("notes-browser")
            .join("config.json"))
    }

    /// Loads configuration from file, merging with defaults.
    ///
    /// If the file doesn't exist, returns default configuration.
    fn load_from_file(path: &Path) -> Result<Config, String> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        merge_config_with_defaults(&content)
    }

    /// Gets a clone of the current configuration.
    pub fn get(&self) -> Config {
        self.config.read().unwrap().clone()
    }

    /// Updates the configuration using a closure.
    ///
    /// # Arguments
    /// * `f` - A closure that modifies the configuration
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Config),
    {
        let mut config = self.config.write().unwrap();
        f(&mut config);
    }

    /// Saves the configuration to disk immediately.
    ///
    /// # Returns
    /// * `Ok(())` - If save was successful
    /// * `Err(String)` - If saving fails
    pub fn save_sync(&self) -> Result<(), String> {
        let config = self.config.read().unwrap().clone();

        let content = serde_json::to_string_pretty(&config)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(&self.config_path, content)
            .map_err(|e| format!("Failed to write config file: {}", e))
    }

    /// Returns the config file path.
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }
}

/// Merges a partial config JSON with defaults.
///
/// Unknown fields and fields of the wrong type are ignored.
///
/// # Arguments
/// * `partial_json` - JSON string with partial configuration
///
/// # Returns
/// * `Ok(Config)` - The merged configuration
/// * `Err(String)` - If parsing fails
pub fn merge_config_with_defaults(partial_json: &str) -> Result<Config, String> {
    if partial_json.trim().is_empty() {
        return Ok(Config::default());
    }

    let json_value: serde_json::Value = serde_json::from_str(partial_json)
        .map_err(|e| format!("Failed to parse config: {}", e))?;

    let mut config = Config::default();

    if let Some(obj) = json_value.as_object() {
        if let Some(v) = obj.get("content_root").and_then(|v| v.as_str()) {
            config.content_root = PathBuf::from(v);
        }
        if let Some(v) = obj.get("host").and_then(|v| v.as_str()) {
            config.host = v.to_string();
        }
        if let Some(v) = obj.get("port").and_then(|v| v.as_u64()) {
            match u16::try_from(v) {
                Ok(port) => config.port = port,
                Err(_) => log::warn!("Ignoring out of range port {} in config", v),
            }
        }
        if let Some(v) = obj.get("base_path").and_then(|v| v.as_str()) {
            config.base_path = normalize_base_path(v);
        }
        if let Some(v) = obj.get("index_file").and_then(|v| v.as_str()) {
            if !v.is_empty() {
                config.index_file = v.to_string();
            }
        }
        if let Some(v) = obj.get("authoring_enabled").and_then(|v| v.as_bool()) {
            config.authoring_enabled = v;
        }
        if let Some(v) = obj.get("content_base_url").and_then(|v| v.as_str()) {
            config.content_base_url = v.to_string();
        }
    }

    Ok(config)
}

/// Names of the settings accepted by [`set_field`]
pub const CONFIG_KEYS: [&str; 7] = [
    "content_root",
    "host",
    "port",
    "base_path",
    "index_file",
    "authoring_enabled",
    "content_base_url",
];

/// Sets one config field from its textual value.
///
/// Values are checked the same way a loaded config file is: the port must fit
/// in a `u16`, the index file name must not be empty and the mount point is
/// normalized.
///
/// # Returns
/// * `Ok(())` - The field was updated
/// * `Err(String)` - Unknown key or invalid value; `config` is unchanged
pub fn set_field(config: &mut Config, key: &str, value: &str) -> Result<(), String> {
    let value = value.trim();
    match key {
        "content_root" => config.content_root = PathBuf::from(value),
        "host" => config.host = value.to_string(),
        "port" => {
            config.port = value
                .parse()
                .map_err(|e| format!("Invalid port '{}': {}", value, e))?
        }
        "base_path" => config.base_path = normalize_base_path(value),
        "index_file" => {
            if value.is_empty() {
                return Err("Index file name must not be empty".to_string());
            }
            config.index_file = value.to_string();
        }
        "authoring_enabled" => {
            config.authoring_enabled = value
                .parse()
                .map_err(|_| format!("Invalid boolean '{}' (expected true or false)", value))?
        }
        "content_base_url" => config.content_base_url = value.to_string(),
        other => {
            return Err(format!(
                "Unknown config key '{}' (expected one of: {})",
                other,
                CONFIG_KEYS.join(", ")
            ))
        }
    }
    Ok(())
}

/// Mount points always start and end with a slash: `notes` becomes `/notes/`.
pub fn normalize_base_path(base: &str) -> String {
    let trimmed = base.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_manager_new_no_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let manager = ConfigManager::new(config_path).unwrap();
        assert_eq!(manager.get(), Config::default());
    }

    #[test]
    fn test_config_manager_load_existing() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let partial_config = r#"{
            "content_root": "docs",
            "port": 8080
        }"#;
        fs::write(&config_path, partial_config).unwrap();

        let manager = ConfigManager::new(config_path).unwrap();
        let config = manager.get();

        assert_eq!(config.content_root, PathBuf::from("docs"));
        assert_eq!(config.port, 8080);

        // Default values should be preserved for missing fields
        assert_eq!(config.base_path, "/notes/");
        assert!(config.authoring_enabled);
    }

    #[test]
    fn test_config_manager_update_and_save() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let manager = ConfigManager::new(config_path.clone()).unwrap();
        manager.update(|config| {
            config.authoring_enabled = false;
            config.port = 4000;
        });
        manager.save_sync().unwrap();

        let reloaded = ConfigManager::new(config_path).unwrap().get();
        assert!(!reloaded.authoring_enabled);
        assert_eq!(reloaded.port, 4000);
    }

    #[test]
    fn test_merge_config_with_defaults_empty() {
        assert_eq!(merge_config_with_defaults("").unwrap(), Config::default());
        assert_eq!(merge_config_with_defaults("   ").unwrap(), Config::default());
    }

    #[test]
    fn test_merge_config_ignores_bad_values() {
        let config = merge_config_with_defaults(r#"{"port": 70000, "host": 5, "index_file": ""}"#).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_merge_config_invalid_json() {
        let result = merge_config_with_defaults("{oops");
        assert!(result.unwrap_err().contains("Failed to parse config"));
    }

    #[test]
    fn test_merge_config_with_defaults_full() {
        let full = serde_json::to_string(&Config::default()).unwrap();
        assert_eq!(merge_config_with_defaults(&full).unwrap(), Config::default());
    }

    #[test]
    fn test_set_field_then_save_round_trip() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let manager = ConfigManager::new(config_path.clone()).unwrap();

        let mut next = manager.get();
        set_field(&mut next, "port", "8080").unwrap();
        set_field(&mut next, "base_path", "docs").unwrap();
        set_field(&mut next, "authoring_enabled", "false").unwrap();
        manager.update(|config| *config = next);
        manager.save_sync().unwrap();

        let reloaded = ConfigManager::new(config_path).unwrap().get();
        assert_eq!(reloaded.port, 8080);
        assert_eq!(reloaded.base_path, "/docs/");
        assert!(!reloaded.authoring_enabled);
        assert_eq!(reloaded.index_file, "notes-index.json");
    }

    #[test]
    fn test_set_field_rejects_bad_values() {
        let mut config = Config::default();
        assert!(set_field(&mut config, "port", "70000").is_err());
        assert!(set_field(&mut config, "authoring_enabled", "yes").is_err());
        assert!(set_field(&mut config, "index_file", "  ").is_err());
        assert!(set_field(&mut config, "colour", "blue")
            .unwrap_err()
            .contains("Unknown config key"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_normalize_base_path() {
        assert_eq!(normalize_base_path("notes"), "/notes/");
        assert_eq!(normalize_base_path("/notes"), "/notes/");
        assert_eq!(normalize_base_path("/"), "/");
        assert_eq!(normalize_base_path(""), "/");
    }

    fn optional_string_val() -> impl Strategy<Value = Option<String>> {
        prop_oneof![Just(None), "[a-zA-Z0-9_-]{1,20}".prop_map(Some),]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Loading a partial config keeps defaults for every missing field.
        #[test]
        fn prop_config_merge_preserves_defaults(
            host in optional_string_val(),
            port in proptest::option::of(1u16..=u16::MAX),
            authoring_enabled in proptest::option::of(any::<bool>()),
        ) {
            let mut json_obj = serde_json::Map::new();
            if let Some(v) = &host {
                json_obj.insert("host".to_string(), serde_json::json!(v));
            }
            if let Some(v) = port {
                json_obj.insert("port".to_string(), serde_json::json!(v));
            }
            if let Some(v) = authoring_enabled {
                json_obj.insert("authoring_enabled".to_string(), serde_json::json!(v));
            }

            let partial_json = serde_json::to_string(&json_obj).unwrap();
            let config = merge_config_with_defaults(&partial_json).unwrap();
            let defaults = Config::default();

            prop_assert_eq!(&config.host, host.as_ref().unwrap_or(&defaults.host));
            prop_assert_eq!(config.port, port.unwrap_or(defaults.port));
            prop_assert_eq!(config.authoring_enabled, authoring_enabled.unwrap_or(defaults.authoring_enabled));
            prop_assert_eq!(&config.content_root, &defaults.content_root);
            prop_assert_eq!(&config.base_path, &defaults.base_path);
        }
    }
}
