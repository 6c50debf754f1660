//! Configuration loading and management
//!
//! Handles parsing of `zen.toml` in the data directory.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

pub const CONFIG_FILENAME: &str = "zen.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub user: UserConfig,
}

/// Where and how the store is persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Primary medium: the project array as a JSON file
    #[serde(default = "default_db_filename")]
    pub db_filename: String,

    /// Secondary medium: a JSON object of string values
    #[serde(default = "default_kv_filename")]
    pub kv_filename: String,

    /// Key holding the store copy in the secondary medium
    #[serde(default = "default_backup_key")]
    pub backup_key: String,

    #[serde(default = "default_sessions_key")]
    pub sessions_key: String,

    #[serde(default = "default_achievements_key")]
    pub achievements_key: String,

    /// Quiet period before a queued snapshot is written
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_db_filename() -> String {
    "zen-db.json".to_string()
}

fn default_kv_filename() -> String {
    "local-storage.json".to_string()
}

fn default_backup_key() -> String {
    "zen_backup_web".to_string()
}

fn default_sessions_key() -> String {
    "zen_sessions".to_string()
}

fn default_achievements_key() -> String {
    "zen_achievements".to_string()
}

fn default_debounce_ms() -> u64 {
    1000
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_filename: default_db_filename(),
            kv_filename: default_kv_filename(),
            backup_key: default_backup_key(),
            sessions_key: default_sessions_key(),
            achievements_key: default_achievements_key(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Oldest entries are dropped beyond this many
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_max_entries() -> usize {
    crate::history::DEFAULT_MAX_HISTORY
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Author recorded on new task comments
    #[serde(default = "default_comment_author")]
    pub comment_author: String,
}

fn default_comment_author() -> String {
    "You".to_string()
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            comment_author: default_comment_author(),
        }
    }
}

impl Config {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `zen.toml` from the data directory, or return defaults
    pub fn load_from_dir(data_dir: &Path) -> Self {
        let path = data_dir.join(CONFIG_FILENAME);
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring invalid config");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let storage = &self.storage;
        for (field, value) in [
            ("storage.db_filename", &storage.db_filename),
            ("storage.kv_filename", &storage.kv_filename),
            ("storage.backup_key", &storage.backup_key),
            ("storage.sessions_key", &storage.sessions_key),
            ("storage.achievements_key", &storage.achievements_key),
        ] {
            if value.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("{field} cannot be empty")));
            }
        }
        if storage.db_filename == storage.kv_filename {
            return Err(Error::InvalidConfig(
                "storage.db_filename and storage.kv_filename must differ".to_string(),
            ));
        }
        if storage.debounce_ms == 0 {
            return Err(Error::InvalidConfig(
                "storage.debounce_ms must be greater than 0".to_string(),
            ));
        }
        if self.history.max_entries == 0 {
            return Err(Error::InvalidConfig(
                "history.max_entries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_expected() {
        let cfg = Config::default();
        assert_eq!(cfg.storage.db_filename, "zen-db.json");
        assert_eq!(cfg.storage.kv_filename, "local-storage.json");
        assert_eq!(cfg.storage.backup_key, "zen_backup_web");
        assert_eq!(cfg.storage.sessions_key, "zen_sessions");
        assert_eq!(cfg.storage.achievements_key, "zen_achievements");
        assert_eq!(cfg.storage.debounce_ms, 1000);
        assert_eq!(cfg.history.max_entries, 50);
        assert_eq!(cfg.user.comment_author, "You");
    }

    #[test]
    fn load_parses_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILENAME);
        let content = r#"
[storage]
db_filename = "tasks.json"
debounce_ms = 250

[history]
max_entries = 10

[user]
comment_author = "Dana"
"#;
        fs::write(&path, content).expect("write config");

        let cfg = Config::load(&path).expect("load config");
        assert_eq!(cfg.storage.db_filename, "tasks.json");
        assert_eq!(cfg.storage.kv_filename, "local-storage.json");
        assert_eq!(cfg.storage.debounce_ms, 250);
        assert_eq!(cfg.history.max_entries, 10);
        assert_eq!(cfg.user.comment_author, "Dana");
    }

    #[test]
    fn zero_debounce_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "[storage]\ndebounce_ms = 0\n").expect("write config");

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn shared_filenames_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "[storage]\ndb_filename = \"a.json\"\nkv_filename = \"a.json\"\n")
            .expect("write config");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn load_from_dir_defaults_when_missing_or_invalid() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(Config::load_from_dir(dir.path()), Config::default());

        fs::write(dir.path().join(CONFIG_FILENAME), "[history]\nmax_entries = 0\n")
            .expect("write config");
        assert_eq!(Config::load_from_dir(dir.path()), Config::default());
    }

    #[test]
    fn save_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.toml");
        let mut cfg = Config::default();
        cfg.history.max_entries = 7;
        cfg.save(&path).expect("save config");

        let written = fs::read_to_string(&path).expect("read config");
        assert!(written.contains("max_entries = 7"));
        assert_eq!(Config::load(&path).expect("reload"), cfg);
    }
}
