//! Storage layer for zen
//!
//! All state lives in one data directory:
//!
//! ```text
//! <data dir>/
//!   zen.toml              # Optional configuration
//!   zen-db.json           # Primary medium: JSON array of projects
//!   local-storage.json    # Secondary medium: JSON object of string values
//!                         #   zen_backup_web   -> copy of the project array
//!                         #   zen_sessions     -> focus sessions
//!                         #   zen_achievements -> unlock ledger
//! ```
//!
//! The gateway writes the primary medium and falls back to the secondary
//! one when that fails. Loading works the same way in reverse.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use directories::ProjectDirs;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::{StorageConfig, CONFIG_FILENAME};
use crate::error::{Error, Result};
use crate::gamification::AchievementLedger;
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::model::{FocusSession, Project};
use crate::normalize;

pub const DATA_DIR_ENV: &str = "ZEN_DATA_DIR";

/// Resolve the data directory: explicit path first, then the platform
/// application-local-data directory.
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    ProjectDirs::from("", "", "zen")
        .map(|dirs| dirs.data_local_dir().to_path_buf())
        .ok_or(Error::NoDataDir)
}

/// A place a string payload can be read from and written to.
pub trait Medium: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` when the medium is reachable but holds nothing yet.
    fn read(&self) -> Result<Option<String>>;

    fn write(&self, data: &str) -> Result<()>;
}

/// A whole file holding the payload.
#[derive(Debug, Clone)]
pub struct FileMedium {
    path: PathBuf,
}

impl FileMedium {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Medium for FileMedium {
    fn name(&self) -> &'static str {
        "file"
    }

    fn read(&self) -> Result<Option<String>> {
        lock::read_locked_str(&self.path, DEFAULT_LOCK_TIMEOUT_MS)
    }

    fn write(&self, data: &str) -> Result<()> {
        lock::write_atomic_locked(&self.path, data.as_bytes(), DEFAULT_LOCK_TIMEOUT_MS)
    }
}

/// A JSON object of string values kept in one file, shared by several keys.
#[derive(Debug, Clone)]
pub struct KeyValueFile {
    path: PathBuf,
}

impl KeyValueFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, Value>> {
        match lock::read_locked_str(&self.path, DEFAULT_LOCK_TIMEOUT_MS)? {
            Some(text) if !text.trim().is_empty() => Ok(serde_json::from_str(&text)?),
            _ => Ok(BTreeMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.read_map()?;
        Ok(map.get(key).and_then(Value::as_str).map(str::to_string))
    }

    /// Replace one key. A corrupt file is replaced rather than aborting.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let _lock = FileLock::acquire(lock::lock_path_for(&self.path), DEFAULT_LOCK_TIMEOUT_MS)?;
        let mut map: BTreeMap<String, Value> = match std::fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|err| {
                warn!(path = %self.path.display(), error = %err, "replacing unreadable key/value file");
                BTreeMap::new()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(Error::Io(err)),
        };
        map.insert(key.to_string(), Value::String(value.to_string()));
        let text = serde_json::to_string_pretty(&map)?;
        lock::write_atomic(&self.path, text.as_bytes())
    }
}

/// One key of a key/value file used as a medium.
#[derive(Debug, Clone)]
pub struct KeyValueMedium {
    file: KeyValueFile,
    key: String,
}

impl KeyValueMedium {
    pub fn new(file: KeyValueFile, key: impl Into<String>) -> Self {
        Self {
            file,
            key: key.into(),
        }
    }
}

impl Medium for KeyValueMedium {
    fn name(&self) -> &'static str {
        "key-value"
    }

    fn read(&self) -> Result<Option<String>> {
        self.file.get(&self.key)
    }

    fn write(&self, data: &str) -> Result<()> {
        self.file.set(&self.key, data)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Primary,
    Secondary,
    /// Neither medium held anything.
    Empty,
}

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub projects: Vec<Project>,
    pub source: Source,
    /// Project records discarded by validation.
    pub dropped: usize,
    /// Task records discarded inside otherwise valid projects.
    pub dropped_tasks: usize,
}

/// Loads and saves the project array across the two media.
pub struct Gateway {
    primary: Box<dyn Medium>,
    secondary: Box<dyn Medium>,
}

impl Gateway {
    pub fn new(primary: Box<dyn Medium>, secondary: Box<dyn Medium>) -> Self {
        Self { primary, secondary }
    }

    fn parse(&self, text: &str, source: Source, now: DateTime<Utc>) -> Result<LoadReport> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_array() {
            return Err(Error::StorageUnavailable(format!(
                "{source:?} payload is not a project array"
            )));
        }
        let (normalized, dropped_tasks) = normalize::projects(&value, now);
        if normalized.dropped > 0 || dropped_tasks > 0 {
            warn!(
                ?source,
                dropped = normalized.dropped,
                dropped_tasks,
                "discarded malformed records"
            );
        }
        let mut projects = normalized.records;
        projects.sort_by_key(|project| project.id);
        Ok(LoadReport {
            projects,
            source,
            dropped: normalized.dropped,
            dropped_tasks,
        })
    }

    fn read_primary(&self, now: DateTime<Utc>) -> Result<LoadReport> {
        match self.primary.read()? {
            Some(text) => self.parse(&text, Source::Primary, now),
            None => {
                self.primary.write("[]")?;
                Ok(LoadReport {
                    projects: Vec::new(),
                    source: Source::Primary,
                    dropped: 0,
                    dropped_tasks: 0,
                })
            }
        }
    }

    /// Never fails: an unusable primary falls back to the secondary medium,
    /// and when that is unusable too the store starts empty.
    pub fn load(&self, now: DateTime<Utc>) -> LoadReport {
        match self.read_primary(now) {
            Ok(report) => return report,
            Err(err) => warn!(
                medium = self.primary.name(),
                error = %err,
                "primary storage unavailable, falling back"
            ),
        }

        let loaded = self
            .secondary
            .read()
            .and_then(|text| text.map(|t| self.parse(&t, Source::Secondary, now)).transpose());
        match loaded {
            Ok(Some(report)) => report,
            Ok(None) => LoadReport {
                projects: Vec::new(),
                source: Source::Empty,
                dropped: 0,
                dropped_tasks: 0,
            },
            Err(err) => {
                error!(medium = self.secondary.name(), error = %err, "secondary storage unavailable");
                LoadReport {
                    projects: Vec::new(),
                    source: Source::Empty,
                    dropped: 0,
                    dropped_tasks: 0,
                }
            }
        }
    }

    /// Write the array as 2-space JSON, to the secondary medium when the
    /// primary refuses it.
    pub fn save(&self, projects: &[Project]) -> Result<Source> {
        let text = serde_json::to_string_pretty(projects)?;
        match self.primary.write(&text) {
            Ok(()) => {
                debug!(bytes = text.len(), "saved to primary storage");
                Ok(Source::Primary)
            }
            Err(primary_err) => {
                warn!(error = %primary_err, "primary write failed, writing secondary");
                self.secondary.write(&text).map_err(|secondary_err| {
                    Error::StorageUnavailable(format!(
                        "{}: {primary_err}; {}: {secondary_err}",
                        self.primary.name(),
                        self.secondary.name()
                    ))
                })?;
                Ok(Source::Secondary)
            }
        }
    }
}

/// Paths and media for one data directory.
#[derive(Debug, Clone)]
pub struct Storage {
    data_dir: PathBuf,
    config: StorageConfig,
}

impl Storage {
    pub fn new(data_dir: impl Into<PathBuf>, config: StorageConfig) -> Self {
        Self {
            data_dir: data_dir.into(),
            config,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILENAME)
    }

    pub fn db_file(&self) -> PathBuf {
        self.data_dir.join(&self.config.db_filename)
    }

    pub fn kv_file(&self) -> KeyValueFile {
        KeyValueFile::new(self.data_dir.join(&self.config.kv_filename))
    }

    pub fn gateway(&self) -> Gateway {
        Gateway::new(
            Box::new(FileMedium::new(self.db_file())),
            Box::new(KeyValueMedium::new(
                self.kv_file(),
                self.config.backup_key.clone(),
            )),
        )
    }

    /// Focus sessions; unreadable storage or records are logged and skipped.
    pub fn load_sessions(&self) -> Vec<FocusSession> {
        let text = match self.kv_file().get(&self.config.sessions_key) {
            Ok(Some(text)) => text,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(error = %err, "failed to read focus sessions");
                return Vec::new();
            }
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => {
                let normalized = normalize::sessions(&value);
                if normalized.dropped > 0 {
                    warn!(dropped = normalized.dropped, "discarded malformed focus sessions");
                }
                normalized.records
            }
            Err(err) => {
                warn!(error = %err, "focus sessions are not valid JSON");
                Vec::new()
            }
        }
    }

    pub fn save_sessions(&self, sessions: &[FocusSession]) -> Result<()> {
        let text = serde_json::to_string(sessions)?;
        self.kv_file().set(&self.config.sessions_key, &text)
    }

    pub fn load_ledger(&self) -> AchievementLedger {
        let parsed = self
            .kv_file()
            .get(&self.config.achievements_key)
            .and_then(|text| match text {
                Some(text) => Ok(serde_json::from_str(&text)?),
                None => Ok(AchievementLedger::default()),
            });
        parsed.unwrap_or_else(|err| {
            warn!(error = %err, "failed to read achievement ledger");
            AchievementLedger::default()
        })
    }

    pub fn save_ledger(&self, ledger: &AchievementLedger) -> Result<()> {
        let text = serde_json::to_string(ledger)?;
        self.kv_file().set(&self.config.achievements_key, &text)
    }
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("zen_backup_{}.json", date.format("%Y-%m-%d"))
}

/// Write the full store as 2-space JSON. `dest` may be a directory, in
/// which case the dated backup name is used inside it.
pub fn export(projects: &[Project], dest: &Path, date: NaiveDate) -> Result<PathBuf> {
    let path = if dest.is_dir() {
        dest.join(export_file_name(date))
    } else {
        dest.to_path_buf()
    };
    let text = serde_json::to_string_pretty(projects)?;
    lock::write_atomic(&path, text.as_bytes())?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    fn storage(dir: &TempDir) -> Storage {
        Storage::new(dir.path(), StorageConfig::default())
    }

    #[test]
    fn missing_primary_is_initialized_empty() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        let report = storage.gateway().load(now());
        assert_eq!(report.source, Source::Primary);
        assert!(report.projects.is_empty());
        assert_eq!(fs::read_to_string(storage.db_file()).unwrap(), "[]");
    }

    #[test]
    fn save_writes_pretty_json_and_reloads_sorted() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        let projects = vec![
            Project::new(20, "b", Priority::Low, now()),
            Project::new(10, "a", Priority::High, now()),
        ];
        assert_eq!(storage.gateway().save(&projects).unwrap(), Source::Primary);

        let text = fs::read_to_string(storage.db_file()).unwrap();
        assert!(text.starts_with("[\n  {\n    \"id\": 20"));

        let report = storage.gateway().load(now());
        let ids: Vec<u64> = report.projects.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![10, 20]);
    }

    #[test]
    fn corrupt_primary_falls_back_to_secondary() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        fs::write(storage.db_file(), "{ not json").unwrap();
        let backup = serde_json::to_string(&vec![Project::new(1, "kept", Priority::Normal, now())])
            .unwrap();
        storage.kv_file().set("zen_backup_web", &backup).unwrap();

        let report = storage.gateway().load(now());
        assert_eq!(report.source, Source::Secondary);
        assert_eq!(report.projects[0].name, "kept");
    }

    #[test]
    fn object_primary_falls_back_to_secondary() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        fs::write(storage.db_file(), "{}").unwrap();
        let backup = serde_json::to_string(&vec![Project::new(2, "backup", Priority::Normal, now())])
            .unwrap();
        storage.kv_file().set("zen_backup_web", &backup).unwrap();

        let report = storage.gateway().load(now());
        assert_eq!(report.source, Source::Secondary);
        assert_eq!(report.projects[0].name, "backup");
    }

    #[test]
    fn key_value_file_keeps_other_keys() {
        let dir = TempDir::new().unwrap();
        let kv = KeyValueFile::new(dir.path().join("local-storage.json"));
        kv.set("a", "1").unwrap();
        kv.set("b", "2").unwrap();
        kv.set("a", "3").unwrap();
        assert_eq!(kv.get("a").unwrap().as_deref(), Some("3"));
        assert_eq!(kv.get("b").unwrap().as_deref(), Some("2"));
        assert_eq!(kv.get("c").unwrap(), None);
    }

    #[test]
    fn sessions_and_ledger_round_trip() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        assert!(storage.load_sessions().is_empty());
        assert!(storage.load_ledger().is_empty());

        let session = FocusSession {
            id: 1,
            project_id: 2,
            task_id: None,
            start_time: now(),
            end_time: None,
            duration: 0,
            was_completed: false,
        };
        storage.save_sessions(std::slice::from_ref(&session)).unwrap();
        assert_eq!(storage.load_sessions(), vec![session]);
    }

    #[test]
    fn export_uses_dated_name_in_directories() {
        let dir = TempDir::new().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let path = export(&[], dir.path(), date).unwrap();
        assert_eq!(path.file_name().unwrap(), "zen_backup_2024-03-09.json");
        assert_eq!(fs::read_to_string(path).unwrap(), "[]");
    }

    #[test]
    fn explicit_data_dir_wins() {
        let dir = resolve_data_dir(Some(PathBuf::from("/tmp/zen-test"))).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/zen-test"));
    }
}
