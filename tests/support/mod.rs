#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// A throwaway data directory and a `zen` command bound to it.
pub struct TestEnv {
    dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn zen(&self) -> Command {
        let mut cmd = Command::cargo_bin("zen").expect("binary");
        cmd.arg("--data-dir")
            .arg(self.dir.path())
            .env_remove("RUST_LOG")
            .env_remove("ZEN_DATA_DIR");
        cmd
    }

    /// Run with `--json`, assert success, and return the `data` payload.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self
            .zen()
            .arg("--json")
            .args(args)
            .output()
            .expect("run zen");
        assert!(
            output.status.success(),
            "zen {args:?} failed: {}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let envelope: Value = serde_json::from_slice(&output.stdout).expect("json output");
        assert_eq!(envelope["status"], "success");
        envelope["data"].clone()
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("zen-db.json")
    }

    pub fn read_db(&self) -> Value {
        let text = fs::read_to_string(self.db_path()).expect("read zen-db.json");
        serde_json::from_str(&text).expect("parse zen-db.json")
    }

    pub fn read_kv(&self) -> Value {
        let text = fs::read_to_string(self.dir.path().join("local-storage.json"))
            .expect("read local-storage.json");
        serde_json::from_str(&text).expect("parse local-storage.json")
    }

    /// Add a client and return its id.
    pub fn add_project(&self, name: &str) -> u64 {
        self.json(&["project", "add", name])["id"]
            .as_u64()
            .expect("project id")
    }

    /// Add a task to one client and return its id.
    pub fn add_task(&self, project: u64, title: &str, extra: &[&str]) -> u64 {
        let project = project.to_string();
        let mut args = vec!["task", "add", title, "--project", project.as_str()];
        args.extend_from_slice(extra);
        self.json(&args)["created"][0]["task"]["id"]
            .as_u64()
            .expect("task id")
    }
}
