#![allow(dead_code)]

use assert_cmd::cargo;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub fn dupe_linker() -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(cargo::cargo_bin!("dupe-linker"));
    cmd.env_remove("DUPE_LINKER_DB")
        .env_remove("DUPE_LINKER_THREADS")
        .env_remove("RUST_LOG");
    cmd
}

/// A directory to scan plus a separate directory for the hash database
pub struct Workspace {
    pub models: TempDir,
    pub state: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            models: TempDir::new().unwrap(),
            state: TempDir::new().unwrap(),
        }
    }

    /// Canonical scan root, as it appears in output
    pub fn root(&self) -> PathBuf {
        fs::canonicalize(self.models.path()).unwrap()
    }

    pub fn db(&self) -> PathBuf {
        self.state.path().join("model-data.sqlite3")
    }

    /// Command preconfigured with the scan root and database
    pub fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = dupe_linker();
        cmd.arg("-d")
            .arg(self.models.path())
            .arg("-b")
            .arg(self.db())
            .arg("--no-progress");
        cmd
    }

    pub fn json(&self, extra: &[&str]) -> serde_json::Value {
        let output = self
            .cmd()
            .args(["--format", "json"])
            .args(extra)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).unwrap()
    }

    pub fn file(&self, name: &str, content: &[u8]) -> PathBuf {
        create_file(self.models.path(), name, content);
        self.root().join(name)
    }
}

pub fn create_file(dir: &Path, name: &str, content: &[u8]) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

pub fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

pub fn file_names(json: &serde_json::Value) -> Vec<String> {
    json["groups"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|g| g["files"].as_array().unwrap())
        .map(|f| f.as_str().unwrap().rsplit('/').next().unwrap().to_string())
        .collect()
}
