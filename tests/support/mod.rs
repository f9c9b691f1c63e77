#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// Scratch data directory for one test.
pub struct DataDir {
    dir: TempDir,
}

impl DataDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.file(name);
        fs::write(&path, contents).expect("write data file");
        path
    }

    pub fn read_json(&self, name: &str) -> Value {
        let raw = fs::read_to_string(self.file(name)).expect("read data file");
        serde_json::from_str(&raw).expect("data file json")
    }

    /// `duetask` bound to this data directory, isolated from the environment.
    pub fn cmd(&self) -> Command {
        let mut cmd = duetask_cmd();
        cmd.env("DUETASK_DIR", self.path());
        cmd
    }

    /// Run with `--json` and return the success envelope.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).expect("json envelope")
    }

    /// `duetask add` with extra arguments; returns the new task id.
    pub fn add(&self, args: &[&str]) -> String {
        let mut full = vec!["add"];
        full.extend_from_slice(args);
        let value = self.json(&full);
        value["data"]["id"].as_str().expect("task id").to_string()
    }
}

pub fn duetask_cmd() -> Command {
    let mut cmd = Command::cargo_bin("duetask").expect("binary");
    cmd.env_remove("DUETASK_DIR").env_remove("RUST_LOG");
    cmd
}
