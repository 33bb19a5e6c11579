#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    /// A project with `task init` already run.
    pub fn initialized() -> Self {
        let project = Self::new();
        project.cmd().arg("init").assert().success();
        project
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.dir.path().join(".claude").join("tasks")
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn write_config(&self, contents: &str) -> std::io::Result<PathBuf> {
        self.write_file(".task.toml", contents)
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = task_cmd();
        cmd.current_dir(self.path());
        cmd
    }

    /// Run a command expected to succeed and parse its JSON output.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).expect("json output")
    }

    /// Run a command expected to fail and parse its JSON error envelope.
    pub fn json_err(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .args(args)
            .assert()
            .code(1)
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).expect("json error output")
    }

    /// Add a task and return its id.
    pub fn add(&self, args: &[&str]) -> String {
        let mut full = vec!["add"];
        full.extend_from_slice(args);
        let value = self.json(&full);
        value["id"].as_str().expect("task id").to_string()
    }
}

pub fn task_cmd() -> Command {
    let mut cmd = Command::cargo_bin("task").expect("binary");
    cmd.env_remove("TASK_ROOT").env_remove("RUST_LOG");
    cmd
}
