//! Configuration loading and management
//!
//! Handles parsing of `.task.toml` configuration files. Every field has a
//! default, so a missing file and an empty file behave the same.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;
use crate::storage::DEFAULT_STORE_DIR;

/// Name of the configuration file looked up from the working directory
pub const CONFIG_FILE: &str = ".task.toml";

const MAX_LOCK_TIMEOUT_MS: u64 = 600_000;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Store location
    #[serde(default)]
    pub store: StoreConfig,

    /// Store lock behaviour
    #[serde(default)]
    pub lock: LockConfig,

    /// Default output format
    #[serde(default)]
    pub output: OutputConfig,

    /// Task validation rules
    #[serde(default)]
    pub tasks: TasksConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root container, relative to the project directory
    #[serde(default = "default_store_dir")]
    pub dir: String,
}

fn default_store_dir() -> String {
    DEFAULT_STORE_DIR.to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Hold the store lock during mutating commands
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// How long to wait for another writer, in milliseconds
    #[serde(default = "default_lock_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: default_lock_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// `json` or `human`
    #[serde(default = "default_output_format")]
    pub format: String,
}

fn default_output_format() -> String {
    "json".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_output_format(),
        }
    }
}

impl OutputConfig {
    pub fn is_human(&self) -> bool {
        self.format == "human"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Reject dependency ids that do not resolve on add/update
    #[serde(default = "default_true")]
    pub validate_deps: bool,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            validate_deps: true,
        }
    }
}

/// A configuration together with the file it came from, if any
#[derive(Debug, Clone, Default)]
pub struct DiscoveredConfig {
    pub config: Config,
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a `.task.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `.task.toml` from a directory, or return defaults if it has none
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.is_file() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load the nearest `.task.toml` at or above `start`
    pub fn discover(start: &Path) -> Result<DiscoveredConfig> {
        match start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE))
            .find(|candidate| candidate.is_file())
        {
            Some(path) => Ok(DiscoveredConfig {
                config: Self::load(&path)?,
                path: Some(path),
            }),
            None => Ok(DiscoveredConfig::default()),
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let dir = self.store.dir.trim();
        if dir.is_empty() {
            return Err(Error::InvalidConfig("store.dir cannot be empty".to_string()));
        }
        let dir_path = Path::new(dir);
        if dir_path.is_absolute() {
            return Err(Error::InvalidConfig(format!(
                "store.dir must be relative, got '{dir}'"
            )));
        }
        if dir_path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(Error::InvalidConfig(format!(
                "store.dir cannot contain '..', got '{dir}'"
            )));
        }

        if self.lock.timeout_ms == 0 || self.lock.timeout_ms > MAX_LOCK_TIMEOUT_MS {
            return Err(Error::InvalidConfig(format!(
                "lock.timeout_ms must be between 1 and {MAX_LOCK_TIMEOUT_MS}"
            )));
        }

        match self.output.format.as_str() {
            "json" | "human" => Ok(()),
            other => Err(Error::InvalidConfig(format!(
                "output.format: invalid value '{other}' (expected json|human)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_expected() {
        let cfg = Config::default();
        assert_eq!(cfg.store.dir, ".claude/tasks");
        assert!(cfg.lock.enabled);
        assert_eq!(cfg.lock.timeout_ms, 5000);
        assert_eq!(cfg.output.format, "json");
        assert!(!cfg.output.is_human());
        assert!(cfg.tasks.validate_deps);
        cfg.validate().expect("defaults validate");
    }

    #[test]
    fn load_parses_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let content = r#"
[store]
dir = "planning/tasks"

[lock]
enabled = false
timeout_ms = 250

[output]
format = "human"

[tasks]
validate_deps = false
"#;
        fs::write(&path, content.trim()).expect("write config");

        let cfg = Config::load(&path).expect("load config");
        assert_eq!(cfg.store.dir, "planning/tasks");
        assert!(!cfg.lock.enabled);
        assert_eq!(cfg.lock.timeout_ms, 250);
        assert!(cfg.output.is_human());
        assert!(!cfg.tasks.validate_deps);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(CONFIG_FILE), "[lock]\ntimeout_ms = 100\n").expect("write");

        let cfg = Config::load_from_dir(dir.path()).expect("load");
        assert_eq!(cfg.lock.timeout_ms, 100);
        assert!(cfg.lock.enabled);
        assert_eq!(cfg.store.dir, DEFAULT_STORE_DIR);
    }

    #[test]
    fn invalid_values_rejected() {
        for content in [
            "[output]\nformat = \"yaml\"",
            "[store]\ndir = \"\"",
            "[store]\ndir = \"../elsewhere\"",
            "[lock]\ntimeout_ms = 0",
        ] {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join(CONFIG_FILE);
            fs::write(&path, content).expect("write config");

            let err = Config::load(&path).expect_err("invalid config");
            match err {
                Error::InvalidConfig(_) => {}
                other => panic!("unexpected error for {content:?}: {other:?}"),
            }
        }
    }

    #[test]
    fn load_from_dir_defaults_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_from_dir(dir.path()).expect("defaults");
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn discover_searches_upward() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[store]\ndir = \"work/tasks\"").expect("write config");
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).expect("mkdir");

        let found = Config::discover(&nested).expect("discover");
        assert_eq!(found.config.store.dir, "work/tasks");
        assert_eq!(found.path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn save_writes_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.toml");
        let cfg = Config::default();
        cfg.save(&path).expect("save config");

        let written = fs::read_to_string(&path).expect("read config");
        assert!(written.contains("dir = \".claude/tasks\""));
        assert_eq!(Config::load(&path).expect("reload"), cfg);
    }
}
