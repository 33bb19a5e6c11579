//! Storage layer for the task store
//!
//! The store is a plain directory tree; there is no manifest. Everything
//! here goes through the codec on the way in and out.
//!
//! # Directory Structure
//!
//! ```text
//! .claude/tasks/                # Root container
//!   .lock                       # Store lock (hidden, never a task)
//!   01-setup.md                 # Leaf task
//!   02-auth/                    # Parent task
//!     00-index.md               # The parent's own record
//!     01-login.md               # Child leaf
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::codec;
use crate::error::{Error, Result};
use crate::hierarchy::{self, Shape};
use crate::lock::{self, LOCK_FILE};
use crate::resolver::{self, Location};
use crate::task::Task;

/// Default location of the root container, relative to the project
pub const DEFAULT_STORE_DIR: &str = ".claude/tasks";

/// Storage manager for one task store
#[derive(Debug, Clone)]
pub struct Storage {
    /// Path to the root container
    root: PathBuf,
}

impl Storage {
    /// Storage rooted at an existing root container
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Find `dir` in `start` or the nearest ancestor that has one.
    pub fn discover(start: &Path, dir: &str) -> Result<Self> {
        start
            .ancestors()
            .map(|ancestor| ancestor.join(dir))
            .find(|candidate| candidate.is_dir())
            .map(Self::new)
            .ok_or_else(|| Error::StoreNotFound {
                dir: dir.to_string(),
                start: start.to_path_buf(),
            })
    }

    /// Create an empty root container at `project_dir/dir`.
    pub fn init(project_dir: &Path, dir: &str) -> Result<Self> {
        Self::create(project_dir.join(dir))
    }

    /// Create an empty root container at exactly `root`.
    pub fn create(root: PathBuf) -> Result<Self> {
        if root.exists() {
            return Err(Error::AlreadyInitialized(root));
        }
        fs::create_dir_all(&root)?;
        tracing::debug!(root = %root.display(), "initialized task store");
        Ok(Self::new(root))
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    /// Path to the root container
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the store lock file
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// Directory new children of `parent` go into; the root for top level.
    pub fn container_for(&self, parent: Option<&str>) -> PathBuf {
        match parent {
            Some(parent) => resolver::container_path(&self.root, parent),
            None => self.root.clone(),
        }
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Exact id lookup
    pub fn locate(&self, id: &str) -> Result<Location> {
        resolver::resolve(&self.root, id)
    }

    /// User reference lookup, ordinals allowed
    pub fn locate_reference(&self, input: &str) -> Result<Location> {
        resolver::resolve_reference(&self.root, input)
    }

    // =========================================================================
    // Record I/O
    // =========================================================================

    /// Load a task by exact id, children included.
    pub fn load(&self, id: &str) -> Result<Task> {
        let location = self.locate(id)?;
        self.read(&location)
    }

    /// Load the task at a resolved location, children included.
    pub fn read(&self, location: &Location) -> Result<Task> {
        let mut task = self.read_record(&location.path, &location.id)?;
        if location.shape == Shape::Parent {
            task.children = hierarchy::child_ids(&self.root, &location.id)?;
        }
        Ok(task)
    }

    /// Decode one record file and attach the id it lives under.
    pub fn read_record(&self, path: &Path, id: &str) -> Result<Task> {
        let raw = fs::read_to_string(path)?;
        let mut task =
            codec::decode(&raw).map_err(|err| Error::format(path, err.to_string()))?;
        task.id = id.to_string();
        if task.title.is_empty() {
            task.title = resolver::slug_of(resolver::name_of(id)).to_string();
        }
        Ok(task)
    }

    /// Encode and atomically replace a record file.
    pub fn write_record(&self, path: &Path, task: &Task) -> Result<()> {
        lock::write_atomic_str(path, &codec::encode(task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use tempfile::tempdir;

    #[test]
    fn init_refuses_existing_store() {
        let dir = tempdir().unwrap();
        let storage = Storage::init(dir.path(), DEFAULT_STORE_DIR).unwrap();
        assert!(storage.root().is_dir());

        let err = Storage::init(dir.path(), DEFAULT_STORE_DIR).expect_err("exists");
        assert!(matches!(err, Error::AlreadyInitialized(_)));
    }

    #[test]
    fn discover_searches_upward() {
        let dir = tempdir().unwrap();
        Storage::init(dir.path(), DEFAULT_STORE_DIR).unwrap();
        let nested = dir.path().join("src").join("deep");
        fs::create_dir_all(&nested).unwrap();

        let storage = Storage::discover(&nested, DEFAULT_STORE_DIR).unwrap();
        assert_eq!(storage.root(), dir.path().join(DEFAULT_STORE_DIR));

        let other = tempdir().unwrap();
        let err = Storage::discover(other.path(), "no/such/store").expect_err("missing");
        assert!(matches!(err, Error::StoreNotFound { .. }));
    }

    #[test]
    fn write_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let storage = Storage::init(dir.path(), DEFAULT_STORE_DIR).unwrap();

        let mut task = Task::new("01-write-docs", "Write docs");
        task.criteria = vec!["README covers init".to_string()];
        let path = resolver::leaf_path(storage.root(), &task.id);
        storage.write_record(&path, &task).unwrap();

        task.transition(TaskStatus::InProgress);
        let location = storage.locate(&task.id).unwrap();
        storage.write_record(&location.path, &task).unwrap();

        let loaded = storage.load("01-write-docs").unwrap();
        assert_eq!(loaded, task);
    }

    #[test]
    fn missing_title_falls_back_to_slug() {
        let dir = tempdir().unwrap();
        let storage = Storage::init(dir.path(), DEFAULT_STORE_DIR).unwrap();
        fs::write(
            storage.root().join("03-fix-login.md"),
            "---\nstatus: pending\n---\n",
        )
        .unwrap();

        let task = storage.load("03-fix-login").unwrap();
        assert_eq!(task.title, "fix-login");
    }

    #[test]
    fn undecodable_record_is_format_error() {
        let dir = tempdir().unwrap();
        let storage = Storage::init(dir.path(), DEFAULT_STORE_DIR).unwrap();
        fs::write(storage.root().join("01-bad.md"), "no header here\n").unwrap();

        let err = storage.load("01-bad").expect_err("format");
        assert!(matches!(err, Error::Format { .. }));
        assert_eq!(err.kind(), "format");
    }

    #[test]
    fn parent_load_derives_children() {
        let dir = tempdir().unwrap();
        let storage = Storage::init(dir.path(), DEFAULT_STORE_DIR).unwrap();
        let parent = Task::new("01-auth", "Auth");
        storage
            .write_record(&resolver::leaf_path(storage.root(), "01-auth"), &parent)
            .unwrap();
        hierarchy::promote(storage.root(), "01-auth").unwrap();
        let child = Task::new("01-auth/01-login", "Login");
        storage
            .write_record(
                &resolver::leaf_path(storage.root(), "01-auth/01-login"),
                &child,
            )
            .unwrap();

        let loaded = storage.load("01-auth").unwrap();
        assert_eq!(loaded.children, vec!["01-auth/01-login".to_string()]);
        assert_eq!(
            storage.container_for(Some("01-auth")),
            storage.root().join("01-auth")
        );
    }
}
