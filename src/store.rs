//! Task store operations.
//!
//! `TaskStore` is what the CLI talks to. Every mutating operation validates
//! its inputs before touching disk and runs under the store lock when
//! locking is enabled.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::hierarchy::{self, Shape};
use crate::lock::{self, FileLock};
use crate::render;
use crate::resolver::{self, Location};
use crate::schedule::{self, NO_AVAILABLE_TASKS};
use crate::storage::Storage;
use crate::task::{Note, Task, TaskStatus};
use crate::walk::WalkOrder;

/// Fields for a new task
#[derive(Debug, Clone, Default)]
pub struct AddRequest {
    pub title: String,
    pub parent: Option<String>,
    pub description: Option<String>,
    pub approach: Option<String>,
    pub criteria: Vec<String>,
    pub files: Vec<String>,
    pub deps: Vec<String>,
}

/// Field changes for an existing task. `None` leaves a field alone; an
/// empty description or approach clears it.
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub approach: Option<String>,
    pub criteria: Option<Vec<String>>,
    pub files: Option<Vec<String>>,
    pub status: Option<String>,
    pub deps: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitOutcome {
    pub message: String,
    pub path: PathBuf,
}

/// Result of any operation that returns a single task
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub id: String,
    pub task: Task,
    #[serde(skip)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoveOutcome {
    pub removed: String,
    pub task: Task,
    #[serde(skip)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListOutcome {
    pub tasks: Vec<Task>,
    pub count: usize,
    #[serde(skip)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShowOutcome {
    pub id: String,
    pub task: Task,
    pub deps_satisfied: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub incomplete_deps: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NextOutcome {
    pub task: Option<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NoteOutcome {
    pub task_id: String,
    pub note: Note,
    pub note_count: usize,
}

/// A note flattened together with the task it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteEntry {
    pub task_id: String,
    pub task_title: String,
    pub text: String,
    pub created: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotesOutcome {
    pub notes: Vec<NoteEntry>,
    pub count: usize,
    #[serde(skip)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveOutcome {
    pub old_id: String,
    pub new_id: String,
    pub task: Task,
}

/// A record rewrite prepared before a move touches disk
struct StagedWrite {
    /// Id the record will have once the move is applied
    id_after: String,
    original: String,
    task: Task,
}

/// A move worked out in full before anything on disk changes
struct MovePlan {
    old_id: String,
    new_id: String,
    dest_parent: Option<String>,
    from: PathBuf,
    to: PathBuf,
    staged: Vec<StagedWrite>,
}

#[derive(Debug, Clone)]
pub struct TaskStore {
    storage: Storage,
    config: Config,
}

impl TaskStore {
    pub fn new(storage: Storage, config: Config) -> Self {
        Self { storage, config }
    }

    /// Find the store by searching upward from `start`.
    pub fn open(start: &Path, config: Config) -> Result<Self> {
        let storage = Storage::discover(start, &config.store.dir)?;
        Ok(Self::new(storage, config))
    }

    /// Use `root` as the root container directly.
    pub fn at(root: &Path, config: Config) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::StoreNotFound {
                dir: config.store.dir.clone(),
                start: root.to_path_buf(),
            });
        }
        Ok(Self::new(Storage::new(root), config))
    }

    /// Create the root container under `project_dir`.
    pub fn init(project_dir: &Path, config: Config) -> Result<(Self, InitOutcome)> {
        let storage = Storage::init(project_dir, &config.store.dir)?;
        Ok(Self::initialized(storage, config))
    }

    /// Create the root container at exactly `root`.
    pub fn init_at(root: &Path, config: Config) -> Result<(Self, InitOutcome)> {
        let storage = Storage::create(root.to_path_buf())?;
        Ok(Self::initialized(storage, config))
    }

    fn initialized(storage: Storage, config: Config) -> (Self, InitOutcome) {
        let outcome = InitOutcome {
            message: format!("Created {}", storage.root().display()),
            path: storage.root().to_path_buf(),
        };
        (Self::new(storage, config), outcome)
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    fn root(&self) -> &Path {
        self.storage.root()
    }

    fn write_guard(&self) -> Result<Option<FileLock>> {
        if !self.config.lock.enabled {
            return Ok(None);
        }
        FileLock::acquire(self.storage.lock_path(), self.config.lock.timeout_ms).map(Some)
    }

    fn load_reference(&self, input: &str) -> Result<(Location, Task)> {
        let location = self.storage.locate_reference(input)?;
        let task = self.storage.read(&location)?;
        Ok((location, task))
    }

    /// Canonical ids for user-supplied dependencies.
    fn canonical_deps(&self, deps: &[String]) -> Result<Vec<String>> {
        deps.iter()
            .map(|dep| match self.storage.locate_reference(dep) {
                Ok(location) => Ok(location.id),
                Err(Error::NotFound(_)) if !self.config.tasks.validate_deps => {
                    resolver::normalize_id(dep)
                }
                Err(Error::NotFound(_)) => Err(Error::NotFound(format!(
                    "{} (dependency)",
                    dep.trim()
                ))),
                Err(err) => Err(err),
            })
            .collect()
    }

    // =========================================================================
    // Create / delete
    // =========================================================================

    pub fn add(&self, request: AddRequest) -> Result<TaskOutcome> {
        let _guard = self.write_guard()?;

        let title = required_title(&request.title)?;
        let parent = match request.parent.as_deref() {
            Some(parent) => Some(self.storage.locate_reference(parent)?.id),
            None => None,
        };
        let deps = self.canonical_deps(&request.deps)?;

        let promoted = match parent.as_deref() {
            Some(parent) => hierarchy::ensure_parent(self.root(), parent)?.promoted,
            None => false,
        };

        let result = self.create_record(parent.as_deref(), title, request, deps);
        if result.is_err() && promoted {
            if let Some(parent) = parent.as_deref() {
                hierarchy::collapse_if_empty(self.root(), parent);
            }
        }
        result
    }

    fn create_record(
        &self,
        parent: Option<&str>,
        title: String,
        request: AddRequest,
        deps: Vec<String>,
    ) -> Result<TaskOutcome> {
        let container = self.storage.container_for(parent);
        let name = format!(
            "{}-{}",
            resolver::next_ordinal(&container)?,
            resolver::slugify(&title)
        );
        let id = resolver::join_id(parent, &name);

        let path = resolver::leaf_path(self.root(), &id);
        if path.exists() || resolver::container_path(self.root(), &id).exists() {
            return Err(Error::Structural(format!("Task {id} already exists")));
        }

        let mut task = Task::new(&id, title);
        task.description = non_empty(request.description);
        task.approach = non_empty(request.approach);
        task.criteria = request.criteria;
        task.files = request.files;
        task.deps = deps;

        self.storage.write_record(&path, &task)?;
        tracing::debug!(id = %id, "added task");
        Ok(TaskOutcome {
            id,
            task,
            warnings: Vec::new(),
        })
    }

    /// Delete a task; a parent takes its whole subtree with it.
    pub fn remove(&self, id: &str) -> Result<RemoveOutcome> {
        let _guard = self.write_guard()?;

        let (location, task) = self.load_reference(id)?;
        match location.container() {
            Some(container) => fs::remove_dir_all(container)?,
            None => fs::remove_file(&location.path)?,
        }
        if let Some(parent) = resolver::parent_id(&location.id) {
            hierarchy::collapse_if_empty(self.root(), parent);
        }

        let mut warnings = Vec::new();
        for (other_id, other) in self.storage.walk(WalkOrder::DepthFirst).flatten() {
            for dep in other
                .deps
                .iter()
                .filter(|dep| resolver::is_within(dep, &location.id))
            {
                warnings.push(format!("{other_id} still depends on removed task {dep}"));
            }
        }

        Ok(RemoveOutcome {
            removed: location.id,
            task,
            warnings,
        })
    }

    // =========================================================================
    // Edit
    // =========================================================================

    pub fn update(&self, id: &str, request: UpdateRequest) -> Result<TaskOutcome> {
        let _guard = self.write_guard()?;

        let (location, mut task) = self.load_reference(id)?;

        let title = request.title.as_deref().map(required_title).transpose()?;
        let status = request
            .status
            .as_deref()
            .map(str::parse::<TaskStatus>)
            .transpose()?;
        let deps = request
            .deps
            .as_deref()
            .map(|deps| self.canonical_deps(deps))
            .transpose()?;

        if let Some(title) = title {
            task.title = title;
        }
        if let Some(description) = request.description {
            task.description = non_empty(Some(description));
        }
        if let Some(approach) = request.approach {
            task.approach = non_empty(Some(approach));
        }
        if let Some(criteria) = request.criteria {
            task.criteria = criteria;
        }
        if let Some(files) = request.files {
            task.files = files;
        }
        if let Some(deps) = deps {
            task.deps = deps;
        }
        match status {
            Some(status) => task.transition(status),
            None => task.touch(),
        }

        self.storage.write_record(&location.path, &task)?;
        Ok(TaskOutcome {
            id: location.id,
            task,
            warnings: Vec::new(),
        })
    }

    /// Move to `in_progress`. Unmet dependencies only produce a warning.
    pub fn start(&self, id: &str) -> Result<TaskOutcome> {
        let _guard = self.write_guard()?;

        let (location, mut task) = self.load_reference(id)?;
        let report = schedule::deps_satisfied(&self.storage, &task);
        let mut warnings = Vec::new();
        if !report.satisfied {
            warnings.push(format!(
                "Starting with incomplete dependencies: {}",
                report.unsatisfied.join(", ")
            ));
        }

        task.transition(TaskStatus::InProgress);
        self.storage.write_record(&location.path, &task)?;
        Ok(TaskOutcome {
            id: location.id,
            task,
            warnings,
        })
    }

    /// Complete `id`, or the current in-progress task when no id is given.
    pub fn done(&self, id: Option<&str>) -> Result<TaskOutcome> {
        let _guard = self.write_guard()?;

        let location = match id {
            Some(id) => self.storage.locate_reference(id)?,
            None => {
                let current = schedule::current_in_progress(&self.storage).ok_or_else(|| {
                    Error::NotFound("no in_progress task; specify an id".to_string())
                })?;
                self.storage.locate(&current.id)?
            }
        };
        self.set_status(location, TaskStatus::Complete, None)
    }

    pub fn block(&self, id: &str, reason: Option<&str>) -> Result<TaskOutcome> {
        let _guard = self.write_guard()?;
        let location = self.storage.locate_reference(id)?;
        self.set_status(location, TaskStatus::Blocked, reason)
    }

    /// Back to `pending`; the block reason is dropped.
    pub fn unblock(&self, id: &str) -> Result<TaskOutcome> {
        let _guard = self.write_guard()?;
        let location = self.storage.locate_reference(id)?;
        self.set_status(location, TaskStatus::Pending, None)
    }

    fn set_status(
        &self,
        location: Location,
        status: TaskStatus,
        reason: Option<&str>,
    ) -> Result<TaskOutcome> {
        let mut task = self.storage.read(&location)?;
        task.transition(status);
        if let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) {
            task.blocked_reason = Some(reason.to_string());
        }
        self.storage.write_record(&location.path, &task)?;
        Ok(TaskOutcome {
            id: location.id,
            task,
            warnings: Vec::new(),
        })
    }

    pub fn note(&self, id: &str, text: &str) -> Result<NoteOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("note text cannot be empty".to_string()));
        }

        let _guard = self.write_guard()?;
        let (location, mut task) = self.load_reference(id)?;
        let note = Note::new(text);
        task.notes.push(note.clone());
        task.touch();
        self.storage.write_record(&location.path, &task)?;

        Ok(NoteOutcome {
            task_id: location.id,
            note_count: task.notes.len(),
            note,
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn list(&self, status: Option<&str>) -> Result<ListOutcome> {
        let status = status.map(str::parse::<TaskStatus>).transpose()?;
        let (tasks, skipped) = self.storage.walk(WalkOrder::DepthFirst).partition();
        let tasks: Vec<Task> = tasks
            .into_iter()
            .filter(|task| status.map_or(true, |status| task.status == status))
            .collect();

        Ok(ListOutcome {
            count: tasks.len(),
            tasks,
            warnings: skipped.iter().map(ToString::to_string).collect(),
        })
    }

    pub fn show(&self, id: &str) -> Result<ShowOutcome> {
        let (location, task) = self.load_reference(id)?;
        let report = schedule::deps_satisfied(&self.storage, &task);
        Ok(ShowOutcome {
            id: location.id,
            task,
            deps_satisfied: report.satisfied,
            incomplete_deps: report.unsatisfied,
        })
    }

    pub fn next(&self) -> Result<NextOutcome> {
        Ok(match schedule::next_task(&self.storage) {
            Some(next) => NextOutcome {
                id: Some(next.task.id.clone()),
                task: Some(next.task),
                reason: next.reason.to_string(),
            },
            None => NextOutcome {
                task: None,
                id: None,
                reason: NO_AVAILABLE_TASKS.to_string(),
            },
        })
    }

    /// Every note in the store, oldest first.
    pub fn notes(&self) -> Result<NotesOutcome> {
        let (tasks, skipped) = self.storage.walk(WalkOrder::DepthFirst).partition();
        let mut notes: Vec<NoteEntry> = tasks
            .iter()
            .flat_map(|task| {
                task.notes.iter().map(move |note| NoteEntry {
                    task_id: task.id.clone(),
                    task_title: task.title.clone(),
                    text: note.text.clone(),
                    created: note.created.clone(),
                })
            })
            .collect();
        notes.sort_by(|a, b| a.created.cmp(&b.created));

        Ok(NotesOutcome {
            count: notes.len(),
            notes,
            warnings: skipped.iter().map(ToString::to_string).collect(),
        })
    }

    /// Markdown report of the whole store.
    pub fn render(&self) -> Result<String> {
        let (tasks, _) = self.storage.walk(WalkOrder::DepthFirst).partition();
        Ok(render::render_markdown(&tasks))
    }

    // =========================================================================
    // Move
    // =========================================================================

    /// Relocate a task under `parent` (top level when `None`).
    ///
    /// All affected records are read and rewritten in memory first; an
    /// unreadable record aborts before anything is written. A failure while
    /// applying rolls back the rewrites, the relocation and any promotion.
    pub fn move_task(&self, id: &str, parent: Option<&str>) -> Result<MoveOutcome> {
        let _guard = self.write_guard()?;
        let plan = self.plan_move(id, parent)?;
        self.apply_move(plan, |path, task| self.storage.write_record(path, task))
    }

    /// Everything a move needs, computed without touching disk.
    fn plan_move(&self, id: &str, parent: Option<&str>) -> Result<MovePlan> {
        let root = self.root();

        let source = self.storage.locate_reference(id)?;
        let old_id = source.id.clone();
        let dest_parent = match parent {
            Some(parent) => Some(self.storage.locate_reference(parent)?.id),
            None => None,
        };
        if let Some(dest) = dest_parent.as_deref() {
            if resolver::is_within(dest, &old_id) {
                return Err(Error::Structural(format!(
                    "Cannot move {old_id} under itself or its own descendant"
                )));
            }
        }

        let dest_container = self.storage.container_for(dest_parent.as_deref());
        let new_name = format!(
            "{}-{}",
            resolver::next_ordinal(&dest_container)?,
            resolver::slug_of(resolver::name_of(&old_id))
        );
        let new_id = resolver::join_id(dest_parent.as_deref(), &new_name);

        let staged = self.stage_move(&old_id, &new_id)?;

        let (from, to) = match source.shape {
            Shape::Leaf => (source.path.clone(), resolver::leaf_path(root, &new_id)),
            Shape::Parent => (
                resolver::container_path(root, &old_id),
                resolver::container_path(root, &new_id),
            ),
        };
        if resolver::leaf_path(root, &new_id).exists()
            || resolver::container_path(root, &new_id).exists()
        {
            return Err(Error::Structural(format!(
                "Cannot move {old_id}: destination {new_id} already exists"
            )));
        }

        Ok(MovePlan {
            old_id,
            new_id,
            dest_parent,
            from,
            to,
            staged,
        })
    }

    /// Relocate and rewrite per `plan`, undoing every step on failure.
    fn apply_move<W>(&self, plan: MovePlan, mut write: W) -> Result<MoveOutcome>
    where
        W: FnMut(&Path, &Task) -> Result<()>,
    {
        let root = self.root();
        let MovePlan {
            old_id,
            new_id,
            dest_parent,
            from,
            to,
            staged,
        } = plan;

        let promoted = match dest_parent.as_deref() {
            Some(dest) => hierarchy::ensure_parent(root, dest)?.promoted,
            None => false,
        };
        let undo_promotion = || {
            if promoted {
                if let Some(dest) = dest_parent.as_deref() {
                    hierarchy::collapse_if_empty(root, dest);
                }
            }
        };

        if let Err(err) = fs::rename(&from, &to) {
            undo_promotion();
            return Err(err.into());
        }

        let mut written: Vec<(PathBuf, &str)> = Vec::with_capacity(staged.len());
        for staged_write in &staged {
            let applied = self
                .storage
                .locate(&staged_write.id_after)
                .and_then(|location| write(&location.path, &staged_write.task).map(|_| location.path));
            match applied {
                Ok(path) => written.push((path, staged_write.original.as_str())),
                Err(err) => {
                    tracing::warn!(old_id = %old_id, new_id = %new_id, error = %err, "rolling back move");
                    for (path, original) in written.iter().rev() {
                        if let Err(restore) = lock::write_atomic_str(path, original) {
                            tracing::warn!(path = %path.display(), error = %restore, "could not restore record");
                        }
                    }
                    if let Err(back) = fs::rename(&to, &from) {
                        tracing::warn!(error = %back, "could not move task back");
                    }
                    undo_promotion();
                    return Err(err);
                }
            }
        }

        if let Some(old_parent) = resolver::parent_id(&old_id) {
            if Some(old_parent) != dest_parent.as_deref() {
                hierarchy::collapse_if_empty(root, old_parent);
            }
        }

        tracing::debug!(old_id = %old_id, new_id = %new_id, rewritten = staged.len(), "moved task");
        let task = self.storage.load(&new_id)?;
        Ok(MoveOutcome {
            old_id,
            new_id,
            task,
        })
    }

    /// Read every record a move from `old_id` to `new_id` has to rewrite:
    /// the moved task itself plus every task depending on it or on one of
    /// its descendants.
    fn stage_move(&self, old_id: &str, new_id: &str) -> Result<Vec<StagedWrite>> {
        let mut staged = Vec::new();
        for item in self.storage.walk(WalkOrder::DepthFirst) {
            let (id, mut task) = item?;
            let rewritten = task.rewrite_deps(old_id, new_id);
            if !rewritten && id != old_id {
                continue;
            }

            let location = self.storage.locate(&id)?;
            let original = fs::read_to_string(&location.path)?;
            let id_after = resolver::rebase_id(&id, old_id, new_id).unwrap_or(id);
            task.id = id_after.clone();
            task.touch();
            staged.push(StagedWrite {
                id_after,
                original,
                task,
            });
        }
        Ok(staged)
    }
}

fn required_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::Validation("title cannot be empty".to_string()));
    }
    if title.contains(['\n', '\r']) {
        return Err(Error::Validation("title must be a single line".to_string()));
    }
    Ok(title.to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
