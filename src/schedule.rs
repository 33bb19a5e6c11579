//! Dependency gating and next-task selection.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::storage::Storage;
use crate::task::{Task, TaskStatus};
use crate::walk::WalkOrder;

/// Result of checking a task's dependencies
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepsReport {
    pub satisfied: bool,
    /// Unmet dependency ids, in `deps` order
    pub unsatisfied: Vec<String>,
}

/// Every dep must resolve exactly and be complete. Missing ones count as
/// unmet rather than as errors.
pub fn deps_satisfied(storage: &Storage, task: &Task) -> DepsReport {
    let unsatisfied: Vec<String> = task
        .deps
        .iter()
        .filter(|dep| !is_complete(storage, dep))
        .cloned()
        .collect();

    DepsReport {
        satisfied: unsatisfied.is_empty(),
        unsatisfied,
    }
}

fn is_complete(storage: &Storage, id: &str) -> bool {
    storage
        .locate(id)
        .and_then(|location| storage.read_record(&location.path, &location.id))
        .map(|task| task.status == TaskStatus::Complete)
        .unwrap_or(false)
}

/// Why [`next_task`] picked what it picked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NextReason {
    #[serde(rename = "pending child of in_progress task")]
    PendingChildOfInProgress,
    #[serde(rename = "first pending task with satisfied dependencies")]
    FirstPendingReady,
}

impl NextReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NextReason::PendingChildOfInProgress => "pending child of in_progress task",
            NextReason::FirstPendingReady => "first pending task with satisfied dependencies",
        }
    }
}

impl fmt::Display for NextReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason reported when nothing is available
pub const NO_AVAILABLE_TASKS: &str = "no available tasks";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextTask {
    pub task: Task,
    pub reason: NextReason,
}

/// Pick the task to work on next.
///
/// Pending children of in-progress parents come first, so started work gets
/// finished; otherwise the first ready pending task anywhere in the tree.
/// Unreadable records are skipped.
pub fn next_task(storage: &Storage) -> Option<NextTask> {
    let ready = |task: &Task| task.is_pending() && deps_satisfied(storage, task).satisfied;

    for (_, task) in storage.walk(WalkOrder::DepthFirst).flatten() {
        if task.status != TaskStatus::InProgress || task.children.is_empty() {
            continue;
        }
        for child_id in &task.children {
            let Ok(child) = storage.load(child_id) else {
                continue;
            };
            if ready(&child) {
                return Some(NextTask {
                    task: child,
                    reason: NextReason::PendingChildOfInProgress,
                });
            }
        }
    }

    storage
        .walk(WalkOrder::DepthFirst)
        .flatten()
        .map(|(_, task)| task)
        .find(|task| ready(task))
        .map(|task| NextTask {
            task,
            reason: NextReason::FirstPendingReady,
        })
}

/// The task currently being worked on: the first in-progress task in
/// depth-first order, then its deepest in-progress descendant.
pub fn current_in_progress(storage: &Storage) -> Option<Task> {
    let tasks: Vec<Task> = storage
        .walk(WalkOrder::DepthFirst)
        .flatten()
        .map(|(_, task)| task)
        .collect();
    let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut current = tasks
        .iter()
        .find(|task| task.status == TaskStatus::InProgress)?;
    while let Some(deeper) = current.children.iter().find_map(|child| {
        by_id
            .get(child.as_str())
            .copied()
            .filter(|task| task.status == TaskStatus::InProgress)
    }) {
        current = deeper;
    }
    Some(current.clone())
}
