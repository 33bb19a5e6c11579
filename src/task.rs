//! Task data model.
//!
//! A task's `id` is derived from where its record lives and is never written
//! into the record itself; `children` is likewise recomputed on every walk.

use std::fmt;
use std::str::FromStr;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// All statuses, in the order they are reported to users.
pub const VALID_STATUSES: [TaskStatus; 5] = [
    TaskStatus::Pending,
    TaskStatus::InProgress,
    TaskStatus::Blocked,
    TaskStatus::Complete,
    TaskStatus::WontDo,
];

/// Current time as an RFC 3339 UTC timestamp (`2024-05-01T12:00:00.000000+00:00`).
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Blocked,
    Complete,
    WontDo,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Complete => "complete",
            TaskStatus::WontDo => "wont_do",
        }
    }

    /// Section title used by the Markdown report.
    pub fn title(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Blocked => "Blocked",
            TaskStatus::Complete => "Completed",
            TaskStatus::WontDo => "Won't Do",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        VALID_STATUSES
            .iter()
            .copied()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| {
                let valid: Vec<&str> = VALID_STATUSES.iter().map(|s| s.as_str()).collect();
                Error::Validation(format!(
                    "Invalid status: {}. Valid: {}",
                    s,
                    valid.join(", ")
                ))
            })
    }
}

/// A timestamped note. Notes are append-only and kept in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub text: String,
    pub created: String,
}

impl Note {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            created: now_iso(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approach: Option<String>,
    #[serde(default)]
    pub criteria: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub deps: Vec<String>,
    #[serde(default)]
    pub notes: Vec<Note>,
    pub created: String,
    pub updated: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
}

impl Task {
    /// A fresh pending task with `created` and `updated` stamped now.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = now_iso();
        Self {
            id: id.into(),
            title: title.into(),
            created: now.clone(),
            updated: now,
            ..Self::default()
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    /// Move to `status`, maintaining the lifecycle timestamps.
    ///
    /// `started` and `completed` are only stamped the first time the task
    /// enters the matching state; leaving `blocked` drops the reason.
    pub fn transition(&mut self, status: TaskStatus) {
        let now = now_iso();
        match status {
            TaskStatus::InProgress if self.started.is_none() => {
                self.started = Some(now.clone());
            }
            TaskStatus::Complete if self.completed.is_none() => {
                self.completed = Some(now.clone());
            }
            _ => {}
        }
        if status != TaskStatus::Blocked {
            self.blocked_reason = None;
        }
        self.status = status;
        self.updated = now;
    }

    /// Mark the task touched without changing anything else.
    pub fn touch(&mut self) {
        self.updated = now_iso();
    }

    /// Replace every dependency on `old_id` (or on a descendant of it) so it
    /// follows a move to `new_id`. Returns true when anything changed.
    pub fn rewrite_deps(&mut self, old_id: &str, new_id: &str) -> bool {
        let mut changed = false;
        for dep in &mut self.deps {
            if let Some(rewritten) = crate::resolver::rebase_id(dep, old_id, new_id) {
                *dep = rewritten;
                changed = true;
            }
        }
        changed
    }
}
