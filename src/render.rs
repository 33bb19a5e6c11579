//! Markdown report of the store, grouped by status.

use crate::task::{Task, TaskStatus};

/// Section order of the report
const SECTION_ORDER: [TaskStatus; 5] = [
    TaskStatus::InProgress,
    TaskStatus::Pending,
    TaskStatus::Blocked,
    TaskStatus::Complete,
    TaskStatus::WontDo,
];

/// Render tasks (in walk order) as a Markdown document.
pub fn render_markdown(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "# Tasks\n\n_No tasks._".to_string();
    }

    let mut lines = vec!["# Tasks".to_string(), String::new()];
    for status in SECTION_ORDER {
        let section: Vec<&Task> = tasks.iter().filter(|t| t.status == status).collect();
        if section.is_empty() {
            continue;
        }
        lines.push(format!("## {}", status.title()));
        for task in section {
            lines.extend(task_lines(task));
        }
        lines.push(String::new());
    }

    lines.join("\n").trim_end().to_string()
}

fn task_lines(task: &Task) -> Vec<String> {
    let indent = "  ".repeat(task.id.matches('/').count());
    let deps = if task.deps.is_empty() {
        String::new()
    } else {
        format!(" _(depends on: {})_", task.deps.join(", "))
    };

    let headline = match task.status {
        TaskStatus::Complete => format!("- [x] **{}** {}{deps}", task.id, task.title),
        TaskStatus::WontDo => format!("- [~] **{}** ~~{}~~{deps}", task.id, task.title),
        TaskStatus::Blocked => {
            let reason = task
                .blocked_reason
                .as_deref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default();
            format!("- [ ] **{}** {} [BLOCKED]{reason}{deps}", task.id, task.title)
        }
        TaskStatus::Pending | TaskStatus::InProgress => {
            format!("- **{}** {}{deps}", task.id, task.title)
        }
    };

    let mut lines = vec![format!("{indent}{headline}")];
    if let Some(approach) = task.approach.as_deref() {
        lines.push(format!("{indent}  _Approach: {approach}_"));
    }
    if !task.criteria.is_empty() {
        lines.push(format!("{indent}  _Done when:_"));
        lines.extend(task.criteria.iter().map(|c| format!("{indent}    - {c}")));
    }
    if !task.files.is_empty() {
        let files: Vec<String> = task.files.iter().map(|f| format!("`{f}`")).collect();
        lines.push(format!("{indent}  _Files: {}_", files.join(", ")));
    }
    lines.extend(task.notes.iter().map(|n| format!("{indent}  > {}", n.text)));
    lines
}
