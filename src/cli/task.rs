//! Task command implementations.

use std::path::Path;

use crate::cli::GlobalOptions;
use crate::config::Config;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::store::{AddRequest, TaskOutcome, TaskStore, UpdateRequest};
use crate::task::Task;

pub struct AddOptions {
    pub title: String,
    pub parent: Option<String>,
    pub description: Option<String>,
    pub approach: Option<String>,
    pub criteria: Option<Vec<String>>,
    pub files: Option<Vec<String>>,
    pub deps: Option<Vec<String>>,
}

pub struct UpdateOptions {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub approach: Option<String>,
    pub criteria: Option<Vec<String>>,
    pub files: Option<Vec<String>>,
    pub status: Option<String>,
    pub deps: Option<Vec<String>>,
}

struct CommandContext {
    store: TaskStore,
    output: OutputOptions,
}

fn load_context(global: &GlobalOptions) -> Result<CommandContext> {
    let cwd = std::env::current_dir()?;
    let config = Config::discover(&cwd)?.config;
    let output = global.output(&config);
    let store = match global.root.as_deref() {
        Some(root) => TaskStore::at(&absolute(&cwd, root), config)?,
        None => TaskStore::open(&cwd, config)?,
    };
    tracing::debug!(root = %store.storage().root().display(), "opened task store");
    Ok(CommandContext { store, output })
}

fn absolute(cwd: &Path, path: &Path) -> std::path::PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn push_task_summary(human: &mut HumanOutput, task: &Task) {
    human.push_summary("ID", task.id.clone());
    human.push_summary("Title", task.title.clone());
    human.push_summary("Status", task.status.to_string());
    if let Some(reason) = task.blocked_reason.as_deref() {
        human.push_summary("Blocked", reason.to_string());
    }
    if !task.deps.is_empty() {
        human.push_summary("Deps", task.deps.join(", "));
    }
    if !task.children.is_empty() {
        human.push_summary("Children", task.children.join(", "));
    }
}

fn task_line(task: &Task) -> String {
    format!("{} [{}] {}", task.id, task.status, task.title)
}

fn emit_task(ctx: &CommandContext, header: &str, outcome: &TaskOutcome) -> Result<()> {
    let mut human = HumanOutput::new(header);
    push_task_summary(&mut human, &outcome.task);
    for warning in &outcome.warnings {
        human.push_warning(warning.clone());
    }
    emit_success(ctx.output, outcome, &human)
}

pub fn run_add(global: &GlobalOptions, options: AddOptions) -> Result<()> {
    let ctx = load_context(global)?;
    let outcome = ctx.store.add(AddRequest {
        title: options.title,
        parent: options.parent,
        description: options.description,
        approach: options.approach,
        criteria: options.criteria.unwrap_or_default(),
        files: options.files.unwrap_or_default(),
        deps: options.deps.unwrap_or_default(),
    })?;

    emit_task(&ctx, "Task added", &outcome)
}

pub fn run_remove(global: &GlobalOptions, id: &str) -> Result<()> {
    let ctx = load_context(global)?;
    let outcome = ctx.store.remove(id)?;

    let mut human = HumanOutput::new("Task removed");
    human.push_summary("ID", outcome.removed.clone());
    human.push_summary("Title", outcome.task.title.clone());
    if !outcome.task.children.is_empty() {
        human.push_summary("Sub-tasks removed", outcome.task.children.len().to_string());
    }
    for warning in &outcome.warnings {
        human.push_warning(warning.clone());
    }

    emit_success(ctx.output, &outcome, &human)
}

pub fn run_update(global: &GlobalOptions, options: UpdateOptions) -> Result<()> {
    let ctx = load_context(global)?;
    let outcome = ctx.store.update(
        &options.id,
        UpdateRequest {
            title: options.title,
            description: options.description,
            approach: options.approach,
            criteria: options.criteria,
            files: options.files,
            status: options.status,
            deps: options.deps,
        },
    )?;

    emit_task(&ctx, "Task updated", &outcome)
}

pub fn run_list(global: &GlobalOptions, status: Option<&str>) -> Result<()> {
    let ctx = load_context(global)?;
    let outcome = ctx.store.list(status)?;

    let mut human = HumanOutput::new(format!("{} task(s)", outcome.count));
    for task in &outcome.tasks {
        human.push_detail(task_line(task));
    }
    for warning in &outcome.warnings {
        human.push_warning(warning.clone());
    }

    emit_success(ctx.output, &outcome, &human)
}

pub fn run_show(global: &GlobalOptions, id: &str) -> Result<()> {
    let ctx = load_context(global)?;
    let outcome = ctx.store.show(id)?;

    let mut human = HumanOutput::new(format!("Task {}", outcome.id));
    push_task_summary(&mut human, &outcome.task);
    human.push_summary(
        "Deps satisfied",
        if outcome.deps_satisfied { "yes" } else { "no" },
    );
    if let Some(description) = outcome.task.description.as_deref() {
        human.push_detail(description.to_string());
    }
    if let Some(approach) = outcome.task.approach.as_deref() {
        human.push_detail(format!("Approach: {approach}"));
    }
    for criterion in &outcome.task.criteria {
        human.push_detail(format!("Done when: {criterion}"));
    }
    for file in &outcome.task.files {
        human.push_detail(format!("File: {file}"));
    }
    for note in &outcome.task.notes {
        human.push_detail(format!("[{}] {}", note.created, note.text));
    }
    if !outcome.incomplete_deps.is_empty() {
        human.push_summary("Incomplete deps", outcome.incomplete_deps.join(", "));
    }

    emit_success(ctx.output, &outcome, &human)
}

pub fn run_next(global: &GlobalOptions) -> Result<()> {
    let ctx = load_context(global)?;
    let outcome = ctx.store.next()?;

    let mut human = match &outcome.task {
        Some(task) => {
            let mut human = HumanOutput::new(format!("Next: {}", task_line(task)));
            push_task_summary(&mut human, task);
            human.push_next_step(format!("task start {}", task.id));
            human
        }
        None => HumanOutput::new("Nothing to do"),
    };
    human.push_summary("Reason", outcome.reason.clone());

    emit_success(ctx.output, &outcome, &human)
}

pub fn run_start(global: &GlobalOptions, id: &str) -> Result<()> {
    let ctx = load_context(global)?;
    let outcome = ctx.store.start(id)?;
    emit_task(&ctx, "Task started", &outcome)
}

pub fn run_done(global: &GlobalOptions, id: Option<&str>) -> Result<()> {
    let ctx = load_context(global)?;
    let outcome = ctx.store.done(id)?;
    emit_task(&ctx, "Task completed", &outcome)
}

pub fn run_block(global: &GlobalOptions, id: &str, reason: Option<&str>) -> Result<()> {
    let ctx = load_context(global)?;
    let outcome = ctx.store.block(id, reason)?;
    emit_task(&ctx, "Task blocked", &outcome)
}

pub fn run_unblock(global: &GlobalOptions, id: &str) -> Result<()> {
    let ctx = load_context(global)?;
    let outcome = ctx.store.unblock(id)?;
    emit_task(&ctx, "Task unblocked", &outcome)
}

pub fn run_note(global: &GlobalOptions, id: &str, text: &str) -> Result<()> {
    let ctx = load_context(global)?;
    let outcome = ctx.store.note(id, text)?;

    let mut human = HumanOutput::new("Note added");
    human.push_summary("Task", outcome.task_id.clone());
    human.push_summary("Notes", outcome.note_count.to_string());
    human.push_detail(outcome.note.text.clone());

    emit_success(ctx.output, &outcome, &human)
}

pub fn run_notes(global: &GlobalOptions) -> Result<()> {
    let ctx = load_context(global)?;
    let outcome = ctx.store.notes()?;

    let mut human = HumanOutput::new(format!("{} note(s)", outcome.count));
    for note in &outcome.notes {
        human.push_detail(format!("[{}] {}: {}", note.created, note.task_id, note.text));
    }
    for warning in &outcome.warnings {
        human.push_warning(warning.clone());
    }

    emit_success(ctx.output, &outcome, &human)
}

pub fn run_move(global: &GlobalOptions, id: &str, parent: Option<&str>) -> Result<()> {
    let ctx = load_context(global)?;
    let outcome = ctx.store.move_task(id, parent)?;

    let mut human = HumanOutput::new("Task moved");
    human.push_summary("From", outcome.old_id.clone());
    human.push_summary("To", outcome.new_id.clone());
    human.push_summary("Title", outcome.task.title.clone());

    emit_success(ctx.output, &outcome, &human)
}

/// The report is Markdown in every output mode.
pub fn run_render(global: &GlobalOptions) -> Result<()> {
    let ctx = load_context(global)?;
    println!("{}", ctx.store.render()?);
    Ok(())
}
