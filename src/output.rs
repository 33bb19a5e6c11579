//! Shared output formatting for task CLI commands.
//!
//! JSON results are `{"ok": true, ...fields}` with a `warnings` array when
//! there is something to warn about; failures are `{"ok": false, ...}`.

use serde::Serialize;

use crate::error::{Error, JsonError, Result};

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    details: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            details: Vec::new(),
            warnings: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.details.push(value.into());
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.next_steps.push(value.into());
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    ok: bool,
    #[serde(flatten)]
    data: &'a T,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    warnings: &'a [String],
}

/// Serialize a success result into its envelope.
pub fn success_json<T: Serialize>(data: &T, warnings: &[String]) -> Result<String> {
    let payload = Envelope {
        ok: true,
        data,
        warnings,
    };
    Ok(serde_json::to_string_pretty(&payload)?)
}

/// Serialize a failure into its envelope.
pub fn error_json(err: &Error) -> Result<String> {
    Ok(serde_json::to_string_pretty(&JsonError::from(err))?)
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    data: &T,
    human: &HumanOutput,
) -> Result<()> {
    if options.json {
        println!("{}", success_json(data, human.warnings())?);
        return Ok(());
    }

    if options.quiet {
        // Warnings still matter when everything else is muted.
        for warning in human.warnings() {
            eprintln!("warning: {warning}");
        }
        return Ok(());
    }

    println!("{}", format_human(human));
    Ok(())
}

pub fn emit_error(err: &Error, json: bool) -> Result<()> {
    if json {
        println!("{}", error_json(err)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Some(hint) = error_hint(err) {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut lines = Vec::new();
    lines.push(output.header.clone());

    push_summary(&mut lines, &output.summary);
    push_section(&mut lines, "Details", &output.details);
    push_section(&mut lines, "Warnings", &output.warnings);
    push_section(&mut lines, "Next steps", &output.next_steps);

    lines.join("\n")
}

fn error_hint(err: &Error) -> Option<String> {
    match err {
        Error::StoreNotFound { .. } => Some("task init".to_string()),
        Error::AmbiguousReference { candidates, .. } => candidates
            .first()
            .map(|first| format!("use a full id, e.g. {first}")),
        Error::InvalidConfig(_) => Some("fix .task.toml then retry".to_string()),
        Error::LockFailed(_) => Some("another task command is running; retry".to_string()),
        _ => None,
    }
}

fn push_summary(lines: &mut Vec<String>, summary: &[(String, String)]) {
    if summary.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push("Summary:".to_string());
    for (key, value) in summary {
        if value.is_empty() {
            lines.push(format!("- {key}"));
        } else {
            lines.push(format!("- {key}: {value}"));
        }
    }
}

fn push_section(lines: &mut Vec<String>, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push(format!("{title}:"));
    for item in items {
        lines.push(format!("- {item}"));
    }
}
