//! Record codec: task ⇄ Markdown text.
//!
//! ```text
//! ---
//! status: in_progress
//! created: "2024-05-01T12:00:00.000000+00:00"
//! updated: "2024-05-01T12:30:00.000000+00:00"
//! deps:
//!   - 01-auth
//! ---
//!
//! # Title
//!
//! Description paragraph(s).
//!
//! ## Notes
//!
//! ### 2024-05-01T12:30:00.000000+00:00
//!
//! Note body.
//! ```
//!
//! The header and the notes region are handled by separate functions so each
//! half can be exercised on its own. Only non-empty fields are written, in a
//! fixed order, so rewriting an unchanged task produces identical bytes.

use thiserror::Error;

use crate::task::{now_iso, Note, Task, TaskStatus};

/// Header fence line
pub const FENCE: &str = "---";

const NOTES_HEADING: &str = "## Notes";
const NOTE_HEADING_PREFIX: &str = "### ";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("no frontmatter")]
    MissingFence,

    #[error("frontmatter is not terminated")]
    UnterminatedHeader,

    #[error("unknown status '{0}'")]
    UnknownStatus(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Scalar(String),
    List(Vec<String>),
}

/// Ordered key/value metadata block between the fences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    entries: Vec<(String, HeaderValue)>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a scalar; empty values are dropped.
    pub fn push_scalar(&mut self, key: &str, value: &str) {
        if !value.is_empty() {
            self.entries
                .push((key.to_string(), HeaderValue::Scalar(value.to_string())));
        }
    }

    /// Append a list; empty lists are dropped.
    pub fn push_list(&mut self, key: &str, items: &[String]) {
        if !items.is_empty() {
            self.entries
                .push((key.to_string(), HeaderValue::List(items.to_vec())));
        }
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value)
    }

    /// Non-empty scalar value for `key`.
    pub fn scalar(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            HeaderValue::Scalar(value) if !value.is_empty() => Some(value.clone()),
            _ => None,
        }
    }

    /// List value for `key`; an inline scalar counts as a one-item list.
    pub fn list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(HeaderValue::List(items)) => items.clone(),
            Some(HeaderValue::Scalar(value)) if !value.is_empty() => vec![value.clone()],
            _ => Vec::new(),
        }
    }

    pub fn entries(&self) -> &[(String, HeaderValue)] {
        &self.entries
    }
}

/// Parse the text between the fences.
///
/// `key: value` is a scalar; `key:` followed by indented `- item` lines is a
/// list. Lines that fit neither shape are ignored.
pub fn parse_header(text: &str) -> Header {
    let lines: Vec<&str> = text.lines().collect();
    let mut header = Header::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        i += 1;

        let Some((key, rest)) = split_key(line) else {
            continue;
        };

        let value = rest.trim();
        if !value.is_empty() {
            header
                .entries
                .push((key.to_string(), HeaderValue::Scalar(unquote(value))));
            continue;
        }

        let mut items = Vec::new();
        while i < lines.len() {
            let next = lines[i];
            if let Some(item) = list_item(next) {
                items.push(unquote(item));
                i += 1;
            } else if next.trim().is_empty() || split_key(next).is_some() {
                break;
            } else {
                i += 1;
            }
        }
        header.entries.push((key.to_string(), HeaderValue::List(items)));
    }

    header
}

/// Render header entries, one line per scalar and per list item.
pub fn render_header(header: &Header) -> String {
    let mut lines = Vec::new();
    for (key, value) in header.entries() {
        match value {
            HeaderValue::Scalar(value) => lines.push(format!("{key}: {}", quote_if_needed(value))),
            HeaderValue::List(items) => {
                lines.push(format!("{key}:"));
                for item in items {
                    lines.push(format!("  - {}", quote_if_needed(item)));
                }
            }
        }
    }
    lines.join("\n")
}

/// Parse `### <timestamp>` blocks in document order.
pub fn parse_notes(text: &str) -> Vec<Note> {
    let mut notes = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        let heading = line
            .strip_prefix(NOTE_HEADING_PREFIX)
            .map(str::trim)
            .filter(|ts| looks_like_timestamp(ts));
        if let Some(created) = heading {
            if let Some((previous, body)) = current.take() {
                notes.push(finish_note(previous, &body));
            }
            current = Some((created.to_string(), Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }

    if let Some((created, body)) = current {
        notes.push(finish_note(created, &body));
    }
    notes
}

/// Render notes as a `## Notes` section; empty when there are none.
pub fn render_notes(notes: &[Note]) -> String {
    if notes.is_empty() {
        return String::new();
    }
    let mut lines = vec![NOTES_HEADING.to_string()];
    for note in notes {
        lines.push(String::new());
        lines.push(format!("{NOTE_HEADING_PREFIX}{}", note.created));
        lines.push(String::new());
        lines.push(escape_body(&note.text));
    }
    lines.join("\n")
}

/// Decode a stored record. The returned task has an empty `id`; callers
/// derive it from the record's location.
pub fn decode(raw: &str) -> Result<Task, DecodeError> {
    let text = raw.replace("\r\n", "\n");
    let rest = text
        .strip_prefix(FENCE)
        .and_then(|rest| rest.strip_prefix('\n'))
        .ok_or(DecodeError::MissingFence)?;

    let mut offset = 0;
    let mut split = None;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches('\n') == FENCE {
            split = Some((offset, offset + line.len()));
            break;
        }
        offset += line.len();
    }
    let (header_end, body_start) = split.ok_or(DecodeError::UnterminatedHeader)?;
    let header = parse_header(&rest[..header_end]);
    let body = &rest[body_start..];

    let status = match header.scalar("status") {
        Some(raw) => raw
            .parse::<TaskStatus>()
            .map_err(|_| DecodeError::UnknownStatus(raw))?,
        None => TaskStatus::Pending,
    };

    let (title, description, notes) = parse_body(body);

    Ok(Task {
        id: String::new(),
        title: title.unwrap_or_default(),
        status,
        description,
        approach: header.scalar("approach"),
        criteria: header.list("criteria"),
        files: header.list("files"),
        deps: header.list("deps"),
        notes,
        created: header.scalar("created").unwrap_or_default(),
        updated: header.scalar("updated").unwrap_or_default(),
        started: header.scalar("started"),
        completed: header.scalar("completed"),
        blocked_reason: header.scalar("blocked_reason"),
        children: Vec::new(),
    })
}

/// Encode a task. Blank `created`/`updated` are stamped with the current time.
pub fn encode(task: &Task) -> String {
    let mut header = Header::new();
    header.push_scalar("status", task.status.as_str());
    header.push_scalar("created", &or_now(&task.created));
    header.push_scalar("updated", &or_now(&task.updated));
    header.push_scalar("started", task.started.as_deref().unwrap_or_default());
    header.push_scalar("completed", task.completed.as_deref().unwrap_or_default());
    header.push_scalar(
        "blocked_reason",
        task.blocked_reason.as_deref().unwrap_or_default(),
    );
    header.push_list("deps", &task.deps);
    header.push_scalar("approach", task.approach.as_deref().unwrap_or_default());
    header.push_list("criteria", &task.criteria);
    header.push_list("files", &task.files);

    let mut lines = vec![
        FENCE.to_string(),
        render_header(&header),
        FENCE.to_string(),
        String::new(),
        format!("# {}", single_line(&task.title)),
    ];

    if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
        lines.push(String::new());
        lines.push(escape_body(description));
    }

    if !task.notes.is_empty() {
        lines.push(String::new());
        lines.push(render_notes(&task.notes));
    }

    lines.join("\n") + "\n"
}

fn parse_body(body: &str) -> (Option<String>, Option<String>, Vec<Note>) {
    let lines: Vec<&str> = body.lines().collect();
    let title_at = lines.iter().position(|line| line.starts_with("# "));

    let title = title_at.map(|i| lines[i][2..].trim().to_string());

    let mut description = None;
    let mut section_from = 0;
    if let Some(i) = title_at {
        let desc_end = lines[i + 1..]
            .iter()
            .position(|line| line.starts_with("## "))
            .map_or(lines.len(), |offset| i + 1 + offset);
        let text = lines[i + 1..desc_end].join("\n");
        let text = text.trim();
        if !text.is_empty() {
            description = Some(unescape_body(text));
        }
        section_from = desc_end;
    }

    let notes = lines[section_from..]
        .iter()
        .position(|line| line.trim_end() == NOTES_HEADING)
        .map(|offset| parse_notes(&lines[section_from + offset + 1..].join("\n")))
        .unwrap_or_default();

    (title, description, notes)
}

fn finish_note(created: String, body: &[&str]) -> Note {
    Note {
        text: unescape_body(body.join("\n").trim()),
        created,
    }
}

/// Free text must never produce a line the body parser treats as a section
/// or note heading. Any line that is `##...` behind zero or more backslashes
/// gets one more backslash; [`unescape_body`] removes exactly one.
fn escape_body(text: &str) -> String {
    map_lines(text, |line| {
        if line.trim_start_matches('\\').starts_with("##") {
            format!("\\{line}")
        } else {
            line.to_string()
        }
    })
}

fn unescape_body(text: &str) -> String {
    map_lines(text, |line| {
        let bare = line.trim_start_matches('\\');
        if bare.starts_with("##") && bare.len() < line.len() {
            line[1..].to_string()
        } else {
            line.to_string()
        }
    })
}

fn map_lines(text: &str, f: impl Fn(&str) -> String) -> String {
    text.split('\n').map(f).collect::<Vec<_>>().join("\n")
}

fn split_key(line: &str) -> Option<(&str, &str)> {
    let (key, rest) = line.split_once(':')?;
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
        return None;
    }
    Some((key, rest))
}

fn list_item(line: &str) -> Option<&str> {
    if !line.starts_with(char::is_whitespace) {
        return None;
    }
    let item = line.trim_start().strip_prefix("- ")?.trim();
    (!item.is_empty()).then_some(item)
}

fn looks_like_timestamp(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() > 11
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit)
        && bytes[10] == b'T'
}

fn needs_quotes(value: &str) -> bool {
    value.is_empty()
        || value.contains(':')
        || value.contains('\n')
        || value.contains('\r')
        || value.trim() != value
        || value.starts_with(['"', '\''])
        || value.ends_with(['"', '\''])
}

fn quote_if_needed(value: &str) -> String {
    if !needs_quotes(value) {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 {
        if let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
            return unescape(inner);
        }
        if let Some(inner) = value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
            return inner.to_string();
        }
    }
    value.to_string()
}

// Unknown escapes are kept verbatim so hand-written values like `C:\tmp` survive.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn or_now(timestamp: &str) -> String {
    if timestamp.is_empty() {
        now_iso()
    } else {
        timestamp.to_string()
    }
}

fn single_line(title: &str) -> String {
    title.lines().map(str::trim).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TS1: &str = "2024-05-01T12:00:00.000000+00:00";
    const TS2: &str = "2024-05-01T13:00:00.000000+00:00";

    fn full_task() -> Task {
        Task {
            id: String::new(),
            title: "Session storage".to_string(),
            status: TaskStatus::Blocked,
            description: Some("Persist sessions.\n\nSecond paragraph.".to_string()),
            approach: Some("Use a table: one row per session".to_string()),
            criteria: vec!["tests pass".to_string(), "no: regressions".to_string()],
            files: vec!["src/session.rs".to_string()],
            deps: vec!["01-auth".to_string(), "01-auth/02-login".to_string()],
            notes: vec![
                Note {
                    text: "First finding".to_string(),
                    created: TS1.to_string(),
                },
                Note {
                    text: "Second\n\nmulti-line finding".to_string(),
                    created: TS2.to_string(),
                },
            ],
            created: TS1.to_string(),
            updated: TS2.to_string(),
            started: Some(TS1.to_string()),
            completed: None,
            blocked_reason: Some("waiting for \"schema\" review\nsee notes".to_string()),
            children: Vec::new(),
        }
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let task = full_task();
        let decoded = decode(&encode(&task)).expect("decode");
        assert_eq!(decoded, task);
    }

    #[test]
    fn reencoding_is_stable() {
        let once = encode(&full_task());
        let twice = encode(&decode(&once).expect("decode"));
        assert_eq!(once, twice);
    }

    #[test]
    fn sparse_header_has_fixed_order() {
        let mut task = Task {
            title: "Write parser".to_string(),
            created: "2024-01-01T00:00:00+00:00".to_string(),
            updated: "2024-01-01T00:00:00+00:00".to_string(),
            ..Task::default()
        };
        task.deps = vec!["01-a".to_string()];
        task.criteria = vec!["parses: all".to_string()];

        let expected = "---\n\
status: pending\n\
created: \"2024-01-01T00:00:00+00:00\"\n\
updated: \"2024-01-01T00:00:00+00:00\"\n\
deps:\n  - 01-a\n\
criteria:\n  - \"parses: all\"\n\
---\n\n# Write parser\n";
        assert_eq!(encode(&task), expected);
    }

    #[test]
    fn blank_timestamps_are_generated() {
        let task = Task {
            title: "Fresh".to_string(),
            ..Task::default()
        };
        let decoded = decode(&encode(&task)).expect("decode");
        assert!(looks_like_timestamp(&decoded.created));
        assert!(looks_like_timestamp(&decoded.updated));
    }

    #[test]
    fn missing_fence_is_an_error() {
        let err = decode("# Just a heading\n").expect_err("no fence");
        assert_eq!(err, DecodeError::MissingFence);
        let err = decode("---\nstatus: pending\n# no closing fence\n").expect_err("open");
        assert_eq!(err, DecodeError::UnterminatedHeader);
    }

    #[test]
    fn unknown_status_is_an_error() {
        let err = decode("---\nstatus: finished\n---\n\n# T\n").expect_err("status");
        assert_eq!(err, DecodeError::UnknownStatus("finished".to_string()));
    }

    #[test]
    fn decodes_hand_written_record() {
        let raw = "---\r\n\
status: in_progress\r\n\
created: '2024-01-01T00:00:00+00:00'\r\n\
updated: \"2024-01-02T00:00:00+00:00\"\r\n\
deps: 01-setup\r\n\
files:\r\n  - src/lib.rs\r\n  - src/main.rs\r\n\
---\r\n\
\r\n\
# Wire it up\r\n\
\r\n\
## Notes\r\n\
\r\n\
### 2024-01-02T00:00:00+00:00\r\n\
\r\n\
Started on the CLI.\r\n";
        let task = decode(raw).expect("decode");
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.created, "2024-01-01T00:00:00+00:00");
        assert_eq!(task.deps, vec!["01-setup".to_string()]);
        assert_eq!(task.files.len(), 2);
        assert_eq!(task.title, "Wire it up");
        assert!(task.description.is_none());
        assert_eq!(task.notes.len(), 1);
        assert_eq!(task.notes[0].text, "Started on the CLI.");
    }

    #[test]
    fn legacy_backslashes_survive() {
        let task = decode("---\napproach: \"C:\\tmp\\build\"\n---\n\n# T\n").expect("decode");
        assert_eq!(task.approach.as_deref(), Some("C:\\tmp\\build"));
        let again = decode(&encode(&task)).expect("decode");
        assert_eq!(again.approach, task.approach);
    }

    #[test]
    fn header_and_notes_halves_work_alone() {
        let mut header = Header::new();
        header.push_scalar("status", "pending");
        header.push_scalar("approach", "");
        header.push_list("deps", &[]);
        header.push_list("files", &["a.rs".to_string()]);
        let text = render_header(&header);
        assert_eq!(text, "status: pending\nfiles:\n  - a.rs");
        assert_eq!(parse_header(&text), header);

        let notes = vec![
            Note {
                text: "b".to_string(),
                created: TS2.to_string(),
            },
            Note {
                text: "a".to_string(),
                created: TS1.to_string(),
            },
        ];
        let rendered = render_notes(&notes);
        let body = rendered.strip_prefix(NOTES_HEADING).expect("heading");
        assert_eq!(parse_notes(body), notes);
    }

    #[test]
    fn note_heading_must_be_a_timestamp() {
        let notes = parse_notes("### 2024-01-01T00:00:00+00:00\n\n### not a date\nstill body\n");
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].text, "### not a date\nstill body");
    }

    #[test]
    fn heading_lines_in_free_text_round_trip() {
        let mut task = full_task();
        task.description =
            Some("Intro\n\n## Details\n\nMore text\n\n## Notes\n\n### 2024-01-01T00:00:00+00:00\n\nforged".to_string());
        task.notes = vec![Note {
            text: "log:\n### 2024-02-02T00:00:00+00:00\nline\n\\## already escaped".to_string(),
            created: TS1.to_string(),
        }];

        let raw = encode(&task);
        assert!(raw.contains("\n\\## Details\n"));
        let decoded = decode(&raw).expect("decode");
        assert_eq!(decoded, task);
        assert_eq!(decoded.notes.len(), 1);
    }

    #[test]
    fn unescaped_hand_written_text_is_untouched() {
        assert_eq!(unescape_body("C:\\tmp\n# heading"), "C:\\tmp\n# heading");
        assert_eq!(escape_body("a\n#b"), "a\n#b");
    }

    #[test]
    fn missing_title_decodes_empty() {
        let task = decode("---\nstatus: pending\n---\n\nno heading here\n").expect("decode");
        assert!(task.title.is_empty());
    }
}
