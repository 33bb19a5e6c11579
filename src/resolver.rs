//! Identifier ⇄ storage location mapping.
//!
//! A task id is a `/`-joined path of `NN-slug` names relative to the store
//! root. A leaf lives at `<root>/<id>.md`; a parent is the directory
//! `<root>/<id>/` whose own fields sit in `00-index.md`. The index file's
//! name never appears in an id.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::hierarchy::Shape;

/// Reserved name of a parent's own record inside its container
pub const INDEX_FILE: &str = "00-index.md";

/// Suffix of every record file
pub const RECORD_EXT: &str = "md";

const INDEX_STEM: &str = "00-index";
const SLUG_MAX_LEN: usize = 50;
const SLUG_FALLBACK: &str = "task";

/// Where a task's record lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub id: String,
    /// The record file: the leaf itself or the container's index.
    pub path: PathBuf,
    pub shape: Shape,
}

impl Location {
    /// The directory holding this task's children, if it is a parent.
    pub fn container(&self) -> Option<&Path> {
        match self.shape {
            Shape::Parent => self.path.parent(),
            Shape::Leaf => None,
        }
    }
}

/// A task entry found while listing a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Entry name as it appears in ids (no record suffix)
    pub name: String,
    pub shape: Shape,
    pub path: PathBuf,
}

/// Filesystem-safe slug for a title; `task` when nothing usable remains.
pub fn slugify(title: &str) -> String {
    let mapped = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() || c == '_' { '-' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect::<String>();

    let mut collapsed = String::with_capacity(mapped.len());
    for c in mapped.chars() {
        if c == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(c);
    }

    let slug: String = collapsed
        .trim_matches('-')
        .chars()
        .take(SLUG_MAX_LEN)
        .collect();
    if slug.is_empty() {
        SLUG_FALLBACK.to_string()
    } else {
        slug
    }
}

/// Validate and canonicalize a user-supplied id.
///
/// A trailing `/` or `.md` suffix is tolerated; empty, absolute, dotted or
/// backslash-separated ids and the index name are rejected.
pub fn normalize_id(input: &str) -> Result<String> {
    let trimmed = input.trim().trim_end_matches('/');
    let trimmed = trimmed
        .strip_suffix(".md")
        .unwrap_or(trimmed);

    if trimmed.is_empty() {
        return Err(Error::Validation("task id cannot be empty".to_string()));
    }

    let malformed = trimmed.starts_with('/')
        || trimmed.contains('\\')
        || trimmed
            .split('/')
            .any(|seg| seg.is_empty() || seg.starts_with('.') || seg == INDEX_STEM);
    if malformed {
        return Err(Error::Validation(format!("malformed task id '{}'", input.trim())));
    }

    Ok(trimmed.to_string())
}

/// Path a leaf record with this id would have.
pub fn leaf_path(root: &Path, id: &str) -> PathBuf {
    root.join(format!("{id}.{RECORD_EXT}"))
}

/// Path a parent container with this id would have.
pub fn container_path(root: &Path, id: &str) -> PathBuf {
    root.join(id)
}

/// Resolve an exact id. Containers win over leaves.
pub fn resolve(root: &Path, id: &str) -> Result<Location> {
    let id = normalize_id(id)?;

    let container = container_path(root, &id);
    if container.is_dir() {
        let index = container.join(INDEX_FILE);
        if !index.is_file() {
            return Err(Error::Structural(format!(
                "task container {id} has no {INDEX_FILE}"
            )));
        }
        return Ok(Location {
            id,
            path: index,
            shape: Shape::Parent,
        });
    }

    let leaf = leaf_path(root, &id);
    if leaf.is_file() {
        return Ok(Location {
            id,
            path: leaf,
            shape: Shape::Leaf,
        });
    }

    Err(Error::NotFound(id))
}

/// Resolve a user reference: an exact id, or one whose segments are
/// abbreviated to their ordinals (`1/2` for `01-auth/02-session`).
pub fn resolve_reference(root: &Path, input: &str) -> Result<Location> {
    let id = normalize_id(input)?;
    match resolve(root, &id) {
        Err(Error::NotFound(_)) => {}
        other => return other,
    }

    let mut dir = root.to_path_buf();
    let mut resolved: Vec<String> = Vec::new();
    for segment in id.split('/') {
        let names: BTreeSet<String> = list_entries(&dir)?
            .into_iter()
            .map(|entry| entry.name)
            .collect();

        let name = if names.contains(segment) {
            segment.to_string()
        } else {
            let wanted = segment_ordinal(segment).ok_or_else(|| Error::NotFound(id.clone()))?;
            let matches: Vec<&String> = names
                .iter()
                .filter(|name| ordinal_of(name) == Some(wanted))
                .collect();
            match matches.as_slice() {
                [] => return Err(Error::NotFound(id)),
                [only] => (*only).clone(),
                many => {
                    let prefix = resolved.join("/");
                    return Err(Error::AmbiguousReference {
                        input: input.trim().to_string(),
                        candidates: many
                            .iter()
                            .map(|name| join_id(non_empty(&prefix), name))
                            .collect(),
                    });
                }
            }
        };

        dir = dir.join(&name);
        resolved.push(name);
    }

    resolve(root, &resolved.join("/"))
}

/// Inverse of [`resolve`]: the id of a record path under `root`.
pub fn identifier_of(root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(root).map_err(|_| {
        Error::Validation(format!("{} is outside the task store", path.display()))
    })?;

    let is_index = rel
        .file_name()
        .map(|name| name == INDEX_FILE)
        .unwrap_or(false);
    let rel = if is_index {
        rel.parent().unwrap_or(rel).to_path_buf()
    } else {
        rel.with_extension("")
    };

    let id = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    if id.is_empty() {
        return Err(Error::Validation(format!(
            "{} is not a task record",
            path.display()
        )));
    }
    Ok(id)
}

/// Next `NN` prefix for a container: one past the highest in use, `01` when
/// empty or missing. Gaps below the highest are never refilled.
pub fn next_ordinal(container: &Path) -> Result<String> {
    if !container.is_dir() {
        return Ok("01".to_string());
    }

    let mut highest = 0;
    for entry in fs::read_dir(container)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if name == INDEX_FILE {
            continue;
        }
        if let Some(ordinal) = ordinal_of(&name) {
            highest = highest.max(ordinal);
        }
    }
    let next = highest.checked_add(1).ok_or_else(|| {
        Error::Validation(format!(
            "no ordinal left after {highest} in {}",
            container.display()
        ))
    })?;
    Ok(format!("{next:02}"))
}

/// Task entries of a container in ordinal order. The index record and
/// hidden entries are skipped; a missing directory has no entries.
pub fn list_entries(dir: &Path) -> Result<Vec<Entry>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut raw = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name == INDEX_FILE || file_name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            raw.push((
                file_name.clone(),
                Entry {
                    name: file_name,
                    shape: Shape::Parent,
                    path,
                },
            ));
        } else if let Some(stem) = file_name.strip_suffix(&format!(".{RECORD_EXT}")) {
            raw.push((
                file_name.clone(),
                Entry {
                    name: stem.to_string(),
                    shape: Shape::Leaf,
                    path,
                },
            ));
        }
    }

    // Numeric so that `100-x` follows `99-y`; unnumbered names go last.
    raw.sort_by(|a, b| {
        let key = |name: &str| ordinal_of(name).unwrap_or(u32::MAX);
        key(&a.0).cmp(&key(&b.0)).then_with(|| a.0.cmp(&b.0))
    });
    Ok(raw.into_iter().map(|(_, entry)| entry).collect())
}

/// Numeric `NN` prefix of an entry name.
pub fn ordinal_of(name: &str) -> Option<u32> {
    let (digits, _) = name.split_once('-')?;
    segment_ordinal(digits)
}

/// Name with its ordinal prefix removed.
pub fn slug_of(name: &str) -> &str {
    name.split_once('-').map(|(_, slug)| slug).unwrap_or(name)
}

/// Last segment of an id.
pub fn name_of(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

/// Id of the enclosing parent, `None` at top level.
pub fn parent_id(id: &str) -> Option<&str> {
    id.rsplit_once('/').map(|(parent, _)| parent)
}

pub fn join_id(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) => format!("{parent}/{name}"),
        None => name.to_string(),
    }
}

/// `id` rewritten from under `old` to under `new`; `None` if unrelated.
pub fn rebase_id(id: &str, old: &str, new: &str) -> Option<String> {
    if id == old {
        return Some(new.to_string());
    }
    id.strip_prefix(old)
        .filter(|rest| rest.starts_with('/'))
        .map(|rest| format!("{new}{rest}"))
}

/// True when `id` is `ancestor` or lies beneath it.
pub fn is_within(id: &str, ancestor: &str) -> bool {
    rebase_id(id, ancestor, ancestor).is_some()
}

fn segment_ordinal(segment: &str) -> Option<u32> {
    if segment.is_empty() || !segment.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}
