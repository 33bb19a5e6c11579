//! Leaf/parent duality.
//!
//! A task is stored either as a leaf record or as a container holding an
//! index record plus children. These transitions are the only code that
//! moves a task between the two shapes.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::resolver::{self, Location, INDEX_FILE};

/// Storage shape of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Leaf,
    Parent,
}

/// Convert a leaf into a parent whose container holds only its index.
pub fn promote(root: &Path, id: &str) -> Result<Location> {
    let location = resolver::resolve(root, id)?;
    if location.shape != Shape::Leaf {
        return Err(Error::Structural(format!(
            "Cannot promote {}: it is already a parent",
            location.id
        )));
    }

    let container = resolver::container_path(root, &location.id);
    if container.exists() {
        return Err(Error::Structural(format!(
            "Cannot promote {}: {} already exists",
            location.id,
            container.display()
        )));
    }

    fs::create_dir(&container)?;
    let index = container.join(INDEX_FILE);
    if let Err(err) = fs::rename(&location.path, &index) {
        let _ = fs::remove_dir(&container);
        return Err(err.into());
    }

    tracing::debug!(id = %location.id, "promoted leaf to parent");
    Ok(Location {
        id: location.id,
        path: index,
        shape: Shape::Parent,
    })
}

/// Convert a childless parent back into a leaf.
pub fn demote(root: &Path, id: &str) -> Result<Location> {
    let location = resolver::resolve(root, id)?;
    let container = match location.container() {
        Some(container) => container.to_path_buf(),
        None => {
            return Err(Error::Structural(format!(
                "Cannot demote {}: it is not a parent",
                location.id
            )))
        }
    };

    if has_children(&container)? {
        return Err(Error::Structural(format!(
            "Cannot demote {}: it still has children",
            location.id
        )));
    }

    let leaf = resolver::leaf_path(root, &location.id);
    if leaf.exists() {
        return Err(Error::Structural(format!(
            "Cannot demote {}: {} already exists",
            location.id,
            leaf.display()
        )));
    }

    fs::rename(&location.path, &leaf)?;
    if let Err(err) = fs::remove_dir(&container) {
        // Something untracked is still in there; put the index back.
        let _ = fs::rename(&leaf, &location.path);
        return Err(err.into());
    }

    tracing::debug!(id = %location.id, "demoted parent to leaf");
    Ok(Location {
        id: location.id,
        path: leaf,
        shape: Shape::Leaf,
    })
}

/// Outcome of [`ensure_parent`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentContainer {
    pub id: String,
    pub container: PathBuf,
    /// True when this call promoted a leaf
    pub promoted: bool,
}

/// Make `id` a parent, promoting it when it is still a leaf.
pub fn ensure_parent(root: &Path, id: &str) -> Result<ParentContainer> {
    let location = resolver::resolve(root, id)?;
    let promoted = match location.shape {
        Shape::Parent => false,
        Shape::Leaf => {
            promote(root, &location.id)?;
            true
        }
    };

    Ok(ParentContainer {
        container: resolver::container_path(root, &location.id),
        id: location.id,
        promoted,
    })
}

/// Implicit demote after a child left `id`. Failures are logged, not
/// returned, so the operation that triggered it still succeeds.
pub fn collapse_if_empty(root: &Path, id: &str) -> bool {
    let container = resolver::container_path(root, id);
    match has_children(&container) {
        Ok(false) if container.is_dir() => {}
        Ok(_) => return false,
        Err(err) => {
            tracing::warn!(id, error = %err, "could not inspect container");
            return false;
        }
    }

    match demote(root, id) {
        Ok(_) => true,
        Err(err) => {
            tracing::warn!(id, error = %err, "left empty container in place");
            false
        }
    }
}

/// Whether a container holds any child task.
pub fn has_children(container: &Path) -> Result<bool> {
    Ok(!resolver::list_entries(container)?.is_empty())
}

/// Sorted ids of the immediate children of parent `id`.
pub fn child_ids(root: &Path, id: &str) -> Result<Vec<String>> {
    let container = resolver::container_path(root, id);
    Ok(resolver::list_entries(&container)?
        .into_iter()
        .map(|entry| resolver::join_id(Some(id), &entry.name))
        .collect())
}
