//! Lazy traversal of the task tree.
//!
//! Every [`Walk`] re-reads the store as it goes; nothing is cached between
//! walks. Within a container entries come in numeric ordinal order. A parent is yielded before its descendants, with its
//! `children` filled in from the container at that moment.

use std::path::PathBuf;
use std::vec;

use crate::error::{Error, Result};
use crate::hierarchy::{self, Shape};
use crate::resolver::{self, Entry, INDEX_FILE};
use crate::storage::Storage;
use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WalkOrder {
    /// Every task at every depth, parents before their children
    #[default]
    DepthFirst,
    /// Top-level tasks only
    Shallow,
}

enum Frame {
    Unlisted {
        parent: Option<String>,
        dir: PathBuf,
    },
    Listed {
        parent: Option<String>,
        entries: vec::IntoIter<Entry>,
    },
}

/// Iterator over `(id, task)` pairs. A record that fails to load yields an
/// `Err` and the walk carries on with the next entry.
pub struct Walk {
    storage: Storage,
    order: WalkOrder,
    stack: Vec<Frame>,
}

impl Walk {
    pub fn new(storage: &Storage, order: WalkOrder) -> Self {
        Self {
            stack: vec![Frame::Unlisted {
                parent: None,
                dir: storage.root().to_path_buf(),
            }],
            storage: storage.clone(),
            order,
        }
    }

    /// Collect every decodable task, handing back the failures separately.
    pub fn partition(self) -> (Vec<Task>, Vec<Error>) {
        let mut tasks = Vec::new();
        let mut skipped = Vec::new();
        for item in self {
            match item {
                Ok((_, task)) => tasks.push(task),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable task record");
                    skipped.push(err);
                }
            }
        }
        (tasks, skipped)
    }

    fn load(&self, id: &str, entry: &Entry) -> Result<Task> {
        match entry.shape {
            Shape::Leaf => self.storage.read_record(&entry.path, id),
            Shape::Parent => {
                let mut task = self
                    .storage
                    .read_record(&entry.path.join(INDEX_FILE), id)?;
                task.children = hierarchy::child_ids(self.storage.root(), id)?;
                Ok(task)
            }
        }
    }
}

impl Iterator for Walk {
    type Item = Result<(String, Task)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.stack.pop()? {
                Frame::Unlisted { parent, dir } => match resolver::list_entries(&dir) {
                    Ok(entries) => self.stack.push(Frame::Listed {
                        parent,
                        entries: entries.into_iter(),
                    }),
                    Err(err) => return Some(Err(err)),
                },
                Frame::Listed { parent, mut entries } => {
                    let Some(entry) = entries.next() else {
                        continue;
                    };
                    let id = resolver::join_id(parent.as_deref(), &entry.name);
                    self.stack.push(Frame::Listed { parent, entries });

                    if entry.shape == Shape::Parent {
                        if self.order == WalkOrder::DepthFirst {
                            self.stack.push(Frame::Unlisted {
                                parent: Some(id.clone()),
                                dir: entry.path.clone(),
                            });
                        }
                        // Orphaned container: descend but yield nothing for it.
                        if !entry.path.join(INDEX_FILE).is_file() {
                            continue;
                        }
                    }

                    return Some(self.load(&id, &entry).map(|task| (id, task)));
                }
            }
        }
    }
}

impl Storage {
    /// Start a fresh walk over this store.
    pub fn walk(&self, order: WalkOrder) -> Walk {
        Walk::new(self, order)
    }
}
