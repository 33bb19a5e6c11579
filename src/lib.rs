//! task-tracker - durable task memory for coding agents
//!
//! Tasks are Markdown records with a small header, stored as a directory
//! tree under `.claude/tasks`. A task with sub-tasks is a directory holding
//! its own record in `00-index.md`; everything else is a single file.
//!
//! # Core Concepts
//!
//! - **Ids**: slash-joined `NN-slug` names, derived from the tree itself
//! - **Hierarchy**: leaves are promoted to parents on their first child and
//!   demoted again when the last child goes away
//! - **Scheduling**: the next task is either the first ready pending child of
//!   an in-progress parent, taken in depth-first order, or else the first
//!   pending task anywhere whose dependencies are done
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `codec`: Record text format (header + Markdown body)
//! - `config`: Configuration loading from `.task.toml`
//! - `error`: Error types and result aliases
//! - `hierarchy`: Leaf/parent promotion and demotion
//! - `lock`: Store lock and atomic file writes
//! - `output`: JSON envelopes and human-readable rendering
//! - `render`: Markdown report of the whole tree
//! - `resolver`: Id normalization and lookup
//! - `schedule`: Dependency checks and next-task selection
//! - `storage`: Record I/O against the directory tree
//! - `store`: The operations the CLI exposes
//! - `task`: Task data model
//! - `walk`: Ordered traversal of the tree

pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod lock;
pub mod output;
pub mod render;
pub mod resolver;
pub mod schedule;
pub mod storage;
pub mod store;
pub mod task;
pub mod walk;

pub use error::{Error, Result};
