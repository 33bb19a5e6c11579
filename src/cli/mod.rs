//! Command-line interface for the task tracker
//!
//! This module defines the CLI structure using clap derive macros.
//! Handlers live in `task` (store commands) and `init`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::error::Result;
use crate::output::OutputOptions;

mod init;
mod task;

/// task - durable task memory for coding agents
///
/// Tasks are Markdown records under `.claude/tasks`; sub-tasks live in a
/// directory named after their parent.
#[derive(Parser, Debug)]
#[command(name = "task")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Root task container (skips upward discovery)
    #[arg(long, global = true, env = "TASK_ROOT")]
    pub root: Option<PathBuf>,

    /// Output in JSON format (the default)
    #[arg(long, global = true, conflicts_with = "human")]
    pub json: bool,

    /// Output human-readable text
    #[arg(long, global = true)]
    pub human: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the task directory under the current directory
    Init,

    /// Add a task or sub-task
    Add {
        /// Task title
        title: String,

        /// Parent task id (for sub-tasks)
        #[arg(short, long)]
        parent: Option<String>,

        /// Task description
        #[arg(short, long)]
        description: Option<String>,

        /// Implementation approach
        #[arg(short, long)]
        approach: Option<String>,

        /// Acceptance criteria
        #[arg(short, long, num_args = 0..)]
        criteria: Option<Vec<String>>,

        /// Relevant file paths
        #[arg(short, long, num_args = 0..)]
        files: Option<Vec<String>>,

        /// Dependency task ids
        #[arg(long, num_args = 0..)]
        deps: Option<Vec<String>>,
    },

    /// Remove a task (a parent goes with all its sub-tasks)
    Remove {
        /// Task id
        id: String,
    },

    /// Update a task's fields
    Update {
        /// Task id
        id: String,

        /// New title
        #[arg(short, long)]
        title: Option<String>,

        /// New description (empty clears it)
        #[arg(short, long)]
        description: Option<String>,

        /// Implementation approach (empty clears it)
        #[arg(short, long)]
        approach: Option<String>,

        /// Replace acceptance criteria (no values clears them)
        #[arg(short, long, num_args = 0..)]
        criteria: Option<Vec<String>>,

        /// Replace file paths (no values clears them)
        #[arg(short, long, num_args = 0..)]
        files: Option<Vec<String>>,

        /// New status: pending, in_progress, blocked, complete, wont_do
        #[arg(short, long)]
        status: Option<String>,

        /// Replace dependencies (no values clears them)
        #[arg(long, num_args = 0..)]
        deps: Option<Vec<String>>,
    },

    /// List tasks
    List {
        /// Filter by status
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show a task with its dependency state
    Show {
        /// Task id
        id: String,
    },

    /// Get the next task to work on
    Next,

    /// Start a task (warns about unfinished dependencies)
    Start {
        /// Task id
        id: String,
    },

    /// Mark a task complete
    Done {
        /// Task id (default: the current in_progress task)
        id: Option<String>,
    },

    /// Block a task
    Block {
        /// Task id
        id: String,

        /// Reason for blocking
        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Unblock a task (back to pending)
    Unblock {
        /// Task id
        id: String,
    },

    /// Add a note to a task
    Note {
        /// Task id
        id: String,

        /// Note text
        text: String,
    },

    /// List all notes chronologically
    Notes,

    /// Move a task under another parent
    Move {
        /// Task id to move
        id: String,

        /// New parent task id (omit for top level)
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Render all tasks as Markdown
    Render,
}

/// Flags shared by every command
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub root: Option<PathBuf>,
    pub json: bool,
    pub human: bool,
    pub quiet: bool,
}

impl GlobalOptions {
    /// Explicit flags win over `output.format`.
    pub fn output(&self, config: &Config) -> OutputOptions {
        let json = if self.json {
            true
        } else if self.human {
            false
        } else {
            !config.output.is_human()
        };
        OutputOptions {
            json,
            quiet: self.quiet,
        }
    }
}

impl Cli {
    fn global(&self) -> GlobalOptions {
        GlobalOptions {
            root: self.root.clone(),
            json: self.json,
            human: self.human,
            quiet: self.quiet,
        }
    }

    /// Whether a failure should be reported as JSON.
    pub fn json_errors(&self) -> bool {
        if self.json || self.human {
            return self.json;
        }
        std::env::current_dir()
            .ok()
            .and_then(|cwd| Config::discover(&cwd).ok())
            .map(|found| !found.config.output.is_human())
            .unwrap_or(true)
    }

    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let global = self.global();
        match self.command {
            Commands::Init => init::run(&global),
            Commands::Add {
                title,
                parent,
                description,
                approach,
                criteria,
                files,
                deps,
            } => task::run_add(
                &global,
                task::AddOptions {
                    title,
                    parent,
                    description,
                    approach,
                    criteria,
                    files,
                    deps,
                },
            ),
            Commands::Remove { id } => task::run_remove(&global, &id),
            Commands::Update {
                id,
                title,
                description,
                approach,
                criteria,
                files,
                status,
                deps,
            } => task::run_update(
                &global,
                task::UpdateOptions {
                    id,
                    title,
                    description,
                    approach,
                    criteria,
                    files,
                    status,
                    deps,
                },
            ),
            Commands::List { status } => task::run_list(&global, status.as_deref()),
            Commands::Show { id } => task::run_show(&global, &id),
            Commands::Next => task::run_next(&global),
            Commands::Start { id } => task::run_start(&global, &id),
            Commands::Done { id } => task::run_done(&global, id.as_deref()),
            Commands::Block { id, reason } => task::run_block(&global, &id, reason.as_deref()),
            Commands::Unblock { id } => task::run_unblock(&global, &id),
            Commands::Note { id, text } => task::run_note(&global, &id, &text),
            Commands::Notes => task::run_notes(&global),
            Commands::Move { id, parent } => task::run_move(&global, &id, parent.as_deref()),
            Commands::Render => task::run_render(&global),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn empty_list_flag_is_distinct_from_absent() {
        let cli = Cli::parse_from(["task", "update", "01-a", "--criteria"]);
        match cli.command {
            Commands::Update {
                criteria, files, ..
            } => {
                assert_eq!(criteria, Some(Vec::new()));
                assert_eq!(files, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn flags_override_config_format() {
        let mut config = Config::default();
        config.output.format = "human".to_string();
        let global = GlobalOptions {
            root: None,
            json: false,
            human: false,
            quiet: false,
        };
        assert!(!global.output(&config).json);

        let forced = GlobalOptions {
            json: true,
            ..global
        };
        assert!(forced.output(&config).json);
    }
}
