//! task init command implementation
//!
//! Creates the root task container under the current directory, or at
//! `--root` when one is given.

use crate::cli::GlobalOptions;
use crate::config::Config;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::store::TaskStore;

pub fn run(global: &GlobalOptions) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config = Config::discover(&cwd)?.config;
    let output = global.output(&config);

    let (_, outcome) = match global.root.as_deref() {
        Some(root) => TaskStore::init_at(&cwd.join(root), config)?,
        None => TaskStore::init(&cwd, config)?,
    };

    let mut human = HumanOutput::new("task init: created task store");
    human.push_summary("path", outcome.path.display().to_string());
    human.push_next_step("task add \"<title>\"");

    emit_success(output, &outcome, &human)
}
