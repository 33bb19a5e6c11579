//! task - durable task memory for coding agents
//!
//! A small CLI over a directory of Markdown task records: add, nest,
//! schedule, and complete tasks across sessions.

use clap::Parser;
use task_tracker::cli::Cli;
use task_tracker::output::emit_error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    // Tracing is opt-in via RUST_LOG and always goes to stderr so stdout
    // stays a single JSON document.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw.len() > 4096 {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new("off"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();
    let json = cli.json_errors();
    if let Err(err) = cli.run() {
        let _ = emit_error(&err, json);
        std::process::exit(err.exit_code());
    }
}
