//! # ws - WorkSync command line
//!
//! A file-backed tracker for team projects and their tasks.
//!
//! ## Quick Start
//!
//! ```bash
//! export WORKSYNC_USER=olga@example.com
//!
//! # Create a project and a task in it
//! ws project add "Website relaunch"
//! ws add "Draft landing page" --project 1 --priority high --due friday
//!
//! # Move it across the board and check progress
//! ws move 1 in-progress
//! ws done 1
//! ws project list
//!
//! # Board and dashboard
//! ws board --project 1
//! ws stats
//! ```
//!
//! Data is stored in `~/.worksync/workspace.json` unless `--db` or
//! `WORKSYNC_DB` says otherwise. Set `WORKSYNC_LOG=debug` to see what the
//! stores are doing.

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod cli;
mod cmd;

use cli::Cli;
use cmd::{run, Commands, Session};

fn init_logging(filter: &str) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    let config = cli.config();
    init_logging(&config.log_filter);

    if let Commands::Completions { shell } = cli.command {
        cmd::cmd_completions(shell);
        return;
    }

    debug!(db = %config.db_path.display(), "starting");
    let result = Session::open(config, cli.user).and_then(|session| run(&session, cli.command));
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
