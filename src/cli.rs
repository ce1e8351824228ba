use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;
use worksync::config::{Config, ConfigOverrides};

/// File-backed project and task tracker.
/// Storage defaults to ~/.worksync/workspace.json or a path passed via --db.
#[derive(Parser)]
#[command(name = "ws", version, about = "Team project and task tracking CLI")]
pub struct Cli {
    /// Path to the JSON workspace file.
    #[arg(long, global = true, env = "WORKSYNC_DB")]
    pub db: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `worksync=trace`.
    #[arg(long, global = true, env = "WORKSYNC_LOG")]
    pub log: Option<String>,

    /// Base URL used for links in notification emails.
    #[arg(long, global = true, env = "WORKSYNC_BASE_URL")]
    pub base_url: Option<String>,

    /// Horizon in days for due-soon listings and reminders.
    #[arg(long, global = true, env = "WORKSYNC_DUE_SOON_DAYS")]
    pub due_soon_days: Option<u32>,

    /// Acting user, recorded as creator, owner or time-log user.
    #[arg(long = "as", global = true, env = "WORKSYNC_USER")]
    pub user: Option<String>,

    /// Print the result envelope as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn config(&self) -> Config {
        Config::from_overrides(ConfigOverrides {
            db_path: self.db.clone(),
            log_filter: self.log.clone(),
            base_url: self.base_url.clone(),
            due_soon_days: self.due_soon_days,
            json: self.json,
        })
    }
}
