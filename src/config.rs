//! Runtime configuration for the command line.
//!
//! Flags and environment variables are merged by clap before they get here;
//! this module fills in the defaults.

use std::path::{Path, PathBuf};

pub const DEFAULT_LOG_FILTER: &str = "warn";
pub const DEFAULT_DUE_SOON_DAYS: u32 = 3;
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const DATA_DIR: &str = ".worksync";
const DB_FILE: &str = "workspace.json";

/// Values supplied explicitly, by flag or environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub db_path: Option<PathBuf>,
    pub log_filter: Option<String>,
    pub base_url: Option<String>,
    pub due_soon_days: Option<u32>,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub log_filter: String,
    pub due_soon_days: u32,
    /// Prefix for links in notification emails.
    pub base_url: String,
    /// Print result envelopes as JSON instead of tables.
    pub json: bool,
}

impl Config {
    /// Resolve against the process environment's `HOME`.
    pub fn from_overrides(overrides: ConfigOverrides) -> Self {
        let home = std::env::var_os("HOME").map(PathBuf::from);
        Self::resolve(overrides, home.as_deref())
    }

    pub fn resolve(overrides: ConfigOverrides, home: Option<&Path>) -> Self {
        Config {
            db_path: overrides
                .db_path
                .unwrap_or_else(|| default_db_path(home)),
            log_filter: overrides
                .log_filter
                .filter(|f| !f.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            due_soon_days: overrides.due_soon_days.unwrap_or(DEFAULT_DUE_SOON_DAYS),
            base_url: overrides
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            json: overrides.json,
        }
    }
}

/// `$HOME/.worksync/workspace.json`, or the same under the current directory
/// when there is no home.
pub fn default_db_path(home: Option<&Path>) -> PathBuf {
    home.unwrap_or_else(|| Path::new("."))
        .join(DATA_DIR)
        .join(DB_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::resolve(ConfigOverrides::default(), Some(Path::new("/home/kim")));
        assert_eq!(cfg.db_path, PathBuf::from("/home/kim/.worksync/workspace.json"));
        assert_eq!(cfg.log_filter, "warn");
        assert_eq!(cfg.due_soon_days, 3);
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert!(!cfg.json);
    }

    #[test]
    fn test_no_home_falls_back_to_current_dir() {
        let cfg = Config::resolve(ConfigOverrides::default(), None);
        assert_eq!(cfg.db_path, PathBuf::from("./.worksync/workspace.json"));
    }

    #[test]
    fn test_overrides_win() {
        let cfg = Config::resolve(
            ConfigOverrides {
                db_path: Some("/tmp/ws.json".into()),
                log_filter: Some("worksync=debug".into()),
                base_url: Some("https://ws.example".into()),
                due_soon_days: Some(7),
                json: true,
            },
            Some(Path::new("/home/kim")),
        );
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/ws.json"));
        assert_eq!(cfg.log_filter, "worksync=debug");
        assert_eq!(cfg.due_soon_days, 7);
        assert_eq!(cfg.base_url, "https://ws.example");
        assert!(cfg.json);
    }

    #[test]
    fn test_blank_log_filter_uses_default() {
        let cfg = Config::resolve(
            ConfigOverrides {
                log_filter: Some("  ".into()),
                ..Default::default()
            },
            None,
        );
        assert_eq!(cfg.log_filter, DEFAULT_LOG_FILTER);
    }
}
