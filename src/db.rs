//! JSON persistence of a workspace snapshot, plus input normalisation
//! helpers shared by the stores and the command line.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::{Datelike, Days, Duration, NaiveDate};
use thiserror::Error;
use tracing::debug;

use crate::workspace::Snapshot;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed workspace file: {0}")]
    Json(#[from] serde_json::Error),

    /// The file parsed but its contents break a store invariant.
    #[error("inconsistent workspace data: {0}")]
    Integrity(String),
}

/// Load a snapshot, or an empty one when the file does not exist yet.
pub fn load(path: &Path) -> Result<Snapshot, StorageError> {
    if !path.exists() {
        debug!(path = %path.display(), "no workspace file, starting empty");
        return Ok(Snapshot::default());
    }
    let buf = fs::read_to_string(path)?;
    let snapshot = serde_json::from_str(&buf)?;
    Ok(snapshot)
}

/// Save a snapshot with an atomic write (temp file + rename), creating the
/// parent directory if needed.
pub fn save(snapshot: &Snapshot, path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_string_pretty(snapshot)?;
    let mut f = File::create(&tmp)?;
    f.write_all(data.as_bytes())?;
    f.sync_all()?;
    fs::rename(&tmp, path)?;
    debug!(
        path = %path.display(),
        projects = snapshot.projects.len(),
        tasks = snapshot.tasks.len(),
        "workspace saved"
    );
    Ok(())
}

/// Normalise a tag by trimming, lowercasing, and replacing spaces with hyphens.
pub fn normalise_tag(s: &str) -> String {
    s.trim().to_lowercase().replace(' ', "-")
}

/// Split comma-separated tag strings and normalise each one. The result is
/// sorted and free of duplicates.
pub fn split_and_normalise_tags(inputs: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = inputs
        .iter()
        .flat_map(|raw| raw.split(','))
        .map(normalise_tag)
        .filter(|t| !t.is_empty())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}

/// Parse a due date relative to `today`.
///
/// Accepts `today`, `tomorrow`, `yesterday`, `in 3d`, `in 2w`, a weekday name
/// (its next occurrence, today included), `next <weekday>` (one week later)
/// and `YYYY-MM-DD`. Offsets that leave the calendar give `None`.
pub fn parse_due_input(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();
    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return today.succ_opt(),
        "yesterday" => return today.pred_opt(),
        _ => {}
    }

    if let Some(rest) = s.strip_prefix("in ") {
        let rest = rest.trim();
        let unit = rest.chars().last()?;
        let n: i64 = rest[..rest.len() - unit.len_utf8()].trim().parse().ok()?;
        let offset = match unit {
            'd' => Duration::try_days(n)?,
            'w' => Duration::try_weeks(n)?,
            _ => return None,
        };
        return today.checked_add_signed(offset);
    }

    let (weekday_name, extra_week) = match s.strip_prefix("next ") {
        Some(rest) => (rest.trim(), 7),
        None => (s.as_str(), 0),
    };
    if let Some(target) = weekday_index(weekday_name) {
        let current = today.weekday().num_days_from_monday() as i64;
        let ahead = (target - current).rem_euclid(7) + extra_week;
        return today.checked_add_days(Days::new(ahead as u64));
    }

    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

fn weekday_index(name: &str) -> Option<i64> {
    const DAYS: [&str; 7] = [
        "monday",
        "tuesday",
        "wednesday",
        "thursday",
        "friday",
        "saturday",
        "sunday",
    ];
    DAYS.iter()
        .position(|d| *d == name || (name.len() == 3 && d.starts_with(name)))
        .map(|i| i as i64)
}
