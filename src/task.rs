//! Task data structure and related functionality.
//!
//! This module defines the `Task` record together with its checklist, time
//! log and comment entries, and the input structs the task store accepts.
//! Nothing here mutates a stored task; the store owns every write.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkSyncError};
use crate::fields::{Priority, Status};
use crate::project::{ProjectId, UserId};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 2000;
pub const MAX_COMMENT_LEN: usize = 1000;

/// Identifier of a task, assigned by the store and never reused while the
/// task exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of work belonging to exactly one project.
///
/// `completed_at` is present exactly when `status` is `Completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub project_id: ProjectId,
    pub status: Status,
    pub priority: Priority,
    pub assigned_to: Option<UserId>,
    pub created_by: UserId,
    pub due_date: Option<NaiveDate>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_hours: Option<f64>,
    /// Tasks that must be done before this one. Never contains the task
    /// itself or an id that no longer exists.
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    #[serde(default)]
    pub time_logs: Vec<TimeLog>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A boolean sub-step of a task. `completed_at` is set exactly when
/// `completed` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub item: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// An interval of work by one user. Open while `end_time` is absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeLog {
    pub user_id: UserId,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TimeLog {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Length of a closed log; `None` while the log is still running.
    pub fn duration(&self) -> Option<Duration> {
        self.end_time.map(|end| end - self.start_time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub user_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a task. Status always starts at `NotStarted`.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub project_id: Option<ProjectId>,
    /// Defaults to `Medium`.
    pub priority: Option<Priority>,
    pub assigned_to: Option<UserId>,
    pub created_by: UserId,
    pub due_date: Option<NaiveDate>,
    pub estimated_hours: Option<f64>,
    pub dependencies: Vec<TaskId>,
    pub tags: Vec<String>,
}

/// Partial update of a task. `None` leaves a field untouched; for optional
/// fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub project_id: Option<ProjectId>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub assigned_to: Option<Option<UserId>>,
    pub due_date: Option<Option<NaiveDate>>,
    pub estimated_hours: Option<Option<f64>>,
    pub actual_hours: Option<Option<f64>>,
    /// Replaces the whole dependency list.
    pub dependencies: Option<Vec<TaskId>>,
    pub tags: Option<Vec<String>>,
}

impl TaskPatch {
    pub fn status(status: Status) -> Self {
        TaskPatch {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == TaskPatch::default()
    }
}

impl Task {
    /// True iff the task has a due date, is not completed, and `now` falls on
    /// a day after the due date.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.due_date {
            Some(due) => !self.status.is_completed() && now.date_naive() > due,
            None => false,
        }
    }

    /// Sum of closed time logs. Running logs are not counted until stopped.
    pub fn total_time_spent(&self) -> Duration {
        self.time_logs
            .iter()
            .filter_map(TimeLog::duration)
            .fold(Duration::zero(), |total, d| total + d)
    }

    /// Percentage of checklist items completed. Without a checklist the task
    /// counts as 100 when completed and 0 otherwise.
    pub fn checklist_completion(&self) -> u8 {
        if self.checklist.is_empty() {
            return if self.status.is_completed() { 100 } else { 0 };
        }
        let done = self.checklist.iter().filter(|c| c.completed).count();
        rounded_percent(done, self.checklist.len())
    }

    pub fn open_log_for(&self, user: &UserId) -> Option<&TimeLog> {
        self.time_logs
            .iter()
            .find(|log| log.is_open() && &log.user_id == user)
    }
}

/// `round(100 * part / whole)` with halves rounded up, 0 for an empty whole.
pub(crate) fn rounded_percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    let pct = (200 * part + whole) / (2 * whole);
    pct.min(100) as u8
}

/// Trim a title and check it is non-empty and within bounds.
pub(crate) fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(WorkSyncError::Validation("task title is required".into()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(WorkSyncError::Validation(format!(
            "task title cannot exceed {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

/// Trim a description; blank descriptions become absent.
pub(crate) fn validate_description(description: Option<&str>) -> Result<Option<String>> {
    let Some(d) = description.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(None);
    };
    if d.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(WorkSyncError::Validation(format!(
            "description cannot exceed {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(Some(d.to_string()))
}

/// Hour figures must be finite and not negative.
pub(crate) fn validate_hours(hours: Option<f64>, what: &str) -> Result<Option<f64>> {
    match hours {
        Some(h) if !h.is_finite() || h < 0.0 => Err(WorkSyncError::Validation(format!(
            "{what} must be a non-negative number of hours"
        ))),
        _ => Ok(hours),
    }
}

pub(crate) fn validate_comment(content: &str) -> Result<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(WorkSyncError::Validation("comment content is required".into()));
    }
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(WorkSyncError::Validation(format!(
            "comment cannot exceed {MAX_COMMENT_LEN} characters"
        )));
    }
    Ok(content.to_string())
}
