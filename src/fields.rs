//! Enumerations and field types for tasks and projects.
//!
//! Every enum here is closed: parsing a string that names no variant is a
//! validation error rather than a silent fallback, so an unknown status can
//! never reach a store.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::WorkSyncError;

/// Normalise user input to the canonical `SCREAMING_SNAKE` spelling, so that
/// `in-progress`, `In Progress` and `IN_PROGRESS` all name the same variant.
fn canonical(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// Task workflow status. Declaration order is the board column order.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[serde(alias = "not-started")]
    NotStarted,
    #[serde(alias = "in-progress")]
    InProgress,
    #[serde(alias = "completed")]
    Completed,
    #[serde(alias = "on-hold")]
    OnHold,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::NotStarted,
        Status::InProgress,
        Status::Completed,
        Status::OnHold,
    ];

    /// Human-readable column label.
    pub fn label(self) -> &'static str {
        match self {
            Status::NotStarted => "Not Started",
            Status::InProgress => "In Progress",
            Status::Completed => "Completed",
            Status::OnHold => "On Hold",
        }
    }

    pub fn is_completed(self) -> bool {
        self == Status::Completed
    }
}

impl FromStr for Status {
    type Err = WorkSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match canonical(s).as_str() {
            "NOT_STARTED" => Ok(Status::NotStarted),
            "IN_PROGRESS" => Ok(Status::InProgress),
            "COMPLETED" => Ok(Status::Completed),
            "ON_HOLD" => Ok(Status::OnHold),
            _ => Err(WorkSyncError::Validation(format!("unknown task status '{s}'"))),
        }
    }
}

/// Task priority. Ordering ascends with importance: `Low < ... < Urgent`.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    #[serde(alias = "low")]
    Low,
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "high")]
    High,
    #[serde(alias = "urgent")]
    Urgent,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Urgent => "Urgent",
        }
    }
}

impl FromStr for Priority {
    type Err = WorkSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match canonical(s).as_str() {
            "LOW" => Ok(Priority::Low),
            "MEDIUM" => Ok(Priority::Medium),
            "HIGH" => Ok(Priority::High),
            "URGENT" => Ok(Priority::Urgent),
            _ => Err(WorkSyncError::Validation(format!("unknown priority '{s}'"))),
        }
    }
}

/// Project lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    #[serde(alias = "active")]
    Active,
    #[serde(alias = "completed")]
    Completed,
    #[serde(alias = "on-hold")]
    OnHold,
    #[serde(alias = "cancelled")]
    Cancelled,
}

impl ProjectStatus {
    pub fn label(self) -> &'static str {
        match self {
            ProjectStatus::Active => "Active",
            ProjectStatus::Completed => "Completed",
            ProjectStatus::OnHold => "On Hold",
            ProjectStatus::Cancelled => "Cancelled",
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = WorkSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match canonical(s).as_str() {
            "ACTIVE" => Ok(ProjectStatus::Active),
            "COMPLETED" => Ok(ProjectStatus::Completed),
            "ON_HOLD" => Ok(ProjectStatus::OnHold),
            "CANCELLED" => Ok(ProjectStatus::Cancelled),
            _ => Err(WorkSyncError::Validation(format!("unknown project status '{s}'"))),
        }
    }
}

/// Team role. Ordering is the access hierarchy `Viewer < Editor < Admin`.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[serde(alias = "viewer")]
    Viewer,
    #[serde(alias = "editor")]
    Editor,
    #[serde(alias = "admin")]
    Admin,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::Viewer => "Viewer",
            Role::Editor => "Editor",
            Role::Admin => "Admin",
        }
    }
}

impl FromStr for Role {
    type Err = WorkSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match canonical(s).as_str() {
            "VIEWER" => Ok(Role::Viewer),
            "EDITOR" => Ok(Role::Editor),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(WorkSyncError::Validation(format!("unknown role '{s}'"))),
        }
    }
}

/// Available sorting options for task lists.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum SortKey {
    Title,
    Priority,
    CreatedAt,
    #[default]
    DueDate,
}

impl FromStr for SortKey {
    type Err = WorkSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match canonical(s).replace('_', "").as_str() {
            "TITLE" => Ok(SortKey::Title),
            "PRIORITY" => Ok(SortKey::Priority),
            "CREATEDAT" => Ok(SortKey::CreatedAt),
            "DUEDATE" => Ok(SortKey::DueDate),
            _ => Err(WorkSyncError::Validation(format!("unknown sort key '{s}'"))),
        }
    }
}

/// Sorting options for project lists.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum ProjectSortKey {
    Name,
    Progress,
    UpdatedAt,
    #[default]
    CreatedAt,
}

impl FromStr for ProjectSortKey {
    type Err = WorkSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match canonical(s).replace('_', "").as_str() {
            "NAME" => Ok(ProjectSortKey::Name),
            "PROGRESS" => Ok(ProjectSortKey::Progress),
            "UPDATEDAT" => Ok(ProjectSortKey::UpdatedAt),
            "CREATEDAT" => Ok(ProjectSortKey::CreatedAt),
            _ => Err(WorkSyncError::Validation(format!(
                "unknown project sort key '{s}'"
            ))),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_status_parses_every_spelling() {
        assert_eq!("IN_PROGRESS".parse::<Status>().unwrap(), Status::InProgress);
        assert_eq!("in-progress".parse::<Status>().unwrap(), Status::InProgress);
        assert_eq!(" On Hold ".parse::<Status>().unwrap(), Status::OnHold);
    }

    #[test]
    fn test_unknown_values_are_rejected() {
        let err = "BLOCKED".parse::<Status>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert!("critical".parse::<Priority>().is_err());
        assert!("owner".parse::<Role>().is_err());
        assert!("archived".parse::<ProjectStatus>().is_err());
    }

    #[test]
    fn test_role_hierarchy_ordering() {
        assert!(Role::Viewer < Role::Editor);
        assert!(Role::Editor < Role::Admin);
    }

    #[test]
    fn test_priority_ordering_and_default() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::Low < Priority::Medium);
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn test_serde_accepts_backend_spelling() {
        let s: Status = serde_json::from_str("\"not-started\"").unwrap();
        assert_eq!(s, Status::NotStarted);
        assert_eq!(serde_json::to_string(&Status::OnHold).unwrap(), "\"ON_HOLD\"");
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!("dueDate".parse::<SortKey>().unwrap(), SortKey::DueDate);
        assert_eq!("created-at".parse::<SortKey>().unwrap(), SortKey::CreatedAt);
        assert!("size".parse::<SortKey>().is_err());
    }

    #[test]
    fn test_project_sort_key_parse() {
        assert_eq!("updatedAt".parse::<ProjectSortKey>().unwrap(), ProjectSortKey::UpdatedAt);
        assert_eq!("progress".parse::<ProjectSortKey>().unwrap(), ProjectSortKey::Progress);
        assert!("due-date".parse::<ProjectSortKey>().is_err());
    }
}
