//! Project data structure, team membership and access checks.
//!
//! A project owns no tasks directly; tasks point at it through their
//! `project_id`. The project's `progress` is derived from those tasks and
//! is only ever written by the project store.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkSyncError};
use crate::fields::{ProjectStatus, Role};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_PROJECT_DESCRIPTION_LEN: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub u64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to a user managed outside this crate.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        UserId(s)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub user_id: UserId,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

/// A container of tasks with derived progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub owner: UserId,
    /// 0..=100, recomputed from the project's tasks.
    pub progress: u8,
    #[serde(default)]
    pub team: Vec<TeamMember>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a project.
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub owner: UserId,
    pub tags: Vec<String>,
    /// Defaults to the creation day.
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Project {
    /// Role-based access check. The owner always passes; anyone else needs a
    /// team entry whose role ranks at least `required`.
    pub fn has_access(&self, user: &UserId, required: Role) -> bool {
        if &self.owner == user {
            return true;
        }
        self.member(user).is_some_and(|m| m.role >= required)
    }

    pub fn member(&self, user: &UserId) -> Option<&TeamMember> {
        self.team.iter().find(|m| &m.user_id == user)
    }

    /// Effective role of a user: `Admin` for the owner, the team role for a
    /// member, `None` for anyone else.
    pub fn role_of(&self, user: &UserId) -> Option<Role> {
        if &self.owner == user {
            Some(Role::Admin)
        } else {
            self.member(user).map(|m| m.role)
        }
    }
}

pub(crate) fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(WorkSyncError::Validation("project name is required".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(WorkSyncError::Validation(format!(
            "project name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

pub(crate) fn validate_project_description(description: Option<&str>) -> Result<Option<String>> {
    let Some(d) = description.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(None);
    };
    if d.chars().count() > MAX_PROJECT_DESCRIPTION_LEN {
        return Err(WorkSyncError::Validation(format!(
            "project description cannot exceed {MAX_PROJECT_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(Some(d.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn project() -> Project {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
        Project {
            id: ProjectId(1),
            name: "Website".into(),
            description: None,
            status: ProjectStatus::Active,
            owner: UserId::from("owner"),
            progress: 0,
            team: vec![TeamMember {
                user_id: UserId::from("ed"),
                role: Role::Editor,
                joined_at: now,
            }],
            tags: vec![],
            start_date: now.date_naive(),
            end_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_owner_always_has_access() {
        let p = project();
        assert!(p.has_access(&UserId::from("owner"), Role::Admin));
        assert_eq!(p.role_of(&UserId::from("owner")), Some(Role::Admin));
    }

    #[test]
    fn test_member_access_follows_rank() {
        let p = project();
        let ed = UserId::from("ed");
        assert!(p.has_access(&ed, Role::Viewer));
        assert!(p.has_access(&ed, Role::Editor));
        assert!(!p.has_access(&ed, Role::Admin));
    }

    #[test]
    fn test_stranger_has_no_access() {
        let p = project();
        assert!(!p.has_access(&UserId::from("mallory"), Role::Viewer));
        assert_eq!(p.role_of(&UserId::from("mallory")), None);
    }

    #[test]
    fn test_name_validation() {
        assert_eq!(validate_name("  Launch ").unwrap(), "Launch");
        assert!(validate_name("").is_err());
        assert!(validate_name(&"n".repeat(MAX_NAME_LEN + 1)).is_err());
    }
}
