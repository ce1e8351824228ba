//! Authoritative project collection and progress derivation.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::db::split_and_normalise_tags;
use crate::error::{Result, WorkSyncError};
use crate::event::StoreEvent;
use crate::fields::{ProjectStatus, Role};
use crate::project::{
    validate_name, validate_project_description, NewProject, Project, ProjectId, TeamMember,
    UserId,
};
use crate::task::{rounded_percent, Task};
use crate::task_store::{ProjectRegistry, TaskStore};

/// Options for [`ProjectStore::delete`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Delete the project's tasks too instead of refusing.
    pub cascade: bool,
}

/// Percentage of a project's tasks that are completed, rounded, 0 when the
/// project has no tasks.
pub fn compute_progress(project_id: ProjectId, tasks: &[Task]) -> u8 {
    let (total, done) = tasks
        .iter()
        .filter(|t| t.project_id == project_id)
        .fold((0, 0), |(total, done), t| {
            (total + 1, done + usize::from(t.status.is_completed()))
        });
    rounded_percent(done, total)
}

#[derive(Debug, Default, Clone)]
pub struct ProjectStore {
    projects: Vec<Project>,
    next_id: u64,
    outbox: Vec<StoreEvent>,
}

impl ProjectRegistry for ProjectStore {
    fn project_name(&self, id: ProjectId) -> Option<&str> {
        self.get(id).map(|p| p.name.as_str())
    }
}

impl ProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_projects(projects: Vec<Project>) -> Self {
        let next_id = projects.iter().map(|p| p.id.0).max().unwrap_or(0);
        ProjectStore {
            projects,
            next_id,
            outbox: Vec::new(),
        }
    }

    /// See [`TaskStore::with_id_floor`].
    pub fn with_id_floor(mut self, last_id: u64) -> Self {
        self.next_id = self.next_id.max(last_id);
        self
    }

    pub fn last_id(&self) -> u64 {
        self.next_id
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn get(&self, id: ProjectId) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn find(&self, id: ProjectId) -> Result<&Project> {
        self.get(id).ok_or_else(|| WorkSyncError::not_found("project", id))
    }

    fn position(&self, id: ProjectId) -> Result<usize> {
        self.projects
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| WorkSyncError::not_found("project", id))
    }

    pub fn take_events(&mut self) -> Vec<StoreEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Create an active project with zero progress.
    pub fn create(&mut self, input: NewProject, now: DateTime<Utc>) -> Result<&Project> {
        let name = validate_name(&input.name)?;
        let description = validate_project_description(input.description.as_deref())?;
        if input.owner.is_blank() {
            return Err(WorkSyncError::Validation("project owner is required".into()));
        }
        let start_date = input.start_date.unwrap_or_else(|| now.date_naive());
        if let Some(end) = input.end_date {
            if end < start_date {
                return Err(WorkSyncError::Validation(
                    "project end date is before its start date".into(),
                ));
            }
        }

        self.next_id += 1;
        let project = Project {
            id: ProjectId(self.next_id),
            name,
            description,
            status: ProjectStatus::Active,
            owner: input.owner,
            progress: 0,
            team: Vec::new(),
            tags: split_and_normalise_tags(&input.tags),
            start_date,
            end_date: input.end_date,
            created_at: now,
            updated_at: now,
        };
        info!(project_id = %project.id, name = %project.name, "project created");
        self.outbox.push(StoreEvent::ProjectCreated {
            project_id: project.id,
        });
        self.projects.push(project);
        Ok(&self.projects[self.projects.len() - 1])
    }

    pub fn set_status(
        &mut self,
        id: ProjectId,
        status: ProjectStatus,
        now: DateTime<Utc>,
    ) -> Result<&Project> {
        let idx = self.position(id)?;
        let project = &mut self.projects[idx];
        if project.status != status {
            project.status = status;
            project.updated_at = now;
            debug!(project_id = %id, ?status, "project status changed");
            self.outbox.push(StoreEvent::ProjectUpdated {
                project_id: id,
                status,
            });
        }
        Ok(&self.projects[idx])
    }

    /// Recompute a project's stored progress from `tasks`. Returns the new
    /// value when it changed; unknown projects are ignored.
    pub fn refresh_progress(&mut self, id: ProjectId, tasks: &[Task]) -> Option<u8> {
        let progress = compute_progress(id, tasks);
        let project = self.projects.iter_mut().find(|p| p.id == id)?;
        if project.progress == progress {
            return None;
        }
        project.progress = progress;
        debug!(project_id = %id, progress, "project progress recomputed");
        self.outbox.push(StoreEvent::ProgressChanged {
            project_id: id,
            progress,
        });
        Some(progress)
    }

    /// Owner always passes; otherwise the user's team role must rank at least
    /// `required`.
    pub fn has_access(project: &Project, user: &UserId, required: Role) -> bool {
        project.has_access(user, required)
    }

    /// Add a member or change the role of an existing one. Adding the owner
    /// is a no-op since the owner is implicitly an admin.
    pub fn add_team_member(
        &mut self,
        id: ProjectId,
        user: &UserId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<&Project> {
        let idx = self.position(id)?;
        if user.is_blank() {
            return Err(WorkSyncError::Validation("team member is required".into()));
        }
        if &self.projects[idx].owner == user {
            return Ok(&self.projects[idx]);
        }
        let project = &mut self.projects[idx];
        match project.team.iter_mut().find(|m| &m.user_id == user) {
            Some(member) if member.role == role => {}
            Some(member) => {
                member.role = role;
                project.updated_at = now;
                debug!(project_id = %id, user = %user, ?role, "team role changed");
            }
            None => {
                project.team.push(TeamMember {
                    user_id: user.clone(),
                    role,
                    joined_at: now,
                });
                project.updated_at = now;
                debug!(project_id = %id, user = %user, ?role, "team member added");
                self.outbox.push(StoreEvent::MemberAdded {
                    project_id: id,
                    project_name: project.name.clone(),
                    user_id: user.clone(),
                    role,
                    invited_by: project.owner.clone(),
                });
            }
        }
        Ok(&self.projects[idx])
    }

    /// Remove a member. Removing someone who is not on the team succeeds
    /// without change.
    pub fn remove_team_member(
        &mut self,
        id: ProjectId,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<&Project> {
        let idx = self.position(id)?;
        let project = &mut self.projects[idx];
        let before = project.team.len();
        project.team.retain(|m| &m.user_id != user);
        if project.team.len() != before {
            project.updated_at = now;
            debug!(project_id = %id, user = %user, "team member removed");
            self.outbox.push(StoreEvent::MemberRemoved {
                project_id: id,
                user_id: user.clone(),
            });
        }
        Ok(&self.projects[idx])
    }

    /// Delete a project. With tasks still pointing at it the call fails with
    /// `Conflict` unless `cascade` is set, in which case the tasks go too.
    /// All checks happen before either store is touched.
    pub fn delete(
        &mut self,
        id: ProjectId,
        options: DeleteOptions,
        tasks: &mut TaskStore,
    ) -> Result<Project> {
        let idx = self.position(id)?;
        let count = tasks.count_for_project(id);
        if count > 0 && !options.cascade {
            return Err(WorkSyncError::Conflict(format!(
                "project {id} still has {count} task(s)"
            )));
        }
        let removed_tasks = tasks.remove_project_tasks(id);
        let project = self.projects.remove(idx);
        info!(project_id = %id, removed_tasks = removed_tasks.len(), "project deleted");
        self.outbox.push(StoreEvent::ProjectDeleted {
            project_id: id,
            removed_tasks,
        });
        Ok(project)
    }

    /// Check persisted projects: unique ids and progress within bounds.
    pub fn check_integrity(&self) -> std::result::Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for project in &self.projects {
            if !seen.insert(project.id) {
                return Err(format!("duplicate project id {}", project.id));
            }
            if project.progress > 100 {
                return Err(format!("project {} progress above 100", project.id));
            }
        }
        Ok(())
    }
}
