//! Authoritative task collection.
//!
//! Every write goes through a named operation that validates its whole input
//! before touching the task, so a failed call leaves the store exactly as it
//! was. Status and `completed_at` only ever change together, through
//! [`transition_status`], whichever surface (table edit, board move, toggle)
//! asked for the change.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::db::split_and_normalise_tags;
use crate::error::{Result, WorkSyncError};
use crate::event::StoreEvent;
use crate::fields::Status;
use crate::project::{ProjectId, UserId};
use crate::task::{
    validate_comment, validate_description, validate_hours, validate_title, ChecklistItem, Comment,
    NewTask, Task, TaskId, TaskPatch, TimeLog,
};

/// Read access to the set of existing projects, used for referential checks.
pub trait ProjectRegistry {
    fn project_name(&self, id: ProjectId) -> Option<&str>;

    fn contains_project(&self, id: ProjectId) -> bool {
        self.project_name(id).is_some()
    }
}

/// In-memory task collection in creation order.
#[derive(Debug, Default, Clone)]
pub struct TaskStore {
    tasks: Vec<Task>,
    next_id: u64,
    outbox: Vec<StoreEvent>,
}

/// Move a task to `to`, keeping `completed_at` in step. Returns the previous
/// status when it changed.
fn transition_status(task: &mut Task, to: Status, now: DateTime<Utc>) -> Option<Status> {
    let from = task.status;
    if from == to {
        return None;
    }
    task.status = to;
    if to.is_completed() {
        if task.completed_at.is_none() {
            task.completed_at = Some(now);
        }
    } else {
        task.completed_at = None;
    }
    Some(from)
}

fn require_user(user: &UserId, what: &str) -> Result<()> {
    if user.is_blank() {
        return Err(WorkSyncError::Validation(format!("{what} is required")));
    }
    Ok(())
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted tasks. Ids continue after the highest
    /// one present.
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let next_id = tasks.iter().map(|t| t.id.0).max().unwrap_or(0);
        TaskStore {
            tasks,
            next_id,
            outbox: Vec::new(),
        }
    }

    /// Keep allocating after `last_id` even if that task is gone, so a
    /// deleted id is never handed out again.
    pub fn with_id_floor(mut self, last_id: u64) -> Self {
        self.next_id = self.next_id.max(last_id);
        self
    }

    /// Highest id allocated so far.
    pub fn last_id(&self) -> u64 {
        self.next_id
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Like [`TaskStore::get`] but unknown ids are a `NotFound` error.
    pub fn find(&self, id: TaskId) -> Result<&Task> {
        self.get(id).ok_or_else(|| WorkSyncError::not_found("task", id))
    }

    fn position(&self, id: TaskId) -> Result<usize> {
        self.tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| WorkSyncError::not_found("task", id))
    }

    pub fn count_for_project(&self, project_id: ProjectId) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.project_id == project_id)
            .count()
    }

    /// Drain the notifications recorded since the last call.
    pub fn take_events(&mut self) -> Vec<StoreEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Create a task in `NotStarted` with no completion timestamp.
    pub fn create(
        &mut self,
        input: NewTask,
        projects: &impl ProjectRegistry,
        now: DateTime<Utc>,
    ) -> Result<&Task> {
        let title = validate_title(&input.title)?;
        let description = validate_description(input.description.as_deref())?;
        let project_id = input
            .project_id
            .ok_or_else(|| WorkSyncError::Validation("project is required".into()))?;
        let Some(project_name) = projects.project_name(project_id) else {
            return Err(WorkSyncError::Validation(format!(
                "project {project_id} does not exist"
            )));
        };
        require_user(&input.created_by, "task creator")?;
        if let Some(assignee) = &input.assigned_to {
            require_user(assignee, "assignee")?;
        }
        let estimated_hours = validate_hours(input.estimated_hours, "estimated hours")?;
        let dependencies = self.validate_dependencies(None, &input.dependencies)?;

        self.next_id += 1;
        let task = Task {
            id: TaskId(self.next_id),
            title,
            description,
            project_id,
            status: Status::NotStarted,
            priority: input.priority.unwrap_or_default(),
            assigned_to: input.assigned_to,
            created_by: input.created_by,
            due_date: input.due_date,
            completed_at: None,
            estimated_hours,
            actual_hours: None,
            dependencies,
            tags: split_and_normalise_tags(&input.tags),
            checklist: Vec::new(),
            time_logs: Vec::new(),
            comments: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        debug!(task_id = %task.id, project_id = %project_id, "task created");

        self.outbox.push(StoreEvent::TaskCreated {
            task_id: task.id,
            project_id,
        });
        if let Some(assignee) = &task.assigned_to {
            self.outbox.push(StoreEvent::TaskAssigned {
                task_id: task.id,
                task_title: task.title.clone(),
                project_id,
                project_name: project_name.to_string(),
                assignee: assignee.clone(),
            });
        }
        self.tasks.push(task);
        Ok(&self.tasks[self.tasks.len() - 1])
    }

    /// Apply a partial update. The patch is validated as a whole first; a
    /// status change moves `completed_at` with it.
    pub fn update(
        &mut self,
        id: TaskId,
        patch: TaskPatch,
        projects: &impl ProjectRegistry,
        now: DateTime<Utc>,
    ) -> Result<&Task> {
        let idx = self.position(id)?;
        if patch.is_empty() {
            return Ok(&self.tasks[idx]);
        }

        let title = patch.title.as_deref().map(validate_title).transpose()?;
        let description = match &patch.description {
            Some(d) => Some(validate_description(d.as_deref())?),
            None => None,
        };
        if let Some(pid) = patch.project_id {
            if !projects.contains_project(pid) {
                return Err(WorkSyncError::Validation(format!(
                    "project {pid} does not exist"
                )));
            }
        }
        if let Some(Some(assignee)) = &patch.assigned_to {
            require_user(assignee, "assignee")?;
        }
        let estimated_hours = patch
            .estimated_hours
            .map(|h| validate_hours(h, "estimated hours"))
            .transpose()?;
        let actual_hours = patch
            .actual_hours
            .map(|h| validate_hours(h, "actual hours"))
            .transpose()?;
        let dependencies = patch
            .dependencies
            .as_deref()
            .map(|deps| self.validate_dependencies(Some(id), deps))
            .transpose()?;
        let tags = patch.tags.as_deref().map(split_and_normalise_tags);

        let task = &mut self.tasks[idx];
        let mut events = Vec::new();

        if let Some(title) = title {
            task.title = title;
        }
        if let Some(description) = description {
            task.description = description;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(due) = patch.due_date {
            task.due_date = due;
        }
        if let Some(hours) = estimated_hours {
            task.estimated_hours = hours;
        }
        if let Some(hours) = actual_hours {
            task.actual_hours = hours;
        }
        if let Some(dependencies) = dependencies {
            task.dependencies = dependencies;
        }
        if let Some(tags) = tags {
            task.tags = tags;
        }
        if let Some(pid) = patch.project_id {
            if pid != task.project_id {
                events.push(StoreEvent::TaskMoved {
                    task_id: id,
                    from: task.project_id,
                    to: pid,
                });
                task.project_id = pid;
            }
        }
        if let Some(status) = patch.status {
            if let Some(from) = transition_status(task, status, now) {
                events.push(StoreEvent::TaskStatusChanged {
                    task_id: id,
                    project_id: task.project_id,
                    from,
                    to: status,
                });
            }
        }
        if let Some(assignee) = patch.assigned_to {
            if assignee != task.assigned_to {
                if let Some(user) = &assignee {
                    events.push(StoreEvent::TaskAssigned {
                        task_id: id,
                        task_title: task.title.clone(),
                        project_id: task.project_id,
                        project_name: projects
                            .project_name(task.project_id)
                            .unwrap_or_default()
                            .to_string(),
                        assignee: user.clone(),
                    });
                }
                task.assigned_to = assignee;
            }
        }
        task.updated_at = now;
        debug!(task_id = %id, status = ?task.status, "task updated");

        self.outbox.push(StoreEvent::TaskUpdated {
            task_id: id,
            project_id: task.project_id,
        });
        self.outbox.extend(events);
        Ok(&self.tasks[idx])
    }

    /// Change only the status. Board moves and table toggles both land here,
    /// so they follow the same timestamp rule as [`TaskStore::update`].
    pub fn set_status(&mut self, id: TaskId, status: Status, now: DateTime<Utc>) -> Result<&Task> {
        let idx = self.position(id)?;
        let task = &mut self.tasks[idx];
        if let Some(from) = transition_status(task, status, now) {
            task.updated_at = now;
            debug!(task_id = %id, ?from, to = ?status, "task status changed");
            self.outbox.push(StoreEvent::TaskUpdated {
                task_id: id,
                project_id: task.project_id,
            });
            self.outbox.push(StoreEvent::TaskStatusChanged {
                task_id: id,
                project_id: task.project_id,
                from,
                to: status,
            });
        }
        Ok(&self.tasks[idx])
    }

    pub fn add_checklist_item(&mut self, id: TaskId, item: &str, now: DateTime<Utc>) -> Result<&Task> {
        let idx = self.position(id)?;
        let item = item.trim();
        if item.is_empty() {
            return Err(WorkSyncError::Validation("checklist item text is required".into()));
        }
        let task = &mut self.tasks[idx];
        task.checklist.push(ChecklistItem {
            item: item.to_string(),
            completed: false,
            completed_at: None,
        });
        task.updated_at = now;
        self.touched(idx);
        Ok(&self.tasks[idx])
    }

    /// Flip one checklist item, setting or clearing its completion time.
    pub fn toggle_checklist_item(
        &mut self,
        id: TaskId,
        index: usize,
        now: DateTime<Utc>,
    ) -> Result<&ChecklistItem> {
        let idx = self.position(id)?;
        let len = self.tasks[idx].checklist.len();
        if index >= len {
            return Err(WorkSyncError::Index { index, len });
        }
        let task = &mut self.tasks[idx];
        let entry = &mut task.checklist[index];
        entry.completed = !entry.completed;
        entry.completed_at = entry.completed.then_some(now);
        task.updated_at = now;
        debug!(task_id = %id, index, completed = entry.completed, "checklist item toggled");
        self.touched(idx);
        Ok(&self.tasks[idx].checklist[index])
    }

    /// Open a time log for `user`. A user may have only one running log per
    /// task.
    pub fn start_time_log(
        &mut self,
        id: TaskId,
        user: &UserId,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<&TimeLog> {
        let idx = self.position(id)?;
        require_user(user, "user")?;
        if self.tasks[idx].open_log_for(user).is_some() {
            return Err(WorkSyncError::Conflict(format!(
                "user {user} already has a running time log on task {id}"
            )));
        }
        let task = &mut self.tasks[idx];
        task.time_logs.push(TimeLog {
            user_id: user.clone(),
            start_time: now,
            end_time: None,
            description: description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
        });
        task.updated_at = now;
        debug!(task_id = %id, user = %user, "time log started");
        self.touched(idx);
        let logs = &self.tasks[idx].time_logs;
        Ok(&logs[logs.len() - 1])
    }

    /// Close the most recent running log of `user`.
    pub fn stop_time_log(&mut self, id: TaskId, user: &UserId, now: DateTime<Utc>) -> Result<&TimeLog> {
        let idx = self.position(id)?;
        let task = &mut self.tasks[idx];
        let Some(pos) = task
            .time_logs
            .iter()
            .rposition(|log| log.is_open() && &log.user_id == user)
        else {
            return Err(WorkSyncError::not_found(
                "running time log",
                format!("for user {user} on task {id}"),
            ));
        };
        task.time_logs[pos].end_time = Some(now);
        task.updated_at = now;
        debug!(task_id = %id, user = %user, "time log stopped");
        self.touched(idx);
        Ok(&self.tasks[idx].time_logs[pos])
    }

    /// Total of closed time logs on a task.
    pub fn total_time_spent(&self, id: TaskId) -> Result<Duration> {
        Ok(self.find(id)?.total_time_spent())
    }

    pub fn add_comment(
        &mut self,
        id: TaskId,
        user: &UserId,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<&Comment> {
        let idx = self.position(id)?;
        require_user(user, "comment author")?;
        let content = validate_comment(content)?;
        let task = &mut self.tasks[idx];
        task.comments.push(Comment {
            user_id: user.clone(),
            content,
            created_at: now,
        });
        task.updated_at = now;
        self.touched(idx);
        let comments = &self.tasks[idx].comments;
        Ok(&comments[comments.len() - 1])
    }

    /// Remove a task and announce its removal.
    pub fn delete(&mut self, id: TaskId) -> Result<Task> {
        let idx = self.position(id)?;
        let task = self.tasks.remove(idx);
        debug!(task_id = %id, "task deleted");
        self.outbox.push(StoreEvent::TaskRemoved {
            task_id: id,
            project_id: task.project_id,
        });
        self.forget_dependencies(&[id]);
        Ok(task)
    }

    /// Remove every task of a project. Used by cascading project deletion.
    pub fn remove_project_tasks(&mut self, project_id: ProjectId) -> Vec<TaskId> {
        let (removed, kept): (Vec<Task>, Vec<Task>) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|t| t.project_id == project_id);
        self.tasks = kept;
        let ids: Vec<TaskId> = removed.iter().map(|t| t.id).collect();
        for &task_id in &ids {
            self.outbox.push(StoreEvent::TaskRemoved { task_id, project_id });
        }
        self.forget_dependencies(&ids);
        ids
    }

    /// Overdue predicate, independent of any store state.
    pub fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
        task.is_overdue(now)
    }

    /// Check the invariants a persisted collection must satisfy before it can
    /// back a store. Returns a description of the first violation.
    pub fn check_integrity(&self, projects: &impl ProjectRegistry) -> std::result::Result<(), String> {
        let mut seen = HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.id) {
                return Err(format!("duplicate task id {}", task.id));
            }
            if [task.estimated_hours, task.actual_hours]
                .iter()
                .any(|h| validate_hours(*h, "hours").is_err())
            {
                return Err(format!("task {} has an invalid hour figure", task.id));
            }
            if !projects.contains_project(task.project_id) {
                return Err(format!(
                    "task {} references missing project {}",
                    task.id, task.project_id
                ));
            }
            if task.status.is_completed() != task.completed_at.is_some() {
                return Err(format!(
                    "task {} completion timestamp disagrees with its status",
                    task.id
                ));
            }
            if let Some(i) = task
                .checklist
                .iter()
                .position(|c| c.completed != c.completed_at.is_some())
            {
                return Err(format!(
                    "task {} checklist item {i} completion timestamp disagrees with its flag",
                    task.id
                ));
            }
            let mut open = HashSet::new();
            for log in task.time_logs.iter().filter(|l| l.is_open()) {
                if !open.insert(&log.user_id) {
                    return Err(format!(
                        "task {} has several running time logs for user {}",
                        task.id, log.user_id
                    ));
                }
            }
        }
        for task in &self.tasks {
            if let Some(dep) = task
                .dependencies
                .iter()
                .find(|d| **d == task.id || !seen.contains(*d))
            {
                return Err(format!(
                    "task {} depends on itself or on missing task {dep}",
                    task.id
                ));
            }
            if self.depends_on(task.dependencies.iter().copied(), task.id) {
                return Err(format!("task {} is part of a dependency cycle", task.id));
            }
        }
        Ok(())
    }

    /// Check a dependency list for `task` (absent while creating): every id
    /// must exist, differ from the task and not lead back to it. Duplicates
    /// are dropped, first occurrence kept.
    fn validate_dependencies(&self, task: Option<TaskId>, deps: &[TaskId]) -> Result<Vec<TaskId>> {
        let mut out: Vec<TaskId> = Vec::with_capacity(deps.len());
        for &dep in deps {
            if Some(dep) == task {
                return Err(WorkSyncError::Validation(format!(
                    "task {dep} cannot depend on itself"
                )));
            }
            if self.get(dep).is_none() {
                return Err(WorkSyncError::Validation(format!(
                    "dependency task {dep} does not exist"
                )));
            }
            if !out.contains(&dep) {
                out.push(dep);
            }
        }
        if let Some(id) = task {
            if self.depends_on(out.iter().copied(), id) {
                return Err(WorkSyncError::Validation(format!(
                    "dependencies of task {id} would form a cycle"
                )));
            }
        }
        Ok(out)
    }

    /// True when `target` is reachable from `start` through dependency
    /// edges.
    fn depends_on(&self, start: impl IntoIterator<Item = TaskId>, target: TaskId) -> bool {
        let mut stack: Vec<TaskId> = start.into_iter().collect();
        let mut visited = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if visited.insert(id) {
                if let Some(task) = self.get(id) {
                    stack.extend(task.dependencies.iter().copied());
                }
            }
        }
        false
    }

    /// Drop removed tasks from every remaining dependency list.
    fn forget_dependencies(&mut self, removed: &[TaskId]) {
        for idx in 0..self.tasks.len() {
            let deps = &mut self.tasks[idx].dependencies;
            let before = deps.len();
            deps.retain(|d| !removed.contains(d));
            if deps.len() != before {
                debug!(task_id = %self.tasks[idx].id, "dependency on removed task dropped");
                self.touched(idx);
            }
        }
    }

    fn touched(&mut self, idx: usize) {
        let task = &self.tasks[idx];
        self.outbox.push(StoreEvent::TaskUpdated {
            task_id: task.id,
            project_id: task.project_id,
        });
    }
}
