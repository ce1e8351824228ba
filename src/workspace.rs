//! The workspace ties the two stores together.
//!
//! Each store sits behind its own `RwLock`, so all writes to one store are
//! serialised. Operations that need both always lock projects before tasks.
//! Any task mutation that can move progress recomputes the affected
//! projects before the locks are released, so a caller never observes a
//! task change without the matching progress. Notifications go out after
//! the locks are dropped.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::clock::{Clock, SystemClock};
use crate::db::StorageError;
use crate::error::Result;
use crate::event::{Listeners, StoreEvent};
use crate::fields::{ProjectStatus, Role, Status};
use crate::project::{NewProject, Project, ProjectId, UserId};
use crate::project_store::{compute_progress, DeleteOptions, ProjectStore};
use crate::task::{ChecklistItem, Comment, NewTask, Task, TaskId, TaskPatch, TimeLog};
use crate::task_store::TaskStore;
use crate::view::{self, DashboardStats};

/// Point-in-time copy of both stores, taken under both read locks. Also the
/// persisted file format.
///
/// The id counters travel with the data so that ids of deleted records are
/// not reissued after a reload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub last_project_id: u64,
    #[serde(default)]
    pub last_task_id: u64,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Snapshot {
    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn dashboard(&self, now: DateTime<Utc>) -> DashboardStats {
        view::dashboard_stats(&self.projects, &self.tasks, now)
    }
}

pub struct Workspace {
    projects: RwLock<ProjectStore>,
    tasks: RwLock<TaskStore>,
    listeners: Listeners,
    clock: Arc<dyn Clock>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Workspace {
            projects: RwLock::new(ProjectStore::new()),
            tasks: RwLock::new(TaskStore::new()),
            listeners: Listeners::default(),
            clock,
        }
    }

    /// Rebuild a workspace from persisted data, rejecting data that breaks
    /// the store invariants. Stored progress values are recomputed.
    pub fn from_snapshot(
        snapshot: Snapshot,
        clock: Arc<dyn Clock>,
    ) -> std::result::Result<Self, StorageError> {
        let mut projects = ProjectStore::from_projects(snapshot.projects)
            .with_id_floor(snapshot.last_project_id);
        projects.check_integrity().map_err(StorageError::Integrity)?;
        let tasks = TaskStore::from_tasks(snapshot.tasks).with_id_floor(snapshot.last_task_id);
        tasks
            .check_integrity(&projects)
            .map_err(StorageError::Integrity)?;

        let ids: Vec<ProjectId> = projects.projects().iter().map(|p| p.id).collect();
        for id in ids {
            if let Some(progress) = projects.refresh_progress(id, tasks.tasks()) {
                warn!(project_id = %id, progress, "stored progress was stale, recomputed");
            }
        }
        projects.take_events();

        Ok(Workspace {
            projects: RwLock::new(projects),
            tasks: RwLock::new(tasks),
            listeners: Listeners::default(),
            clock,
        })
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Register a listener for store notifications.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.listeners.subscribe(Arc::new(listener));
    }

    /// Consistent copy of both stores.
    pub fn snapshot(&self) -> Snapshot {
        let projects = self.projects.read();
        let tasks = self.tasks.read();
        Snapshot {
            last_project_id: projects.last_id(),
            last_task_id: tasks.last_id(),
            projects: projects.projects().to_vec(),
            tasks: tasks.tasks().to_vec(),
        }
    }

    /// Dashboard numbers computed from a single snapshot.
    pub fn dashboard(&self) -> DashboardStats {
        self.snapshot().dashboard(self.now())
    }

    /// Run a project-only mutation and publish what it recorded.
    fn with_projects<T>(
        &self,
        op: impl FnOnce(&mut ProjectStore, DateTime<Utc>) -> Result<T>,
    ) -> Result<T> {
        let now = self.clock.now();
        let (result, events) = {
            let mut projects = self.projects.write();
            let result = op(&mut *projects, now);
            (result, projects.take_events())
        };
        self.listeners.publish(&events);
        result
    }

    /// Run a mutation that may change task status or membership of a
    /// project, refreshing progress before the locks are released.
    fn with_both<T>(
        &self,
        op: impl FnOnce(&mut ProjectStore, &mut TaskStore, DateTime<Utc>) -> Result<T>,
    ) -> Result<T> {
        let now = self.clock.now();
        let (result, events) = {
            let mut projects = self.projects.write();
            let mut tasks = self.tasks.write();
            let result = op(&mut *projects, &mut *tasks, now);
            let mut events = tasks.take_events();
            let touched: BTreeSet<ProjectId> = events
                .iter()
                .flat_map(StoreEvent::progress_projects)
                .collect();
            for id in touched {
                projects.refresh_progress(id, tasks.tasks());
            }
            events.extend(projects.take_events());
            (result, events)
        };
        self.listeners.publish(&events);
        result
    }

    /// Run a task mutation that cannot affect status or project membership.
    fn with_tasks<T>(&self, op: impl FnOnce(&mut TaskStore, DateTime<Utc>) -> Result<T>) -> Result<T> {
        let now = self.clock.now();
        let (result, events) = {
            let mut tasks = self.tasks.write();
            let result = op(&mut *tasks, now);
            (result, tasks.take_events())
        };
        self.listeners.publish(&events);
        result
    }

    // Projects

    pub fn create_project(&self, input: NewProject) -> Result<Project> {
        self.with_projects(|projects, now| projects.create(input, now).cloned())
    }

    pub fn project(&self, id: ProjectId) -> Result<Project> {
        self.projects.read().find(id).cloned()
    }

    pub fn projects(&self) -> Vec<Project> {
        self.projects.read().projects().to_vec()
    }

    pub fn set_project_status(&self, id: ProjectId, status: ProjectStatus) -> Result<Project> {
        self.with_projects(|projects, now| projects.set_status(id, status, now).cloned())
    }

    pub fn add_team_member(&self, id: ProjectId, user: &UserId, role: Role) -> Result<Project> {
        self.with_projects(|projects, now| projects.add_team_member(id, user, role, now).cloned())
    }

    pub fn remove_team_member(&self, id: ProjectId, user: &UserId) -> Result<Project> {
        self.with_projects(|projects, now| projects.remove_team_member(id, user, now).cloned())
    }

    pub fn has_access(&self, id: ProjectId, user: &UserId, required: Role) -> Result<bool> {
        let projects = self.projects.read();
        Ok(ProjectStore::has_access(projects.find(id)?, user, required))
    }

    /// Progress recomputed from the current tasks.
    pub fn compute_progress(&self, id: ProjectId) -> Result<u8> {
        let projects = self.projects.read();
        let tasks = self.tasks.read();
        projects.find(id)?;
        Ok(compute_progress(id, tasks.tasks()))
    }

    /// Delete a project; see [`DeleteOptions`]. Either the project and all
    /// its tasks go, or nothing changes.
    pub fn delete_project(&self, id: ProjectId, options: DeleteOptions) -> Result<Project> {
        self.with_both(|projects, tasks, _| projects.delete(id, options, tasks))
    }

    // Tasks

    pub fn task(&self, id: TaskId) -> Result<Task> {
        self.tasks.read().find(id).cloned()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.read().tasks().to_vec()
    }

    pub fn create_task(&self, input: NewTask) -> Result<Task> {
        self.with_both(|projects, tasks, now| tasks.create(input, &*projects, now).cloned())
    }

    pub fn update_task(&self, id: TaskId, patch: TaskPatch) -> Result<Task> {
        self.with_both(|projects, tasks, now| tasks.update(id, patch, &*projects, now).cloned())
    }

    /// Status change used by both the board move and the table toggle.
    pub fn set_task_status(&self, id: TaskId, status: Status) -> Result<Task> {
        self.with_both(|_, tasks, now| tasks.set_status(id, status, now).cloned())
    }

    pub fn delete_task(&self, id: TaskId) -> Result<Task> {
        self.with_both(|_, tasks, _| tasks.delete(id))
    }

    pub fn add_checklist_item(&self, id: TaskId, item: &str) -> Result<Task> {
        self.with_tasks(|tasks, now| tasks.add_checklist_item(id, item, now).cloned())
    }

    pub fn toggle_checklist_item(&self, id: TaskId, index: usize) -> Result<ChecklistItem> {
        self.with_tasks(|tasks, now| tasks.toggle_checklist_item(id, index, now).cloned())
    }

    pub fn start_time_log(
        &self,
        id: TaskId,
        user: &UserId,
        description: Option<String>,
    ) -> Result<TimeLog> {
        self.with_tasks(|tasks, now| tasks.start_time_log(id, user, description, now).cloned())
    }

    pub fn stop_time_log(&self, id: TaskId, user: &UserId) -> Result<TimeLog> {
        self.with_tasks(|tasks, now| tasks.stop_time_log(id, user, now).cloned())
    }

    pub fn total_time_spent(&self, id: TaskId) -> Result<Duration> {
        self.tasks.read().total_time_spent(id)
    }

    pub fn add_comment(&self, id: TaskId, user: &UserId, content: &str) -> Result<Comment> {
        self.with_tasks(|tasks, now| tasks.add_comment(id, user, content, now).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::ErrorKind;
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use std::thread;

    fn workspace() -> (Workspace, ProjectId) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 7, 1, 8, 0, 0).unwrap(),
        ));
        let ws = Workspace::with_clock(clock);
        let pid = ws
            .create_project(NewProject {
                name: "Core".into(),
                owner: UserId::from("olga"),
                ..Default::default()
            })
            .unwrap()
            .id;
        (ws, pid)
    }

    fn add_task(ws: &Workspace, pid: ProjectId, title: &str) -> TaskId {
        ws.create_task(NewTask {
            title: title.into(),
            project_id: Some(pid),
            created_by: UserId::from("olga"),
            ..Default::default()
        })
        .unwrap()
        .id
    }

    #[test]
    fn test_progress_follows_status_changes() {
        let (ws, pid) = workspace();
        let ids: Vec<TaskId> = (0..4).map(|i| add_task(&ws, pid, &format!("t{i}"))).collect();
        ws.set_task_status(ids[0], Status::Completed).unwrap();
        assert_eq!(ws.project(pid).unwrap().progress, 25);
        ws.update_task(ids[1], TaskPatch::status(Status::Completed))
            .unwrap();
        assert_eq!(ws.project(pid).unwrap().progress, 50);
        ws.delete_task(ids[2]).unwrap();
        assert_eq!(ws.project(pid).unwrap().progress, 67);
        assert_eq!(ws.compute_progress(pid).unwrap(), 67);
    }

    #[test]
    fn test_moving_task_refreshes_both_projects() {
        let (ws, p1) = workspace();
        let p2 = ws
            .create_project(NewProject {
                name: "Other".into(),
                owner: UserId::from("olga"),
                ..Default::default()
            })
            .unwrap()
            .id;
        let a = add_task(&ws, p1, "a");
        add_task(&ws, p1, "b");
        ws.set_task_status(a, Status::Completed).unwrap();
        assert_eq!(ws.project(p1).unwrap().progress, 50);
        ws.update_task(
            a,
            TaskPatch {
                project_id: Some(p2),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(ws.project(p1).unwrap().progress, 0);
        assert_eq!(ws.project(p2).unwrap().progress, 100);
    }

    #[test]
    fn test_blocked_delete_leaves_state_unchanged() {
        let (ws, pid) = workspace();
        add_task(&ws, pid, "a");
        let before = ws.snapshot();
        let err = ws.delete_project(pid, DeleteOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConflictError);
        assert_eq!(ws.snapshot(), before);
    }

    #[test]
    fn test_cascade_delete_notifies_removals() {
        let (ws, pid) = workspace();
        let a = add_task(&ws, pid, "a");
        let b = add_task(&ws, pid, "b");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        ws.subscribe(move |e| sink.lock().push(e.clone()));
        ws.delete_project(pid, DeleteOptions { cascade: true })
            .unwrap();
        let seen = seen.lock();
        assert!(seen.contains(&StoreEvent::TaskRemoved {
            task_id: a,
            project_id: pid
        }));
        assert!(seen.contains(&StoreEvent::TaskRemoved {
            task_id: b,
            project_id: pid
        }));
        assert!(seen.contains(&StoreEvent::ProjectDeleted {
            project_id: pid,
            removed_tasks: vec![a, b]
        }));
        assert!(ws.tasks().is_empty());
    }

    #[test]
    fn test_failed_operation_publishes_nothing() {
        let (ws, _) = workspace();
        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);
        ws.subscribe(move |_| *sink.lock() += 1);
        assert!(ws.set_task_status(TaskId(99), Status::Completed).is_err());
        assert!(ws
            .create_task(NewTask {
                title: "x".into(),
                project_id: Some(ProjectId(42)),
                created_by: UserId::from("olga"),
                ..Default::default()
            })
            .is_err());
        assert_eq!(*count.lock(), 0);
    }

    #[test]
    fn test_listener_can_read_workspace() {
        let (ws, pid) = workspace();
        let ws = Arc::new(ws);
        let reader = Arc::downgrade(&ws);
        let progress = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&progress);
        ws.subscribe(move |e| {
            if let (StoreEvent::ProgressChanged { project_id, .. }, Some(ws)) =
                (e, reader.upgrade())
            {
                sink.lock().push(ws.project(*project_id).unwrap().progress);
            }
        });
        let t = add_task(&ws, pid, "a");
        ws.set_task_status(t, Status::Completed).unwrap();
        assert_eq!(*progress.lock(), vec![100]);
    }

    #[test]
    fn test_concurrent_status_changes_keep_progress_consistent() {
        let (ws, pid) = workspace();
        let ids: Vec<TaskId> = (0..16).map(|i| add_task(&ws, pid, &format!("t{i}"))).collect();
        let ws = Arc::new(ws);
        let handles: Vec<_> = ids
            .chunks(4)
            .map(|chunk| {
                let ws = Arc::clone(&ws);
                let chunk = chunk.to_vec();
                thread::spawn(move || {
                    for id in chunk {
                        ws.set_task_status(id, Status::Completed).unwrap();
                        let snap = ws.snapshot();
                        let stored = snap.project(pid).unwrap().progress;
                        assert_eq!(stored, compute_progress(pid, &snap.tasks));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(ws.project(pid).unwrap().progress, 100);
    }

    #[test]
    fn test_listener_can_subscribe_from_a_callback() {
        let (ws, pid) = workspace();
        let ws = Arc::new(ws);
        let handle = Arc::downgrade(&ws);
        let late = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&late);
        ws.subscribe(move |e| {
            if let (StoreEvent::TaskCreated { .. }, Some(ws)) = (e, handle.upgrade()) {
                let sink = Arc::clone(&sink);
                ws.subscribe(move |_| *sink.lock() += 1);
            }
        });
        add_task(&ws, pid, "a");
        assert_eq!(*late.lock(), 0);
        ws.create_project(NewProject {
            name: "Next".into(),
            owner: UserId::from("olga"),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(*late.lock(), 1);
    }

    #[test]
    fn test_from_snapshot_recomputes_progress() {
        let (ws, pid) = workspace();
        let t = add_task(&ws, pid, "a");
        ws.set_task_status(t, Status::Completed).unwrap();
        let mut snap = ws.snapshot();
        snap.projects[0].progress = 3;
        let restored = Workspace::from_snapshot(snap, Arc::new(SystemClock)).unwrap();
        assert_eq!(restored.project(pid).unwrap().progress, 100);
    }

    #[test]
    fn test_from_snapshot_rejects_dangling_task() {
        let (ws, pid) = workspace();
        add_task(&ws, pid, "a");
        let mut snap = ws.snapshot();
        snap.projects.clear();
        assert!(matches!(
            Workspace::from_snapshot(snap, Arc::new(SystemClock)),
            Err(StorageError::Integrity(_))
        ));
    }

    #[test]
    fn test_reload_does_not_reuse_deleted_ids() {
        let (ws, pid) = workspace();
        add_task(&ws, pid, "a");
        let b = add_task(&ws, pid, "b");
        ws.delete_task(b).unwrap();
        let spare = ws
            .create_project(NewProject {
                name: "Spare".into(),
                owner: UserId::from("olga"),
                ..Default::default()
            })
            .unwrap()
            .id;
        ws.delete_project(spare, DeleteOptions::default()).unwrap();

        let json = serde_json::to_string(&ws.snapshot()).unwrap();
        let restored =
            Workspace::from_snapshot(serde_json::from_str(&json).unwrap(), Arc::new(SystemClock))
                .unwrap();
        let c = add_task(&restored, pid, "c");
        assert!(c > b);
        let next = restored
            .create_project(NewProject {
                name: "Next".into(),
                owner: UserId::from("olga"),
                ..Default::default()
            })
            .unwrap()
            .id;
        assert!(next > spare);
    }

    #[test]
    fn test_access_through_workspace() {
        let (ws, pid) = workspace();
        let ed = UserId::from("ed");
        ws.add_team_member(pid, &ed, Role::Editor).unwrap();
        assert!(ws.has_access(pid, &ed, Role::Editor).unwrap());
        assert!(!ws.has_access(pid, &ed, Role::Admin).unwrap());
        ws.remove_team_member(pid, &ed).unwrap();
        assert!(!ws.has_access(pid, &ed, Role::Viewer).unwrap());
        assert_eq!(
            ws.has_access(ProjectId(9), &ed, Role::Viewer).unwrap_err().kind(),
            ErrorKind::NotFoundError
        );
    }
}
