//! Store notifications.
//!
//! Stores record a `StoreEvent` for every accepted mutation. The workspace
//! publishes them to subscribers after the store locks are released, so a
//! listener may read the workspace again without deadlocking.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::fields::{ProjectStatus, Role, Status};
use crate::project::{ProjectId, UserId};
use crate::task::TaskId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StoreEvent {
    ProjectCreated {
        project_id: ProjectId,
    },
    ProjectUpdated {
        project_id: ProjectId,
        status: ProjectStatus,
    },
    ProjectDeleted {
        project_id: ProjectId,
        removed_tasks: Vec<TaskId>,
    },
    MemberAdded {
        project_id: ProjectId,
        project_name: String,
        user_id: UserId,
        role: Role,
        invited_by: UserId,
    },
    MemberRemoved {
        project_id: ProjectId,
        user_id: UserId,
    },
    TaskCreated {
        task_id: TaskId,
        project_id: ProjectId,
    },
    TaskUpdated {
        task_id: TaskId,
        project_id: ProjectId,
    },
    TaskMoved {
        task_id: TaskId,
        from: ProjectId,
        to: ProjectId,
    },
    TaskStatusChanged {
        task_id: TaskId,
        project_id: ProjectId,
        from: Status,
        to: Status,
    },
    TaskAssigned {
        task_id: TaskId,
        task_title: String,
        project_id: ProjectId,
        project_name: String,
        assignee: UserId,
    },
    TaskRemoved {
        task_id: TaskId,
        project_id: ProjectId,
    },
    ProgressChanged {
        project_id: ProjectId,
        progress: u8,
    },
}

impl StoreEvent {
    /// Projects whose derived progress this event can change.
    pub fn progress_projects(&self) -> Vec<ProjectId> {
        match self {
            StoreEvent::TaskCreated { project_id, .. }
            | StoreEvent::TaskStatusChanged { project_id, .. }
            | StoreEvent::TaskRemoved { project_id, .. } => vec![*project_id],
            StoreEvent::TaskMoved { from, to, .. } => vec![*from, *to],
            _ => Vec::new(),
        }
    }
}

pub type Listener = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

/// Subscriber list. Listeners run in subscription order on the thread that
/// performed the mutation. The list is copied before they run, so a
/// listener may subscribe another; the newcomer sees the next batch.
#[derive(Default)]
pub struct Listeners {
    inner: RwLock<Vec<Listener>>,
}

impl Listeners {
    pub fn subscribe(&self, listener: Listener) {
        self.inner.write().push(listener);
    }

    pub fn publish(&self, events: &[StoreEvent]) {
        if events.is_empty() {
            return;
        }
        let listeners: Vec<Listener> = self.inner.read().clone();
        for event in events {
            for listener in &listeners {
                listener(event);
            }
        }
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.inner.read().len())
            .finish()
    }
}
