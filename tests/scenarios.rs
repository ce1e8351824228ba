//! End-to-end workspace scenarios driven through the public API with a
//! manual clock.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use parking_lot::Mutex;

use worksync::clock::{Clock, ManualClock};
use worksync::error::ErrorKind;
use worksync::event::StoreEvent;
use worksync::fields::{Priority, SortKey, Status};
use worksync::project::{NewProject, ProjectId, UserId};
use worksync::project_store::DeleteOptions;
use worksync::task::{NewTask, TaskId, TaskPatch};
use worksync::task_store::TaskStore;
use worksync::view::{self, TaskFilter};
use worksync::Workspace;

fn setup() -> (Workspace, Arc<ManualClock>, ProjectId) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 4, 20, 9, 30, 0).unwrap(),
    ));
    let ws = Workspace::with_clock(clock.clone());
    let pid = ws
        .create_project(NewProject {
            name: "P1".into(),
            owner: UserId::from("u1"),
            ..Default::default()
        })
        .unwrap()
        .id;
    (ws, clock, pid)
}

fn task(ws: &Workspace, pid: ProjectId, title: &str) -> TaskId {
    ws.create_task(NewTask {
        title: title.into(),
        project_id: Some(pid),
        created_by: UserId::from("u1"),
        ..Default::default()
    })
    .unwrap()
    .id
}

#[test]
fn progress_tracks_completed_share() {
    let (ws, _, pid) = setup();
    let ids: Vec<TaskId> = ["a", "b", "c", "d"].iter().map(|t| task(&ws, pid, t)).collect();
    ws.set_task_status(ids[0], Status::Completed).unwrap();
    assert_eq!(ws.compute_progress(pid).unwrap(), 25);
    assert_eq!(ws.project(pid).unwrap().progress, 25);
    ws.set_task_status(ids[1], Status::Completed).unwrap();
    assert_eq!(ws.compute_progress(pid).unwrap(), 50);
    assert_eq!(ws.project(pid).unwrap().progress, 50);
}

#[test]
fn second_time_log_start_conflicts() {
    let (ws, clock, pid) = setup();
    let t1 = task(&ws, pid, "t1");
    let u1 = UserId::from("u1");
    ws.start_time_log(t1, &u1, None).unwrap();
    let err = ws.start_time_log(t1, &u1, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConflictError);

    // Another user may run a log on the same task meanwhile.
    ws.start_time_log(t1, &UserId::from("u2"), None).unwrap();

    clock.advance(Duration::minutes(45));
    let log = ws.stop_time_log(t1, &u1).unwrap();
    assert_eq!(log.duration(), Some(Duration::minutes(45)));
    assert_eq!(ws.total_time_spent(t1).unwrap(), Duration::minutes(45));
    ws.start_time_log(t1, &u1, Some("second pass".into())).unwrap();
}

#[test]
fn blocked_project_delete_changes_nothing() {
    let (ws, _, pid) = setup();
    task(&ws, pid, "keep me");
    let before = ws.snapshot();
    let err = ws
        .delete_project(pid, DeleteOptions { cascade: false })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConflictError);
    assert_eq!(ws.snapshot(), before);
}

#[test]
fn overdue_clears_on_completion() {
    let (ws, clock, pid) = setup();
    let yesterday = (clock.now() - Duration::days(1)).date_naive();
    let id = ws
        .create_task(NewTask {
            title: "late".into(),
            project_id: Some(pid),
            created_by: UserId::from("u1"),
            due_date: Some(yesterday),
            ..Default::default()
        })
        .unwrap()
        .id;
    ws.set_task_status(id, Status::InProgress).unwrap();
    let now = ws.now();
    assert!(TaskStore::is_overdue(&ws.task(id).unwrap(), now));
    ws.set_task_status(id, Status::Completed).unwrap();
    assert!(!TaskStore::is_overdue(&ws.task(id).unwrap(), now));
}

#[test]
fn completion_timestamp_follows_every_surface() {
    let (ws, clock, pid) = setup();
    let id = task(&ws, pid, "t");

    // Board move.
    let done = ws.set_task_status(id, Status::Completed).unwrap();
    let stamp = done.completed_at.unwrap();

    // Re-completing keeps the first timestamp.
    clock.advance(Duration::hours(1));
    let again = ws
        .update_task(id, TaskPatch::status(Status::Completed))
        .unwrap();
    assert_eq!(again.completed_at, Some(stamp));

    // Table edit away from completed clears it.
    let reopened = ws
        .update_task(id, TaskPatch::status(Status::OnHold))
        .unwrap();
    assert_eq!(reopened.completed_at, None);
}

#[test]
fn checklist_toggle_and_bounds() {
    let (ws, _, pid) = setup();
    let id = task(&ws, pid, "t");
    ws.add_checklist_item(id, "write").unwrap();
    ws.add_checklist_item(id, "review").unwrap();
    let item = ws.toggle_checklist_item(id, 1).unwrap();
    assert!(item.completed && item.completed_at.is_some());
    assert_eq!(ws.task(id).unwrap().checklist_completion(), 50);
    let err = ws.toggle_checklist_item(id, 2).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IndexError);
}

#[test]
fn invalid_input_is_rejected_without_change() {
    let (ws, _, pid) = setup();
    let id = task(&ws, pid, "t");
    let before = ws.snapshot();
    let err = ws
        .update_task(
            id,
            TaskPatch {
                title: Some("   ".into()),
                priority: Some(Priority::Urgent),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
    assert_eq!(ws.snapshot(), before);
    assert!("SOMEDAY".parse::<Status>().is_err());
    assert_eq!(
        ws.task(TaskId(404)).unwrap_err().kind(),
        ErrorKind::NotFoundError
    );
}

#[test]
fn cascade_delete_tells_listeners_about_each_task() {
    let (ws, _, pid) = setup();
    let a = task(&ws, pid, "a");
    let b = task(&ws, pid, "b");
    let removed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&removed);
    ws.subscribe(move |event| {
        if let StoreEvent::TaskRemoved { task_id, .. } = event {
            sink.lock().push(*task_id);
        }
    });
    ws.delete_project(pid, DeleteOptions { cascade: true })
        .unwrap();
    assert_eq!(*removed.lock(), vec![a, b]);
    assert!(ws.project(pid).is_err());
    assert!(ws.tasks().is_empty());
}

#[test]
fn views_agree_on_one_snapshot() {
    let (ws, _, pid) = setup();
    for (title, status) in [
        ("alpha", Status::InProgress),
        ("beta", Status::NotStarted),
        ("gamma", Status::InProgress),
    ] {
        let id = task(&ws, pid, title);
        ws.set_task_status(id, status).unwrap();
    }
    let snap = ws.snapshot();
    let filter = TaskFilter {
        status: Some(Status::InProgress),
        ..Default::default()
    };
    let table = view::sort_tasks(view::filter_tasks(&snap.tasks, &filter), SortKey::Title);
    let board = view::group_by_status(&snap.tasks);
    assert_eq!(table.len(), board[&Status::InProgress].len());
    assert_eq!(table[0].title, "alpha");
    let stats = ws.dashboard();
    assert_eq!(stats.status_counts[&Status::InProgress], 2);
    assert_eq!(stats.pending_tasks, 3);
}
