//! Read-side projections for the table, board and dashboard.
//!
//! These functions never mutate anything and keep no cache: callers pass the
//! slices of one snapshot and get presentation-ready views back. The table
//! and the board both group through [`group_by_status`], so they cannot
//! disagree about which column a task belongs in.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;

use crate::fields::{Priority, ProjectSortKey, ProjectStatus, SortKey, Status};
use crate::project::{Project, ProjectId};
use crate::task::Task;

/// Window of the dashboard's completions chart, in days.
pub const COMPLETION_WINDOW_DAYS: u32 = 7;

/// Task list filter. Absent fields pass everything through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Case-insensitive substring of the title or description.
    pub search: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub project_id: Option<ProjectId>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(s) = self.status {
            if task.status != s {
                return false;
            }
        }
        if let Some(p) = self.priority {
            if task.priority != p {
                return false;
            }
        }
        if let Some(pid) = self.project_id {
            if task.project_id != pid {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                task.title.to_lowercase().contains(&needle)
                    || task
                        .description
                        .as_ref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            }
        }
    }
}

/// Project list filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectFilter {
    /// Case-insensitive substring of the name, description or any tag.
    pub search: Option<String>,
    pub status: Option<ProjectStatus>,
}

impl ProjectFilter {
    pub fn matches(&self, project: &Project) -> bool {
        if self.status.is_some_and(|s| project.status != s) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                project.name.to_lowercase().contains(&needle)
                    || project
                        .description
                        .as_ref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
                    || project
                        .tags
                        .iter()
                        .any(|t| t.to_lowercase().contains(&needle))
            }
        }
    }
}

pub fn filter_projects<'a>(projects: &'a [Project], filter: &ProjectFilter) -> Vec<&'a Project> {
    projects.iter().filter(|p| filter.matches(p)).collect()
}

/// Stable sort of a project list. `Name` ascends; the others put the
/// largest or most recent first.
pub fn sort_projects(mut projects: Vec<&Project>, key: ProjectSortKey) -> Vec<&Project> {
    match key {
        ProjectSortKey::Name => projects.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        }),
        ProjectSortKey::Progress => projects.sort_by(|a, b| b.progress.cmp(&a.progress)),
        ProjectSortKey::UpdatedAt => projects.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
        ProjectSortKey::CreatedAt => projects.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }
    projects
}

pub fn filter_tasks<'a>(tasks: &'a [Task], filter: &TaskFilter) -> Vec<&'a Task> {
    tasks.iter().filter(|t| filter.matches(t)).collect()
}

fn by_due_date(a: &Task, b: &Task) -> Ordering {
    match (a.due_date, b.due_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort; ties keep their incoming order.
///
/// - `Title`: alphabetical, ignoring case first.
/// - `Priority`: `Urgent` first down to `Low`.
/// - `CreatedAt`: newest first.
/// - `DueDate`: earliest first, undated tasks last.
pub fn sort_tasks(mut tasks: Vec<&Task>, key: SortKey) -> Vec<&Task> {
    match key {
        SortKey::Title => tasks.sort_by(|a, b| {
            a.title
                .to_lowercase()
                .cmp(&b.title.to_lowercase())
                .then_with(|| a.title.cmp(&b.title))
        }),
        SortKey::Priority => tasks.sort_by(|a, b| b.priority.cmp(&a.priority)),
        SortKey::CreatedAt => tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortKey::DueDate => tasks.sort_by(|a, b| by_due_date(a, b)),
    }
    tasks
}

/// Tasks per status, every status present, incoming order kept in each
/// column.
pub fn group_by_status<'a, I>(tasks: I) -> BTreeMap<Status, Vec<&'a Task>>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut columns: BTreeMap<Status, Vec<&Task>> =
        Status::ALL.iter().map(|s| (*s, Vec::new())).collect();
    for task in tasks {
        columns.entry(task.status).or_default().push(task);
    }
    columns
}

/// Headline numbers for the dashboard, all from one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_projects: usize,
    pub completed_tasks: usize,
    pub pending_tasks: usize,
    pub overdue_tasks: usize,
    pub status_counts: BTreeMap<Status, usize>,
    /// Completed tasks per UTC day over the last week, oldest day first.
    pub completions_by_day: Vec<(NaiveDate, usize)>,
}

pub fn dashboard_stats(projects: &[Project], tasks: &[Task], now: DateTime<Utc>) -> DashboardStats {
    let completed_tasks = tasks.iter().filter(|t| t.status.is_completed()).count();
    let status_counts = group_by_status(tasks)
        .into_iter()
        .map(|(status, column)| (status, column.len()))
        .collect();
    DashboardStats {
        total_projects: projects.len(),
        completed_tasks,
        pending_tasks: tasks.len() - completed_tasks,
        overdue_tasks: tasks.iter().filter(|t| t.is_overdue(now)).count(),
        status_counts,
        completions_by_day: completions_by_day(tasks, now, COMPLETION_WINDOW_DAYS),
    }
}

/// Completed tasks per day for the `days` days ending today, oldest first.
/// A task counts on the UTC day of its `completed_at`; tasks that were
/// reopened carry no timestamp and drop out.
pub fn completions_by_day(tasks: &[Task], now: DateTime<Utc>, days: u32) -> Vec<(NaiveDate, usize)> {
    let today = now.date_naive();
    let mut counts: BTreeMap<NaiveDate, usize> = (0..days)
        .map_while(|back| today.checked_sub_days(Days::new(u64::from(back))))
        .map(|day| (day, 0))
        .collect();
    let completed_days = tasks
        .iter()
        .filter(|t| t.status.is_completed())
        .filter_map(|t| t.completed_at)
        .map(|at| at.date_naive());
    for day in completed_days {
        if let Some(count) = counts.get_mut(&day) {
            *count += 1;
        }
    }
    counts.into_iter().collect()
}

pub fn overdue(tasks: &[Task], now: DateTime<Utc>) -> Vec<&Task> {
    tasks.iter().filter(|t| t.is_overdue(now)).collect()
}

/// Open tasks due between today and `days` days from today, inclusive.
pub fn due_soon(tasks: &[Task], now: DateTime<Utc>, days: u32) -> Vec<&Task> {
    let today = now.date_naive();
    let horizon = today
        .checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX);
    tasks
        .iter()
        .filter(|t| !t.status.is_completed())
        .filter(|t| t.due_date.is_some_and(|d| d >= today && d <= horizon))
        .collect()
}
