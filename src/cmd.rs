//! Command implementations for the CLI interface.
//!
//! Each invocation loads the workspace file once, applies at most one
//! workspace operation and saves once if that operation succeeded. With
//! `--json` every command prints the `Outcome` envelope instead of a table.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use clap::Subcommand;
use clap_complete::{generate, Shell};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use worksync::clock::SystemClock;
use worksync::config::Config;
use worksync::db::{self, parse_due_input, StorageError};
use worksync::fields::{Priority, ProjectSortKey, ProjectStatus, Role, SortKey, Status};
use worksync::notify::{AddressDirectory, LogMailer, Notifier};
use worksync::project::{NewProject, Project, ProjectId, UserId};
use worksync::project_store::DeleteOptions;
use worksync::task::{NewTask, Task, TaskId, TaskPatch};
use worksync::view::{self, DashboardStats, ProjectFilter, TaskFilter};
use worksync::{Outcome, Workspace, WorkSyncError};

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Store(#[from] WorkSyncError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("invalid due date '{0}': use YYYY-MM-DD, today, tomorrow, a weekday or \"in Nd\"")]
    DueDate(String),

    #[error("no acting user: pass --as <user> or set WORKSYNC_USER")]
    NoUser,

    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage projects.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Add a new task.
    Add {
        /// Short title for the task.
        title: String,
        /// Project ID the task belongs to.
        #[arg(long)]
        project: u64,
        /// Optional longer description.
        #[arg(long)]
        desc: Option<String>,
        /// Priority: low | medium | high | urgent. Defaults to medium.
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// User to assign the task to.
        #[arg(long)]
        assign: Option<String>,
        /// Due date: YYYY-MM-DD, "today", "tomorrow", a weekday, or "in Nd".
        #[arg(long)]
        due: Option<String>,
        /// Estimated effort in hours.
        #[arg(long)]
        estimate: Option<f64>,
        /// ID of a task that must be done first. May be repeated.
        #[arg(long = "depends-on")]
        depends_on: Vec<u64>,
        /// Comma-separated tags. May be repeated.
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// List tasks with optional filters.
    List {
        /// Case-insensitive text to look for in title or description.
        #[arg(long)]
        search: Option<String>,
        /// Filter by status.
        #[arg(long, value_enum)]
        status: Option<Status>,
        /// Filter by priority.
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// Filter by project ID.
        #[arg(long)]
        project: Option<u64>,
        /// Sort key.
        #[arg(long, value_enum, default_value_t = SortKey::DueDate)]
        sort: SortKey,
        /// Limit number of rows printed.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show tasks as status columns.
    Board {
        /// Only tasks of this project.
        #[arg(long)]
        project: Option<u64>,
    },

    /// View a single task.
    View { id: u64 },

    /// Update an existing task's fields.
    Update {
        id: u64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "clear_desc")]
        desc: Option<String>,
        #[arg(long)]
        clear_desc: bool,
        /// Move the task to another project.
        #[arg(long)]
        project: Option<u64>,
        #[arg(long, value_enum)]
        status: Option<Status>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        #[arg(long, conflicts_with = "unassign")]
        assign: Option<String>,
        #[arg(long)]
        unassign: bool,
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,
        #[arg(long)]
        clear_due: bool,
        /// Estimated effort in hours.
        #[arg(long)]
        estimate: Option<f64>,
        /// Hours actually spent, as reported.
        #[arg(long)]
        actual: Option<f64>,
        /// Replace the dependency list. May be repeated.
        #[arg(long = "depends-on", conflicts_with = "clear_deps")]
        depends_on: Vec<u64>,
        #[arg(long)]
        clear_deps: bool,
        /// Replace the tag list. Comma-separated, may be repeated.
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Move a task to another status column.
    Move {
        id: u64,
        #[arg(value_enum)]
        status: Status,
    },

    /// Mark a task as completed.
    Done { id: u64 },

    /// Move a completed task back to not started.
    Reopen { id: u64 },

    /// Delete a task.
    Delete { id: u64 },

    /// Manage a task's checklist.
    Check {
        #[command(subcommand)]
        action: CheckAction,
    },

    /// Track time spent on a task.
    Timer {
        #[command(subcommand)]
        action: TimerAction,
    },

    /// Add a comment to a task.
    Comment { id: u64, text: String },

    /// Dashboard numbers for the whole workspace.
    Stats,

    /// Open tasks due within the next few days.
    DueSoon {
        /// Horizon in days; defaults to the configured value.
        #[arg(long)]
        days: Option<u32>,
        /// Email a reminder to each assignee with a resolvable address.
        #[arg(long)]
        notify: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ProjectAction {
    /// Create a project owned by the acting user.
    Add {
        name: String,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Start date; defaults to today.
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    /// List projects with their progress.
    List {
        /// Case-insensitive text to look for in name, description or tags.
        #[arg(long)]
        search: Option<String>,
        #[arg(long, value_enum)]
        status: Option<ProjectStatus>,
        #[arg(long, value_enum, default_value_t = ProjectSortKey::CreatedAt)]
        sort: ProjectSortKey,
    },
    /// Show a project, its team and task counts.
    Show { id: u64 },
    /// Change a project's status.
    Status {
        id: u64,
        #[arg(value_enum)]
        status: ProjectStatus,
    },
    /// Delete a project.
    Delete {
        id: u64,
        /// Also delete the project's tasks.
        #[arg(long)]
        cascade: bool,
    },
    /// Manage team members.
    Member {
        #[command(subcommand)]
        action: MemberAction,
    },
    /// Check whether a user holds at least a role on a project.
    Access {
        id: u64,
        user: String,
        #[arg(value_enum)]
        role: Role,
    },
}

#[derive(Subcommand)]
pub enum MemberAction {
    /// Add a member, or change the role of an existing one.
    Add {
        project: u64,
        user: String,
        #[arg(long, value_enum, default_value_t = Role::Viewer)]
        role: Role,
    },
    /// Remove a member.
    Rm { project: u64, user: String },
}

#[derive(Subcommand)]
pub enum CheckAction {
    /// Append a checklist item.
    Add { id: u64, item: String },
    /// Flip a checklist item by its zero-based index.
    Toggle { id: u64, index: usize },
}

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a time log for the acting user.
    Start {
        id: u64,
        #[arg(long)]
        note: Option<String>,
    },
    /// Stop the acting user's running time log.
    Stop { id: u64 },
}

/// One CLI invocation's view of the workspace.
pub struct Session {
    ws: Workspace,
    config: Config,
    user: Option<UserId>,
}

impl Session {
    pub fn open(config: Config, user: Option<String>) -> Result<Self, CliError> {
        let snapshot = db::load(&config.db_path)?;
        let ws = Workspace::from_snapshot(snapshot, Arc::new(SystemClock))?;
        let notifier = Notifier::new(LogMailer, AddressDirectory, config.base_url.clone());
        Notifier::attach(Arc::new(notifier), &ws);
        debug!(path = %config.db_path.display(), "workspace opened");
        Ok(Session {
            ws,
            config,
            user: user
                .map(UserId::from)
                .filter(|u| !u.is_blank()),
        })
    }

    fn user(&self) -> Result<UserId, CliError> {
        self.user.clone().ok_or(CliError::NoUser)
    }

    fn today(&self) -> NaiveDate {
        self.ws.now().date_naive()
    }

    fn due(&self, input: Option<&str>) -> Result<Option<NaiveDate>, CliError> {
        input
            .map(|s| parse_due_input(s, self.today()).ok_or_else(|| CliError::DueDate(s.to_string())))
            .transpose()
    }

    /// Save only when the operation went through.
    fn commit<T>(&self, result: &worksync::Result<T>) -> Result<(), CliError> {
        if result.is_ok() {
            db::save(&self.ws.snapshot(), &self.config.db_path)?;
        }
        Ok(())
    }

    fn emit<T: Serialize>(
        &self,
        result: worksync::Result<T>,
        human: impl FnOnce(&T),
    ) -> Result<(), CliError> {
        if self.config.json {
            let failure = result.as_ref().err().cloned();
            println!("{}", serde_json::to_string_pretty(&Outcome::from(result))?);
            return match failure {
                Some(err) => Err(err.into()),
                None => Ok(()),
            };
        }
        let value = result?;
        human(&value);
        Ok(())
    }

    fn project_name(&self, id: ProjectId) -> String {
        self.ws
            .project(id)
            .map(|p| p.name)
            .unwrap_or_else(|_| "-".into())
    }
}

pub fn run(session: &Session, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Project { action } => cmd_project(session, action),
        Commands::Add {
            title,
            project,
            desc,
            priority,
            assign,
            due,
            estimate,
            depends_on,
            tags,
        } => {
            let input = NewTask {
                title,
                description: desc,
                project_id: Some(ProjectId(project)),
                priority,
                assigned_to: assign.map(UserId::from),
                created_by: session.user()?,
                due_date: session.due(due.as_deref())?,
                estimated_hours: estimate,
                dependencies: depends_on.into_iter().map(TaskId).collect(),
                tags,
            };
            cmd_add(session, input)
        }
        Commands::List {
            search,
            status,
            priority,
            project,
            sort,
            limit,
        } => {
            let filter = TaskFilter {
                search,
                status,
                priority,
                project_id: project.map(ProjectId),
            };
            cmd_list(session, &filter, sort, limit)
        }
        Commands::Board { project } => cmd_board(session, project.map(ProjectId)),
        Commands::View { id } => cmd_view(session, TaskId(id)),
        Commands::Update {
            id,
            title,
            desc,
            clear_desc,
            project,
            status,
            priority,
            assign,
            unassign,
            due,
            clear_due,
            estimate,
            actual,
            depends_on,
            clear_deps,
            tags,
        } => {
            let patch = TaskPatch {
                title,
                description: if clear_desc { Some(None) } else { desc.map(Some) },
                project_id: project.map(ProjectId),
                status,
                priority,
                assigned_to: if unassign {
                    Some(None)
                } else {
                    assign.map(|u| Some(UserId::from(u)))
                },
                due_date: if clear_due {
                    Some(None)
                } else {
                    session.due(due.as_deref())?.map(Some)
                },
                estimated_hours: estimate.map(Some),
                actual_hours: actual.map(Some),
                dependencies: if clear_deps {
                    Some(Vec::new())
                } else {
                    (!depends_on.is_empty()).then(|| depends_on.into_iter().map(TaskId).collect())
                },
                tags: (!tags.is_empty()).then_some(tags),
            };
            cmd_update(session, TaskId(id), patch)
        }
        Commands::Move { id, status } => cmd_set_status(session, TaskId(id), status),
        Commands::Done { id } => cmd_set_status(session, TaskId(id), Status::Completed),
        Commands::Reopen { id } => cmd_set_status(session, TaskId(id), Status::NotStarted),
        Commands::Delete { id } => cmd_delete(session, TaskId(id)),
        Commands::Check { action } => cmd_check(session, action),
        Commands::Timer { action } => cmd_timer(session, action),
        Commands::Comment { id, text } => cmd_comment(session, TaskId(id), &text),
        Commands::Stats => cmd_stats(session),
        Commands::DueSoon { days, notify } => cmd_due_soon(session, days, notify),
        Commands::Completions { shell } => {
            cmd_completions(shell);
            Ok(())
        }
    }
}

pub fn cmd_add(session: &Session, input: NewTask) -> Result<(), CliError> {
    let result = session.ws.create_task(input);
    session.commit(&result)?;
    session.emit(result, |t| println!("Added task {}: {}", t.id, t.title))
}

pub fn cmd_list(
    session: &Session,
    filter: &TaskFilter,
    sort: SortKey,
    limit: Option<usize>,
) -> Result<(), CliError> {
    let snapshot = session.ws.snapshot();
    let mut rows = view::sort_tasks(view::filter_tasks(&snapshot.tasks, filter), sort);
    if let Some(n) = limit {
        rows.truncate(n);
    }
    let names = |id: ProjectId| {
        snapshot
            .project(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "-".into())
    };
    let today = session.today();
    session.emit(Ok(rows), |rows| print_table(rows, names, today))
}

pub fn cmd_board(session: &Session, project: Option<ProjectId>) -> Result<(), CliError> {
    let snapshot = session.ws.snapshot();
    let filter = TaskFilter {
        project_id: project,
        ..Default::default()
    };
    let tasks = view::filter_tasks(&snapshot.tasks, &filter);
    let columns = view::group_by_status(tasks);
    let today = session.today();
    session.emit(Ok(&columns), |columns| {
        for (status, tasks) in columns.iter() {
            println!("{} ({})", status.label().to_uppercase(), tasks.len());
            for t in tasks {
                println!(
                    "  #{:<4} {:<8} {:<10} {}",
                    t.id,
                    t.priority.label(),
                    format_due_relative(t.due_date, today),
                    t.title
                );
            }
            println!();
        }
    })
}

pub fn cmd_view(session: &Session, id: TaskId) -> Result<(), CliError> {
    let result = session.ws.task(id);
    let today = session.today();
    session.emit(result, |task| {
        println!("ID:           {}", task.id);
        println!("Title:        {}", task.title);
        println!("Status:       {}", task.status.label());
        println!("Priority:     {}", task.priority.label());
        println!(
            "Project:      {} (#{})",
            session.project_name(task.project_id),
            task.project_id
        );
        println!(
            "Assigned to:  {}",
            task.assigned_to.as_ref().map_or("-", |u| u.as_str())
        );
        println!("Created by:   {}", task.created_by);
        println!(
            "Due:          {}",
            match task.due_date {
                Some(d) => format!("{d} ({})", format_due_relative(Some(d), today)),
                None => "-".into(),
            }
        );
        println!(
            "Tags:         {}",
            if task.tags.is_empty() {
                "-".into()
            } else {
                task.tags.join(",")
            }
        );
        println!("Created UTC:  {}", task.created_at.to_rfc3339());
        println!("Updated UTC:  {}", task.updated_at.to_rfc3339());
        if let Some(at) = task.completed_at {
            println!("Completed:    {}", at.to_rfc3339());
        }
        println!("Time spent:   {}", format_duration(task.total_time_spent()));
        println!(
            "Hours:        {} estimated, {} reported",
            format_hours(task.estimated_hours),
            format_hours(task.actual_hours)
        );
        if !task.dependencies.is_empty() {
            let deps: Vec<String> = task.dependencies.iter().map(|d| format!("#{d}")).collect();
            println!("Depends on:   {}", deps.join(", "));
        }
        println!(
            "Description:\n{}\n",
            task.description.as_deref().unwrap_or("-")
        );

        if !task.checklist.is_empty() {
            println!("Checklist ({}% done):", task.checklist_completion());
            for (i, c) in task.checklist.iter().enumerate() {
                println!("  {i}. [{}] {}", if c.completed { "x" } else { " " }, c.item);
            }
        }
        if !task.time_logs.is_empty() {
            println!("Time logs:");
            for log in &task.time_logs {
                let span = match log.duration() {
                    Some(d) => format_duration(d),
                    None => "running".into(),
                };
                println!(
                    "  {} {} {}{}",
                    log.user_id,
                    log.start_time.to_rfc3339(),
                    span,
                    log.description
                        .as_deref()
                        .map(|d| format!(" ({d})"))
                        .unwrap_or_default()
                );
            }
        }
        if !task.comments.is_empty() {
            println!("Comments:");
            for c in &task.comments {
                println!("  [{}] {}: {}", c.created_at.to_rfc3339(), c.user_id, c.content);
            }
        }
    })
}

pub fn cmd_update(session: &Session, id: TaskId, patch: TaskPatch) -> Result<(), CliError> {
    let result = session.ws.update_task(id, patch);
    session.commit(&result)?;
    session.emit(result, |t| println!("Updated {}", t.id))
}

pub fn cmd_set_status(session: &Session, id: TaskId, status: Status) -> Result<(), CliError> {
    let result = session.ws.set_task_status(id, status);
    session.commit(&result)?;
    session.emit(result, |t| println!("Task {} is now {}", t.id, t.status.label()))
}

pub fn cmd_delete(session: &Session, id: TaskId) -> Result<(), CliError> {
    let result = session.ws.delete_task(id);
    session.commit(&result)?;
    session.emit(result, |t| println!("Deleted task {}: {}", t.id, t.title))
}

pub fn cmd_check(session: &Session, action: CheckAction) -> Result<(), CliError> {
    match action {
        CheckAction::Add { id, item } => {
            let result = session.ws.add_checklist_item(TaskId(id), &item);
            session.commit(&result)?;
            session.emit(result, |t| {
                println!(
                    "Added checklist item {} to task {}",
                    t.checklist.len().saturating_sub(1),
                    t.id
                )
            })
        }
        CheckAction::Toggle { id, index } => {
            let result = session.ws.toggle_checklist_item(TaskId(id), index);
            session.commit(&result)?;
            session.emit(result, |c| {
                println!(
                    "[{}] {}",
                    if c.completed { "x" } else { " " },
                    c.item
                )
            })
        }
    }
}

pub fn cmd_timer(session: &Session, action: TimerAction) -> Result<(), CliError> {
    let user = session.user()?;
    match action {
        TimerAction::Start { id, note } => {
            let result = session.ws.start_time_log(TaskId(id), &user, note);
            session.commit(&result)?;
            session.emit(result, |log| {
                println!("Timer started for {} at {}", log.user_id, log.start_time.to_rfc3339())
            })
        }
        TimerAction::Stop { id } => {
            let result = session.ws.stop_time_log(TaskId(id), &user);
            session.commit(&result)?;
            session.emit(result, |log| {
                let spent = log.duration().unwrap_or_else(Duration::zero);
                println!("Timer stopped after {}", format_duration(spent))
            })
        }
    }
}

pub fn cmd_comment(session: &Session, id: TaskId, text: &str) -> Result<(), CliError> {
    let user = session.user()?;
    let result = session.ws.add_comment(id, &user, text);
    session.commit(&result)?;
    session.emit(result, |_| println!("Comment added to task {id}"))
}

pub fn cmd_stats(session: &Session) -> Result<(), CliError> {
    let stats: DashboardStats = session.ws.dashboard();
    session.emit(Ok(stats), |s| {
        println!("Projects:       {}", s.total_projects);
        println!("Completed:      {}", s.completed_tasks);
        println!("Pending:        {}", s.pending_tasks);
        println!("Overdue:        {}", s.overdue_tasks);
        for (status, count) in &s.status_counts {
            println!("  {:<12} {}", status.label(), count);
        }
        println!("Completed per day:");
        for (day, count) in &s.completions_by_day {
            println!("  {} {:>3} {}", day.format("%a %m-%d"), count, "#".repeat(*count));
        }
    })
}

pub fn cmd_due_soon(session: &Session, days: Option<u32>, notify: bool) -> Result<(), CliError> {
    let days = days.unwrap_or(session.config.due_soon_days);
    let snapshot = session.ws.snapshot();
    let now = session.ws.now();
    if notify {
        let notifier = Notifier::new(LogMailer, AddressDirectory, session.config.base_url.clone());
        let sent = notifier.due_soon_reminders(&snapshot, now, days);
        return session.emit(Ok(sent), |n| println!("Sent {n} reminder(s)"));
    }
    let rows = view::due_soon(&snapshot.tasks, now, days);
    let names = |id: ProjectId| {
        snapshot
            .project(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "-".into())
    };
    let today = session.today();
    session.emit(Ok(rows), |rows| print_table(rows, names, today))
}

pub fn cmd_project(session: &Session, action: ProjectAction) -> Result<(), CliError> {
    match action {
        ProjectAction::Add {
            name,
            desc,
            tags,
            start,
            end,
        } => {
            let input = NewProject {
                name,
                description: desc,
                owner: session.user()?,
                tags,
                start_date: session.due(start.as_deref())?,
                end_date: session.due(end.as_deref())?,
            };
            let result = session.ws.create_project(input);
            session.commit(&result)?;
            session.emit(result, |p| println!("Added project {}: {}", p.id, p.name))
        }
        ProjectAction::List {
            search,
            status,
            sort,
        } => {
            let projects = session.ws.projects();
            let filter = ProjectFilter { search, status };
            let rows = view::sort_projects(view::filter_projects(&projects, &filter), sort);
            session.emit(Ok(rows), |rows| print_projects(rows))
        }
        ProjectAction::Show { id } => {
            let id = ProjectId(id);
            let result = session.ws.project(id);
            let snapshot = session.ws.snapshot();
            session.emit(result, |p| {
                println!("ID:           {}", p.id);
                println!("Name:         {}", p.name);
                println!("Status:       {}", p.status.label());
                println!("Owner:        {}", p.owner);
                if let Some(user) = &session.user {
                    println!(
                        "Your role:    {}",
                        p.role_of(user).map_or("none", |r| r.label())
                    );
                }
                println!("Progress:     {}%", p.progress);
                println!("Start:        {}", p.start_date);
                println!(
                    "End:          {}",
                    p.end_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into())
                );
                println!(
                    "Tags:         {}",
                    if p.tags.is_empty() {
                        "-".into()
                    } else {
                        p.tags.join(",")
                    }
                );
                println!(
                    "Description:\n{}\n",
                    p.description.as_deref().unwrap_or("-")
                );
                println!("Team:");
                if p.team.is_empty() {
                    println!("  -");
                }
                for m in &p.team {
                    println!("  {:<20} {}", m.user_id, m.role.label());
                }
                let filter = TaskFilter {
                    project_id: Some(id),
                    ..Default::default()
                };
                println!("Tasks:");
                for (status, tasks) in view::group_by_status(view::filter_tasks(&snapshot.tasks, &filter)) {
                    println!("  {:<12} {}", status.label(), tasks.len());
                }
            })
        }
        ProjectAction::Status { id, status } => {
            let result = session.ws.set_project_status(ProjectId(id), status);
            session.commit(&result)?;
            session.emit(result, |p| println!("Project {} is now {}", p.id, p.status.label()))
        }
        ProjectAction::Delete { id, cascade } => {
            let result = session
                .ws
                .delete_project(ProjectId(id), DeleteOptions { cascade });
            session.commit(&result)?;
            session.emit(result, |p| println!("Deleted project {}: {}", p.id, p.name))
        }
        ProjectAction::Member { action } => match action {
            MemberAction::Add {
                project,
                user,
                role,
            } => {
                let result = session
                    .ws
                    .add_team_member(ProjectId(project), &UserId::from(user), role);
                session.commit(&result)?;
                session.emit(result, |p| println!("Team of {} now has {} member(s)", p.name, p.team.len()))
            }
            MemberAction::Rm { project, user } => {
                let result = session
                    .ws
                    .remove_team_member(ProjectId(project), &UserId::from(user));
                session.commit(&result)?;
                session.emit(result, |p| println!("Team of {} now has {} member(s)", p.name, p.team.len()))
            }
        },
        ProjectAction::Access { id, user, role } => {
            let result = session
                .ws
                .has_access(ProjectId(id), &UserId::from(user.as_str()), role);
            session.emit(result, |ok| {
                println!(
                    "{user} {} {} access",
                    if *ok { "has" } else { "lacks" },
                    role.label()
                )
            })
        }
    }
}

pub fn cmd_completions(shell: Shell) {
    use crate::cli::Cli;
    use clap::CommandFactory;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}

pub fn print_table(tasks: &[&Task], project_name: impl Fn(ProjectId) -> String, today: NaiveDate) {
    println!(
        "{:<5} {:<12} {:<7} {:<10} {:<14} {}",
        "ID", "Status", "Pri", "Due", "Project", "Title [tags]"
    );
    for t in tasks {
        let tags = if t.tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", t.tags.join(","))
        };
        println!(
            "{:<5} {:<12} {:<7} {:<10} {:<14} {}{}",
            t.id,
            t.status.label(),
            t.priority.label(),
            format_due_relative(t.due_date, today),
            truncate(&project_name(t.project_id), 14),
            t.title,
            tags
        );
    }
}

pub fn print_projects(projects: &[&Project]) {
    println!(
        "{:<5} {:<10} {:>4} {:<14} {}",
        "ID", "Status", "Done", "Owner", "Name"
    );
    for p in projects {
        println!(
            "{:<5} {:<10} {:>3}% {:<14} {}",
            p.id,
            p.status.label(),
            p.progress,
            truncate(p.owner.as_str(), 14),
            p.name
        );
    }
}

pub fn format_due_relative(due: Option<NaiveDate>, today: NaiveDate) -> String {
    match due {
        None => "-".into(),
        Some(d) => match (d - today).num_days() {
            0 => "today".into(),
            1 => "tomorrow".into(),
            n if n > 1 => format!("in {n}d"),
            n => format!("{}d late", -n),
        },
    }
}

pub fn format_hours(hours: Option<f64>) -> String {
    match hours {
        Some(h) => format!("{h:.1}h"),
        None => "-".into(),
    }
}

pub fn format_duration(d: Duration) -> String {
    let minutes = d.num_minutes().max(0);
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}

pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_due_relative() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let d = |day| NaiveDate::from_ymd_opt(2026, 3, day);
        assert_eq!(format_due_relative(None, today), "-");
        assert_eq!(format_due_relative(d(10), today), "today");
        assert_eq!(format_due_relative(d(11), today), "tomorrow");
        assert_eq!(format_due_relative(d(15), today), "in 5d");
        assert_eq!(format_due_relative(d(8), today), "2d late");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 14), "short");
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("ééééé", 3), "éé…");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::minutes(125)), "2h 05m");
        assert_eq!(format_duration(Duration::seconds(59)), "0h 00m");
        assert_eq!(format_hours(Some(2.5)), "2.5h");
        assert_eq!(format_hours(None), "-");
    }

    #[test]
    fn test_session_round_trip_through_file() {
        let dir = std::env::temp_dir().join(format!("worksync-cmd-{}", std::process::id()));
        let config = Config {
            db_path: dir.join("workspace.json"),
            log_filter: "warn".into(),
            due_soon_days: 3,
            base_url: "http://localhost".into(),
            json: true,
        };
        let session = Session::open(config.clone(), Some("olga".into())).unwrap();
        cmd_project(
            &session,
            ProjectAction::Add {
                name: "Ops".into(),
                desc: None,
                tags: vec![],
                start: None,
                end: None,
            },
        )
        .unwrap();
        let patch = NewTask {
            title: "Patch".into(),
            project_id: Some(ProjectId(1)),
            created_by: session.user().unwrap(),
            due_date: session.due(Some("tomorrow")).unwrap(),
            ..Default::default()
        };
        cmd_add(&session, patch).unwrap();
        cmd_set_status(&session, TaskId(1), Status::Completed).unwrap();
        assert!(matches!(
            session.due(Some("in 100000000d")),
            Err(CliError::DueDate(_))
        ));

        let reopened = Session::open(config.clone(), None).unwrap();
        assert_eq!(reopened.ws.project(ProjectId(1)).unwrap().progress, 100);
        assert!(matches!(
            cmd_comment(&reopened, TaskId(1), "hi"),
            Err(CliError::NoUser)
        ));
        assert!(matches!(
            cmd_delete(&reopened, TaskId(9)),
            Err(CliError::Store(WorkSyncError::NotFound { .. }))
        ));

        // A deleted id stays retired across reloads.
        let spare = NewTask {
            title: "Spare".into(),
            project_id: Some(ProjectId(1)),
            created_by: session.user().unwrap(),
            ..Default::default()
        };
        cmd_add(&session, spare.clone()).unwrap();
        cmd_delete(&session, TaskId(2)).unwrap();
        let again = Session::open(config.clone(), Some("olga".into())).unwrap();
        cmd_add(&again, spare).unwrap();
        assert!(again.ws.task(TaskId(2)).is_err());
        assert!(again.ws.task(TaskId(3)).is_ok());
        let _ = std::fs::remove_dir_all(dir);
    }
}
