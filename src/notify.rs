//! Email notifications for assignment, due-date and invitation events.
//!
//! The notifier only renders messages and hands them to a [`Mailer`]. No
//! real transport lives here; the command line uses [`LogMailer`] and tests
//! use [`MemoryMailer`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::event::StoreEvent;
use crate::project::{ProjectId, UserId};
use crate::task::TaskId;
use crate::view;
use crate::workspace::{Snapshot, Workspace};

const FOOTER: &str = "<hr style=\"margin: 30px 0; border: none; border-top: 1px solid #e5e7eb;\">\
<p style=\"color: #6b7280; font-size: 14px;\">Best regards,<br>The WorkSync Team</p>";

/// Something worth an email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    TaskAssigned {
        to: String,
        assigner: Option<String>,
        task_title: String,
        project_name: String,
        task_url: String,
    },
    TaskDueSoon {
        to: String,
        task_title: String,
        project_name: String,
        due_date: NaiveDate,
        task_url: String,
    },
    ProjectInvite {
        to: String,
        inviter: String,
        project_name: String,
        invite_url: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn button(url: &str, colour: &str, label: &str) -> String {
    format!(
        "<div style=\"text-align: center; margin: 30px 0;\"><a href=\"{}\" \
style=\"background-color: {colour}; color: white; padding: 12px 24px; text-decoration: none; \
border-radius: 6px; display: inline-block;\">{label}</a></div>",
        escape_html(url)
    )
}

fn frame(body: String) -> String {
    format!(
        "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">{body}{FOOTER}</div>"
    )
}

/// Build the message for a trigger. Subjects carry raw titles; the HTML body
/// escapes every interpolated value.
pub fn render(trigger: &Trigger) -> EmailMessage {
    match trigger {
        Trigger::TaskAssigned {
            to,
            assigner,
            task_title,
            project_name,
            task_url,
        } => {
            let title = escape_html(task_title);
            let project = escape_html(project_name);
            let lead = match assigner {
                Some(name) => format!("{} has assigned you", escape_html(name)),
                None => "You have been assigned".to_string(),
            };
            let body = format!(
                "<h2 style=\"color: #7c3aed;\">Task Assignment</h2>\
<p>{lead} a new task in the project <strong>\"{project}\"</strong>.</p>\
<div style=\"background-color: #f3f4f6; padding: 20px; border-radius: 8px; margin: 20px 0;\">\
<h3 style=\"margin: 0 0 10px 0; color: #374151;\">Task: {title}</h3>\
<p style=\"margin: 0; color: #6b7280;\">Project: {project}</p></div>\
<p>Click the button below to view the task details:</p>{}",
                button(task_url, "#7c3aed", "View Task")
            );
            EmailMessage {
                to: to.clone(),
                subject: format!("You've been assigned a task: \"{task_title}\""),
                html: frame(body),
            }
        }
        Trigger::TaskDueSoon {
            to,
            task_title,
            project_name,
            due_date,
            task_url,
        } => {
            let body = format!(
                "<h2 style=\"color: #d97706;\">Task Due Reminder</h2>\
<p>This is a friendly reminder that you have a task due soon.</p>\
<div style=\"background-color: #fef3c7; padding: 20px; border-radius: 8px; margin: 20px 0; border-left: 4px solid #d97706;\">\
<h3 style=\"margin: 0 0 10px 0; color: #92400e;\">Task: {}</h3>\
<p style=\"margin: 5px 0; color: #92400e;\"><strong>Project:</strong> {}</p>\
<p style=\"margin: 5px 0; color: #92400e;\"><strong>Due Date:</strong> {}</p></div>\
<p>Click the button below to view and update the task:</p>{}",
                escape_html(task_title),
                escape_html(project_name),
                due_date.format("%Y-%m-%d"),
                button(task_url, "#d97706", "View Task")
            );
            EmailMessage {
                to: to.clone(),
                subject: format!("Reminder: Task \"{task_title}\" is due soon"),
                html: frame(body),
            }
        }
        Trigger::ProjectInvite {
            to,
            inviter,
            project_name,
            invite_url,
        } => {
            let body = format!(
                "<h2 style=\"color: #059669;\">Project Invitation</h2>\
<p>{} has invited you to join the project <strong>\"{}\"</strong> on WorkSync.</p>\
<p>Click the button below to accept the invitation:</p>{}\
<p>You'll be able to collaborate on tasks, share updates, and track progress together.</p>",
                escape_html(inviter),
                escape_html(project_name),
                button(invite_url, "#059669", "Accept Invitation")
            );
            EmailMessage {
                to: to.clone(),
                subject: format!("You've been invited to join \"{project_name}\" on WorkSync"),
                html: frame(body),
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailError {
    #[error("mail transport failed: {0}")]
    Transport(String),

    #[error("invalid recipient address: {0}")]
    Recipient(String),
}

/// Outbound mail transport.
pub trait Mailer: Send + Sync {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl MemoryMailer {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().clone()
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

/// Writes messages to the log instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        if !message.to.contains('@') {
            return Err(MailError::Recipient(message.to.clone()));
        }
        info!(to = %message.to, subject = %message.subject, "email not sent (no transport configured)");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

/// Resolves user ids to mail recipients.
pub trait Directory: Send + Sync {
    fn lookup(&self, user: &UserId) -> Option<Recipient>;
}

impl Directory for HashMap<UserId, Recipient> {
    fn lookup(&self, user: &UserId) -> Option<Recipient> {
        self.get(user).cloned()
    }
}

/// Treats user ids that look like email addresses as their own address.
#[derive(Debug, Default, Clone, Copy)]
pub struct AddressDirectory;

impl Directory for AddressDirectory {
    fn lookup(&self, user: &UserId) -> Option<Recipient> {
        let (local, domain) = user.as_str().split_once('@')?;
        if local.is_empty() || !domain.contains('.') {
            return None;
        }
        Some(Recipient {
            name: local.to_string(),
            email: user.as_str().to_string(),
        })
    }
}

pub struct Notifier<M, D> {
    mailer: M,
    directory: D,
    base_url: String,
}

impl<M: Mailer, D: Directory> Notifier<M, D> {
    pub fn new(mailer: M, directory: D, base_url: impl Into<String>) -> Self {
        Notifier {
            mailer,
            directory,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn mailer(&self) -> &M {
        &self.mailer
    }

    fn task_url(&self, id: TaskId) -> String {
        format!("{}/tasks/{id}", self.base_url)
    }

    fn project_url(&self, id: ProjectId) -> String {
        format!("{}/projects/{id}", self.base_url)
    }

    fn name_of(&self, user: &UserId) -> String {
        self.directory
            .lookup(user)
            .map(|r| r.name)
            .unwrap_or_else(|| user.to_string())
    }

    /// Render and send; a failed delivery is logged and reported as `false`.
    fn deliver(&self, trigger: Trigger) -> bool {
        let message = render(&trigger);
        match self.mailer.send(&message) {
            Ok(()) => {
                debug!(to = %message.to, subject = %message.subject, "notification sent");
                true
            }
            Err(err) => {
                warn!(to = %message.to, error = %err, "notification failed");
                false
            }
        }
    }

    /// React to one store notification. Events that are not assignments or
    /// invitations are ignored, as are users the directory cannot resolve.
    pub fn handle(&self, event: &StoreEvent) {
        match event {
            StoreEvent::TaskAssigned {
                task_id,
                task_title,
                project_name,
                assignee,
                ..
            } => {
                let Some(recipient) = self.directory.lookup(assignee) else {
                    debug!(user = %assignee, "assignee has no address, skipping");
                    return;
                };
                self.deliver(Trigger::TaskAssigned {
                    to: recipient.email,
                    assigner: None,
                    task_title: task_title.clone(),
                    project_name: project_name.clone(),
                    task_url: self.task_url(*task_id),
                });
            }
            StoreEvent::MemberAdded {
                project_id,
                project_name,
                user_id,
                invited_by,
                ..
            } => {
                let Some(recipient) = self.directory.lookup(user_id) else {
                    debug!(user = %user_id, "invitee has no address, skipping");
                    return;
                };
                self.deliver(Trigger::ProjectInvite {
                    to: recipient.email,
                    inviter: self.name_of(invited_by),
                    project_name: project_name.clone(),
                    invite_url: self.project_url(*project_id),
                });
            }
            _ => {}
        }
    }

    /// Send a reminder for every assigned open task due within `days`.
    /// Returns how many reminders went out.
    pub fn due_soon_reminders(&self, snapshot: &Snapshot, now: DateTime<Utc>, days: u32) -> usize {
        let mut sent = 0;
        for task in view::due_soon(&snapshot.tasks, now, days) {
            let (Some(assignee), Some(due_date)) = (&task.assigned_to, task.due_date) else {
                continue;
            };
            let Some(recipient) = self.directory.lookup(assignee) else {
                continue;
            };
            let project_name = snapshot
                .project(task.project_id)
                .map(|p| p.name.clone())
                .unwrap_or_default();
            if self.deliver(Trigger::TaskDueSoon {
                to: recipient.email,
                task_title: task.title.clone(),
                project_name,
                due_date,
                task_url: self.task_url(task.id),
            }) {
                sent += 1;
            }
        }
        sent
    }
}

impl<M, D> Notifier<M, D>
where
    M: Mailer + 'static,
    D: Directory + 'static,
{
    /// Subscribe the notifier to a workspace's store notifications.
    pub fn attach(notifier: Arc<Self>, workspace: &Workspace) {
        workspace.subscribe(move |event| notifier.handle(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::fields::Role;
    use crate::project::NewProject;
    use crate::task::{NewTask, TaskPatch};
    use chrono::{Duration, TimeZone};

    fn directory() -> HashMap<UserId, Recipient> {
        HashMap::from([
            (
                UserId::from("ana"),
                Recipient {
                    name: "Ana".into(),
                    email: "ana@example.com".into(),
                },
            ),
            (
                UserId::from("olga"),
                Recipient {
                    name: "Olga".into(),
                    email: "olga@example.com".into(),
                },
            ),
        ])
    }

    fn setup() -> (Workspace, Arc<Notifier<MemoryMailer, HashMap<UserId, Recipient>>>, ProjectId) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap(),
        ));
        let ws = Workspace::with_clock(clock);
        let notifier = Arc::new(Notifier::new(
            MemoryMailer::default(),
            directory(),
            "https://worksync.test/",
        ));
        Notifier::attach(Arc::clone(&notifier), &ws);
        let pid = ws
            .create_project(NewProject {
                name: "R&D <core>".into(),
                owner: UserId::from("olga"),
                ..Default::default()
            })
            .unwrap()
            .id;
        (ws, notifier, pid)
    }

    #[test]
    fn test_render_escapes_body_but_not_subject() {
        let msg = render(&Trigger::TaskAssigned {
            to: "a@b.io".into(),
            assigner: Some("Tom & Jerry".into()),
            task_title: "Fix <script>".into(),
            project_name: "P".into(),
            task_url: "https://x/tasks/1".into(),
        });
        assert_eq!(msg.subject, "You've been assigned a task: \"Fix <script>\"");
        assert!(msg.html.contains("Fix &lt;script&gt;"));
        assert!(msg.html.contains("Tom &amp; Jerry has assigned you"));
        assert!(!msg.html.contains("<script>"));
    }

    #[test]
    fn test_render_subjects() {
        let due = render(&Trigger::TaskDueSoon {
            to: "a@b.io".into(),
            task_title: "Ship".into(),
            project_name: "P".into(),
            due_date: NaiveDate::from_ymd_opt(2026, 5, 6).unwrap(),
            task_url: "u".into(),
        });
        assert_eq!(due.subject, "Reminder: Task \"Ship\" is due soon");
        assert!(due.html.contains("2026-05-06"));
        let invite = render(&Trigger::ProjectInvite {
            to: "a@b.io".into(),
            inviter: "Olga".into(),
            project_name: "Core".into(),
            invite_url: "u".into(),
        });
        assert_eq!(
            invite.subject,
            "You've been invited to join \"Core\" on WorkSync"
        );
    }

    #[test]
    fn test_assignment_sends_mail_to_resolved_user() {
        let (ws, notifier, pid) = setup();
        let tid = ws
            .create_task(NewTask {
                title: "Write tests".into(),
                project_id: Some(pid),
                created_by: UserId::from("olga"),
                assigned_to: Some(UserId::from("ana")),
                ..Default::default()
            })
            .unwrap()
            .id;
        let sent = notifier.mailer().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ana@example.com");
        assert!(sent[0].html.contains("R&amp;D &lt;core&gt;"));
        assert!(sent[0]
            .html
            .contains(&format!("https://worksync.test/tasks/{tid}")));

        // Reassigning to an unknown user is skipped.
        ws.update_task(
            tid,
            TaskPatch {
                assigned_to: Some(Some(UserId::from("ghost"))),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(notifier.mailer().sent().len(), 1);
    }

    #[test]
    fn test_invitation_names_inviter() {
        let (ws, notifier, pid) = setup();
        ws.add_team_member(pid, &UserId::from("ana"), Role::Editor)
            .unwrap();
        // Role change on an existing member is not a new invitation.
        ws.add_team_member(pid, &UserId::from("ana"), Role::Admin)
            .unwrap();
        let sent = notifier.mailer().sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].html.contains("Olga has invited you"));
        assert!(sent[0].subject.contains("R&D <core>"));
    }

    #[test]
    fn test_due_soon_reminders() {
        let (ws, notifier, pid) = setup();
        let now = ws.now();
        for (title, days, who) in [
            ("soon", 2, Some("ana")),
            ("later", 10, Some("ana")),
            ("nobody", 1, None),
            ("ghost", 1, Some("ghost")),
        ] {
            ws.create_task(NewTask {
                title: title.into(),
                project_id: Some(pid),
                created_by: UserId::from("olga"),
                due_date: Some((now + Duration::days(days)).date_naive()),
                ..Default::default()
            })
            .map(|t| {
                if let Some(who) = who {
                    ws.update_task(
                        t.id,
                        TaskPatch {
                            assigned_to: Some(Some(UserId::from(who))),
                            ..Default::default()
                        },
                    )
                    .unwrap();
                }
            })
            .unwrap();
        }
        let before = notifier.mailer().sent().len();
        let count = notifier.due_soon_reminders(&ws.snapshot(), now, 3);
        assert_eq!(count, 1);
        let sent = notifier.mailer().sent();
        assert_eq!(sent.len(), before + 1);
        assert_eq!(sent[before].subject, "Reminder: Task \"soon\" is due soon");
    }

    #[test]
    fn test_address_directory() {
        let dir = AddressDirectory;
        assert_eq!(
            dir.lookup(&UserId::from("kim@corp.io")).map(|r| r.name),
            Some("kim".to_string())
        );
        assert!(dir.lookup(&UserId::from("kim")).is_none());
        assert!(dir.lookup(&UserId::from("@corp.io")).is_none());
    }

    #[test]
    fn test_log_mailer_rejects_bad_address() {
        let msg = EmailMessage {
            to: "nobody".into(),
            subject: "s".into(),
            html: String::new(),
        };
        assert!(matches!(
            LogMailer.send(&msg),
            Err(MailError::Recipient(_))
        ));
    }
}
