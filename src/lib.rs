//! # WorkSync
//!
//! Project and task tracking core: an authoritative task store and project
//! store kept consistent by a [`Workspace`](workspace::Workspace), stateless
//! read-side views for tables, boards and dashboards, and an email notifier
//! driven by store notifications.
//!
//! Data lives in a single JSON file (see [`db`]). The `ws` binary is a thin
//! command line over the workspace.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod event;
pub mod fields;
pub mod notify;
pub mod project;
pub mod project_store;
pub mod task;
pub mod task_store;
pub mod view;
pub mod workspace;

pub use error::{ErrorKind, Outcome, Result, WorkSyncError};
pub use workspace::{Snapshot, Workspace};
