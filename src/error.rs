//! Error kinds shared by every store operation.
//!
//! Operations fail with exactly one of four kinds. The message carried by a
//! variant is diagnostic text for logs; turning it into something a user
//! reads is the presentation layer's job.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a store operation. No operation returning this error has
/// mutated any store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkSyncError {
    /// A required field is missing or a value is out of its allowed range.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The requested state transition is not permitted in the current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A checklist index outside the checklist.
    #[error("index {index} out of range for checklist of length {len}")]
    Index { index: usize, len: usize },
}

/// Machine-readable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    ValidationError,
    NotFoundError,
    ConflictError,
    IndexError,
}

impl WorkSyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkSyncError::Validation(_) => ErrorKind::ValidationError,
            WorkSyncError::NotFound { .. } => ErrorKind::NotFoundError,
            WorkSyncError::Conflict(_) => ErrorKind::ConflictError,
            WorkSyncError::Index { .. } => ErrorKind::IndexError,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        WorkSyncError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkSyncError>;

/// Result envelope handed to a notification sink.
///
/// Serialises as `{"ok":true,"value":...}` on success and
/// `{"ok":false,"errorKind":...,"message":...}` on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome<T> {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Outcome {
                ok: true,
                value: Some(value),
                error_kind: None,
                message: None,
            },
            Err(err) => Outcome {
                ok: false,
                value: None,
                error_kind: Some(err.kind()),
                message: Some(err.to_string()),
            },
        }
    }
}
