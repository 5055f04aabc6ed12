//! Error types for reconciliation.
//!
//! Errors that concern an entity carry its label and the verb that failed,
//! so a message read on its own still says what went wrong where. Values
//! of sensitive fields never reach an error message: validation output and
//! diffs render them through the field table.

use crate::lifecycle::LifecycleState;
use crate::resource::EntityRecord;
use crate::transport::{RemoteError, RemoteErrorKind};
use crate::validate::Violations;
use std::fmt;
use thiserror::Error;

/// Public verbs of the lifecycle controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Create,
    Read,
    Update,
    Delete,
    Import,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Import => "import",
        };
        f.write_str(s)
    }
}

/// Categories of reconciliation errors for user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Desired state or identifier rejected locally
    Invalid,
    /// Remote rejected the request contents
    Rejected,
    /// Credentials missing or insufficient
    Unauthorized,
    /// Entity does not exist remotely
    NotFound,
    /// Remote kept failing transiently or ran out of time
    Unavailable,
    /// A change needs destroy-then-recreate
    Replace,
    /// Unexpected remote answer or internal inconsistency
    Other,
}

impl ErrorCategory {
    /// Whether running the same operation later may succeed unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Invalid => "Invalid configuration",
            Self::Rejected => "Rejected by the remote service",
            Self::Unauthorized => "Not authorized",
            Self::NotFound => "Resource not found",
            Self::Unavailable => "Remote service unavailable",
            Self::Replace => "Replacement required",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Invalid => "Fix the reported attributes and try again",
            Self::Rejected => "Check the attribute values against the service limits",
            Self::Unauthorized => "Check the credentials and permissions used for the endpoint",
            Self::NotFound => "Verify the parent collection exists, or refresh to drop stale state",
            Self::Unavailable => "Try again later or raise the timeout",
            Self::Replace => "Apply the plan to destroy and recreate the resource",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors surfaced by the reconciliation core.
#[derive(Debug, Error)]
pub enum Error {
    /// Desired state failed validation; nothing was sent
    #[error("{entity}: {verb} rejected by validation:\n{violations}")]
    Validation {
        entity: String,
        verb: Verb,
        violations: Violations,
    },

    /// Malformed import identifier
    #[error("Wrong format of import identifier {identifier:?}, expected '{expected}'")]
    Format {
        identifier: String,
        expected: &'static str,
    },

    /// Non-retryable remote failure
    #[error("{entity}: {verb} failed: {source}")]
    Remote {
        entity: String,
        verb: Verb,
        source: RemoteError,
    },

    /// Transient remote failure that outlasted the retry budget
    #[error("{entity}: {verb} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        entity: String,
        verb: Verb,
        attempts: u32,
        last: RemoteError,
    },

    /// The caller's deadline passed; the entity keeps its pre-call state
    #[error("{entity}: {verb} timed out")]
    Timeout { entity: String, verb: Verb },

    /// Entity missing where it must exist (Create read-back, Update, Import)
    #[error("{entity}: {verb} failed: resource not found")]
    NotFound { entity: String, verb: Verb },

    /// Update asked for a change that needs destroy-then-recreate
    #[error("{entity}: changing {} requires replacement", .fields.join(", "))]
    ReplaceRequired { entity: String, fields: Vec<String> },

    /// Remote answer the field table cannot make sense of
    #[error("{entity}: {verb} returned an invalid response: {message}")]
    InvalidResponse {
        entity: String,
        verb: Verb,
        message: String,
    },

    /// The remote created the entity but the read-back failed; `record`
    /// keeps the assigned identity in `Failed` status
    #[error("{source}; tracking {} as failed", record.identity)]
    Unsettled {
        record: Box<EntityRecord>,
        source: Box<Error>,
    },

    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),

    #[error("invalid lifecycle transition {from} -> {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },
}

impl Error {
    /// Get the error category for user feedback.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation { .. } | Error::Format { .. } => ErrorCategory::Invalid,
            Error::Remote { source, .. } => match source.kind {
                RemoteErrorKind::InvalidInput => ErrorCategory::Rejected,
                RemoteErrorKind::Unauthorized => ErrorCategory::Unauthorized,
                RemoteErrorKind::NotFound => ErrorCategory::NotFound,
                RemoteErrorKind::Throttled | RemoteErrorKind::Unavailable | RemoteErrorKind::Timeout => {
                    ErrorCategory::Unavailable
                }
                RemoteErrorKind::Unknown => ErrorCategory::Other,
            },
            Error::RetriesExhausted { .. } | Error::Timeout { .. } => ErrorCategory::Unavailable,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::ReplaceRequired { .. } => ErrorCategory::Replace,
            Error::Unsettled { source, .. } => source.category(),
            Error::InvalidResponse { .. } | Error::WorkerPool(_) | Error::InvalidTransition { .. } => {
                ErrorCategory::Other
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Verb that failed, when the error concerns an entity
    pub fn verb(&self) -> Option<Verb> {
        match self {
            Error::Validation { verb, .. }
            | Error::Remote { verb, .. }
            | Error::RetriesExhausted { verb, .. }
            | Error::Timeout { verb, .. }
            | Error::NotFound { verb, .. }
            | Error::InvalidResponse { verb, .. } => Some(*verb),
            Error::ReplaceRequired { .. } => Some(Verb::Update),
            Error::Unsettled { source, .. } => source.verb(),
            Error::Format { .. } => Some(Verb::Import),
            Error::WorkerPool(_) | Error::InvalidTransition { .. } => None,
        }
    }

    /// Record to keep tracking after a failed verb, if the error carries one
    pub fn tracked_record(&self) -> Option<&EntityRecord> {
        match self {
            Error::Unsettled { record, .. } => Some(record),
            _ => None,
        }
    }

    /// Whether the failed verb left the entity in its pre-call state
    pub fn leaves_state_unchanged(&self) -> bool {
        matches!(
            self,
            Error::Validation { .. } | Error::Format { .. } | Error::Timeout { .. } | Error::ReplaceRequired { .. }
        )
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;
