//! Transport collaborator abstraction
//!
//! The [`Transport`] trait is the only way the core reaches the remote
//! API. Implementations classify failures into a [`RemoteErrorKind`] at
//! this boundary so the controller never inspects message text.

use crate::codec::WireDocument;
use crate::context::Deadline;
use crate::resource::ResourceIdentity;
use std::fmt;
use thiserror::Error;

/// Machine-readable class of a remote failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// The addressed resource does not exist
    NotFound,
    /// Request rate exceeded
    Throttled,
    /// The remote rejected the request contents
    InvalidInput,
    /// Missing or insufficient credentials
    Unauthorized,
    /// Connection failure or remote-side fault
    Unavailable,
    /// The call did not complete before its deadline
    Timeout,
    Unknown,
}

impl RemoteErrorKind {
    /// Whether the failure is typically transient and worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Throttled | Self::Unavailable | Self::Timeout)
    }

    /// Whether the request may have been applied despite the failure
    ///
    /// A throttled request was rejected before doing anything; a dropped
    /// connection or timeout leaves the outcome unknown.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Unavailable | Self::Timeout)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::NotFound => "resource not found",
            Self::Throttled => "request throttled",
            Self::InvalidInput => "invalid input",
            Self::Unauthorized => "not authorized",
            Self::Unavailable => "service unavailable",
            Self::Timeout => "timed out",
            Self::Unknown => "unexpected error",
        }
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Error returned by a [`Transport`] call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::NotFound, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == RemoteErrorKind::NotFound
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

/// The four idempotent verbs of the remote API
///
/// Every call receives the caller's [`Deadline`] and must give up with a
/// [`RemoteErrorKind::Timeout`] once it has passed. Implementations hold
/// no per-entity state, so one transport is shared by all reconciliations.
pub trait Transport: Send + Sync {
    /// Create a resource; the response describes the created resource
    /// including its remote-assigned id.
    fn create(&self, request: &WireDocument, deadline: Deadline) -> Result<WireDocument, RemoteError>;

    /// Describe an existing resource.
    fn read(&self, identity: &ResourceIdentity, deadline: Deadline) -> Result<WireDocument, RemoteError>;

    /// Apply an update request to an existing resource.
    fn update(
        &self,
        identity: &ResourceIdentity,
        request: &WireDocument,
        deadline: Deadline,
    ) -> Result<WireDocument, RemoteError>;

    /// Delete a resource.
    fn delete(&self, identity: &ResourceIdentity, deadline: Deadline) -> Result<(), RemoteError>;
}
