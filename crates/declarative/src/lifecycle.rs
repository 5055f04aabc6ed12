//! Per-entity lifecycle state machine

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Absent,
    Creating,
    Stable,
    Updating,
    Deleting,
    /// A non-retryable remote error hit an in-progress verb
    Failed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Absent => "absent",
            Self::Creating => "creating",
            Self::Stable => "stable",
            Self::Updating => "updating",
            Self::Deleting => "deleting",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

pub fn validate_transition(from: LifecycleState, to: LifecycleState) -> Result<(), Error> {
    use LifecycleState::{Absent, Creating, Deleting, Failed, Stable, Updating};

    let valid = matches!(
        (from, to),
        (Absent, Creating)
            | (Creating, Stable)
            | (Stable | Failed, Updating | Deleting)
            | (Updating, Stable)
            | (Deleting, Absent)
            // Read-back resync and out-of-band deletion
            | (Stable | Failed, Stable | Absent)
            | (Creating | Updating | Deleting, Failed)
            // Timeout: back to the pre-call state
            | (Creating, Absent)
            | (Updating | Deleting, Stable)
    );

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidTransition { from, to })
    }
}

/// Tracks one entity through a single verb
#[derive(Debug)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Lifecycle {
    pub fn new(state: LifecycleState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn transition(&mut self, to: LifecycleState) -> Result<(), Error> {
        validate_transition(self.state, to)?;
        log::trace!("lifecycle {} -> {}", self.state, to);
        self.state = to;
        Ok(())
    }
}
