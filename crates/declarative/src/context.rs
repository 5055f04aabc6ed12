//! Call context and provider traits
//!
//! These traits let the core report progress and ask for confirmation
//! without depending on a particular terminal UI.

use crate::error::Result;
use crate::planner::PlannedAction;
use crate::retry::RetryConfig;
use crate::types::ApplyResult;
use std::time::{Duration, Instant};

/// Point in time after which a reconciliation gives up
///
/// Passed into every blocking call; retries never sleep past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `timeout` from now
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    /// Time left, zero once expired
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Tunables of the lifecycle controller
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Retry policy for transient remote errors
    pub retry: RetryConfig,
    /// Polling policy for the read-back after Create
    pub settle: RetryConfig,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            settle: RetryConfig::new(8, Duration::from_millis(250), 2.0)
                .with_max_delay(Duration::from_secs(5)),
        }
    }
}

/// Progress callback for plan execution
pub trait ProgressCallback: Send {
    /// Called before any entity is touched
    fn on_batch_start(&mut self, count: usize);

    /// Called when an entity's verb pipeline starts
    fn on_entity_start(&mut self, address: &str, action: &PlannedAction);

    /// Called when an entity's verb pipeline ends
    fn on_entity_complete(&mut self, address: &str, result: &ApplyResult);

    fn on_batch_complete(&mut self);
}

/// Confirmation callback for destructive actions
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    ///
    /// # Returns
    /// `true` if the user confirmed, `false` otherwise
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _count: usize) {}
    fn on_entity_start(&mut self, _address: &str, _action: &PlannedAction) {}
    fn on_entity_complete(&mut self, _address: &str, _result: &ApplyResult) {}
    fn on_batch_complete(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_remaining() {
        let deadline = Deadline::after(Duration::from_secs(60));
        assert!(!deadline.is_expired());
        assert!(deadline.remaining() <= Duration::from_secs(60));
    }

    #[test]
    fn test_deadline_expired() {
        let deadline = Deadline::after(Duration::ZERO);
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }
}
