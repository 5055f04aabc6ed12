//! Entity identity and the persisted per-entity record

use crate::document::Document;
use crate::lifecycle::LifecycleState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Compound key of a managed entity
///
/// `parent_id` is chosen by the caller and never changes; `resource_id` is
/// assigned by the remote at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceIdentity {
    pub parent_id: String,
    pub resource_id: String,
}

impl ResourceIdentity {
    pub fn new(parent_id: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            parent_id: parent_id.into(),
            resource_id: resource_id.into(),
        }
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.parent_id, self.resource_id)
    }
}

/// What the orchestrator persists per entity, refreshed after every verb
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub identity: ResourceIdentity,
    #[serde(default = "stable")]
    pub status: LifecycleState,
    /// Last observed state, including values carried for unreported inputs
    #[serde(default)]
    pub observed: Document,
}

fn stable() -> LifecycleState {
    LifecycleState::Stable
}

impl EntityRecord {
    pub fn new(identity: ResourceIdentity, observed: Document) -> Self {
        Self {
            identity,
            status: LifecycleState::Stable,
            observed,
        }
    }
}

/// Human-readable entity label used in logs and errors
///
/// The identity may not be known yet (Create before the remote answered).
pub fn entity_label(type_name: &str, parent: Option<&str>, id: Option<&str>) -> String {
    format!(
        "{type_name} {}/{}",
        parent.unwrap_or("?"),
        id.unwrap_or("(new)")
    )
}
