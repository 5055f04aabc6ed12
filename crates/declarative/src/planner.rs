//! Execution planner - picks one verb per entity
//!
//! Entities are addressed `type.name`, where `name` is the key the caller
//! chose in its configuration. The planner compares each desired document
//! against the persisted record of the same address.

use crate::diff::{DiffAction, ResourceDiff, classify};
use crate::document::Document;
use crate::resource::EntityRecord;
use crate::schema::ResourceSchema;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// What the executor will do to one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    Create(ResourceDiff),
    Update(ResourceDiff),
    /// Delete then create; at least one Replace-class field changed
    Replace(ResourceDiff),
    /// Tracked but no longer desired
    Delete,
    NoOp,
}

impl PlannedAction {
    /// Whether the action destroys a remote resource
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::Replace(_) | Self::Delete)
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, Self::NoOp)
    }

    pub fn diff(&self) -> Option<&ResourceDiff> {
        match self {
            Self::Create(diff) | Self::Update(diff) | Self::Replace(diff) => Some(diff),
            Self::Delete | Self::NoOp => None,
        }
    }
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create(_) => "create",
            Self::Update(_) => "update in place",
            Self::Replace(_) => "replace",
            Self::Delete => "delete",
            Self::NoOp => "no change",
        };
        f.write_str(s)
    }
}

/// One entity of a plan
#[derive(Debug, Clone)]
pub struct PlannedEntity {
    pub resource_type: &'static str,
    pub name: String,
    /// Desired document, `None` for deletions
    pub desired: Option<Document>,
    /// Persisted record, `None` for creations
    pub record: Option<EntityRecord>,
    pub action: PlannedAction,
}

impl PlannedEntity {
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }
}

/// Counts of planned actions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
    pub no_op: usize,
}

impl PlanSummary {
    pub fn changes(&self) -> usize {
        self.create + self.update + self.replace + self.delete
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to replace, {} to delete",
            self.create, self.update, self.replace, self.delete
        )
    }
}

/// A plan for one resource type
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    pub entities: Vec<PlannedEntity>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan every desired and every tracked entity of one resource type
    ///
    /// Both maps are keyed by entity name. A name present only in
    /// `desired` is created, one present only in `records` is deleted.
    pub fn build(
        schema: &ResourceSchema,
        desired: &BTreeMap<String, Document>,
        records: &BTreeMap<String, EntityRecord>,
    ) -> Self {
        let names: BTreeSet<&String> = desired.keys().chain(records.keys()).collect();

        let entities = names
            .into_iter()
            .map(|name| {
                let wanted = desired.get(name);
                let record = records.get(name);
                let action = match (wanted, record) {
                    (Some(doc), record) => {
                        let diff = classify(schema, record.map(|r| &r.observed), doc);
                        match diff.action() {
                            DiffAction::Create => PlannedAction::Create(diff),
                            DiffAction::Update => PlannedAction::Update(diff),
                            DiffAction::Replace => PlannedAction::Replace(diff),
                            DiffAction::NoOp => PlannedAction::NoOp,
                        }
                    }
                    (None, Some(_)) => PlannedAction::Delete,
                    (None, None) => PlannedAction::NoOp,
                };
                PlannedEntity {
                    resource_type: schema.type_name,
                    name: name.clone(),
                    desired: wanted.cloned(),
                    record: record.cloned(),
                    action,
                }
            })
            .collect();

        Self { entities }
    }

    /// Plan the deletion of every tracked entity
    pub fn destroy(schema: &ResourceSchema, records: &BTreeMap<String, EntityRecord>) -> Self {
        Self::build(schema, &BTreeMap::new(), records)
    }

    /// Filter plan to only include entities matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&PlannedEntity) -> bool,
    {
        Self {
            entities: self.entities.into_iter().filter(|e| predicate(e)).collect(),
        }
    }

    /// Filter plan to only include entities matching a target pattern
    ///
    /// Target format: "type" or "type.name"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (resource_type, name) = parse_target(t);
                self.filter(|e| matches_filter(e, resource_type.as_deref(), name.as_deref()))
            }
        }
    }

    /// Entities that will be touched
    pub fn changes(&self) -> impl Iterator<Item = &PlannedEntity> {
        self.entities.iter().filter(|e| e.action.is_change())
    }

    pub fn has_destructive(&self) -> bool {
        self.entities.iter().any(|e| e.action.is_destructive())
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for entity in &self.entities {
            match entity.action {
                PlannedAction::Create(_) => summary.create += 1,
                PlannedAction::Update(_) => summary.update += 1,
                PlannedAction::Replace(_) => summary.replace += 1,
                PlannedAction::Delete => summary.delete += 1,
                PlannedAction::NoOp => summary.no_op += 1,
            }
        }
        summary
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Parse a target string like "type.name" into (type, name)
pub fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    match target.split_once('.') {
        None => (Some(target.to_string()), None),
        Some((t, n)) if !n.contains('.') => (Some(t.to_string()), Some(n.to_string())),
        Some(_) => (None, Some(target.to_string())),
    }
}

fn matches_filter(entity: &PlannedEntity, resource_type: Option<&str>, name: Option<&str>) -> bool {
    if let Some(rt) = resource_type
        && entity.resource_type != rt
    {
        return false;
    }

    if let Some(n) = name
        && entity.name != n
    {
        return false;
    }

    true
}
