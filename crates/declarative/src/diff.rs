//! Diff engine: classify every difference between observed and desired
//!
//! Each differing field gets one [`Classification`]. Nested block fields
//! are keyed `block.field`. Values are rendered through the field table so
//! sensitive values never show up in a diff.

use crate::document::{Document, Value};
use crate::schema::{FieldKind, FieldSpec, Presence, ResourceSchema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How a single field difference is reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    /// Applied in place by an Update call
    Update,
    /// Requires destroy-then-recreate
    Replace,
    /// Not acted upon (computed, output-only or unknown)
    Ignore,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Update => write!(f, "update"),
            Self::Replace => write!(f, "replace"),
            Self::Ignore => write!(f, "ignore"),
        }
    }
}

/// One classified field difference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Field key, `block.field` for nested fields
    pub field: String,
    pub classification: Classification,
    /// Rendered observed value, `None` when absent
    pub old: Option<String>,
    /// Rendered desired value, `None` when absent
    pub new: Option<String>,
}

impl FieldChange {
    /// The top-level attribute this change belongs to
    pub fn top_level_field(&self) -> &str {
        self.field.split('.').next().unwrap_or(&self.field)
    }
}

/// What a diff asks the controller to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffAction {
    Create,
    NoOp,
    Update,
    Replace,
}

/// Classified differences for one entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDiff {
    /// There is no observed state; everything desired is new
    pub creating: bool,
    pub changes: BTreeMap<String, FieldChange>,
}

impl ResourceDiff {
    /// The verb this diff calls for
    ///
    /// A single Replace field makes the whole entity a Replace, whatever
    /// the other fields say.
    pub fn action(&self) -> DiffAction {
        if self.creating {
            DiffAction::Create
        } else if self.requires_replace() {
            DiffAction::Replace
        } else if self.has_updates() {
            DiffAction::Update
        } else {
            DiffAction::NoOp
        }
    }

    pub fn requires_replace(&self) -> bool {
        self.changes
            .values()
            .any(|c| c.classification == Classification::Replace)
    }

    pub fn has_updates(&self) -> bool {
        self.changes
            .values()
            .any(|c| c.classification == Classification::Update)
    }

    pub fn classification(&self, field: &str) -> Option<Classification> {
        self.changes.get(field).map(|c| c.classification)
    }

    /// Field keys with the given classification
    pub fn fields_with(&self, classification: Classification) -> Vec<&str> {
        self.changes
            .values()
            .filter(|c| c.classification == classification)
            .map(|c| c.field.as_str())
            .collect()
    }

    /// Changes that will be acted upon
    pub fn actionable(&self) -> impl Iterator<Item = &FieldChange> {
        self.changes
            .values()
            .filter(|c| c.classification != Classification::Ignore)
    }
}

/// Classify the differences between `old` (observed) and `new` (desired)
///
/// Defaults are applied to `new` first. With no observed state every
/// desired input is reported as an Update-class addition and the action
/// is [`DiffAction::Create`].
pub fn classify(schema: &ResourceSchema, old: Option<&Document>, new: &Document) -> ResourceDiff {
    let new = schema.apply_defaults(new);
    let mut diff = ResourceDiff::default();

    let Some(old) = old else {
        diff.creating = true;
        for field in schema.fields.iter().filter(|f| f.is_input()) {
            if let Some(value) = new.get(field.name) {
                diff.changes.insert(
                    field.name.to_string(),
                    change(field, field.name.to_string(), Classification::Update, None, Some(value)),
                );
            }
        }
        return diff;
    };

    compare_fields(
        schema.fields,
        "",
        old,
        &new,
        schema.distinguishes_empty_sets,
        &mut diff.changes,
    );

    // Anything outside the table is forward-compatible noise.
    for (doc, is_old) in [(old, true), (&new, false)] {
        for (name, value) in doc.iter() {
            if schema.field(name).is_some() || diff.changes.contains_key(name) {
                continue;
            }
            let rendered = Some(value.to_string());
            diff.changes.insert(
                name.to_string(),
                FieldChange {
                    field: name.to_string(),
                    classification: Classification::Ignore,
                    old: if is_old { rendered.clone() } else { None },
                    new: if is_old { None } else { rendered },
                },
            );
        }
    }

    diff
}

fn compare_fields(
    fields: &[FieldSpec],
    prefix: &str,
    old: &Document,
    new: &Document,
    distinguish_empty: bool,
    changes: &mut BTreeMap<String, FieldChange>,
) {
    for field in fields {
        let key = format!("{prefix}{}", field.name);
        let before = old.get(field.name);
        let after = new.get(field.name);

        if equivalent(before, after, distinguish_empty) {
            continue;
        }

        if let FieldKind::Block(spec) = field.kind {
            let empty = Document::new();
            match (before, after) {
                (Some(Value::Block(ob)), Some(Value::Block(nb))) => {
                    compare_fields(spec.fields, &format!("{key}."), ob, nb, distinguish_empty, changes);
                    continue;
                }
                (None, Some(Value::Block(nb))) => {
                    compare_fields(spec.fields, &format!("{key}."), &empty, nb, distinguish_empty, changes);
                    continue;
                }
                _ => {}
            }
        }

        let classification = rule(field, before, after);
        changes.insert(key.clone(), change(field, key, classification, before, after));
    }
}

fn rule(field: &FieldSpec, before: Option<&Value>, after: Option<&Value>) -> Classification {
    if field.presence == Presence::Output {
        return Classification::Ignore;
    }
    // The remote value is authoritative for computed fields left out.
    if after.is_none() && field.is_computed() {
        return Classification::Ignore;
    }
    // No baseline to compare against for inputs Read never reports.
    if !field.reported && before.is_none() {
        return Classification::Ignore;
    }
    if field.force_new {
        Classification::Replace
    } else {
        Classification::Update
    }
}

fn equivalent(before: Option<&Value>, after: Option<&Value>, distinguish_empty: bool) -> bool {
    if before == after {
        return true;
    }
    if distinguish_empty {
        return false;
    }
    let absent_or_empty = |v: Option<&Value>| match v {
        None => true,
        Some(Value::Set(items)) => items.is_empty(),
        Some(_) => false,
    };
    absent_or_empty(before) && absent_or_empty(after)
}

fn change(
    field: &FieldSpec,
    key: String,
    classification: Classification,
    before: Option<&Value>,
    after: Option<&Value>,
) -> FieldChange {
    FieldChange {
        field: key,
        classification,
        old: before.map(|v| field.render(v)),
        new: after.map(|v| field.render(v)),
    }
}
