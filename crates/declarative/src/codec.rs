//! Attribute codec: documents to wire requests and wire responses back
//!
//! The wire shape is a JSON object keyed by the `wire` names of the field
//! table. Both directions are pure; nothing here logs or touches the
//! network.

use crate::diff::{Classification, ResourceDiff};
use crate::document::{Document, Value};
use crate::schema::{FieldKind, FieldSpec, ResourceSchema, UpdateMode};
use serde_json::Value as Json;
use std::collections::BTreeSet;
use thiserror::Error;

/// JSON object exchanged with the transport
pub type WireDocument = serde_json::Map<String, Json>;

/// Which request is being built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeMode {
    Create,
    Update,
}

/// A wire member that does not have the type the table declares
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("wire member {member} should be a {expected}")]
pub struct DecodeError {
    pub member: String,
    pub expected: &'static str,
}

/// Encode every present, sendable field of `doc`
///
/// Output-only fields are never sent; create-only fields are dropped from
/// update requests. Sets are emitted in canonical (sorted) order and an
/// empty set is sent as `[]`, not omitted.
pub fn encode(schema: &ResourceSchema, doc: &Document, mode: EncodeMode) -> WireDocument {
    encode_fields(schema.fields, doc, mode)
}

/// Encode the update request for a classified diff
///
/// With [`UpdateMode::Replace`] every settable desired field is sent and a
/// cleared set goes out as `[]` so the remote drops it. With
/// [`UpdateMode::Patch`] only fields classified as Update are sent and
/// cleared fields go out as `null`.
pub fn encode_update(schema: &ResourceSchema, desired: &Document, diff: &ResourceDiff) -> WireDocument {
    let updated: BTreeSet<&str> = diff
        .changes
        .values()
        .filter(|c| c.classification == Classification::Update)
        .map(|c| c.top_level_field())
        .collect();

    let mut wire = match schema.update_mode {
        UpdateMode::Replace => encode(schema, desired, EncodeMode::Update),
        UpdateMode::Patch => {
            let subset: Document = desired
                .iter()
                .filter(|(name, _)| updated.contains(name))
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect();
            encode(schema, &subset, EncodeMode::Update)
        }
    };

    for field in schema.fields {
        if !updated.contains(field.name) || desired.contains(field.name) || wire.contains_key(field.wire) {
            continue;
        }
        let cleared = match (schema.update_mode, field.kind) {
            (UpdateMode::Replace, FieldKind::StringSet { .. }) => Json::Array(Vec::new()),
            (UpdateMode::Replace, _) => continue,
            (UpdateMode::Patch, _) => Json::Null,
        };
        wire.insert(field.wire.to_string(), cleared);
    }

    // The parent id addresses the entity and is always carried.
    if let Some(parent) = schema.field(schema.identity.parent_field)
        && let Some(value) = desired.get(parent.name)
    {
        wire.insert(parent.wire.to_string(), encode_value(value));
    }

    wire
}

fn encode_fields(fields: &[FieldSpec], doc: &Document, mode: EncodeMode) -> WireDocument {
    let mut wire = WireDocument::new();
    for field in fields {
        if !field.is_input() || (mode == EncodeMode::Update && field.create_only) {
            continue;
        }
        let Some(value) = doc.get(field.name) else {
            continue;
        };
        let encoded = match (&field.kind, value) {
            (FieldKind::Block(spec), Value::Block(block)) => {
                Json::Object(encode_fields(spec.fields, block, mode))
            }
            _ => encode_value(value),
        };
        wire.insert(field.wire.to_string(), encoded);
    }
    wire
}

fn encode_value(value: &Value) -> Json {
    match value {
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Str(s) => Json::String(s.clone()),
        Value::Set(items) => Json::Array(items.iter().cloned().map(Json::String).collect()),
        Value::Block(doc) => Json::Object(
            doc.iter()
                .map(|(name, value)| (name.to_string(), encode_value(value)))
                .collect(),
        ),
    }
}

/// Decode a wire response into an observed document
///
/// Members the table does not declare are ignored. Members the response
/// does not carry (or carries as `null`) stay absent; the only values
/// filled in are defaults of fields inside a present nested block, which
/// the remote always reports.
pub fn decode(schema: &ResourceSchema, wire: &WireDocument) -> Result<Document, DecodeError> {
    decode_fields(schema.fields, wire, false)
}

fn decode_fields(fields: &[FieldSpec], wire: &WireDocument, nested: bool) -> Result<Document, DecodeError> {
    let mut doc = Document::new();
    for field in fields {
        match wire.get(field.wire) {
            None | Some(Json::Null) => {
                if nested && let Some(default) = field.default {
                    doc.insert(field.name, default.to_value());
                }
            }
            Some(json) => {
                doc.insert(field.name, decode_value(field, json)?);
            }
        }
    }
    Ok(doc)
}

fn decode_value(field: &FieldSpec, json: &Json) -> Result<Value, DecodeError> {
    let mismatch = || DecodeError {
        member: field.wire.to_string(),
        expected: field.kind.type_name(),
    };
    match field.kind {
        FieldKind::String => json.as_str().map(Value::from).ok_or_else(mismatch),
        FieldKind::Bool => json.as_bool().map(Value::Bool).ok_or_else(mismatch),
        FieldKind::Int { .. } => json.as_i64().map(Value::Int).ok_or_else(mismatch),
        FieldKind::StringSet { .. } => {
            let items = json.as_array().ok_or_else(mismatch)?;
            items
                .iter()
                .map(|item| item.as_str().map(str::to_string).ok_or_else(mismatch))
                .collect::<Result<BTreeSet<_>, _>>()
                .map(Value::Set)
        }
        FieldKind::Block(spec) => {
            let object = json.as_object().ok_or_else(mismatch)?;
            decode_fields(spec.fields, object, true).map(Value::Block)
        }
    }
}
