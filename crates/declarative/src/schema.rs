//! Declarative field-mapping tables
//!
//! A [`ResourceSchema`] is the single description of a resource type that
//! the codec, the validator and the diff engine all consult. Adding a field
//! means adding one [`FieldSpec`] row; Create, Update and Read cannot drift
//! apart because none of them carries its own per-field logic.

use crate::document::{Document, Value};

/// Value type of a field
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    String,
    Bool,
    /// Integer constrained to an inclusive range
    Int { min: i64, max: i64 },
    /// Set of strings, optionally bounded
    StringSet { max_items: Option<usize> },
    /// Nested single block
    Block(&'static BlockSpec),
}

impl FieldKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::Int { .. } => "integer",
            Self::StringSet { .. } => "set of strings",
            Self::Block(_) => "block",
        }
    }

    /// Whether a value has the shape this kind expects
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::String, Value::Str(_))
                | (Self::Bool, Value::Bool(_))
                | (Self::Int { .. }, Value::Int(_))
                | (Self::StringSet { .. }, Value::Set(_))
                | (Self::Block(_), Value::Block(_))
        )
    }
}

/// Syntax/enum check applied to a string value or to every set element
#[derive(Debug, Clone, Copy)]
pub enum ElemCheck {
    None,
    OneOf(&'static [&'static str]),
    Url,
    Arn,
    /// Reserved scope name or `<resource-server>/<scope>`
    OAuthScope,
}

/// Who supplies a field's value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
    /// Optional; the remote assigns a value when the caller omits it
    Computed,
    /// Only ever reported by the remote, never accepted as input
    Output,
}

/// Default applied to an omitted input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    Bool(bool),
    Int(i64),
}

impl FieldDefault {
    pub fn to_value(self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(b),
            Self::Int(i) => Value::Int(i),
        }
    }
}

/// One row of the field-mapping table
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Attribute name in desired/observed documents
    pub name: &'static str,
    /// Member name on the wire
    pub wire: &'static str,
    pub kind: FieldKind,
    pub check: ElemCheck,
    pub presence: Presence,
    /// Changing the value requires destroy-then-recreate
    pub force_new: bool,
    /// Never logged, echoed in diffs or included in errors
    pub sensitive: bool,
    /// Only sent on create
    pub create_only: bool,
    /// Whether Read reports the field back
    pub reported: bool,
    pub default: Option<FieldDefault>,
    /// Fields that must be absent when this one is set (same block)
    pub conflicts_with: &'static [&'static str],
}

impl FieldSpec {
    const fn base(name: &'static str, wire: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            wire,
            kind,
            check: ElemCheck::None,
            presence: Presence::Optional,
            force_new: false,
            sensitive: false,
            create_only: false,
            reported: true,
            default: None,
            conflicts_with: &[],
        }
    }

    pub const fn string(name: &'static str, wire: &'static str) -> Self {
        Self::base(name, wire, FieldKind::String)
    }

    pub const fn bool(name: &'static str, wire: &'static str) -> Self {
        Self::base(name, wire, FieldKind::Bool)
    }

    pub const fn int(name: &'static str, wire: &'static str, min: i64, max: i64) -> Self {
        Self::base(name, wire, FieldKind::Int { min, max })
    }

    pub const fn string_set(name: &'static str, wire: &'static str) -> Self {
        Self::base(name, wire, FieldKind::StringSet { max_items: None })
    }

    pub const fn block(name: &'static str, wire: &'static str, spec: &'static BlockSpec) -> Self {
        Self::base(name, wire, FieldKind::Block(spec))
    }

    pub const fn required(mut self) -> Self {
        self.presence = Presence::Required;
        self
    }

    pub const fn computed(mut self) -> Self {
        self.presence = Presence::Computed;
        self
    }

    pub const fn output(mut self) -> Self {
        self.presence = Presence::Output;
        self
    }

    pub const fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub const fn create_only(mut self) -> Self {
        self.create_only = true;
        self
    }

    pub const fn unreported(mut self) -> Self {
        self.reported = false;
        self
    }

    pub const fn max_items(mut self, max: usize) -> Self {
        if let FieldKind::StringSet { .. } = self.kind {
            self.kind = FieldKind::StringSet {
                max_items: Some(max),
            };
        }
        self
    }

    pub const fn check(mut self, check: ElemCheck) -> Self {
        self.check = check;
        self
    }

    pub const fn default(mut self, default: FieldDefault) -> Self {
        self.default = Some(default);
        self
    }

    pub const fn conflicts_with(mut self, fields: &'static [&'static str]) -> Self {
        self.conflicts_with = fields;
        self
    }

    /// Whether the caller may supply this field
    pub fn is_input(&self) -> bool {
        self.presence != Presence::Output
    }

    /// Whether the remote fills this field in when it is omitted
    pub fn is_computed(&self) -> bool {
        matches!(self.presence, Presence::Computed | Presence::Output)
    }

    /// Render a value for logs and diffs, hiding sensitive values
    pub fn render(&self, value: &Value) -> String {
        if self.sensitive {
            "(sensitive)".to_string()
        } else {
            value.to_string()
        }
    }
}

/// Nested single-block sub-document
#[derive(Debug)]
pub struct BlockSpec {
    pub fields: &'static [FieldSpec],
    /// Exactly one of these fields must be set when the block is present
    pub exactly_one_of: &'static [&'static str],
}

impl BlockSpec {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// How the remote applies an update request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// The update overwrites the whole settable configuration
    Replace,
    /// The update only touches the members it carries
    Patch,
}

/// Where the compound identity lives in documents and on the wire
#[derive(Debug, Clone, Copy)]
pub struct IdentitySpec {
    /// Attribute holding the parent collection id
    pub parent_field: &'static str,
    /// Wire member holding the remote-assigned resource id
    pub id_wire: &'static str,
}

/// Complete description of one resource type
#[derive(Debug)]
pub struct ResourceSchema {
    pub type_name: &'static str,
    pub fields: &'static [FieldSpec],
    pub identity: IdentitySpec,
    pub update_mode: UpdateMode,
    /// Whether the remote keeps "sent empty set" apart from "omitted"
    pub distinguishes_empty_sets: bool,
}

impl ResourceSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields whose change forces replacement
    pub fn force_new_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.force_new)
    }

    /// Parent collection id named by a document
    pub fn parent_of<'d>(&self, doc: &'d Document) -> Option<&'d str> {
        doc.get_str(self.identity.parent_field)
    }

    /// Copy of `doc` with declared defaults filled in, nested blocks included
    pub fn apply_defaults(&self, doc: &Document) -> Document {
        apply_defaults(self.fields, doc)
    }

    /// Copy into `observed` the applied values of fields Read never reports
    pub fn carry_unreported(&self, applied: &Document, observed: &mut Document) {
        for field in self.fields.iter().filter(|f| !f.reported) {
            if let Some(value) = applied.get(field.name) {
                observed.insert(field.name, value.clone());
            }
        }
    }

    /// Seed a desired document from an observed one
    ///
    /// Drops output-only fields so the result is acceptable input.
    pub fn seed_desired(&self, observed: &Document) -> Document {
        observed
            .iter()
            .filter(|(name, _)| self.field(name).is_some_and(FieldSpec::is_input))
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    /// Copy of `doc` safe to print: sensitive values are masked
    pub fn redact(&self, doc: &Document) -> Document {
        redact(self.fields, doc)
    }
}

fn redact(fields: &[FieldSpec], doc: &Document) -> Document {
    doc.iter()
        .map(|(name, value)| {
            let field = fields.iter().find(|f| f.name == name);
            let shown = match (field, value) {
                (Some(f), _) if f.sensitive => Value::from(f.render(value)),
                (Some(FieldSpec { kind: FieldKind::Block(spec), .. }), Value::Block(block)) => {
                    Value::Block(redact(spec.fields, block))
                }
                _ => value.clone(),
            };
            (name.to_string(), shown)
        })
        .collect()
}

fn apply_defaults(fields: &[FieldSpec], doc: &Document) -> Document {
    let mut out = doc.clone();
    for field in fields {
        match (&field.kind, doc.get(field.name)) {
            (FieldKind::Block(spec), Some(Value::Block(block))) => {
                out.insert(field.name, apply_defaults(spec.fields, block));
            }
            (_, None) => {
                if let Some(default) = field.default {
                    out.insert(field.name, default.to_value());
                }
            }
            _ => {}
        }
    }
    out
}


#[cfg(test)]
mod tests {
    use super::fixtures::WIDGET;
    use super::*;

    #[test]
    fn test_apply_defaults_fills_top_level_and_block() {
        let doc = Document::new()
            .with("name", "w")
            .with("source", Document::new().with("source_id", "s-1"));

        let normalized = WIDGET.apply_defaults(&doc);

        assert_eq!(normalized.get_int("ttl"), Some(30));
        assert_eq!(normalized.get_bool("seal"), Some(false));
        assert_eq!(
            normalized.get_block("source").and_then(|b| b.get_bool("shared")),
            Some(false)
        );
    }

    #[test]
    fn test_apply_defaults_keeps_explicit_values() {
        let doc = Document::new().with("ttl", 5_i64);
        assert_eq!(WIDGET.apply_defaults(&doc).get_int("ttl"), Some(5));
    }

    #[test]
    fn test_max_items_only_applies_to_sets() {
        let field = FieldSpec::string("x", "X").max_items(3);
        assert!(matches!(field.kind, FieldKind::String));
    }

    #[test]
    fn test_seed_desired_drops_output_fields() {
        let observed = Document::new()
            .with("name", "w")
            .with("secret", "hunter2")
            .with("unknown", "x");
        let seeded = WIDGET.seed_desired(&observed);
        assert!(seeded.contains("name"));
        assert!(!seeded.contains("secret"));
        assert!(!seeded.contains("unknown"));
    }

    #[test]
    fn test_carry_unreported() {
        let applied = Document::new().with("seal", true).with("name", "w");
        let mut observed = Document::new().with("name", "remote");
        WIDGET.carry_unreported(&applied, &mut observed);
        assert_eq!(observed.get_bool("seal"), Some(true));
        assert_eq!(observed.get_str("name"), Some("remote"));
    }

    #[test]
    fn test_redact_masks_sensitive_values() {
        let observed = Document::new().with("name", "w").with("secret", "hunter2");
        let shown = WIDGET.redact(&observed);
        assert_eq!(shown.get_str("name"), Some("w"));
        assert_eq!(shown.get_str("secret"), Some("(sensitive)"));
        assert!(!shown.to_string().contains("hunter2"));
    }

    #[test]
    fn test_render_hides_sensitive() {
        let field = WIDGET.field("secret").unwrap();
        assert_eq!(field.render(&Value::from("hunter2")), "(sensitive)");
    }
}
