//! Validator: structural and semantic checks before any network call
//!
//! Every check runs; violations are collected so a caller can fix all of
//! them in one pass.

use crate::document::{Document, Value};
use crate::schema::{BlockSpec, ElemCheck, FieldKind, FieldSpec, Presence, ResourceSchema};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// Longest URL the remote accepts
pub const MAX_URL_LENGTH: usize = 1024;

/// Scopes reserved by the directory service
pub const RESERVED_SCOPES: &[&str] = &[
    "phone",
    "email",
    "openid",
    "profile",
    "aws.cognito.signin.user.admin",
];

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://\S+$").expect("URL pattern is valid")
});

static ARN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:[A-Za-z0-9\-]+:[A-Za-z0-9\-]+:[a-z0-9\-]*:(\d{12})?:\S+$")
        .expect("ARN pattern is valid")
});

static CUSTOM_SCOPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+/\S+$").expect("scope pattern is valid"));

/// What is wrong with a field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViolationKind {
    #[error("is required")]
    Required,
    #[error("is not a known attribute")]
    UnknownField,
    #[error("is computed by the remote and cannot be set")]
    OutputOnly,
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("has {found} items, at most {max} allowed")]
    TooManyItems { max: usize, found: usize },
    #[error("{value} is not one of: {}", .allowed.join(", "))]
    NotAllowed {
        value: String,
        allowed: &'static [&'static str],
    },
    #[error("{value} is outside {min}..={max}")]
    OutOfRange { value: i64, min: i64, max: i64 },
    #[error("{value} is not a valid URL")]
    InvalidUrl { value: String },
    #[error("{value} is not a valid ARN")]
    InvalidArn { value: String },
    #[error("{value} is neither a reserved scope nor <resource-server>/<scope>")]
    InvalidScope { value: String },
    #[error("exactly one of {} must be set", .fields.join(", "))]
    ExactlyOneOf { fields: Vec<String> },
    #[error("conflicts with {other}")]
    ConflictsWith { other: String },
}

/// A single failed constraint, keyed by field (`block.field` when nested)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {kind}")]
pub struct ConstraintViolation {
    pub field: String,
    pub kind: ViolationKind,
}

impl ConstraintViolation {
    fn new(field: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }
}

/// Aggregate of violations, displayed one per line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Violations(pub Vec<ConstraintViolation>);

impl Violations {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConstraintViolation> {
        self.0.iter()
    }

    /// Whether some violation concerns `field`
    pub fn mentions(&self, field: &str) -> bool {
        self.0.iter().any(|v| v.field == field)
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {violation}")?;
        }
        Ok(())
    }
}

/// Check a desired document against its schema
///
/// Defaults are applied before checking, so omitted defaulted fields are
/// never reported as missing.
pub fn validate(schema: &ResourceSchema, doc: &Document) -> Violations {
    let doc = schema.apply_defaults(doc);
    let mut out = Vec::new();
    check_fields(schema.fields, "", &doc, &mut out);
    Violations(out)
}

fn check_fields(fields: &[FieldSpec], prefix: &str, doc: &Document, out: &mut Vec<ConstraintViolation>) {
    for name in doc.keys() {
        if !fields.iter().any(|f| f.name == name) {
            out.push(ConstraintViolation::new(
                format!("{prefix}{name}"),
                ViolationKind::UnknownField,
            ));
        }
    }

    for field in fields {
        let key = format!("{prefix}{}", field.name);
        let Some(value) = doc.get(field.name) else {
            if field.presence == Presence::Required {
                out.push(ConstraintViolation::new(key, ViolationKind::Required));
            }
            continue;
        };

        if field.presence == Presence::Output {
            out.push(ConstraintViolation::new(key, ViolationKind::OutputOnly));
            continue;
        }

        if !field.kind.accepts(value) {
            out.push(ConstraintViolation::new(
                key,
                ViolationKind::TypeMismatch {
                    expected: field.kind.type_name(),
                    found: value.type_name(),
                },
            ));
            continue;
        }

        check_value(field, &key, value, out);

        for other in field.conflicts_with {
            if doc.contains(other) {
                out.push(ConstraintViolation::new(
                    key.clone(),
                    ViolationKind::ConflictsWith {
                        other: format!("{prefix}{other}"),
                    },
                ));
            }
        }
    }
}

fn check_value(field: &FieldSpec, key: &str, value: &Value, out: &mut Vec<ConstraintViolation>) {
    match (&field.kind, value) {
        (FieldKind::String, Value::Str(s)) => {
            if field.presence == Presence::Required && s.trim().is_empty() {
                out.push(ConstraintViolation::new(key, ViolationKind::Required));
            }
            if let Some(kind) = check_elem(field, s) {
                out.push(ConstraintViolation::new(key, kind));
            }
        }
        (FieldKind::Int { min, max }, Value::Int(i)) => {
            if i < min || i > max {
                out.push(ConstraintViolation::new(
                    key,
                    ViolationKind::OutOfRange {
                        value: *i,
                        min: *min,
                        max: *max,
                    },
                ));
            }
        }
        (FieldKind::StringSet { max_items }, Value::Set(items)) => {
            if let Some(max) = max_items
                && items.len() > *max
            {
                out.push(ConstraintViolation::new(
                    key,
                    ViolationKind::TooManyItems {
                        max: *max,
                        found: items.len(),
                    },
                ));
            }
            for item in items {
                if let Some(kind) = check_elem(field, item) {
                    out.push(ConstraintViolation::new(key, kind));
                }
            }
        }
        (FieldKind::Block(spec), Value::Block(block)) => check_block(spec, key, block, out),
        _ => {}
    }
}

fn check_block(spec: &BlockSpec, key: &str, block: &Document, out: &mut Vec<ConstraintViolation>) {
    let prefix = format!("{key}.");
    check_fields(spec.fields, &prefix, block, out);

    if !spec.exactly_one_of.is_empty() {
        let set = spec
            .exactly_one_of
            .iter()
            .filter(|name| block.contains(name))
            .count();
        if set != 1 {
            out.push(ConstraintViolation::new(
                key,
                ViolationKind::ExactlyOneOf {
                    fields: spec
                        .exactly_one_of
                        .iter()
                        .map(|name| format!("{prefix}{name}"))
                        .collect(),
                },
            ));
        }
    }
}

fn check_elem(field: &FieldSpec, value: &str) -> Option<ViolationKind> {
    // Keep sensitive values out of the violation text.
    let shown = || {
        if field.sensitive {
            "(sensitive)".to_string()
        } else {
            format!("{value:?}")
        }
    };
    match field.check {
        ElemCheck::None => None,
        ElemCheck::OneOf(allowed) => (!allowed.contains(&value)).then(|| ViolationKind::NotAllowed {
            value: shown(),
            allowed,
        }),
        ElemCheck::Url => (value.len() > MAX_URL_LENGTH || !URL_RE.is_match(value))
            .then(|| ViolationKind::InvalidUrl { value: shown() }),
        ElemCheck::Arn => {
            (!ARN_RE.is_match(value)).then(|| ViolationKind::InvalidArn { value: shown() })
        }
        ElemCheck::OAuthScope => (!RESERVED_SCOPES.contains(&value)
            && !CUSTOM_SCOPE_RE.is_match(value))
        .then(|| ViolationKind::InvalidScope { value: shown() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::WIDGET;

    fn valid() -> Document {
        Document::new()
            .with("name", "w1")
            .with("bucket", "b1")
            .with("source", Document::new().with("source_id", "s-1"))
    }

    #[test]
    fn test_valid_document() {
        assert!(validate(&WIDGET, &valid()).is_empty());
    }

    #[test]
    fn test_missing_required_and_unknown_reported_together() {
        let doc = Document::new().with("colour", "red");
        let violations = validate(&WIDGET, &doc);
        assert!(violations.mentions("name"));
        assert!(violations.mentions("bucket"));
        assert!(violations.mentions("colour"));
        assert_eq!(violations.len(), 3);
    }

    #[test]
    fn test_output_field_rejected() {
        let violations = validate(&WIDGET, &valid().with("secret", "hunter2"));
        assert_eq!(violations.0[0].kind, ViolationKind::OutputOnly);
        assert!(!violations.to_string().contains("hunter2"));
    }

    #[test]
    fn test_type_mismatch() {
        let violations = validate(&WIDGET, &valid().with("ttl", "long"));
        assert!(matches!(
            violations.0[0].kind,
            ViolationKind::TypeMismatch { expected: "integer", found: "string" }
        ));
    }

    #[test]
    fn test_range() {
        assert!(validate(&WIDGET, &valid().with("ttl", 101_i64)).mentions("ttl"));
        assert!(validate(&WIDGET, &valid().with("ttl", 100_i64)).is_empty());
    }

    #[test]
    fn test_cardinality_boundary() {
        let three = Value::set(["a", "b", "c"]);
        let four = Value::set(["a", "b", "c", "d"]);
        assert!(validate(&WIDGET, &valid().with("tags", three)).is_empty());
        let violations = validate(&WIDGET, &valid().with("tags", four));
        assert_eq!(
            violations.0[0].kind,
            ViolationKind::TooManyItems { max: 3, found: 4 }
        );
    }

    #[test]
    fn test_enum_membership_per_element() {
        let violations = validate(&WIDGET, &valid().with("modes", Value::set(["fast", "warp", "jump"])));
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn test_url_syntax() {
        let ok = Value::set(["https://example.com/cb", "myapp://callback"]);
        assert!(validate(&WIDGET, &valid().with("urls", ok)).is_empty());

        let bad = Value::set(["not a url"]);
        assert!(matches!(
            validate(&WIDGET, &valid().with("urls", bad)).0[0].kind,
            ViolationKind::InvalidUrl { .. }
        ));

        let long = format!("https://example.com/{}", "x".repeat(MAX_URL_LENGTH));
        assert!(validate(&WIDGET, &valid().with("urls", Value::set([long]))).mentions("urls"));
    }

    #[test]
    fn test_exactly_one_of_neither() {
        let doc = valid().with("source", Document::new().with("shared", true));
        let violations = validate(&WIDGET, &doc);
        assert!(matches!(violations.0[0].kind, ViolationKind::ExactlyOneOf { .. }));
    }

    #[test]
    fn test_exactly_one_of_both() {
        let doc = valid().with(
            "source",
            Document::new()
                .with("source_id", "s-1")
                .with("source_arn", "arn:aws:mobiletargeting:us-east-1:123456789012:apps/abc"),
        );
        let violations = validate(&WIDGET, &doc);
        assert!(violations.mentions("source"));
    }

    #[test]
    fn test_conflicts_with_inside_block() {
        let doc = valid().with(
            "source",
            Document::new()
                .with("source_arn", "arn:aws:mobiletargeting:us-east-1:123456789012:apps/abc")
                .with("token", "t"),
        );
        let violations = validate(&WIDGET, &doc);
        assert!(violations.iter().any(|v| v.field == "source.source_arn"
            && v.kind == ViolationKind::ConflictsWith { other: "source.token".into() }));
        assert!(violations.mentions("source.token"));
    }

    #[test]
    fn test_invalid_arn() {
        let doc = valid().with("source", Document::new().with("source_arn", "arn:broken"));
        assert!(validate(&WIDGET, &doc).iter().any(|v| matches!(v.kind, ViolationKind::InvalidArn { .. })));
    }

    #[test]
    fn test_display_lists_every_violation() {
        let violations = validate(&WIDGET, &Document::new());
        let text = violations.to_string();
        assert!(text.contains("name: is required"));
        assert!(text.contains("bucket: is required"));
    }
}
