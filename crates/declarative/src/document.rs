//! Typed attribute documents
//!
//! A [`Document`] is the desired-state or observed-state shape of one
//! entity: attribute name to [`Value`]. A missing key means the attribute
//! is absent. Set-valued attributes keep the difference between "absent"
//! and "present but empty", see [`SetState`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A single attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    /// Unordered set of strings; iteration order is the canonical order
    Set(BTreeSet<String>),
    /// Nested single block
    Block(Document),
}

impl Value {
    /// Build a set value from any iterator of string-likes
    pub fn set<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Set(items.into_iter().map(Into::into).collect())
    }

    /// Short type name used in violations
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::Str(_) => "string",
            Self::Set(_) => "set of strings",
            Self::Block(_) => "block",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&Document> {
        match self {
            Self::Block(d) => Some(d),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<Document> for Value {
    fn from(d: Document) -> Self {
        Self::Block(d)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Set(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item:?}")?;
                }
                write!(f, "]")
            }
            Self::Block(doc) => write!(f, "{doc}"),
        }
    }
}

/// Three-way view of a set-valued attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetState<'a> {
    /// Attribute not present at all (not sent / not reported)
    Absent,
    /// Attribute present with zero elements
    Empty,
    /// Attribute present with at least one element
    Populated(&'a BTreeSet<String>),
}

impl SetState<'_> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Number of elements, zero for both absent and empty
    pub fn len(&self) -> usize {
        match self {
            Self::Populated(items) => items.len(),
            _ => 0,
        }
    }
}

/// Attribute name to value mapping for one entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(BTreeMap<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.to_string(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    pub fn get_block(&self, name: &str) -> Option<&Document> {
        self.get(name).and_then(Value::as_block)
    }

    /// Three-way state of a set attribute
    ///
    /// A value of another type reads as absent.
    pub fn set_state(&self, name: &str) -> SetState<'_> {
        match self.get(name).and_then(Value::as_set) {
            None => SetState::Absent,
            Some(items) if items.is_empty() => SetState::Empty,
            Some(items) => SetState::Populated(items),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name} = {value}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_state_three_way() {
        let doc = Document::new()
            .with("empty", Value::set(Vec::<String>::new()))
            .with("full", Value::set(["b", "a"]));

        assert_eq!(doc.set_state("missing"), SetState::Absent);
        assert_eq!(doc.set_state("empty"), SetState::Empty);
        assert!(matches!(doc.set_state("full"), SetState::Populated(s) if s.len() == 2));
    }

    #[test]
    fn test_set_display_is_canonical() {
        let value = Value::set(["zeta", "alpha", "mid"]);
        assert_eq!(value.to_string(), r#"["alpha", "mid", "zeta"]"#);
    }

    #[test]
    fn test_toml_round_trip_keeps_types() {
        let doc: Document = toml::from_str(
            r#"
name = "app1"
generate_secret = true
refresh_token_validity = 30
callback_urls = ["https://b.example", "https://a.example"]

[analytics_configuration]
application_id = "abc"
"#,
        )
        .unwrap();

        assert_eq!(doc.get_str("name"), Some("app1"));
        assert_eq!(doc.get_bool("generate_secret"), Some(true));
        assert_eq!(doc.get_int("refresh_token_validity"), Some(30));
        assert_eq!(doc.set_state("callback_urls").len(), 2);
        assert_eq!(
            doc.get_block("analytics_configuration")
                .and_then(|b| b.get_str("application_id")),
            Some("abc")
        );
    }
}
