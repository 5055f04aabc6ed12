//! Desired configuration (`resources.toml`)
//!
//! One table per entity, addressed `<type>.<name>`:
//!
//! ```toml
//! [user_pool_client.web]
//! name = "web"
//! user_pool_id = "us-east-1_AbCdEf"
//! generate_secret = true
//! callback_urls = ["https://app.example.com/callback"]
//!
//! [user_pool_client.web.analytics_configuration]
//! application_id = "0123456789abcdef"
//! ```

use anyhow::{Context, Result, bail};
use declarative::{Document, ResourceSchema};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Desired documents keyed by type, then by entity name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resources {
    by_type: BTreeMap<String, BTreeMap<String, Document>>,
}

impl Resources {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid resources file {}", path.display()))
    }

    /// Parse and check that every type is known
    pub fn parse(content: &str) -> Result<Self> {
        let by_type: BTreeMap<String, BTreeMap<String, Document>> = toml::from_str(content)?;

        for type_name in by_type.keys() {
            if poolkit::schema_for(type_name).is_none() {
                bail!(
                    "Unknown resource type '{type_name}' (known: {})",
                    known_types().join(", ")
                );
            }
        }

        Ok(Self { by_type })
    }

    /// Desired documents of one type, empty when none are declared
    pub fn of_type(&self, schema: &ResourceSchema) -> BTreeMap<String, Document> {
        self.by_type.get(schema.type_name).cloned().unwrap_or_default()
    }

    /// Every `(type, name, document)`
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &Document)> {
        self.by_type.iter().flat_map(|(type_name, entities)| {
            entities
                .iter()
                .map(move |(name, doc)| (type_name.as_str(), name.as_str(), doc))
        })
    }

    pub fn len(&self) -> usize {
        self.by_type.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn known_types() -> Vec<&'static str> {
    poolkit::SCHEMAS.iter().map(|s| s.type_name).collect()
}

/// Render a document as a `resources.toml` entry
pub fn to_snippet(type_name: &str, name: &str, doc: &Document) -> Result<String> {
    let mut entity = BTreeMap::new();
    entity.insert(name.to_string(), doc);
    let mut root = BTreeMap::new();
    root.insert(type_name.to_string(), entity);
    toml::to_string_pretty(&root).context("Failed to render resource as TOML")
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolkit::USER_POOL_CLIENT;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[user_pool_client.web]
name = "web"
user_pool_id = "pool1"
generate_secret = true
callback_urls = ["https://app.example.com/callback"]

[user_pool_client.web.analytics_configuration]
application_id = "abc"

[user_pool_client.cli]
name = "cli"
user_pool_id = "pool1"
"#;

    #[test]
    fn test_parse_entities() {
        let resources = Resources::parse(SAMPLE).unwrap();
        assert_eq!(resources.len(), 2);

        let clients = resources.of_type(&USER_POOL_CLIENT);
        let web = &clients["web"];
        assert_eq!(web.get_bool("generate_secret"), Some(true));
        assert_eq!(web.set_state("callback_urls").len(), 1);
        assert!(web.get_block("analytics_configuration").is_some());
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = Resources::parse("[user_pool.main]\nname = \"x\"\n").unwrap_err();
        assert!(err.to_string().contains("user_pool"));
    }

    #[test]
    fn test_empty_file() {
        let resources = Resources::parse("").unwrap();
        assert!(resources.is_empty());
        assert!(resources.of_type(&USER_POOL_CLIENT).is_empty());
    }

    #[test]
    fn test_load_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("resources.toml");
        fs::write(&path, "not = [valid").unwrap();
        let err = Resources::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("resources.toml"));
    }

    #[test]
    fn test_snippet_parses_back() {
        let resources = Resources::parse(SAMPLE).unwrap();
        let web = &resources.of_type(&USER_POOL_CLIENT)["web"];

        let snippet = to_snippet("user_pool_client", "web", web).unwrap();
        let parsed = Resources::parse(&snippet).unwrap();
        assert_eq!(&parsed.of_type(&USER_POOL_CLIENT)["web"], web);
    }
}
