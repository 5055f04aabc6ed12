use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use declarative::{EntityRecord, ExecuteReport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// State Structures
// ============================================================================

/// Everything idpctl knows about the entities it manages
///
/// Records hold the last observed document, client secret included, so
/// the file is only readable by its owner.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IdpState {
    /// Records by resource type, then entity name
    #[serde(default)]
    pub resources: BTreeMap<String, BTreeMap<String, EntityRecord>>,

    /// Last time the state was updated
    pub last_updated: DateTime<Utc>,
}

impl Default for IdpState {
    fn default() -> Self {
        Self {
            resources: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

/// State bound to the file it was loaded from
#[derive(Debug)]
pub struct StateFile {
    path: PathBuf,
    pub state: IdpState,
}

impl StateFile {
    /// Load state from disk, or start empty if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file {} does not exist, starting empty", path.display());
            return Ok(Self {
                path: path.to_path_buf(),
                state: IdpState::default(),
            });
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let state: IdpState = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            state,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save state to disk
    pub fn save(&mut self) -> Result<()> {
        self.state.last_updated = Utc::now();

        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content =
            toml::to_string_pretty(&self.state).context("Failed to serialize state to TOML")?;
        write_private(&self.path, &content)
            .with_context(|| format!("Failed to write state file: {}", self.path.display()))?;

        log::debug!("Saved state to {}", self.path.display());
        Ok(())
    }

    /// Records of one resource type
    pub fn records(&self, type_name: &str) -> BTreeMap<String, EntityRecord> {
        self.state
            .resources
            .get(type_name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn record(&self, type_name: &str, name: &str) -> Option<&EntityRecord> {
        self.state.resources.get(type_name)?.get(name)
    }

    pub fn insert(&mut self, type_name: &str, name: &str, record: EntityRecord) {
        self.state
            .resources
            .entry(type_name.to_string())
            .or_default()
            .insert(name.to_string(), record);
    }

    /// Fold the record changes of an execution into the state
    pub fn apply_report(&mut self, type_name: &str, report: &ExecuteReport) {
        let records = self.state.resources.entry(type_name.to_string()).or_default();
        report.apply_to(records);
        if records.is_empty() {
            self.state.resources.remove(type_name);
        }
    }

    /// Every `(type, name, record)`
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &EntityRecord)> {
        self.state.resources.iter().flat_map(|(type_name, records)| {
            records
                .iter()
                .map(move |(name, record)| (type_name.as_str(), name.as_str(), record))
        })
    }
}

#[cfg(unix)]
fn write_private(path: &Path, content: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // An existing file keeps its mode on open.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(content.as_bytes())
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{Document, ExecuteSummary, EntityReport, RecordChange, ResourceIdentity, ApplyResult};
    use tempfile::TempDir;

    fn record(id: &str) -> EntityRecord {
        EntityRecord::new(
            ResourceIdentity::new("pool1", id),
            Document::new()
                .with("name", "web")
                .with("user_pool_id", "pool1")
                .with("client_secret", "sek-1")
                .with(
                    "analytics_configuration",
                    Document::new().with("application_id", "abc"),
                ),
        )
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let state = StateFile::load(&dir.path().join("state.toml")).unwrap();
        assert_eq!(state.iter().count(), 0);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.toml");

        let mut state = StateFile::load(&path).unwrap();
        state.insert("user_pool_client", "web", record("c-1"));
        state.save().unwrap();

        let reloaded = StateFile::load(&path).unwrap();
        assert_eq!(reloaded.record("user_pool_client", "web"), Some(&record("c-1")));
    }

    #[cfg(unix)]
    #[test]
    fn test_state_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.toml");
        fs::write(&path, "").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let mut state = StateFile::load(&dir.path().join("absent.toml")).unwrap();
        state.path = path.clone();
        state.save().unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_apply_report() {
        let dir = TempDir::new().unwrap();
        let mut state = StateFile::load(&dir.path().join("state.toml")).unwrap();
        state.insert("user_pool_client", "old", record("c-1"));

        let report = ExecuteReport {
            summary: ExecuteSummary::default(),
            entities: vec![
                EntityReport {
                    address: "user_pool_client.old".into(),
                    name: "old".into(),
                    result: ApplyResult::Deleted,
                    record: RecordChange::Remove,
                    warnings: Vec::new(),
                },
                EntityReport {
                    address: "user_pool_client.new".into(),
                    name: "new".into(),
                    result: ApplyResult::Created,
                    record: RecordChange::Store(record("c-2")),
                    warnings: Vec::new(),
                },
            ],
        };
        state.apply_report("user_pool_client", &report);

        assert!(state.record("user_pool_client", "old").is_none());
        assert_eq!(
            state.record("user_pool_client", "new").map(|r| r.identity.resource_id.as_str()),
            Some("c-2")
        );
    }
}
