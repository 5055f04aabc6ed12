//! Settings file (`config.toml`)
//!
//! Every key is optional:
//!
//! ```toml
//! endpoint = "https://cognito-idp.us-east-1.amazonaws.com"
//! timeout_secs = 120
//! jobs = 4
//!
//! [retry]
//! max_attempts = 5
//! base_delay_ms = 500
//! backoff_factor = 2.0
//! max_delay_ms = 20000
//!
//! [settle]
//! max_attempts = 8
//! base_delay_ms = 250
//! ```

use anyhow::{Context, Result};
use declarative::{ControllerOptions, ExecuteOptions, RetryConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory service endpoint
    pub endpoint: Option<String>,
    /// Deadline for each entity's verb pipeline
    pub timeout_secs: u64,
    /// Entities reconciled in parallel
    pub jobs: usize,
    pub retry: RetrySettings,
    /// Read-back polling after Create
    pub settle: RetrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 120,
            jobs: 4,
            retry: RetrySettings::from(&RetryConfig::default()),
            settle: RetrySettings::from(&ControllerOptions::default().settle),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    20_000
}

impl From<&RetryConfig> for RetrySettings {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay_ms: config.base_delay.as_millis() as u64,
            backoff_factor: config.backoff_factor,
            max_delay_ms: config.max_delay.as_millis() as u64,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_millis(settings.base_delay_ms),
            settings.backoff_factor,
        )
        .with_max_delay(Duration::from_millis(settings.max_delay_ms))
    }
}

impl Settings {
    /// Load settings, falling back to defaults when the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid settings in {}", path.display()))?;

        if settings.retry.max_attempts == 0 || settings.settle.max_attempts == 0 {
            anyhow::bail!("{}: max_attempts must be at least 1", path.display());
        }
        for (table, retry) in [("retry", &settings.retry), ("settle", &settings.settle)] {
            if !retry.backoff_factor.is_finite() || retry.backoff_factor < 1.0 {
                anyhow::bail!(
                    "{}: [{table}] backoff_factor must be a number of at least 1.0",
                    path.display()
                );
            }
        }
        if settings.timeout_secs == 0 {
            anyhow::bail!("{}: timeout_secs must be at least 1", path.display());
        }

        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            retry: RetryConfig::from(&self.retry),
            settle: RetryConfig::from(&self.settle),
        }
    }

    pub fn execute_options(&self, dry_run: bool, jobs: Option<usize>) -> ExecuteOptions {
        ExecuteOptions {
            dry_run,
            jobs: jobs.unwrap_or(self.jobs).max(1),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}
