//! Path resolution for idpctl
//!
//! # Environment Variables
//!
//! - `IDPCTL_CONFIG_DIR` - Override config directory
//! - `IDPCTL_STATE_DIR` - Override state directory
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `IDPCTL_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/idpctl` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\idpctl`
//!    - macOS/Linux: `~/.config/idpctl`
//!
//! For state_dir():
//! 1. `IDPCTL_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/idpctl` (if set)
//! 3. Platform default:
//!    - Windows: `%LOCALAPPDATA%\idpctl`
//!    - macOS/Linux: `~/.local/state/idpctl`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "idpctl";

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "IDPCTL_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "IDPCTL_STATE_DIR";

pub const CONFIG_FILE: &str = "config.toml";
pub const STATE_FILE: &str = "state.toml";

/// Get the idpctl config directory path
pub fn config_dir() -> Result<PathBuf> {
    let platform = if cfg!(windows) {
        dirs::config_dir()
    } else {
        dirs::home_dir().map(|home| home.join(".config"))
    };
    resolve(
        std::env::var(ENV_CONFIG_DIR).ok().as_deref(),
        std::env::var("XDG_CONFIG_HOME").ok().as_deref(),
        platform.as_deref(),
    )
    .context("Could not determine config directory")
}

/// Get the idpctl state directory path
pub fn state_dir() -> Result<PathBuf> {
    let platform = if cfg!(windows) {
        dirs::data_local_dir()
    } else {
        dirs::home_dir().map(|home| home.join(".local").join("state"))
    };
    resolve(
        std::env::var(ENV_STATE_DIR).ok().as_deref(),
        std::env::var("XDG_STATE_HOME").ok().as_deref(),
        platform.as_deref(),
    )
    .context("Could not determine state directory")
}

/// Default settings file
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Default state file
pub fn state_file() -> Result<PathBuf> {
    Ok(state_dir()?.join(STATE_FILE))
}

/// Pick a directory: explicit override, then XDG base, then platform base
fn resolve(override_dir: Option<&str>, xdg: Option<&str>, platform: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = override_dir.filter(|d| !d.is_empty()) {
        let path = expand(dir);
        log::debug!("Using directory override: {}", path.display());
        return Some(path);
    }

    if let Some(base) = xdg.filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(base).join(APP_DIR));
    }

    platform.map(|base| base.join(APP_DIR))
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
