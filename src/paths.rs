//! Path resolution for driftscan
//!
//! # Environment Variables
//!
//! - `DRIFTSCAN_CONFIG` - Explicit config file
//! - `DRIFTSCAN_CONFIG_DIR` - Override the user config directory
//!
//! # Config Lookup Priority
//!
//! 1. `--config <FILE>`
//! 2. `DRIFTSCAN_CONFIG`
//! 3. `<baseline>/driftscan.toml`
//! 4. `<user config dir>/driftscan.toml`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const ENV_CONFIG: &str = "DRIFTSCAN_CONFIG";

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "DRIFTSCAN_CONFIG_DIR";

/// Name of the config file looked up in the baseline and user config dir
pub const CONFIG_FILE_NAME: &str = "driftscan.toml";

/// Get the driftscan user config directory
///
/// Priority:
/// 1. `DRIFTSCAN_CONFIG_DIR` env var
/// 2. `XDG_CONFIG_HOME/driftscan`
/// 3. Platform default (`~/.config/driftscan` on Unix)
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("driftscan");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            return Ok(app_data.join("driftscan"));
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("driftscan");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Config file named by `DRIFTSCAN_CONFIG`, if set.
pub fn config_file_from_env() -> Option<PathBuf> {
    std::env::var(ENV_CONFIG)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(|v| expand(&v))
}

/// Where a config file was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Passed with `--config` or `DRIFTSCAN_CONFIG`; must exist
    Explicit(PathBuf),
    /// Found by convention
    Discovered(PathBuf),
    /// No file; built-in defaults apply
    None,
}

/// Pick the config file to load.
///
/// Candidates are passed in so lookup is testable without touching the
/// process environment.
pub fn locate_config(
    flag: Option<&Path>,
    env: Option<PathBuf>,
    baseline_dir: Option<&Path>,
    user_dir: Option<PathBuf>,
) -> ConfigSource {
    if let Some(path) = flag {
        return ConfigSource::Explicit(expand(&path.to_string_lossy()));
    }
    if let Some(path) = env {
        return ConfigSource::Explicit(path);
    }

    let conventional = baseline_dir
        .map(|d| d.join(CONFIG_FILE_NAME))
        .into_iter()
        .chain(user_dir.map(|d| d.join(CONFIG_FILE_NAME)));
    for candidate in conventional {
        if candidate.is_file() {
            log::debug!("Found config at {}", candidate.display());
            return ConfigSource::Discovered(candidate);
        }
    }
    ConfigSource::None
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
