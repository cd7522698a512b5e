//! `driftscan.toml` configuration.
//!
//! Every key is optional; command-line flags override file values and
//! built-in defaults fill the rest.

use anyhow::{Context, Result};
use driftkit::ReportLayout;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths::{self, ConfigSource};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Resource group to inspect
    pub environment: Option<String>,
    pub baseline_dir: Option<String>,
    pub output_dir: Option<String>,
    pub match_by_type: Option<bool>,
    pub include_unsupported: Option<bool>,
    pub include_removed: Option<bool>,
    pub layout: Option<ReportLayout>,
    /// Per external call
    pub timeout_secs: Option<u64>,
    pub recover_individually: Option<bool>,
    pub az_path: Option<String>,
    pub bicep_path: Option<String>,
}

impl Config {
    /// Parse config content.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML format in driftscan config")
    }

    /// Load a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("In {}", path.display()))
    }

    /// Locate and load the config for a run.
    ///
    /// An explicit file that is missing is an error; a missing conventional
    /// file just means defaults.
    pub fn discover(flag: Option<&Path>, baseline_dir: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let user_dir = paths::config_dir().ok();
        match paths::locate_config(flag, paths::config_file_from_env(), baseline_dir, user_dir) {
            ConfigSource::Explicit(path) | ConfigSource::Discovered(path) => {
                log::info!("Using config {}", path.display());
                Ok((Self::load(&path)?, Some(path)))
            }
            ConfigSource::None => {
                log::debug!("No config file found, using defaults");
                Ok((Self::default(), None))
            }
        }
    }

    pub fn baseline_path(&self) -> Option<PathBuf> {
        self.baseline_dir.as_deref().map(paths::expand)
    }

    pub fn output_path(&self) -> Option<PathBuf> {
        self.output_dir.as_deref().map(paths::expand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(
            r#"
environment = "rg-prod"
baseline_dir = "~/infra"
output_dir = "drift"
match_by_type = true
include_unsupported = false
include_removed = true
layout = "per-resource"
timeout_secs = 300
recover_individually = true
az_path = "/usr/bin/az"
bicep_path = "/usr/local/bin/bicep"
"#,
        )
        .unwrap();

        assert_eq!(config.environment.as_deref(), Some("rg-prod"));
        assert_eq!(config.match_by_type, Some(true));
        assert_eq!(config.include_unsupported, Some(false));
        assert_eq!(config.layout, Some(ReportLayout::PerResource));
        assert_eq!(config.timeout_secs, Some(300));
        assert!(!config.baseline_path().unwrap().starts_with("~"));
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(Config::from_toml("enviroment = \"typo\"").is_err());
    }

    #[test]
    fn test_bad_layout_is_rejected() {
        assert!(Config::from_toml("layout = \"flat\"").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = Config::load(&temp.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("Could not read config file"));
    }

    #[test]
    fn test_discover_explicit_file() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(paths::CONFIG_FILE_NAME),
            "environment = \"rg-dev\"\n",
        )
        .unwrap();

        let explicit = temp.path().join(paths::CONFIG_FILE_NAME);
        let (config, path) = Config::discover(Some(&explicit), None).unwrap();
        assert_eq!(config.environment.as_deref(), Some("rg-dev"));
        assert_eq!(path, Some(explicit));
    }
}
