//! Configuration management for Gridpack
//!
//! Uses XDG-compliant paths:
//! - Config: ~/.config/gridpack/config.toml
//! - Data: ~/.local/share/gridpack/
//! - Cache: ~/.cache/gridpack/

mod paths;

pub use paths::Paths;

use crate::catalog::OptionValue;
use crate::profiles::ProfileId;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Profile applied at startup; exactly one profile is current
    pub current_profile: Option<ProfileId>,

    /// Parallel download limit for the asset scheduler
    pub max_concurrent_downloads: usize,

    /// Override for the game plugins directory
    pub plugins_dir_override: Option<String>,

    /// Override for the downloaded asset cache directory
    pub cache_dir_override: Option<String>,

    /// Baseline feature flags; profiles overlay these
    pub features: BTreeMap<String, bool>,

    /// Free-form values conditions can reference
    pub values: BTreeMap<String, OptionValue>,

    /// Paths configuration
    #[serde(skip)]
    pub paths: Paths,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            current_profile: None,
            max_concurrent_downloads: 3,
            plugins_dir_override: None,
            cache_dir_override: None,
            features: BTreeMap::new(),
            values: BTreeMap::new(),
            paths: Paths::new(),
        }
    }
}

impl Settings {
    /// Load settings from the config file, falling back to defaults
    pub async fn load() -> Result<Self> {
        let paths = Paths::new();
        let config_file = paths.config_file();

        if !config_file.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_file)
            .await
            .context("Failed to read config file")?;
        let mut settings: Settings = toml::from_str(&content).context("Failed to parse config")?;
        settings.paths = paths;

        Ok(settings)
    }

    /// Save settings to the config file
    pub async fn save(&self) -> Result<()> {
        fs::create_dir_all(self.paths.config_dir())
            .await
            .context("Failed to create config directory")?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(self.paths.config_file(), content)
            .await
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Effective plugins directory
    pub fn plugins_dir(&self) -> PathBuf {
        self.plugins_dir_override
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.paths.plugins_dir())
    }

    /// Effective asset cache directory
    pub fn assets_dir(&self) -> PathBuf {
        self.cache_dir_override
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.paths.assets_dir())
    }
}
