//! XDG-compliant path management

use crate::catalog::{PackageId, VariantId};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Manages all application paths using XDG base directory specification
#[derive(Debug, Clone)]
pub struct Paths {
    dirs: ProjectDirs,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let dirs = ProjectDirs::from("", "", "gridpack")
            .expect("Failed to determine project directories");
        Self { dirs }
    }

    // ========== Config Paths ==========

    /// Config directory: ~/.config/gridpack/
    pub fn config_dir(&self) -> PathBuf {
        self.dirs.config_dir().to_path_buf()
    }

    /// Main config file: ~/.config/gridpack/config.toml
    pub fn config_file(&self) -> PathBuf {
        self.config_dir().join("config.toml")
    }

    // ========== Data Paths ==========

    /// Data directory: ~/.local/share/gridpack/
    pub fn data_dir(&self) -> PathBuf {
        self.dirs.data_dir().to_path_buf()
    }

    /// Channel manifests: ~/.local/share/gridpack/channel/
    pub fn channel_dir(&self) -> PathBuf {
        self.data_dir().join("channel")
    }

    /// Installed variant files: ~/.local/share/gridpack/store/
    pub fn store_dir(&self) -> PathBuf {
        self.data_dir().join("store")
    }

    /// Store directory for one variant
    pub fn variant_dir(&self, package: &PackageId, variant: &VariantId) -> PathBuf {
        self.store_dir()
            .join(package.as_str().replace(':', "."))
            .join(variant.as_str())
    }

    /// Profiles directory: ~/.local/share/gridpack/profiles/
    pub fn profiles_dir(&self) -> PathBuf {
        self.data_dir().join("profiles")
    }

    /// Default game plugins directory: ~/.local/share/gridpack/plugins/
    pub fn plugins_dir(&self) -> PathBuf {
        self.data_dir().join("plugins")
    }

    // ========== Cache Paths ==========

    /// Cache directory: ~/.cache/gridpack/
    pub fn cache_dir(&self) -> PathBuf {
        self.dirs.cache_dir().to_path_buf()
    }

    /// Downloaded asset cache: ~/.cache/gridpack/assets/
    pub fn assets_dir(&self) -> PathBuf {
        self.cache_dir().join("assets")
    }

    // ========== Utility Methods ==========

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.config_dir())?;
        std::fs::create_dir_all(self.data_dir())?;
        std::fs::create_dir_all(self.channel_dir())?;
        std::fs::create_dir_all(self.store_dir())?;
        std::fs::create_dir_all(self.profiles_dir())?;
        std::fs::create_dir_all(self.plugins_dir())?;
        std::fs::create_dir_all(self.assets_dir())?;
        Ok(())
    }
}
