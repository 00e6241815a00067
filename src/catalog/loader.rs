//! Channel manifest loading
//!
//! A channel is a directory of YAML manifests, one or more packages per file
//! (multi-document streams supported). Defective manifests are logged and
//! skipped so a channel with a few bad entries still loads the rest.

use super::{Catalog, Package};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use walkdir::WalkDir;

/// Load every `*.yaml` / `*.yml` manifest under `dir` into a catalog
pub fn load_catalog(dir: &Path) -> Result<Catalog> {
    let mut catalog = Catalog::new();

    if !dir.exists() {
        tracing::warn!("Channel directory {} does not exist", dir.display());
        return Ok(catalog);
    }

    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let is_manifest = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);
        if !is_manifest {
            continue;
        }

        if let Err(e) = load_manifest(&mut catalog, entry.path()) {
            tracing::warn!("Skipping manifest {}: {:#}", entry.path().display(), e);
        }
    }

    tracing::info!("Loaded {} packages from {}", catalog.len(), dir.display());
    Ok(catalog)
}

/// Parse one manifest file, inserting every package document it holds
fn load_manifest(catalog: &mut Catalog, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path).context("Failed to read manifest")?;

    for document in serde_yaml::Deserializer::from_str(&content) {
        let package = Package::deserialize(document).context("Failed to parse manifest")?;
        catalog
            .insert(package)
            .context("Manifest violates catalog invariants")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"
author: memo
name: submenus
variants:
  - id: standard
    version: "1.1.4"
---
author: memo
name: essentials
variants:
  - id: standard
    version: "0.9"
  - id: lite
    version: "0.9"
"#;

    // Duplicate variant ids violate the catalog invariant.
    const BAD: &str = r#"
author: broken
name: pack
variants:
  - id: v1
    version: "1.0"
  - id: v1
    version: "1.1"
"#;

    #[test]
    fn loads_manifests_and_skips_defective_ones() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.yaml"), GOOD).unwrap();
        std::fs::write(dir.path().join("bad.yaml"), BAD).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a manifest").unwrap();

        let catalog = load_catalog(dir.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog
            .get(&crate::catalog::PackageId::new("memo", "submenus"))
            .is_some());
        assert!(catalog
            .get(&crate::catalog::PackageId::new("broken", "pack"))
            .is_none());
    }

    #[test]
    fn missing_channel_dir_is_empty_catalog() {
        let catalog = load_catalog(Path::new("/nonexistent/channel")).unwrap();
        assert!(catalog.is_empty());
    }
}
