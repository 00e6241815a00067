//! Symlink-based plugin linking
//!
//! Materializes the resolved file set into the game's plugins directory by
//! diffing the desired symlink set against what is currently on disk and
//! applying only the delta. Repeated application with identical input
//! performs no filesystem operations.

use crate::catalog::{PackageId, VariantId};
use crate::config::Paths;
use crate::resolver::{IncludedFile, VariantListing};
use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Linking statistics
#[derive(Debug, Default)]
pub struct LinkStats {
    pub created: usize,
    pub removed: usize,
    pub kept: usize,
    pub errors: Vec<String>,
}

/// Map included files to their link paths under the plugins directory.
///
/// The priority is encoded as a zero-padded leading path segment, so the
/// game's lexicographic plugin load order agrees with override resolution.
pub fn desired_links(files: &[IncludedFile], paths: &Paths) -> BTreeMap<PathBuf, PathBuf> {
    let mut links = BTreeMap::new();
    for file in files {
        let priority = file.priority.clamp(0, 999);
        let prefix = format!(
            "{:03}-{}",
            priority,
            file.package.as_str().replace(':', ".")
        );
        let link = PathBuf::from(prefix).join(&file.path);
        let target = paths
            .variant_dir(&file.package, &file.variant)
            .join(&file.source);
        links.insert(link, target);
    }
    links
}

/// Lists installed variant files straight from the store
pub struct StoreListing {
    paths: Paths,
}

impl StoreListing {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }
}

impl VariantListing for StoreListing {
    fn list_files(&self, package: &PackageId, variant: &VariantId) -> Result<Vec<String>> {
        let dir = self.paths.variant_dir(package, variant);
        if !dir.exists() {
            bail!("variant '{}' of {} is not installed", variant, package);
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&dir).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&dir) {
                files.push(rel.to_string_lossy().to_string());
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Applies a desired symlink set against the plugins directory.
///
/// Only symlinks pointing into the store are ever touched; user files in the
/// plugins tree are left alone.
pub struct PluginLinker {
    plugins_dir: PathBuf,
    store_dir: PathBuf,
}

impl PluginLinker {
    pub fn new(plugins_dir: impl Into<PathBuf>, store_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
            store_dir: store_dir.into(),
        }
    }

    /// Converge the plugins directory on `desired` (link paths relative to
    /// the plugins directory, mapped to store targets).
    pub async fn apply(&self, desired: &BTreeMap<PathBuf, PathBuf>) -> Result<LinkStats> {
        let mut stats = LinkStats::default();
        let current = self.scan_current();

        let mut wanted: BTreeMap<PathBuf, PathBuf> = desired
            .iter()
            .map(|(link, target)| (self.plugins_dir.join(link), target.clone()))
            .collect();

        // Remove links that are stale or point at the wrong target.
        for (link, target) in &current {
            let keep = wanted
                .get(link)
                .map(|want| {
                    let resolved = want.canonicalize().unwrap_or_else(|_| want.clone());
                    resolved == *target
                })
                .unwrap_or(false);

            if keep {
                stats.kept += 1;
                wanted.remove(link);
            } else if let Err(e) = tokio::fs::remove_file(link).await {
                stats
                    .errors
                    .push(format!("Failed to remove {}: {}", link.display(), e));
            } else {
                stats.removed += 1;
            }
        }

        // Create what is missing.
        for (link, target) in &wanted {
            if !target.exists() {
                stats
                    .errors
                    .push(format!("Link target missing: {}", target.display()));
                continue;
            }
            if let Some(parent) = link.parent() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    stats
                        .errors
                        .push(format!("Failed to create {}: {}", parent.display(), e));
                    continue;
                }
            }
            match symlink(target, link) {
                Ok(()) => stats.created += 1,
                Err(e) => stats
                    .errors
                    .push(format!("Failed to link {}: {}", link.display(), e)),
            }
        }

        self.clean_empty_dirs().await;

        tracing::info!(
            "Linked plugins: {} created, {} removed, {} kept",
            stats.created,
            stats.removed,
            stats.kept
        );
        Ok(stats)
    }

    /// Current store-owned symlinks under the plugins directory.
    ///
    /// Only symlinks resolving into the store are considered ours; everything
    /// else is user data.
    fn scan_current(&self) -> BTreeMap<PathBuf, PathBuf> {
        let mut current = BTreeMap::new();
        if !self.plugins_dir.exists() {
            return current;
        }

        let canonical_store = self
            .store_dir
            .canonicalize()
            .unwrap_or_else(|_| self.store_dir.clone());

        for entry in WalkDir::new(&self.plugins_dir)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            let Ok(metadata) = std::fs::symlink_metadata(path) else {
                continue;
            };
            if !metadata.file_type().is_symlink() {
                continue;
            }
            let Ok(target) = std::fs::read_link(path) else {
                continue;
            };
            let target = if target.is_absolute() {
                target
            } else {
                path.parent().unwrap_or(path).join(&target)
            };

            match target.canonicalize() {
                Ok(canonical) => {
                    if canonical.starts_with(&canonical_store) {
                        current.insert(path.to_path_buf(), canonical);
                    }
                }
                Err(_) => {
                    // Broken link; claim it only if it points at our store.
                    if target.starts_with(&self.store_dir) {
                        current.insert(path.to_path_buf(), target);
                    }
                }
            }
        }

        current
    }

    /// Remove directories left empty after delinking
    async fn clean_empty_dirs(&self) {
        if !self.plugins_dir.exists() {
            return;
        }
        for entry in WalkDir::new(&self.plugins_dir)
            .contents_first(true)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_dir() {
                // Fails harmlessly on non-empty directories.
                tokio::fs::remove_dir(entry.path()).await.ok();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{PackageId, VariantId};

    fn store_file(store: &Path, rel: &str) -> PathBuf {
        let path = store.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"data").unwrap();
        path
    }

    fn desired(pairs: &[(&str, PathBuf)]) -> BTreeMap<PathBuf, PathBuf> {
        pairs
            .iter()
            .map(|(link, target)| (PathBuf::from(link), target.clone()))
            .collect()
    }

    #[tokio::test]
    async fn apply_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let store = root.path().join("store");
        let plugins = root.path().join("plugins");
        let target_a = store_file(&store, "a/default/one.dat");
        let target_b = store_file(&store, "b/default/two.dat");

        let linker = PluginLinker::new(&plugins, &store);
        let links = desired(&[
            ("100-a/one.dat", target_a.clone()),
            ("200-b/two.dat", target_b.clone()),
        ]);

        let first = linker.apply(&links).await.unwrap();
        assert_eq!(first.created, 2);
        assert_eq!(first.removed, 0);
        assert!(first.errors.is_empty());
        assert!(plugins.join("100-a/one.dat").is_symlink());

        // Second run converges without filesystem operations.
        let second = linker.apply(&links).await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.removed, 0);
        assert_eq!(second.kept, 2);
    }

    #[tokio::test]
    async fn stale_links_are_removed_and_user_files_kept() {
        let root = tempfile::tempdir().unwrap();
        let store = root.path().join("store");
        let plugins = root.path().join("plugins");
        let target = store_file(&store, "a/default/one.dat");

        let linker = PluginLinker::new(&plugins, &store);
        let links = desired(&[("100-a/one.dat", target.clone())]);
        linker.apply(&links).await.unwrap();

        // A file the user dropped in by hand.
        std::fs::write(plugins.join("custom.dat"), b"mine").unwrap();

        let stats = linker.apply(&BTreeMap::new()).await.unwrap();
        assert_eq!(stats.removed, 1);
        assert!(!plugins.join("100-a").exists(), "empty dirs are pruned");
        assert!(plugins.join("custom.dat").exists());
    }

    #[tokio::test]
    async fn retargeted_link_is_replaced() {
        let root = tempfile::tempdir().unwrap();
        let store = root.path().join("store");
        let plugins = root.path().join("plugins");
        let old = store_file(&store, "a/v1/one.dat");
        let new = store_file(&store, "a/v2/one.dat");

        let linker = PluginLinker::new(&plugins, &store);
        linker
            .apply(&desired(&[("100-a/one.dat", old)]))
            .await
            .unwrap();
        let stats = linker
            .apply(&desired(&[("100-a/one.dat", new.clone())]))
            .await
            .unwrap();

        assert_eq!(stats.removed, 1);
        assert_eq!(stats.created, 1);
        assert_eq!(
            std::fs::read_link(plugins.join("100-a/one.dat")).unwrap(),
            new
        );
    }

    #[tokio::test]
    async fn missing_target_is_an_error_not_a_panic() {
        let root = tempfile::tempdir().unwrap();
        let store = root.path().join("store");
        let plugins = root.path().join("plugins");

        let linker = PluginLinker::new(&plugins, &store);
        let links = desired(&[("100-a/one.dat", store.join("a/default/gone.dat"))]);
        let stats = linker.apply(&links).await.unwrap();

        assert_eq!(stats.created, 0);
        assert_eq!(stats.errors.len(), 1);
    }

    #[test]
    fn desired_links_encode_priority_prefix() {
        let paths = Paths::new();
        let files = vec![IncludedFile {
            package: PackageId::new("memo", "essentials"),
            variant: VariantId::new("standard"),
            path: "core.dat".to_string(),
            source: "core.dat".to_string(),
            priority: 330,
        }];

        let links = desired_links(&files, &paths);
        let (link, target) = links.iter().next().unwrap();
        assert_eq!(link, &PathBuf::from("330-memo.essentials/core.dat"));
        assert!(target.ends_with("store/memo.essentials/standard/core.dat"));
    }
}
