//! Profile persistence
//!
//! Each profile lives in its own JSON file named after its ID. Unreadable
//! files are skipped with a warning so one corrupt profile does not hide the
//! rest.

use super::{Profile, ProfileId};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Stores profiles as `<dir>/<id>.json`
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// List all profiles, sorted by name
    pub async fn list(&self) -> Result<Vec<Profile>> {
        let mut profiles = Vec::new();

        if !self.dir.exists() {
            return Ok(profiles);
        }

        let mut entries = fs::read_dir(&self.dir)
            .await
            .context("Failed to read profiles directory")?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_profile(&path).await {
                Ok(profile) => profiles.push(profile),
                Err(e) => tracing::warn!("Skipping profile {}: {:#}", path.display(), e),
            }
        }

        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(profiles)
    }

    pub async fn load(&self, id: ProfileId) -> Result<Profile> {
        read_profile(&self.path_for(id)).await
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Profile>> {
        Ok(self.list().await?.into_iter().find(|p| p.name == name))
    }

    pub async fn save(&self, profile: &Profile) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .context("Failed to create profiles directory")?;

        let content = serde_json::to_string_pretty(profile)?;
        fs::write(self.path_for(profile.id), content)
            .await
            .context("Failed to write profile")?;

        Ok(())
    }

    /// Create a profile, optionally cloning an existing one as a template
    pub async fn create(&self, name: &str, template: Option<&Profile>) -> Result<Profile> {
        if self.find_by_name(name).await?.is_some() {
            bail!("Profile '{}' already exists", name);
        }

        let profile = match template {
            Some(template) => Profile::from_template(template, name),
            None => Profile::new(name),
        };
        self.save(&profile).await?;

        Ok(profile)
    }

    pub async fn remove(&self, id: ProfileId) -> Result<()> {
        let path = self.path_for(id);
        if path.exists() {
            fs::remove_file(path)
                .await
                .context("Failed to remove profile")?;
        }
        Ok(())
    }

    fn path_for(&self, id: ProfileId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

async fn read_profile(path: &Path) -> Result<Profile> {
    let content = fs::read_to_string(path)
        .await
        .context("Failed to read profile file")?;
    serde_json::from_str(&content).context("Failed to parse profile")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path());

        let profile = store.create("London", None).await.unwrap();
        let loaded = store.load(profile.id).await.unwrap();
        assert_eq!(loaded.name, "London");
        assert_eq!(loaded.id, profile.id);
    }

    #[tokio::test]
    async fn list_skips_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path());

        store.create("Good", None).await.unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ not json").unwrap();

        let profiles = store.list().await.unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].name, "Good");
    }

    #[tokio::test]
    async fn create_rejects_duplicate_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path());

        store.create("Berlin", None).await.unwrap();
        assert!(store.create("Berlin", None).await.is_err());
    }

    #[tokio::test]
    async fn remove_deletes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path());

        let profile = store.create("Tmp", None).await.unwrap();
        store.remove(profile.id).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }
}
