//! Profile management for plugin loadouts

mod store;

pub use store::*;

use crate::catalog::{OptionId, OptionValue, PackageId, VariantId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Profile identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(Uuid);

impl ProfileId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-package selection inside a profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    pub enabled: bool,

    /// Variant override; `None` selects the package default
    pub variant: Option<VariantId>,

    /// Values for this package's non-global options
    pub options: BTreeMap<OptionId, OptionValue>,
}

/// A named set of package/variant selections and options.
///
/// Absent package entries mean "package default": first variant, disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,

    pub name: String,

    #[serde(default)]
    pub packages: BTreeMap<PackageId, PackageConfig>,

    /// Values for options declared `global`
    #[serde(default)]
    pub options: BTreeMap<OptionId, OptionValue>,

    /// Feature-flag overrides on top of settings
    #[serde(default)]
    pub features: BTreeMap<String, bool>,

    pub created_at: String,

    pub updated_at: String,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: ProfileId::new(),
            name: name.into(),
            packages: BTreeMap::new(),
            options: BTreeMap::new(),
            features: BTreeMap::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Clone an existing profile as a template under a new identity
    pub fn from_template(template: &Profile, name: impl Into<String>) -> Self {
        let mut profile = Self::new(name);
        profile.packages = template.packages.clone();
        profile.options = template.options.clone();
        profile.features = template.features.clone();
        profile
    }

    pub fn package(&self, id: &PackageId) -> Option<&PackageConfig> {
        self.packages.get(id)
    }

    pub fn set_package(&mut self, id: PackageId, config: PackageConfig) {
        self.packages.insert(id, config);
        self.touch();
    }

    pub fn remove_package(&mut self, id: &PackageId) {
        self.packages.remove(id);
        self.touch();
    }

    /// Apply a partial edit with merge semantics
    pub fn apply(&mut self, update: ProfileUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(packages) = update.packages {
            for (id, config) in packages {
                match config {
                    Some(config) => {
                        self.packages.insert(id, config);
                    }
                    None => {
                        self.packages.remove(&id);
                    }
                }
            }
        }
        if let Some(options) = update.options {
            for (id, value) in options {
                match value {
                    Some(value) => {
                        self.options.insert(id, value);
                    }
                    None => {
                        self.options.remove(&id);
                    }
                }
            }
        }
        if let Some(features) = update.features {
            for (name, active) in features {
                match active {
                    Some(active) => {
                        self.features.insert(name, active);
                    }
                    None => {
                        self.features.remove(&name);
                    }
                }
            }
        }
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

/// Partial profile edit.
///
/// Provided maps are merged entry-wise: `Some` replaces the entry, `None`
/// clears it. Absent maps leave the profile untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub packages: Option<BTreeMap<PackageId, Option<PackageConfig>>>,
    pub options: Option<BTreeMap<OptionId, Option<OptionValue>>>,
    pub features: Option<BTreeMap<String, Option<bool>>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_replaces_and_clears_entries() {
        let mut profile = Profile::new("Test");
        let pkg_a = PackageId::new("a", "one");
        let pkg_b = PackageId::new("b", "two");
        profile.set_package(
            pkg_a.clone(),
            PackageConfig {
                enabled: true,
                ..Default::default()
            },
        );
        profile.set_package(pkg_b.clone(), PackageConfig::default());
        profile
            .options
            .insert(OptionId::new("driveside"), OptionValue::Text("left".into()));

        let mut packages = BTreeMap::new();
        packages.insert(
            pkg_a.clone(),
            Some(PackageConfig {
                enabled: false,
                variant: Some(VariantId::new("lite")),
                options: BTreeMap::new(),
            }),
        );
        packages.insert(pkg_b.clone(), None);
        let mut options = BTreeMap::new();
        options.insert(OptionId::new("driveside"), None);

        profile.apply(ProfileUpdate {
            packages: Some(packages),
            options: Some(options),
            ..Default::default()
        });

        let config = profile.package(&pkg_a).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.variant, Some(VariantId::new("lite")));
        assert!(profile.package(&pkg_b).is_none());
        assert!(profile.options.is_empty());
        // Untouched fields keep their values.
        assert_eq!(profile.name, "Test");
    }

    #[test]
    fn template_gets_a_fresh_identity() {
        let mut original = Profile::new("Original");
        original.features.insert("darknite".to_string(), true);

        let copy = Profile::from_template(&original, "Copy");
        assert_ne!(copy.id, original.id);
        assert_eq!(copy.name, "Copy");
        assert_eq!(copy.features, original.features);
    }
}
