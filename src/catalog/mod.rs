//! Package catalog data model
//!
//! Packages are identified by `author:name` and own one or more variants.
//! Everything here is plain data assembled from channel manifests; all
//! per-profile derived state lives in the resolver.

mod loader;

pub use loader::*;

use crate::dbpf::Tgi;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Catalog invariant violations
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid package id '{0}' (expected 'author:name')")]
    InvalidPackageId(String),
    #[error("package '{0}' declares no variants")]
    NoVariants(PackageId),
    #[error("package '{package}' declares duplicate variant '{variant}'")]
    DuplicateVariant {
        package: PackageId,
        variant: VariantId,
    },
}

/// Package identifier in `author:name` form
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(String);

impl PackageId {
    pub fn new(author: &str, name: &str) -> Self {
        Self(format!(
            "{}:{}",
            author.trim().to_ascii_lowercase(),
            name.trim().to_ascii_lowercase()
        ))
    }

    pub fn parse(s: &str) -> Result<Self, CatalogError> {
        match s.split_once(':') {
            Some((author, name))
                if !author.trim().is_empty() && !name.trim().is_empty() && !name.contains(':') =>
            {
                Ok(Self::new(author, name))
            }
            _ => Err(CatalogError::InvalidPackageId(s.to_string())),
        }
    }

    pub fn author(&self) -> &str {
        self.0.split_once(':').map(|(a, _)| a).unwrap_or(&self.0)
    }

    pub fn name(&self) -> &str {
        self.0.split_once(':').map(|(_, n)| n).unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Variant identifier, unique within its package
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantId(String);

impl VariantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Option identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionId(String);

impl OptionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A runtime option value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Number(i64),
    Text(String),
    Many(Vec<OptionValue>),
}

impl OptionValue {
    /// Whether the current value satisfies an expected condition value.
    ///
    /// Multi-select values match by containment; a list on the condition side
    /// is an any-of set (all-of when both sides are lists).
    pub fn matches(&self, expected: &OptionValue) -> bool {
        match (self, expected) {
            (OptionValue::Many(have), OptionValue::Many(want)) => {
                want.iter().all(|w| have.contains(w))
            }
            (OptionValue::Many(have), want) => have.contains(want),
            (have, OptionValue::Many(want)) => want.contains(have),
            (have, want) => have == want,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(v) => write!(f, "{}", v),
            OptionValue::Number(v) => write!(f, "{}", v),
            OptionValue::Text(v) => f.write_str(v),
            OptionValue::Many(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// Option kinds, one case per supported control
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OptionKind {
    Bool {
        #[serde(default)]
        default: bool,
    },
    Number {
        #[serde(default)]
        default: i64,
    },
    Choice {
        choices: Vec<OptionValue>,
        #[serde(default)]
        default: Option<OptionValue>,
        #[serde(default)]
        multi: bool,
    },
}

impl OptionKind {
    /// Value the option holds when neither profile nor package sets it
    pub fn default_value(&self) -> OptionValue {
        match self {
            OptionKind::Bool { default } => OptionValue::Bool(*default),
            OptionKind::Number { default } => OptionValue::Number(*default),
            OptionKind::Choice {
                choices,
                default,
                multi,
            } => {
                if *multi {
                    match default {
                        Some(OptionValue::Many(values)) => OptionValue::Many(values.clone()),
                        Some(value) => OptionValue::Many(vec![value.clone()]),
                        None => OptionValue::Many(Vec::new()),
                    }
                } else {
                    default
                        .clone()
                        .or_else(|| choices.first().cloned())
                        .unwrap_or(OptionValue::Bool(false))
                }
            }
        }
    }
}

/// A declared option
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionInfo {
    pub id: OptionId,
    #[serde(default)]
    pub label: Option<String>,
    /// UI grouping only; no effect on evaluation
    #[serde(default)]
    pub section: Option<String>,
    /// Global options live on the profile instead of the package entry
    #[serde(default)]
    pub global: bool,
    /// Visibility/applicability gate
    #[serde(default)]
    pub condition: Option<Condition>,
    #[serde(flatten)]
    pub kind: OptionKind,
}

/// Expected state of another package inside a condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageClause {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub variant: Option<VariantId>,
}

fn default_true() -> bool {
    true
}

/// Boolean requirement over options, features, package state and settings.
///
/// Clauses are AND-ed and each map is keyed, so two conditions merge
/// key-wise with the overlay winning on collision. An empty condition is
/// vacuously true.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Condition {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<OptionId, OptionValue>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub features: BTreeMap<String, bool>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub packages: BTreeMap<PackageId, PackageClause>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, OptionValue>,
}

impl Condition {
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
            && self.features.is_empty()
            && self.packages.is_empty()
            && self.settings.is_empty()
    }

    /// Merge `overlay` on top of `self`; the overlay wins per key.
    pub fn overlaid(&self, overlay: &Condition) -> Condition {
        let mut merged = self.clone();
        merged
            .options
            .extend(overlay.options.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
            .features
            .extend(overlay.features.iter().map(|(k, v)| (k.clone(), *v)));
        merged
            .packages
            .extend(overlay.packages.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
            .settings
            .extend(overlay.settings.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    /// Merge two optional conditions, the second winning per key
    pub fn merged(base: Option<&Condition>, overlay: Option<&Condition>) -> Option<Condition> {
        match (base, overlay) {
            (Some(base), Some(overlay)) => Some(base.overlaid(overlay)),
            (Some(base), None) => Some(base.clone()),
            (None, Some(overlay)) => Some(overlay.clone()),
            (None, None) => None,
        }
    }
}

/// Exemplar property overrides applied to one container entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryPatch {
    pub tgi: Tgi,
    pub properties: BTreeMap<String, serde_json::Value>,
}

/// A declared file inclusion rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    /// Glob-style pattern; may carry an inline `?key=value` condition suffix
    pub path: String,
    /// Rename template; `*` stands for the matched basename
    #[serde(default, rename = "as")]
    pub rename: Option<String>,
    /// Overrides the variant's default priority
    #[serde(default)]
    pub priority: Option<i32>,
    /// Gates inclusion
    #[serde(default)]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<EntryPatch>,
}

/// Declared dependency edge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyInfo {
    pub package: PackageId,
    #[serde(default)]
    pub variant: Option<VariantId>,
    /// Gates whether the dependency is pulled in
    #[serde(default)]
    pub condition: Option<Condition>,
}

/// Exemplar content summary, used for search and display only
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentSummary {
    pub lots: Vec<String>,
    pub props: Vec<String>,
    pub mmps: Vec<String>,
    pub building_families: Vec<String>,
}

/// A concrete installable build of a package
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantInfo {
    pub id: VariantId,
    pub version: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    /// Default priority for this variant's files
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub dependencies: Vec<DependencyInfo>,
    #[serde(default)]
    pub options: Vec<OptionInfo>,
    #[serde(default)]
    pub files: Vec<FileInfo>,
    /// Variant-level compatibility requirements
    #[serde(default)]
    pub requirements: Option<Condition>,
    /// Membership in mutually exclusive groups
    #[serde(default)]
    pub conflict_groups: Vec<String>,
    #[serde(default)]
    pub content: ContentSummary,
    /// User-authored, editable in place
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub experimental: bool,
    /// Assets fetched to disk
    #[serde(default)]
    pub installed: bool,
}

impl VariantInfo {
    pub fn option(&self, id: &OptionId) -> Option<&OptionInfo> {
        self.options.iter().find(|o| &o.id == id)
    }
}

/// A content unit offering one or more variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub author: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub variants: Vec<VariantInfo>,
}

impl Package {
    pub fn id(&self) -> PackageId {
        PackageId::new(&self.author, &self.name)
    }

    pub fn variant(&self, id: &VariantId) -> Option<&VariantInfo> {
        self.variants.iter().find(|v| &v.id == id)
    }

    /// First declared variant, the package default
    pub fn default_variant(&self) -> Option<&VariantInfo> {
        self.variants.first()
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.variants.is_empty() {
            return Err(CatalogError::NoVariants(self.id()));
        }
        for (i, variant) in self.variants.iter().enumerate() {
            if self.variants[..i].iter().any(|v| v.id == variant.id) {
                return Err(CatalogError::DuplicateVariant {
                    package: self.id(),
                    variant: variant.id.clone(),
                });
            }
        }
        Ok(())
    }
}

/// In-memory package index
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    packages: BTreeMap<PackageId, Package>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a package, enforcing the variant invariants
    pub fn insert(&mut self, package: Package) -> Result<(), CatalogError> {
        package.validate()?;
        self.packages.insert(package.id(), package);
        Ok(())
    }

    pub fn get(&self, id: &PackageId) -> Option<&Package> {
        self.packages.get(id)
    }

    pub fn packages(&self) -> impl Iterator<Item = (&PackageId, &Package)> {
        self.packages.iter()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Selected variant under an optional profile override: the override if it
    /// still exists, else the package default. The single source of truth for
    /// variant selection.
    pub fn select_variant(
        &self,
        id: &PackageId,
        overridden: Option<&VariantId>,
    ) -> Option<&VariantInfo> {
        let package = self.get(id)?;
        overridden
            .and_then(|v| package.variant(v))
            .or_else(|| package.default_variant())
    }
}
