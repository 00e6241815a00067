//! Per-profile package status resolution
//!
//! Computes the derived state of every catalog package under one profile:
//! selected variant, enablement (explicit or transitive), compatibility
//! issues, and reverse dependency edges. The computation is total and
//! side-effect-free; it never mutates the catalog or profile and is safe to
//! re-run on every state change.

use crate::catalog::{Catalog, OptionId, OptionValue, PackageId, VariantId, VariantInfo};
use crate::config::Settings;
use crate::profiles::{PackageConfig, Profile};
use crate::resolver::conditions::{evaluate, ConditionContext};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Derived state of one package under one profile.
///
/// Recomputed from catalog, profile and settings; never independently
/// mutated or persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageStatus {
    /// Currently selected variant
    pub variant_id: VariantId,

    pub enabled: bool,

    /// Enabled directly by the profile rather than pulled in as a dependency
    pub explicit: bool,

    /// Variant assets present on disk; `false` degrades gracefully while a
    /// fetch is still pending
    pub installed: bool,

    /// Effective option values for the selected variant
    pub options: BTreeMap<OptionId, OptionValue>,

    /// Human-readable compatibility findings per variant
    pub issues: BTreeMap<VariantId, Vec<String>>,

    /// Enabled packages whose dependency condition names this package
    pub required_by: BTreeSet<PackageId>,
}

/// Merge settings feature flags with profile overrides; the profile wins
pub fn effective_features(settings: &Settings, profile: &Profile) -> BTreeMap<String, bool> {
    let mut features = settings.features.clone();
    features.extend(profile.features.iter().map(|(k, v)| (k.clone(), *v)));
    features
}

/// Profile-wide option values: declared global defaults overlaid by the
/// profile's explicit values
pub fn effective_profile_options(
    catalog: &Catalog,
    profile: &Profile,
) -> BTreeMap<OptionId, OptionValue> {
    let mut options = BTreeMap::new();

    for (id, _) in catalog.packages() {
        let overridden = profile.package(id).and_then(|c| c.variant.as_ref());
        let Some(variant) = catalog.select_variant(id, overridden) else {
            continue;
        };
        for declared in &variant.options {
            if declared.global {
                options
                    .entry(declared.id.clone())
                    .or_insert_with(|| declared.kind.default_value());
            }
        }
    }

    for (id, value) in &profile.options {
        options.insert(id.clone(), value.clone());
    }

    options
}

/// Resolve the status of every catalog package under a profile.
///
/// Identical inputs yield identical output (deep equality) with no
/// observable side effects.
pub fn resolve(
    catalog: &Catalog,
    profile: &Profile,
    options: &BTreeMap<OptionId, OptionValue>,
    features: &BTreeMap<String, bool>,
    settings: &Settings,
) -> BTreeMap<PackageId, PackageStatus> {
    let mut statuses: BTreeMap<PackageId, PackageStatus> = BTreeMap::new();

    // Variant selection and explicit enablement.
    for (id, package) in catalog.packages() {
        let config = profile.package(id);
        let overridden = config.and_then(|c| c.variant.as_ref());
        let Some(variant) = catalog.select_variant(id, overridden) else {
            continue;
        };

        let mut issues: BTreeMap<VariantId, Vec<String>> = BTreeMap::new();
        if let Some(wanted) = overridden {
            if package.variant(wanted).is_none() {
                issues.entry(variant.id.clone()).or_default().push(format!(
                    "Profile references missing variant '{}'; using '{}'",
                    wanted, variant.id
                ));
            }
        }

        let explicit = config.map(|c| c.enabled).unwrap_or(false);
        statuses.insert(
            id.clone(),
            PackageStatus {
                variant_id: variant.id.clone(),
                enabled: explicit,
                explicit,
                installed: variant.installed,
                options: effective_package_options(variant, options, config),
                issues,
                required_by: BTreeSet::new(),
            },
        );
    }

    // Transitive enablement over dependency edges. The worklist expands each
    // package at most once, so a dependency cycle terminates with every
    // member enabled (a package already in the chain counts as satisfied).
    let mut queue: VecDeque<PackageId> = statuses
        .iter()
        .filter(|(_, s)| s.enabled)
        .map(|(id, _)| id.clone())
        .collect();
    let mut expanded: BTreeSet<PackageId> = BTreeSet::new();

    while let Some(id) = queue.pop_front() {
        if !expanded.insert(id.clone()) {
            continue;
        }
        let Some(status) = statuses.get(&id) else {
            continue;
        };
        let variant_id = status.variant_id.clone();
        let Some(variant) = catalog.select_variant(&id, Some(&variant_id)) else {
            continue;
        };

        let ctx = ConditionContext {
            package: Some(&id),
            variant: Some(variant),
            profile: Some(profile),
            profile_options: options,
            features,
            settings,
            catalog: Some(catalog),
        };

        for dependency in &variant.dependencies {
            if !evaluate(dependency.condition.as_ref(), &ctx) {
                continue;
            }

            match statuses.get_mut(&dependency.package) {
                Some(dep) => {
                    dep.enabled = true;
                    dep.required_by.insert(id.clone());
                    if !expanded.contains(&dependency.package) {
                        queue.push_back(dependency.package.clone());
                    }
                }
                None => {
                    if let Some(status) = statuses.get_mut(&id) {
                        status
                            .issues
                            .entry(variant_id.clone())
                            .or_default()
                            .push(format!("Missing dependency '{}'", dependency.package));
                    }
                }
            }
        }
    }

    detect_conflicts(catalog, profile, &mut statuses, options, features, settings);

    statuses
}

/// Effective option values for one variant's declared options
fn effective_package_options(
    variant: &VariantInfo,
    profile_options: &BTreeMap<OptionId, OptionValue>,
    config: Option<&PackageConfig>,
) -> BTreeMap<OptionId, OptionValue> {
    let mut options = BTreeMap::new();
    for declared in &variant.options {
        let set = if declared.global {
            profile_options.get(&declared.id).cloned()
        } else {
            config.and_then(|c| c.options.get(&declared.id).cloned())
        };
        options.insert(
            declared.id.clone(),
            set.unwrap_or_else(|| declared.kind.default_value()),
        );
    }
    options
}

/// Surface conflicts between enabled variants as issues.
///
/// Conflicts never disable a package; they produce banners for the user to
/// resolve.
fn detect_conflicts(
    catalog: &Catalog,
    profile: &Profile,
    statuses: &mut BTreeMap<PackageId, PackageStatus>,
    options: &BTreeMap<OptionId, OptionValue>,
    features: &BTreeMap<String, bool>,
    settings: &Settings,
) {
    let enabled: Vec<(PackageId, VariantId)> = statuses
        .iter()
        .filter(|(_, s)| s.enabled)
        .map(|(id, s)| (id.clone(), s.variant_id.clone()))
        .collect();

    let mut findings: Vec<(PackageId, VariantId, String)> = Vec::new();

    for (id, variant_id) in &enabled {
        let Some(variant) = catalog.select_variant(id, Some(variant_id)) else {
            continue;
        };

        let ctx = ConditionContext {
            package: Some(id),
            variant: Some(variant),
            profile: Some(profile),
            profile_options: options,
            features,
            settings,
            catalog: Some(catalog),
        };
        if !evaluate(variant.requirements.as_ref(), &ctx) {
            findings.push((
                id.clone(),
                variant_id.clone(),
                format!("Variant '{}' requirements are not met", variant_id),
            ));
        }
    }

    for (i, (id_a, variant_a)) in enabled.iter().enumerate() {
        let Some(a) = catalog.select_variant(id_a, Some(variant_a)) else {
            continue;
        };
        for (id_b, variant_b) in enabled.iter().skip(i + 1) {
            if id_a == id_b {
                continue;
            }
            let Some(b) = catalog.select_variant(id_b, Some(variant_b)) else {
                continue;
            };

            for group in &a.conflict_groups {
                if b.conflict_groups.contains(group) {
                    findings.push((
                        id_a.clone(),
                        variant_a.clone(),
                        format!("Conflicts with '{}' (group '{}')", id_b, group),
                    ));
                    findings.push((
                        id_b.clone(),
                        variant_b.clone(),
                        format!("Conflicts with '{}' (group '{}')", id_a, group),
                    ));
                }
            }

            // Mutually exclusive requirement clauses: both variants demand a
            // value for the same option, and the values differ.
            if let (Some(req_a), Some(req_b)) = (&a.requirements, &b.requirements) {
                for (key, want_a) in &req_a.options {
                    if let Some(want_b) = req_b.options.get(key) {
                        if want_a != want_b {
                            findings.push((
                                id_a.clone(),
                                variant_a.clone(),
                                format!(
                                    "Requires {}={} but '{}' requires {}={}",
                                    key, want_a, id_b, key, want_b
                                ),
                            ));
                            findings.push((
                                id_b.clone(),
                                variant_b.clone(),
                                format!(
                                    "Requires {}={} but '{}' requires {}={}",
                                    key, want_b, id_a, key, want_a
                                ),
                            ));
                        }
                    }
                }
            }
        }
    }

    for (id, variant_id, reason) in findings {
        if let Some(status) = statuses.get_mut(&id) {
            status.issues.entry(variant_id).or_default().push(reason);
        }
    }
}
