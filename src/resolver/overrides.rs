//! File inclusion and container override resolution
//!
//! Determines which declared files of the enabled packages actually land in
//! the plugins tree, then computes which container entries are shadowed when
//! several included files provide the same T-G-I key. The shadow report is
//! display data; nothing is deleted or rewritten.

use crate::catalog::{Catalog, OptionId, OptionValue, PackageId, VariantId};
use crate::config::Settings;
use crate::dbpf::{DbpfCodec, EntryKind, Tgi};
use crate::profiles::Profile;
use crate::resolver::conditions::{evaluate, ConditionContext};
use crate::resolver::matcher::{match_files, MatchOptions};
use crate::resolver::status::PackageStatus;
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;

/// Lists the on-disk files of an installed variant
pub trait VariantListing {
    fn list_files(&self, package: &PackageId, variant: &VariantId) -> Result<Vec<String>>;
}

/// A file that survived matching and condition gating
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IncludedFile {
    pub package: PackageId,

    pub variant: VariantId,

    /// Logical path inside the plugins tree
    pub path: String,

    /// Path inside the variant's store directory
    pub source: String,

    pub priority: i32,
}

/// Inclusion pass output
#[derive(Debug, Default)]
pub struct IncludedFiles {
    pub files: Vec<IncludedFile>,

    /// Per-package findings: uninstalled variants, stale manifests
    pub diagnostics: Vec<String>,
}

/// Resolve the final included file set across all enabled packages.
///
/// Packages whose variant is not installed yet are skipped with a
/// diagnostic; they do not fail the pass.
pub fn resolve_included_files(
    catalog: &Catalog,
    profile: &Profile,
    statuses: &BTreeMap<PackageId, PackageStatus>,
    options: &BTreeMap<OptionId, OptionValue>,
    features: &BTreeMap<String, bool>,
    settings: &Settings,
    listing: &dyn VariantListing,
) -> IncludedFiles {
    let mut out = IncludedFiles::default();

    for (id, status) in statuses {
        if !status.enabled {
            continue;
        }
        let Some(variant) = catalog.select_variant(id, Some(&status.variant_id)) else {
            continue;
        };
        if !status.installed {
            out.diagnostics
                .push(format!("{} ({}) is not installed yet", id, variant.id));
            continue;
        }

        let paths = match listing.list_files(id, &status.variant_id) {
            Ok(paths) => paths,
            Err(e) => {
                out.diagnostics
                    .push(format!("Failed to list files for {}: {:#}", id, e));
                continue;
            }
        };

        let exclude: Vec<String> = variant
            .files
            .iter()
            .flat_map(|f| f.exclude.iter().cloned())
            .collect();
        let opts = MatchOptions {
            ignore_empty: false,
            default_priority: variant.priority,
        };
        let matches = match_files(&paths, &variant.files, &exclude, &opts);
        out.diagnostics
            .extend(matches.diagnostics.into_iter().map(|d| format!("{}: {}", id, d)));

        let ctx = ConditionContext {
            package: Some(id),
            variant: Some(variant),
            profile: Some(profile),
            profile_options: options,
            features,
            settings,
            catalog: Some(catalog),
        };

        for (source, resolved) in matches.matched {
            // `None` marks an explicit exclusion.
            let Some(resolved) = resolved else { continue };
            if !evaluate(resolved.condition.as_ref(), &ctx) {
                continue;
            }
            out.files.push(IncludedFile {
                package: id.clone(),
                variant: status.variant_id.clone(),
                path: resolved.logical_path,
                source,
                priority: resolved.priority,
            });
        }
    }

    out.files.sort();
    out
}

/// Entry-level override report for an included file set
#[derive(Debug, Default)]
pub struct OverrideReport {
    /// Per logical path, the entries shadowed by another included file
    pub shadowed: BTreeMap<String, Vec<Tgi>>,

    /// Per-file codec failures; other files still resolve
    pub diagnostics: Vec<String>,
}

/// Compute overrides between colliding container entries.
///
/// Exactly one provider wins per T-G-I key: the higher priority, or on ties
/// the lexicographically smaller path. Directory resources are container
/// bookkeeping and never contested.
pub fn resolve_overrides(files: &[IncludedFile], codec: &dyn DbpfCodec) -> OverrideReport {
    let mut report = OverrideReport::default();
    let mut providers: BTreeMap<Tgi, Vec<&IncludedFile>> = BTreeMap::new();

    for file in files {
        let entries = match codec.entries(Path::new(&file.path)) {
            Ok(entries) => entries,
            Err(e) => {
                report.diagnostics.push(format!("{}: {}", file.path, e));
                continue;
            }
        };
        for entry in entries {
            if EntryKind::of(entry.tgi) == EntryKind::Dir {
                continue;
            }
            providers.entry(entry.tgi).or_default().push(file);
        }
    }

    for (tgi, mut contenders) in providers {
        if contenders.len() < 2 {
            continue;
        }
        contenders.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.path.cmp(&b.path))
        });
        for loser in &contenders[1..] {
            report
                .shadowed
                .entry(loser.path.clone())
                .or_default()
                .push(tgi);
        }
    }

    report
}
