//! Condition evaluation
//!
//! Evaluates requirement expressions against profile options, feature flags,
//! package state and settings. Conditions gate option visibility, file
//! inclusion and dependency edges.

use crate::catalog::{Catalog, Condition, OptionId, OptionValue, PackageClause, PackageId, VariantInfo};
use crate::config::Settings;
use crate::profiles::Profile;
use std::collections::BTreeMap;

/// Immutable evaluation context, threaded explicitly through every call
#[derive(Clone, Copy)]
pub struct ConditionContext<'a> {
    /// Package the condition is attached to, if any
    pub package: Option<&'a PackageId>,

    /// Variant the condition is attached to, if any
    pub variant: Option<&'a VariantInfo>,

    pub profile: Option<&'a Profile>,

    /// Effective profile-wide option values
    pub profile_options: &'a BTreeMap<OptionId, OptionValue>,

    /// Effective feature flags (settings overlaid by the profile)
    pub features: &'a BTreeMap<String, bool>,

    pub settings: &'a Settings,

    /// Catalog, for variant selection inside package clauses
    pub catalog: Option<&'a Catalog>,
}

/// Evaluate a condition; `None` is vacuously true.
///
/// Pure and referentially transparent: the result depends only on the
/// arguments, so callers may re-evaluate on every status recomputation.
pub fn evaluate(condition: Option<&Condition>, ctx: &ConditionContext) -> bool {
    let Some(condition) = condition else {
        return true;
    };

    condition
        .options
        .iter()
        .all(|(id, want)| option_value(id, ctx).matches(want))
        && condition
            .features
            .iter()
            .all(|(name, want)| feature_active(name, ctx) == *want)
        && condition
            .packages
            .iter()
            .all(|(id, clause)| package_satisfies(id, clause, ctx))
        && condition.settings.iter().all(|(key, want)| {
            ctx.settings
                .values
                .get(key)
                .map(|value| value.matches(want))
                .unwrap_or(false)
        })
}

/// Current value of an option.
///
/// Options declared `global` (and options with no declaration in scope) read
/// from the profile-wide values; package-scoped options read from the
/// package's profile entry. Unset options fall back to the declared default.
pub fn option_value(id: &OptionId, ctx: &ConditionContext) -> OptionValue {
    let declaration = ctx.variant.and_then(|v| v.option(id));
    let global = declaration.map(|d| d.global).unwrap_or(true);

    let set = if global {
        ctx.profile_options.get(id).cloned()
    } else {
        ctx.package
            .and_then(|package| ctx.profile.and_then(|profile| profile.package(package)))
            .and_then(|config| config.options.get(id).cloned())
    };

    set.or_else(|| declaration.map(|d| d.kind.default_value()))
        .unwrap_or(OptionValue::Bool(false))
}

fn feature_active(name: &str, ctx: &ConditionContext) -> bool {
    ctx.features.get(name).copied().unwrap_or(false)
}

/// True iff the named package is enabled (and on the wanted variant, when one
/// is named) under the current profile.
fn package_satisfies(id: &PackageId, clause: &PackageClause, ctx: &ConditionContext) -> bool {
    let config = ctx.profile.and_then(|profile| profile.package(id));
    let enabled = config.map(|c| c.enabled).unwrap_or(false);
    if enabled != clause.enabled {
        return false;
    }

    if let Some(want) = &clause.variant {
        let overridden = config.and_then(|c| c.variant.as_ref());
        let selected = match ctx.catalog {
            Some(catalog) => catalog.select_variant(id, overridden).map(|v| v.id.clone()),
            None => overridden.cloned(),
        };
        return selected.as_ref() == Some(want);
    }

    true
}
