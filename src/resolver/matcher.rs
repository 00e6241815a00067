//! Declared-pattern file matching
//!
//! Resolves a variant's declared include/exclude patterns against its actual
//! file listing. Patterns are glob-style (`*` within a segment, `**` across
//! segments, trailing `/` for directory matches) and case-insensitive, and
//! may carry an inline `?key=value` condition suffix.

use crate::catalog::{Condition, FileInfo, OptionId, OptionValue};
use regex_lite::Regex;
use std::collections::BTreeMap;

/// Matching knobs
#[derive(Debug, Clone, Default)]
pub struct MatchOptions {
    /// Suppress the diagnostic for include patterns matching nothing
    pub ignore_empty: bool,

    /// Priority assigned when the include entry declares no override
    pub default_priority: i32,
}

/// A path claimed by an include rule
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFile {
    /// Path the file takes on inside the plugins tree
    pub logical_path: String,

    pub priority: i32,

    /// Entry condition merged with the pattern-level condition
    pub condition: Option<Condition>,
}

/// Outcome of one matching pass.
///
/// The result is a mapping, not a sequence; a path appears in exactly one of
/// `matched` and `unmatched`.
#[derive(Debug, Default)]
pub struct FileMatches {
    /// Claimed paths; `None` marks an explicit exclusion
    pub matched: BTreeMap<String, Option<ResolvedFile>>,

    /// Paths no rule claimed
    pub unmatched: Vec<String>,

    /// Non-fatal findings: bad patterns, includes matching nothing
    pub diagnostics: Vec<String>,
}

/// Match paths against declared include/exclude rules.
///
/// Excludes run first, in declared order; include entries then consume
/// matching paths out of the remaining pool, first entry wins. An invalid
/// pattern is reported and skipped, never aborting the pass.
pub fn match_files(
    paths: &[String],
    include: &[FileInfo],
    exclude: &[String],
    opts: &MatchOptions,
) -> FileMatches {
    let mut out = FileMatches::default();
    let mut pool: Vec<String> = paths.to_vec();

    for pattern in exclude {
        let compiled = match CompiledPattern::new(pattern) {
            Ok(compiled) => compiled,
            Err(e) => {
                tracing::warn!("Skipping exclude pattern: {}", e);
                out.diagnostics.push(e);
                continue;
            }
        };
        pool.retain(|path| {
            if compiled.is_match(path) {
                out.matched.insert(path.clone(), None);
                false
            } else {
                true
            }
        });
    }

    for entry in include {
        let compiled = match CompiledPattern::new(&entry.path) {
            Ok(compiled) => compiled,
            Err(e) => {
                tracing::warn!("Skipping include pattern: {}", e);
                out.diagnostics.push(e);
                continue;
            }
        };

        let priority = entry.priority.unwrap_or(opts.default_priority);
        let condition = Condition::merged(entry.condition.as_ref(), compiled.condition.as_ref());
        let mut claimed = 0usize;

        pool.retain(|path| {
            let Some(logical_path) = compiled.resolve(path, entry.rename.as_deref()) else {
                return true;
            };
            out.matched.insert(
                path.clone(),
                Some(ResolvedFile {
                    logical_path,
                    priority,
                    condition: condition.clone(),
                }),
            );
            claimed += 1;
            false
        });

        if claimed == 0 && !opts.ignore_empty {
            // Usually a stale manifest; worth surfacing but never fatal.
            out.diagnostics
                .push(format!("pattern '{}' matched no files", entry.path));
        }
    }

    out.unmatched = pool;
    out
}

/// A compiled pattern with its inline condition
struct CompiledPattern {
    regex: Regex,
    directory: bool,
    condition: Option<Condition>,
}

impl CompiledPattern {
    fn new(pattern: &str) -> Result<Self, String> {
        let (glob, condition) = match pattern.split_once('?') {
            Some((glob, query)) => (glob, Some(parse_inline_condition(pattern, query)?)),
            None => (pattern, None),
        };

        let directory = glob.ends_with('/');
        let glob = glob.trim_end_matches('/');
        if glob.is_empty() {
            return Err(format!("invalid pattern '{}': empty glob", pattern));
        }

        let mut source = String::from("^(?i)");
        let mut chars = glob.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '*' => {
                    if chars.peek() == Some(&'*') {
                        chars.next();
                        source.push_str(".*");
                    } else {
                        source.push_str("[^/]*");
                    }
                }
                '\\' | '.' | '+' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' => {
                    source.push('\\');
                    source.push(c);
                }
                c => source.push(c),
            }
        }
        if directory {
            source.push_str("/(.+)$");
        } else {
            source.push('$');
        }

        let regex = Regex::new(&source)
            .map_err(|e| format!("invalid pattern '{}': {}", pattern, e))?;

        Ok(Self {
            regex,
            directory,
            condition,
        })
    }

    fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Logical path for a matching input, or `None` if it does not match.
    ///
    /// Directory matches yield `as/remainder`; file matches substitute `*` in
    /// `as` with the basename, defaulting to the basename itself.
    fn resolve(&self, path: &str, rename: Option<&str>) -> Option<String> {
        let captures = self.regex.captures(path)?;

        if self.directory {
            let remainder = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
            Some(match rename {
                Some(base) => format!("{}/{}", base.trim_end_matches('/'), remainder),
                None => remainder.to_string(),
            })
        } else {
            let basename = path.rsplit('/').next().unwrap_or(path);
            Some(match rename {
                Some(template) if template.contains('*') => template.replace('*', basename),
                Some(template) => template.to_string(),
                None => basename.to_string(),
            })
        }
    }
}

/// Parse a `key=value&key=value` suffix into an option condition
fn parse_inline_condition(pattern: &str, query: &str) -> Result<Condition, String> {
    let mut condition = Condition::default();
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(format!(
                "invalid pattern '{}': condition clause '{}' is not key=value",
                pattern, pair
            ));
        };
        condition
            .options
            .insert(OptionId::new(key), parse_condition_value(value));
    }
    Ok(condition)
}

fn parse_condition_value(raw: &str) -> OptionValue {
    match raw {
        "true" => OptionValue::Bool(true),
        "false" => OptionValue::Bool(false),
        _ => raw
            .parse::<i64>()
            .map(OptionValue::Number)
            .unwrap_or_else(|_| OptionValue::Text(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn include(pattern: &str) -> FileInfo {
        FileInfo {
            path: pattern.to_string(),
            rename: None,
            priority: None,
            condition: None,
            exclude: Vec::new(),
            patches: Vec::new(),
        }
    }

    #[test]
    fn each_path_is_claimed_exactly_once() {
        let result = match_files(
            &paths(&["a.dat", "b.dat"]),
            &[include("*.dat")],
            &[],
            &MatchOptions::default(),
        );

        assert_eq!(result.matched.len(), 2);
        assert!(result.unmatched.is_empty());
        for path in ["a.dat", "b.dat"] {
            assert!(result.matched.contains_key(path));
            assert!(!result.unmatched.contains(&path.to_string()));
        }
    }

    #[test]
    fn first_include_entry_wins() {
        let mut renamed = include("*.dat");
        renamed.rename = Some("first_*".to_string());

        let result = match_files(
            &paths(&["a.dat"]),
            &[renamed, include("a.dat")],
            &[],
            &MatchOptions {
                ignore_empty: true,
                ..Default::default()
            },
        );

        let resolved = result.matched.get("a.dat").unwrap().as_ref().unwrap();
        assert_eq!(resolved.logical_path, "first_a.dat");
    }

    #[test]
    fn exclude_takes_precedence_over_include() {
        let result = match_files(
            &paths(&["readme.txt", "a.dat"]),
            &[include("**")],
            &["*.txt".to_string()],
            &MatchOptions::default(),
        );

        // Explicitly excluded, not merely unconsidered.
        assert_eq!(result.matched.get("readme.txt"), Some(&None));
        assert!(result.matched.get("a.dat").unwrap().is_some());
        assert!(result.unmatched.is_empty());
    }

    #[test]
    fn directory_pattern_keeps_remainder() {
        let mut entry = include("network/");
        entry.rename = Some("roads".to_string());

        let result = match_files(
            &paths(&["network/avenue/tex.dat", "other.dat"]),
            &[entry],
            &[],
            &MatchOptions {
                ignore_empty: true,
                ..Default::default()
            },
        );

        let resolved = result
            .matched
            .get("network/avenue/tex.dat")
            .unwrap()
            .as_ref()
            .unwrap();
        assert_eq!(resolved.logical_path, "roads/avenue/tex.dat");
        assert_eq!(result.unmatched, vec!["other.dat".to_string()]);
    }

    #[test]
    fn file_rename_substitutes_basename() {
        let mut entry = include("props/*.dat");
        entry.rename = Some("zzz_*".to_string());

        let result = match_files(
            &paths(&["props/tree.dat"]),
            &[entry],
            &[],
            &MatchOptions::default(),
        );

        let resolved = result.matched.get("props/tree.dat").unwrap().as_ref().unwrap();
        assert_eq!(resolved.logical_path, "zzz_tree.dat");
    }

    #[test]
    fn matching_is_case_insensitive() {
        let result = match_files(
            &paths(&["Network/Tex.DAT"]),
            &[include("network/*.dat")],
            &[],
            &MatchOptions::default(),
        );
        assert!(result.matched.get("Network/Tex.DAT").unwrap().is_some());
    }

    #[test]
    fn inline_condition_merges_over_entry_condition() {
        let mut entry = include("lhd/**?driveside=left");
        let mut declared = Condition::default();
        declared
            .options
            .insert(OptionId::new("driveside"), OptionValue::Text("right".into()));
        declared
            .options
            .insert(OptionId::new("style"), OptionValue::Text("euro".into()));
        entry.condition = Some(declared);

        let result = match_files(
            &paths(&["lhd/override.dat"]),
            &[entry],
            &[],
            &MatchOptions::default(),
        );

        let resolved = result.matched.get("lhd/override.dat").unwrap().as_ref().unwrap();
        let condition = resolved.condition.as_ref().unwrap();
        // Pattern-level wins on the colliding key, the rest is kept.
        assert_eq!(
            condition.options.get(&OptionId::new("driveside")),
            Some(&OptionValue::Text("left".into()))
        );
        assert_eq!(
            condition.options.get(&OptionId::new("style")),
            Some(&OptionValue::Text("euro".into()))
        );
    }

    #[test]
    fn invalid_pattern_does_not_abort_the_pass() {
        let result = match_files(
            &paths(&["a.dat"]),
            &[include("broken?notakeyvalue"), include("*.dat")],
            &[],
            &MatchOptions::default(),
        );

        assert!(result.matched.get("a.dat").unwrap().is_some());
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics[0].contains("notakeyvalue"));
    }

    #[test]
    fn empty_include_match_is_reported() {
        let result = match_files(
            &paths(&["a.dat"]),
            &[include("missing/**")],
            &[],
            &MatchOptions::default(),
        );
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.contains("matched no files")));

        let quiet = match_files(
            &paths(&["a.dat"]),
            &[include("missing/**")],
            &[],
            &MatchOptions {
                ignore_empty: true,
                ..Default::default()
            },
        );
        assert!(quiet.diagnostics.is_empty());
    }

    #[test]
    fn priority_override_beats_default() {
        let mut entry = include("*.dat");
        entry.priority = Some(750);

        let result = match_files(
            &paths(&["a.dat"]),
            &[entry, include("*.txt")],
            &[],
            &MatchOptions {
                ignore_empty: true,
                default_priority: 100,
            },
        );

        let resolved = result.matched.get("a.dat").unwrap().as_ref().unwrap();
        assert_eq!(resolved.priority, 750);
    }
}
