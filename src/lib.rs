//! Gridpack - a package manager for SimCity 4 plugins on Linux
//!
//! This crate provides the package management core:
//! - A catalog of packages and variants loaded from channel manifests
//! - Profiles holding per-package selections, options and feature flags
//! - A pure resolution engine: condition evaluation, declared-pattern file
//!   matching, per-package status and DBPF entry override ordering
//! - A bounded-parallel asset download scheduler
//! - Symlink-based linking of resolved files into the plugins directory

pub const APP_VERSION: &str = "0.2.1";

pub mod catalog;
pub mod config;
pub mod dbpf;
pub mod linker;
pub mod profiles;
pub mod queue;
pub mod resolver;

pub use catalog::Catalog;
pub use config::Settings;
