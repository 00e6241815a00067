//! Asset download queue
//!
//! Bounded-parallel scheduling of variant asset downloads. The transport
//! (HTTP, archive extraction) lives behind the [`AssetFetcher`] seam; this
//! module only owns ordering, coalescing and cache placement.

mod scheduler;

pub use scheduler::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A fetchable artifact, keyed for caching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    /// Cache key; at most one download is in flight per key
    pub key: String,

    /// Opaque locator the fetcher understands
    pub url: String,
}

/// Transport collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Materialize the asset at `dest`. A partial write on failure is fine;
    /// the scheduler never promotes it to the final location.
    async fn fetch(&self, asset: &AssetRef, dest: &Path) -> anyhow::Result<()>;
}
