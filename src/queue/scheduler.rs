//! Bounded-parallel download scheduling

use super::{AssetFetcher, AssetRef};
use anyhow::{Context, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

type SharedDownload = Shared<BoxFuture<'static, Result<PathBuf, String>>>;

/// Schedules downloads with bounded parallelism and per-key coalescing.
///
/// Requests beyond the concurrency limit queue in FIFO order on the
/// semaphore. Each cache key has at most one download in flight; concurrent
/// requests for the same key share its outcome. Files land as `<key>.part`
/// and are renamed on completion, so an interrupted download never leaves a
/// corrupt final artifact and a retry reconverges.
pub struct DownloadScheduler {
    fetcher: Arc<dyn AssetFetcher>,
    cache_dir: PathBuf,
    permits: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashMap<String, SharedDownload>>>,
}

impl DownloadScheduler {
    pub fn new(
        fetcher: Arc<dyn AssetFetcher>,
        cache_dir: impl Into<PathBuf>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            fetcher,
            cache_dir: cache_dir.into(),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Final on-disk location for a cache key
    pub fn artifact_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(key)
    }

    /// Whether the artifact is already materialized
    pub fn is_installed(&self, key: &str) -> bool {
        self.artifact_path(key).is_file()
    }

    /// Fetch an asset, reusing any completed or in-flight download
    pub async fn fetch(&self, asset: &AssetRef) -> Result<PathBuf> {
        let dest = self.artifact_path(&asset.key);
        if dest.is_file() {
            return Ok(dest);
        }

        let download = {
            let mut in_flight = self.in_flight.lock().unwrap();
            match in_flight.get(&asset.key) {
                Some(download) => download.clone(),
                None => {
                    let download = self.spawn_download(asset.clone(), dest);
                    in_flight.insert(asset.key.clone(), download.clone());
                    download
                }
            }
        };

        download.await.map_err(|e| anyhow::anyhow!(e))
    }

    fn spawn_download(&self, asset: AssetRef, dest: PathBuf) -> SharedDownload {
        let fetcher = Arc::clone(&self.fetcher);
        let permits = Arc::clone(&self.permits);
        let in_flight = Arc::clone(&self.in_flight);

        let handle = tokio::spawn(async move {
            let _permit = permits.acquire_owned().await.expect("semaphore closed");
            let result = download_one(fetcher.as_ref(), &asset, &dest).await;
            if let Err(e) = &result {
                tracing::warn!("Download of {} failed: {:#}", asset.key, e);
                // Drop the memo so a retry can run the download again.
                in_flight.lock().unwrap().remove(&asset.key);
            }
            result.map(|_| dest).map_err(|e| format!("{:#}", e))
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(format!("download task failed: {}", e)),
            }
        }
        .boxed()
        .shared()
    }

    /// Drop a cached artifact and any memoized state for its key
    pub async fn evict(&self, key: &str) -> Result<()> {
        self.in_flight.lock().unwrap().remove(key);

        let path = self.artifact_path(key);
        if path.exists() {
            tokio::fs::remove_file(&path)
                .await
                .with_context(|| format!("Failed to evict '{}'", key))?;
        }
        let part = part_path(&path);
        if part.exists() {
            tokio::fs::remove_file(&part).await.ok();
        }

        Ok(())
    }
}

async fn download_one(fetcher: &dyn AssetFetcher, asset: &AssetRef, dest: &Path) -> Result<()> {
    if dest.is_file() {
        return Ok(());
    }
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .context("Failed to create cache directory")?;
    }

    let part = part_path(dest);
    fetcher
        .fetch(asset, &part)
        .await
        .with_context(|| format!("Failed to fetch '{}'", asset.key))?;
    tokio::fs::rename(&part, dest)
        .await
        .context("Failed to finalize download")?;

    tracing::info!("Fetched {}", asset.key);
    Ok(())
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MockAssetFetcher;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn asset(key: &str) -> AssetRef {
        AssetRef {
            key: key.to_string(),
            url: format!("sc4e://{}", key),
        }
    }

    fn writing_fetcher(times: usize) -> MockAssetFetcher {
        let mut fetcher = MockAssetFetcher::new();
        fetcher.expect_fetch().times(times).returning(|_, dest| {
            std::fs::write(dest, b"payload")?;
            Ok(())
        });
        fetcher
    }

    #[tokio::test]
    async fn fetch_materializes_and_memoizes() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = DownloadScheduler::new(Arc::new(writing_fetcher(1)), dir.path(), 2);

        let path = scheduler.fetch(&asset("pack-1.zip")).await.unwrap();
        assert!(path.is_file());
        assert!(scheduler.is_installed("pack-1.zip"));

        // Second call is served from the cache; times(1) above enforces it.
        let again = scheduler.fetch(&asset("pack-1.zip")).await.unwrap();
        assert_eq!(again, path);
    }

    #[tokio::test]
    async fn concurrent_requests_for_one_key_coalesce() {
        struct SlowFetcher {
            calls: AtomicUsize,
        }

        #[async_trait::async_trait]
        impl AssetFetcher for SlowFetcher {
            async fn fetch(&self, _asset: &AssetRef, dest: &Path) -> Result<()> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                tokio::fs::write(dest, b"payload").await?;
                Ok(())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(SlowFetcher {
            calls: AtomicUsize::new(0),
        });
        let scheduler = Arc::new(DownloadScheduler::new(
            Arc::clone(&fetcher) as Arc<dyn AssetFetcher>,
            dir.path(),
            2,
        ));

        let asset_a = asset("shared.zip");
        let asset_b = asset("shared.zip");
        let (a, b) = tokio::join!(
            scheduler.fetch(&asset_a),
            scheduler.fetch(&asset_b),
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_download_can_be_retried() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut fetcher = MockAssetFetcher::new();
        let counter = Arc::clone(&calls);
        fetcher.expect_fetch().times(2).returning(move |_, dest| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("connection reset");
            }
            std::fs::write(dest, b"payload")?;
            Ok(())
        });
        let scheduler = DownloadScheduler::new(Arc::new(fetcher), dir.path(), 2);

        assert!(scheduler.fetch(&asset("flaky.zip")).await.is_err());
        // No corrupt final artifact after the failure.
        assert!(!scheduler.is_installed("flaky.zip"));

        let path = scheduler.fetch(&asset("flaky.zip")).await.unwrap();
        assert!(path.is_file());
    }

    #[tokio::test]
    async fn parallelism_is_bounded() {
        struct CountingFetcher {
            active: AtomicUsize,
            peak: AtomicUsize,
        }

        #[async_trait::async_trait]
        impl AssetFetcher for CountingFetcher {
            async fn fetch(&self, _asset: &AssetRef, dest: &Path) -> Result<()> {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                self.active.fetch_sub(1, Ordering::SeqCst);
                tokio::fs::write(dest, b"payload").await?;
                Ok(())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let scheduler = Arc::new(DownloadScheduler::new(
            Arc::clone(&fetcher) as Arc<dyn AssetFetcher>,
            dir.path(),
            2,
        ));

        let mut handles = Vec::new();
        for i in 0..5 {
            let scheduler = Arc::clone(&scheduler);
            handles.push(tokio::spawn(async move {
                scheduler.fetch(&asset(&format!("pack-{}.zip", i))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(fetcher.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn evict_removes_artifact_and_memo() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = DownloadScheduler::new(Arc::new(writing_fetcher(2)), dir.path(), 2);

        scheduler.fetch(&asset("pack-1.zip")).await.unwrap();
        scheduler.evict("pack-1.zip").await.unwrap();
        assert!(!scheduler.is_installed("pack-1.zip"));

        // A fresh fetch runs the transport again.
        scheduler.fetch(&asset("pack-1.zip")).await.unwrap();
        assert!(scheduler.is_installed("pack-1.zip"));
    }
}
