// src/storage/cache.rs

//! Time-bounded page cache.
//!
//! Entries are addressed by the SHA-256 digest of the URL. Staleness is
//! judged only at read time; an expired entry is simply overwritten by the
//! next successful fetch.
//!
//! ## Disk Layout
//!
//! ```text
//! {cache_dir}/
//! ├── 3f1a…c09e.html    # raw text of one fetched URL
//! └── 9b77…12d4.html
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::utils::url_digest;

/// Storage for raw fetched pages.
#[async_trait]
pub trait PageCache: Send + Sync {
    /// Return the cached content for `key` if it is younger than `ttl`.
    async fn get(&self, key: &str, ttl: Duration) -> Result<Option<String>>;

    /// Store content under `key`, replacing any previous entry.
    async fn put(&self, key: &str, content: &str) -> Result<()>;
}

/// Anything that can produce a page from the network.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Cache key for a URL.
pub fn cache_key(url: &str) -> String {
    url_digest(url)
}

/// Return a fresh cached copy of `url`, or fetch it from `source` and cache it.
///
/// Cache failures never fail the call: an unreadable entry counts as a miss
/// and a failed write only loses the cached copy.
pub async fn get_or_fetch(
    cache: &dyn PageCache,
    url: &str,
    ttl: Duration,
    source: &dyn PageSource,
) -> Result<String> {
    let key = cache_key(url);

    match cache.get(&key, ttl).await {
        Ok(Some(content)) => {
            log::debug!("Cache hit: {}", url);
            return Ok(content);
        }
        Ok(None) => log::debug!("Cache miss: {}", url),
        Err(e) => log::warn!("Cache read failed for {}: {}", url, e),
    }

    let content = source.fetch(url).await?;

    if let Err(e) = cache.put(&key, &content).await {
        log::warn!("Cache write failed for {}: {}", url, e);
    }

    Ok(content)
}

/// Filesystem-backed cache, one file per URL.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root_dir: PathBuf,
}

impl DiskCache {
    /// Create a new DiskCache rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a cache key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(format!("{key}.html"))
    }

    fn age(modified: SystemTime) -> Duration {
        // A timestamp in the future counts as brand new.
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO)
    }
}

#[async_trait]
impl PageCache for DiskCache {
    async fn get(&self, key: &str, ttl: Duration) -> Result<Option<String>> {
        let path = self.path(key);
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::Io(e)),
        };

        if Self::age(metadata.modified()?) >= ttl {
            return Ok(None);
        }

        let bytes = tokio::fs::read(&path).await?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    async fn put(&self, key: &str, content: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.root_dir).await?;

        let mut file = tokio::fs::File::create(self.path(key)).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// In-memory cache for tests and one-off runs.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Instant, String)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PageCache for MemoryCache {
    async fn get(&self, key: &str, ttl: Duration) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| AppError::config("memory cache lock poisoned"))?;
        Ok(entries
            .get(key)
            .filter(|(stored, _)| stored.elapsed() < ttl)
            .map(|(_, content)| content.clone()))
    }

    async fn put(&self, key: &str, content: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AppError::config("memory cache lock poisoned"))?;
        entries.insert(key.to_string(), (Instant::now(), content.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingSource {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageSource for CountingSource {
        async fn fetch(&self, url: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(AppError::FetchExhausted {
                    url: url.to_string(),
                    attempts: 3,
                });
            }
            Ok(format!("page {n} of {url}"))
        }
    }

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[tokio::test]
    async fn test_second_call_within_ttl_is_served_from_cache() {
        let cache = MemoryCache::new();
        let source = CountingSource::new();

        let first = get_or_fetch(&cache, "https://a.example/1", DAY, &source)
            .await
            .unwrap();
        let second = get_or_fetch(&cache, "https://a.example/1", DAY, &source)
            .await
            .unwrap();

        assert_eq!(source.calls(), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_refetches() {
        let cache = MemoryCache::new();
        let source = CountingSource::new();

        get_or_fetch(&cache, "https://a.example/1", Duration::ZERO, &source)
            .await
            .unwrap();
        let second = get_or_fetch(&cache, "https://a.example/1", Duration::ZERO, &source)
            .await
            .unwrap();

        assert_eq!(source.calls(), 2);
        assert_eq!(second, "page 2 of https://a.example/1");
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let cache = MemoryCache::new();
        let source = CountingSource::failing();

        let result = get_or_fetch(&cache, "https://a.example/1", DAY, &source).await;
        assert!(matches!(result, Err(AppError::FetchExhausted { .. })));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_disk_cache_roundtrip_and_layout() {
        let tmp = TempDir::new().unwrap();
        let cache = DiskCache::new(tmp.path().join("pages"));
        let source = CountingSource::new();
        let url = "https://drive2.ru/forums/elektrooborudovanie.107/";

        get_or_fetch(&cache, url, DAY, &source).await.unwrap();
        let again = get_or_fetch(&cache, url, DAY, &source).await.unwrap();

        assert_eq!(source.calls(), 1);
        assert_eq!(again, format!("page 1 of {url}"));

        let file = tmp.path().join("pages").join(format!("{}.html", cache_key(url)));
        assert!(file.exists());
    }

    #[tokio::test]
    async fn test_disk_cache_expired_entry_is_miss() {
        let tmp = TempDir::new().unwrap();
        let cache = DiskCache::new(tmp.path());

        cache.put("k", "old").await.unwrap();
        assert_eq!(cache.get("k", DAY).await.unwrap().as_deref(), Some("old"));
        assert_eq!(cache.get("k", Duration::ZERO).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_disk_cache_missing_entry() {
        let tmp = TempDir::new().unwrap();
        let cache = DiskCache::new(tmp.path().join("never-created"));
        assert_eq!(cache.get("nope", DAY).await.unwrap(), None);
    }
}
