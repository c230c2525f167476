use anyhow::{Context, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 3600);

#[derive(Serialize, Deserialize)]
struct Entry<T> {
    expires_at: f64,
    value: T,
}

/// Small on-disk key/value cache with per-entry expiry.
///
/// Built once at startup and handed to whatever needs it. Entries are JSON
/// files named by the SHA-256 of their key.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create cache directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Cache under `<output_dir>/.cache`
    pub fn in_output_dir(output_dir: &Path) -> Result<Self> {
        Self::open(output_dir.join(".cache"))
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{:x}.json", digest))
    }

    fn now() -> f64 {
        Utc::now().timestamp_millis() as f64 / 1000.0
    }

    /// Cached value for `key`; missing, expired and unreadable entries are all misses
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.entry_path(key);
        let content = fs::read_to_string(&path).ok()?;
        let entry: Entry<T> = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(key, error = %e, "ignoring unreadable cache entry");
                return None;
            }
        };
        if entry.expires_at <= Self::now() {
            let _ = fs::remove_file(&path);
            return None;
        }
        Some(entry.value)
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let entry = Entry {
            expires_at: Self::now() + ttl.as_secs_f64(),
            value,
        };
        let json = serde_json::to_string(&entry).context("Failed to serialize cache entry")?;
        fs::write(self.entry_path(key), json).context("Failed to write cache entry")
    }

    /// Return the cached value or await `creator`, store and return its result.
    ///
    /// Errors from `creator` are passed through and never cached. Store
    /// failures are logged, not returned.
    pub async fn memoize<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        creator: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get(key) {
            debug!(key, "cache hit");
            return Ok(hit);
        }
        let value = creator().await?;
        if let Err(e) = self.set(key, &value, ttl) {
            warn!(key, error = %e, "failed to store cache entry");
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn cache() -> (TempDir, DiskCache) {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::in_output_dir(dir.path()).unwrap();
        (dir, cache)
    }

    #[test]
    fn test_set_then_get() {
        let (_dir, cache) = cache();
        cache.set("greeting", &"hello".to_string(), DEFAULT_TTL).unwrap();
        assert_eq!(cache.get::<String>("greeting"), Some("hello".to_string()));
        assert_eq!(cache.get::<String>("other"), None);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let (_dir, cache) = cache();
        cache.set("k", &1u32, Duration::ZERO).unwrap();
        assert_eq!(cache.get::<u32>("k"), None);
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let (_dir, cache) = cache();
        fs::write(cache.entry_path("k"), "not json").unwrap();
        assert_eq!(cache.get::<u32>("k"), None);
    }

    #[tokio::test]
    async fn test_memoize_calls_creator_once() {
        let (_dir, cache) = cache();
        let calls = Cell::new(0);
        let make = || async {
            calls.set(calls.get() + 1);
            Ok::<_, anyhow::Error>(vec![1, 2, 3])
        };

        let first: Vec<i32> = cache.memoize("list", DEFAULT_TTL, make).await.unwrap();
        let second: Vec<i32> = cache
            .memoize("list", DEFAULT_TTL, || async { anyhow::bail!("should not run") })
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_creator_error_is_not_cached() {
        let (_dir, cache) = cache();
        let failed: Result<u32> = cache
            .memoize("k", DEFAULT_TTL, || async { anyhow::bail!("nope") })
            .await;
        assert!(failed.is_err());
        assert_eq!(cache.get::<u32>("k"), None);
    }
}
