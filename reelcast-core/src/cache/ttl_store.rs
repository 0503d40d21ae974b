//! A namespaced, TTL-and-size-capped key/value box backed by a
//! content-addressed disk store. One
//! [`TtlStore`] instance is the single opener for its namespace; callers
//! serialize access the same way the rest of the pipeline does, by holding
//! the store behind an `Arc` and not constructing a second instance over
//! the same root.

use crate::cache::eviction::{plan_evictions, CacheEntryInfo, EvictionReason};
use crate::error::Result;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy)]
pub struct TtlStoreLimits {
    pub ttl: Duration,
    pub max_bytes: u64,
}

impl Default for TtlStoreLimits {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(7 * 24 * 60 * 60),
            max_bytes: 64 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CleanupStats {
    pub removed_ttl: usize,
    pub removed_size: usize,
    pub bytes_after: u64,
}

/// One namespace of the persisted state layout (`user_profiles`,
/// `personal_events`, `pending_uploads`, …). `V` is the JSON-serializable
/// value type that namespace stores; keys are plain strings.
#[derive(Debug)]
pub struct TtlStore<V> {
    root: PathBuf,
    limits: TtlStoreLimits,
    last_touch_ms: DashMap<String, u64>,
    cleanup_lock: Mutex<()>,
    _value: PhantomData<fn() -> V>,
}

impl<V> TtlStore<V>
where
    V: Serialize + DeserializeOwned,
{
    pub async fn open(root: impl Into<PathBuf>, limits: TtlStoreLimits) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        let store = Self {
            root,
            limits,
            last_touch_ms: DashMap::new(),
            cleanup_lock: Mutex::new(()),
            _value: PhantomData,
        };
        store.recover().await;
        Ok(store)
    }

    /// Best-effort integrity scan at startup: entries cacache can't read
    /// back are dropped from the index rather than surfaced as an error,
    /// since a corrupt cache entry is not a reason to fail startup.
    async fn recover(&self) {
        let root = self.root.clone();
        let keys: Vec<String> = tokio::task::spawn_blocking(move || {
            cacache::index::ls(&root)
                .filter_map(|entry| entry.ok())
                .map(|m| m.key)
                .collect()
        })
        .await
        .unwrap_or_default();

        for key in keys {
            if cacache::read(&self.root, &key).await.is_err() {
                tracing::warn!(key, "dropping unreadable cache entry during recovery");
                let _ = cacache::remove(&self.root, &key).await;
            }
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let bytes = cacache::read(&self.root, key).await.ok()?;
        let value = serde_json::from_slice(&bytes).ok()?;
        self.touch(key);
        Some(value)
    }

    pub async fn put(&self, key: &str, value: &V) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        cacache::write(&self.root, key, bytes).await?;
        self.touch(key);
        self.maybe_cleanup().await;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        cacache::remove(&self.root, key).await?;
        self.last_touch_ms.remove(key);
        Ok(())
    }

    pub async fn current_usage_bytes(&self) -> u64 {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            cacache::index::ls(&root)
                .filter_map(|e| e.ok())
                .map(|m| m.size as u64)
                .sum()
        })
        .await
        .unwrap_or(0)
    }

    fn touch(&self, key: &str) {
        self.last_touch_ms.insert(key.to_string(), unix_ms_now());
    }

    async fn maybe_cleanup(&self) {
        if self.limits.max_bytes == 0 {
            return;
        }
        if self.current_usage_bytes().await > self.limits.max_bytes {
            let _ = self.cleanup().await;
        }
    }

    /// Runs TTL and size-cap eviction. Storage errors from this path are
    /// logged and skipped per-entry, never propagated: a single unreadable
    /// entry must not abort the whole cleanup pass.
    pub async fn cleanup(&self) -> Result<CleanupStats> {
        let _guard = self.cleanup_lock.lock().await;
        let root = self.root.clone();
        let entries: Vec<cacache::Metadata> = tokio::task::spawn_blocking(move || {
            cacache::index::ls(&root).filter_map(|e| e.ok()).collect()
        })
        .await
        .unwrap_or_default();

        let now_ms = unix_ms_now();
        let infos: Vec<CacheEntryInfo> = entries
            .iter()
            .map(|m| CacheEntryInfo {
                key: m.key.clone(),
                size_bytes: m.size as u64,
                last_access_ms: self
                    .last_touch_ms
                    .get(&m.key)
                    .map(|v| *v)
                    .unwrap_or_else(|| u128_to_u64(m.time)),
            })
            .collect();

        let ttl_ms = self.limits.ttl.as_millis().min(u128::from(u64::MAX)) as u64;
        let plan = plan_evictions(infos, now_ms, ttl_ms, self.limits.max_bytes);

        let mut removed_ttl = 0;
        let mut removed_size = 0;
        for eviction in &plan.planned {
            if cacache::remove(&self.root, &eviction.key).await.is_ok() {
                self.last_touch_ms.remove(&eviction.key);
                match eviction.reason {
                    EvictionReason::TtlExpired => removed_ttl += 1,
                    EvictionReason::OverSizeCap => removed_size += 1,
                }
            }
        }

        if removed_ttl + removed_size > 0 {
            tracing::debug!(removed_ttl, removed_size, "cache cleanup evicted entries");
        }

        Ok(CleanupStats {
            removed_ttl,
            removed_size,
            bytes_after: plan.total_bytes_after,
        })
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }
}

fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis()
        .min(u128::from(u64::MAX)) as u64
}

fn u128_to_u64(v: u128) -> u64 {
    v.min(u128::from(u64::MAX)) as u64
}
