//! Cache-open recovery: reuse an already-open handle for
//! a given root, otherwise retry opening with backoff, delete-and-recreate
//! on repeated failure, and fall back to a volatile in-memory store as a
//! last resort. A permission failure on the root directory itself is
//! treated as permanent and skips the retry ladder entirely.

use crate::backoff::BackoffPolicy;
use crate::cache::ttl_store::{TtlStore, TtlStoreLimits};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock};

/// Process-wide table of already-opened stores, keyed by canonicalized
/// root path — one opener per store. A second
/// caller opening the same path gets the same handle instead of a second
/// `cacache` index over the same directory.
fn registry() -> &'static RwLock<HashMap<PathBuf, Arc<dyn Any + Send + Sync>>> {
    static REGISTRY: OnceLock<RwLock<HashMap<PathBuf, Arc<dyn Any + Send + Sync>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// A volatile, process-lifetime-only stand-in for a disk store. Used only
/// once on-disk recovery is exhausted; nothing here
/// survives a restart, which is the whole point of surfacing a warning
/// when a caller lands on one.
pub struct VolatileStore<V> {
    entries: DashMap<String, V>,
}

impl<V: Clone> VolatileStore<V> {
    fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).map(|e| e.clone())
    }

    fn put(&self, key: &str, value: V) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }
}

/// Either backend a caller of [`open_with_recovery`] might get back.
/// Callers program against this, not against [`TtlStore`] directly, so a
/// degraded-mode fallback is transparent to them.
pub enum CacheHandle<V> {
    Disk(Arc<TtlStore<V>>),
    Volatile(Arc<VolatileStore<V>>),
}

impl<V> Clone for CacheHandle<V> {
    fn clone(&self) -> Self {
        match self {
            CacheHandle::Disk(s) => CacheHandle::Disk(Arc::clone(s)),
            CacheHandle::Volatile(s) => CacheHandle::Volatile(Arc::clone(s)),
        }
    }
}

impl<V> CacheHandle<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub async fn get(&self, key: &str) -> Option<V> {
        match self {
            CacheHandle::Disk(store) => store.get(key).await,
            CacheHandle::Volatile(store) => store.get(key),
        }
    }

    /// Disk write failures here are logged and swallowed rather than
    /// propagated: a cache is allowed to lose a write, the caller it backs
    /// is not allowed to fail because of it — storage errors here are never
    /// retried, only surfaced to the owning subsystem, not the process.
    pub async fn put(&self, key: &str, value: &V) {
        match self {
            CacheHandle::Disk(store) => {
                if let Err(err) = store.put(key, value).await {
                    tracing::warn!(key, error = %err, "disk cache write failed, value not persisted");
                }
            }
            CacheHandle::Volatile(store) => store.put(key, value.clone()),
        }
    }

    pub async fn remove(&self, key: &str) {
        match self {
            CacheHandle::Disk(store) => {
                let _ = store.remove(key).await;
            }
            CacheHandle::Volatile(store) => store.remove(key),
        }
    }

    /// All keys currently present. Used to rebuild an in-memory secondary
    /// index at startup.
    pub async fn keys(&self) -> Vec<String> {
        match self {
            CacheHandle::Disk(store) => {
                let root = store.root_path().to_path_buf();
                tokio::task::spawn_blocking(move || {
                    cacache::index::ls(&root).filter_map(|e| e.ok()).map(|m| m.key).collect()
                })
                .await
                .unwrap_or_default()
            }
            CacheHandle::Volatile(store) => store.keys(),
        }
    }

    pub fn is_volatile(&self) -> bool {
        matches!(self, CacheHandle::Volatile(_))
    }
}

/// Opens (or reuses) a namespaced disk store at `root`, applying the
/// recovery ladder in order: reuse an open handle, retry opening
/// with bounded backoff, delete-and-recreate the directory once, then fall
/// back to a volatile in-memory store. `V` must be the same type at every
/// call site for a given `root`; the registry is keyed by path on the
/// assumption that one root only ever backs one value type.
pub async fn open_with_recovery<V>(root: impl Into<PathBuf>, limits: TtlStoreLimits) -> CacheHandle<V>
where
    V: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    let root = root.into();

    if let Some(existing) = registry().read().unwrap().get(&root) {
        if let Ok(store) = Arc::clone(existing).downcast::<TtlStore<V>>() {
            return CacheHandle::Disk(store);
        }
    }

    // A permission failure on the root directory itself is permanent;
    // nothing about retrying or recreating it would help.
    if let Err(io_err) = tokio::fs::create_dir_all(&root).await {
        if io_err.kind() == std::io::ErrorKind::PermissionDenied {
            tracing::error!(root = %root.display(), "cache directory permission denied, falling back to volatile store");
            return CacheHandle::Volatile(Arc::new(VolatileStore::new()));
        }
    }

    if let Some(store) = try_open_with_backoff(&root, limits).await {
        return register_disk(root, store);
    }

    tracing::warn!(root = %root.display(), "cache store open failed after retries, deleting and recreating");
    let _ = tokio::fs::remove_dir_all(&root).await;
    match TtlStore::open(root.as_path(), limits).await {
        Ok(store) => register_disk(root, store),
        Err(err) => {
            tracing::error!(root = %root.display(), error = %err, "cache store unusable even after recreate, falling back to volatile store");
            CacheHandle::Volatile(Arc::new(VolatileStore::new()))
        }
    }
}

fn register_disk<V>(root: PathBuf, store: TtlStore<V>) -> CacheHandle<V>
where
    V: Send + Sync + 'static,
{
    let store = Arc::new(store);
    registry().write().unwrap().insert(root, Arc::clone(&store) as Arc<dyn Any + Send + Sync>);
    CacheHandle::Disk(store)
}

/// Up to 3 attempts, each delay bounded by 5s per [`BackoffPolicy`]'s cap.
async fn try_open_with_backoff<V>(root: &Path, limits: TtlStoreLimits) -> Option<TtlStore<V>>
where
    V: Send + Sync + Serialize + DeserializeOwned + 'static,
{
    let policy = BackoffPolicy::with_max_attempts(3);
    let mut attempt = 0;
    loop {
        match TtlStore::open(root, limits).await {
            Ok(store) => return Some(store),
            Err(err) => {
                if attempt + 1 >= policy.max_attempts {
                    return None;
                }
                let delay = policy.delay_for(attempt);
                tracing::debug!(attempt, ?delay, error = %err, "cache store open failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
    struct Record {
        value: String,
    }

    #[tokio::test]
    async fn opens_a_fresh_disk_store() {
        let dir = tempfile::tempdir().unwrap();
        let handle: CacheHandle<Record> = open_with_recovery(dir.path().join("ns"), TtlStoreLimits::default()).await;
        assert!(!handle.is_volatile());
        handle.put("k", &Record { value: "v".into() }).await;
        assert_eq!(handle.get("k").await, Some(Record { value: "v".into() }));
    }

    #[tokio::test]
    async fn reopening_the_same_root_reuses_the_handle() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("ns");
        let first: CacheHandle<Record> = open_with_recovery(root.clone(), TtlStoreLimits::default()).await;
        first.put("k", &Record { value: "v".into() }).await;

        let second: CacheHandle<Record> = open_with_recovery(root, TtlStoreLimits::default()).await;
        assert_eq!(second.get("k").await, Some(Record { value: "v".into() }));
    }

    #[tokio::test]
    async fn volatile_store_round_trips_without_disk() {
        let store: Arc<VolatileStore<Record>> = Arc::new(VolatileStore::new());
        let handle: CacheHandle<Record> = CacheHandle::Volatile(store);
        assert!(handle.is_volatile());
        handle.put("k", &Record { value: "v".into() }).await;
        assert_eq!(handle.get("k").await, Some(Record { value: "v".into() }));
        assert_eq!(handle.keys().await, vec!["k".to_string()]);
    }
}
