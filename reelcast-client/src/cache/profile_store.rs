//! Disk-backed [`ProfileStore`]: a newest-wins
//! record per pubkey plus a separate `fetchedAt` map, each its own
//! namespace so eviction sweeps and freshness checks don't need to
//! deserialize the other.

use crate::profile::ProfileStore;
use reelcast_core::{open_with_recovery, CacheHandle, TtlStoreLimits};
use reelcast_model::ProfileRecord;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// [`ProfileRecord`] doesn't derive `Serialize`/`Deserialize` itself — it
/// carries a `SystemTime`, which isn't a wire type — so this is the
/// on-disk shape, keyed by unix seconds instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredProfile {
    pubkey: String,
    metadata_json: String,
    event_created_at: i64,
    fetched_at_unix: u64,
}

impl From<&ProfileRecord> for StoredProfile {
    fn from(record: &ProfileRecord) -> Self {
        Self {
            pubkey: record.pubkey.clone(),
            metadata_json: record.metadata_json.clone(),
            event_created_at: record.event_created_at,
            fetched_at_unix: record
                .fetched_at
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }
}

impl From<StoredProfile> for ProfileRecord {
    fn from(stored: StoredProfile) -> Self {
        Self {
            pubkey: stored.pubkey,
            metadata_json: stored.metadata_json,
            event_created_at: stored.event_created_at,
            fetched_at: UNIX_EPOCH + Duration::from_secs(stored.fetched_at_unix),
        }
    }
}

pub struct DiskProfileStore {
    records: CacheHandle<StoredProfile>,
}

impl DiskProfileStore {
    /// `root` is the base directory this store's namespaces live under
    /// (`user_profiles`); `fetchedAt` is folded into the same record
    /// rather than a second namespace, since the two are always read and
    /// written together, so nothing here reads one without the other.
    pub async fn open(root: impl AsRef<Path>, hard_ttl: Duration) -> Self {
        let limits = TtlStoreLimits {
            ttl: hard_ttl,
            ..TtlStoreLimits::default()
        };
        let records = open_with_recovery(root.as_ref().join("user_profiles"), limits).await;
        Self { records }
    }
}

#[async_trait::async_trait]
impl ProfileStore for DiskProfileStore {
    async fn get(&self, pubkey: &str) -> Option<ProfileRecord> {
        self.records.get(pubkey).await.map(ProfileRecord::from)
    }

    async fn put(&self, record: ProfileRecord) {
        let stored = StoredProfile::from(&record);
        self.records.put(&record.pubkey, &stored).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pubkey: &str, created_at: i64) -> ProfileRecord {
        ProfileRecord {
            pubkey: pubkey.to_string(),
            metadata_json: "{\"name\":\"a\"}".to_string(),
            event_created_at: created_at,
            fetched_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn round_trips_a_profile_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskProfileStore::open(dir.path(), Duration::from_secs(3600)).await;

        assert!(store.get("pk1").await.is_none());
        store.put(record("pk1", 100)).await;

        let fetched = store.get("pk1").await.unwrap();
        assert_eq!(fetched.pubkey, "pk1");
        assert_eq!(fetched.event_created_at, 100);
    }

    #[tokio::test]
    async fn reopening_the_same_root_sees_prior_writes() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = DiskProfileStore::open(dir.path(), Duration::from_secs(3600)).await;
            store.put(record("pk1", 1)).await;
        }
        let store = DiskProfileStore::open(dir.path(), Duration::from_secs(3600)).await;
        assert!(store.get("pk1").await.is_some());
    }
}
