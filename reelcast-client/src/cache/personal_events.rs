//! Disk-backed personal event cache: every
//! event authored by the current user, indexed by `id` with a secondary
//! in-memory index by `kind` so "my profile" rendering and offline access
//! to one's own content don't need a full namespace scan.

use reelcast_core::{open_with_recovery, CacheHandle, TtlStoreLimits};
use reelcast_model::Event;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EventMeta {
    kind: u32,
}

pub struct PersonalEventCache {
    events: CacheHandle<Event>,
    meta: CacheHandle<EventMeta>,
    by_kind: RwLock<HashMap<u32, HashSet<String>>>,
}

impl PersonalEventCache {
    /// `root` is the base directory the `personal_events` /
    /// `personal_events_metadata` namespaces live under. The user's own
    /// events have no natural TTL — they're kept until explicitly removed
    /// — so this uses a long, effectively-unbounded TTL rather than the
    /// profile cache's hard expiry.
    pub async fn open(root: impl AsRef<Path>) -> Self {
        let limits = TtlStoreLimits {
            ttl: std::time::Duration::from_secs(365 * 24 * 60 * 60 * 10),
            ..TtlStoreLimits::default()
        };
        let events = open_with_recovery(root.as_ref().join("personal_events"), limits).await;
        let meta: CacheHandle<EventMeta> = open_with_recovery(root.as_ref().join("personal_events_metadata"), limits).await;

        let mut by_kind: HashMap<u32, HashSet<String>> = HashMap::new();
        for id in meta.keys().await {
            if let Some(entry) = meta.get(&id).await {
                by_kind.entry(entry.kind).or_default().insert(id);
            }
        }

        Self {
            events,
            meta,
            by_kind: RwLock::new(by_kind),
        }
    }

    pub async fn insert(&self, event: Event) {
        let id = event.id.clone();
        let kind = event.kind;
        self.events.put(&id, &event).await;
        self.meta.put(&id, &EventMeta { kind }).await;
        self.by_kind.write().unwrap().entry(kind).or_default().insert(id);
    }

    pub async fn get(&self, id: &str) -> Option<Event> {
        self.events.get(id).await
    }

    /// IDs of cached events of the given kind, in no particular order; the
    /// caller fetches each body with [`PersonalEventCache::get`].
    pub fn ids_by_kind(&self, kind: u32) -> Vec<String> {
        self.by_kind
            .read()
            .unwrap()
            .get(&kind)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: &str, kind: u32) -> Event {
        Event {
            id: id.to_string(),
            pubkey: "pk".into(),
            created_at: 1,
            kind,
            tags: vec![],
            content: String::new(),
            sig: "sig".into(),
        }
    }

    #[tokio::test]
    async fn inserted_events_are_retrievable_by_id_and_kind() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PersonalEventCache::open(dir.path()).await;

        cache.insert(note("e1", 34236)).await;
        cache.insert(note("e2", 34236)).await;
        cache.insert(note("e3", 0)).await;

        assert!(cache.get("e1").await.is_some());
        assert!(cache.get("missing").await.is_none());

        let mut shorts = cache.ids_by_kind(34236);
        shorts.sort();
        assert_eq!(shorts, vec!["e1".to_string(), "e2".to_string()]);
        assert_eq!(cache.ids_by_kind(0), vec!["e3".to_string()]);
        assert!(cache.ids_by_kind(9999).is_empty());
    }

    #[tokio::test]
    async fn reopening_rebuilds_the_kind_index_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = PersonalEventCache::open(dir.path()).await;
            cache.insert(note("e1", 34236)).await;
        }
        let cache = PersonalEventCache::open(dir.path()).await;
        assert_eq!(cache.ids_by_kind(34236), vec!["e1".to_string()]);
    }
}
