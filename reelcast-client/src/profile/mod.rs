//! The Profile Fetcher: debounced batch resolution over kind-0
//! events, with single-flight per pubkey and negative memoization.

use crate::config::ProfileFetcherConfig;
use crate::subscription::{SubscriptionManager, SubscriptionRequest};
use parking_lot::Mutex;
use reelcast_model::{Filter, ProfileRecord};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Persistent profile storage, injected so the fetcher doesn't own
/// disk I/O directly.
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, pubkey: &str) -> Option<ProfileRecord>;
    async fn put(&self, record: ProfileRecord);
}

struct BatchState {
    pending: HashSet<String>,
    debounce_scheduled: bool,
    inflight: HashMap<String, broadcast::Sender<Option<ProfileRecord>>>,
    missing_until: HashMap<String, Instant>,
    last_background_refresh: Option<Instant>,
}

impl BatchState {
    fn new() -> Self {
        Self {
            pending: HashSet::new(),
            debounce_scheduled: false,
            inflight: HashMap::new(),
            missing_until: HashMap::new(),
            last_background_refresh: None,
        }
    }
}

pub struct ProfileFetcher {
    config: ProfileFetcherConfig,
    subscriptions: Arc<SubscriptionManager>,
    store: Arc<dyn ProfileStore>,
    state: Arc<Mutex<BatchState>>,
}

impl ProfileFetcher {
    pub fn new(config: ProfileFetcherConfig, subscriptions: Arc<SubscriptionManager>, store: Arc<dyn ProfileStore>) -> Self {
        Self {
            config,
            subscriptions,
            store,
            state: Arc::new(Mutex::new(BatchState::new())),
        }
    }

    pub async fn get(&self, pubkey: &str) -> Option<ProfileRecord> {
        let now = Instant::now();
        if let Some(record) = self.store.get(pubkey).await {
            let wall_now = std::time::SystemTime::now();
            if record.is_fresh(self.config.hard_ttl, wall_now) {
                if record.needs_background_refresh(self.config.soft_ttl, wall_now) {
                    self.maybe_trigger_background_refresh(pubkey);
                }
                return Some(record);
            }
        }

        if self.is_negatively_cached(pubkey, now) {
            return None;
        }

        self.resolve(pubkey).await
    }

    pub async fn get_many(&self, pubkeys: &[String]) -> HashMap<String, Option<ProfileRecord>> {
        let futures = pubkeys.iter().map(|pk| async move { (pk.clone(), self.get(pk).await) });
        futures::future::join_all(futures).await.into_iter().collect()
    }

    fn is_negatively_cached(&self, pubkey: &str, now: Instant) -> bool {
        let state = self.state.lock();
        state.missing_until.get(pubkey).map(|expiry| now < *expiry).unwrap_or(false)
    }

    fn maybe_trigger_background_refresh(&self, pubkey: &str) {
        let mut state = self.state.lock();
        let now = Instant::now();
        let allowed = state
            .last_background_refresh
            .map(|last| now.duration_since(last) >= self.config.background_refresh_min_interval)
            .unwrap_or(true);
        if !allowed {
            return;
        }
        state.last_background_refresh = Some(now);
        let already_pending = !state.pending.insert(pubkey.to_string());
        let need_schedule = !already_pending && !state.debounce_scheduled;
        if need_schedule {
            state.debounce_scheduled = true;
        }
        drop(state);
        if need_schedule {
            self.schedule_debounced_batch();
        }
    }

    /// Single-flight (V5): a pubkey already awaiting a batch shares its
    /// receiver instead of re-enqueuing.
    async fn resolve(&self, pubkey: &str) -> Option<ProfileRecord> {
        let mut rx = {
            let mut state = self.state.lock();
            if let Some(tx) = state.inflight.get(pubkey) {
                tx.subscribe()
            } else {
                let (tx, rx) = broadcast::channel(1);
                state.inflight.insert(pubkey.to_string(), tx);
                let newly_pending = state.pending.insert(pubkey.to_string());
                let need_schedule = newly_pending && !state.debounce_scheduled;
                if need_schedule {
                    state.debounce_scheduled = true;
                }
                drop(state);
                if need_schedule {
                    self.schedule_debounced_batch();
                }
                rx
            }
        };
        rx.recv().await.ok().flatten()
    }

    fn schedule_debounced_batch(&self) {
        let fetcher = self.clone_for_task();
        tokio::spawn(async move {
            tokio::time::sleep(fetcher.config.debounce).await;
            fetcher.dispatch_batch().await;
        });
    }

    fn clone_for_task(&self) -> Self {
        Self {
            config: self.config.clone(),
            subscriptions: Arc::clone(&self.subscriptions),
            store: Arc::clone(&self.store),
            state: Arc::clone(&self.state),
        }
    }

    async fn dispatch_batch(&self) {
        let batch: Vec<String> = {
            let mut state = self.state.lock();
            state.debounce_scheduled = false;
            let batch: Vec<String> = state.pending.drain().take(self.config.max_batch_size).collect();
            batch
        };
        if batch.is_empty() {
            return;
        }

        let filter = Filter::new().with_kinds(vec![0]).with_authors(batch.clone()).with_limit(batch.len() as u32);
        let request = SubscriptionRequest {
            name: "profile-fetcher".into(),
            filters: vec![filter],
            timeout: Some(self.config.fallback_timeout),
            priority: crate::subscription::Priority::Normal,
        };
        let mut created = self.subscriptions.create_subscription(request).await;

        let mut resolved: HashSet<String> = HashSet::new();
        let fallback = tokio::time::sleep(self.config.fallback_timeout);
        tokio::pin!(fallback);
        loop {
            if resolved.len() == batch.len() {
                break;
            }
            tokio::select! {
                maybe_event = created.events.recv() => {
                    match maybe_event {
                        Some(event) if event.kind == 0 => {
                            let record = ProfileRecord {
                                pubkey: event.pubkey.clone(),
                                metadata_json: event.content.clone(),
                                event_created_at: event.created_at,
                                fetched_at: std::time::SystemTime::now(),
                            };
                            self.accept_record(record.clone()).await;
                            resolved.insert(record.pubkey.clone());
                        }
                        Some(_) => {}
                        None => break,
                    }
                }
                _ = &mut fallback => break,
            }
        }

        let missing: Vec<String> = batch.into_iter().filter(|pk| !resolved.contains(pk)).collect();
        self.mark_missing(&missing);
    }

    async fn accept_record(&self, record: ProfileRecord) {
        if let Some(existing) = self.store.get(&record.pubkey).await {
            if !existing.should_replace_with(&record) {
                self.notify_resolved(&record.pubkey, Some(existing));
                return;
            }
        }
        self.store.put(record.clone()).await;
        self.notify_resolved(&record.pubkey, Some(record));
    }

    fn mark_missing(&self, pubkeys: &[String]) {
        let mut state = self.state.lock();
        let expiry = Instant::now() + self.config.negative_cache_ttl;
        for pk in pubkeys {
            state.missing_until.insert(pk.clone(), expiry);
        }
        drop(state);
        for pk in pubkeys {
            self.notify_resolved(pk, None);
        }
    }

    fn notify_resolved(&self, pubkey: &str, record: Option<ProfileRecord>) {
        let mut state = self.state.lock();
        if let Some(tx) = state.inflight.remove(pubkey) {
            let _ = tx.send(record);
        }
    }
}

impl Clone for ProfileFetcher {
    fn clone(&self) -> Self {
        self.clone_for_task()
    }
}
