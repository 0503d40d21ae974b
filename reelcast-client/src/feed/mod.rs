//! The Feed Pipeline / Ingestion Bridge: raw events in, admitted
//! `VideoDescriptor`s in the pool.

pub mod admission;
pub mod seen_ids;

use crate::config::FeedConfig;
use crate::pool::VideoControllerPool;
use crate::subscription::{SubscriptionManager, SubscriptionRequest};
use admission::AdmissionRejection;
use futures::StreamExt;
use parking_lot::Mutex;
use reelcast_model::Event;
use seen_ids::SeenIds;
use std::sync::Arc;

/// The user-local, persistent "already seen" service — a read-only
/// capability injected rather than owned, same pattern as the subscription
/// manager's cache-lookup closures.
pub trait SeenService: Send + Sync {
    fn has_seen(&self, id: &str) -> bool;
    fn mark_seen(&self, id: &str);
}

pub struct FeedPipeline {
    config: FeedConfig,
    pool: VideoControllerPool,
    seen_ids: Mutex<SeenIds>,
    seen_service: Arc<dyn SeenService>,
}

impl FeedPipeline {
    pub fn new(config: FeedConfig, pool: VideoControllerPool, seen_service: Arc<dyn SeenService>) -> Self {
        let seen_ids = Mutex::new(SeenIds::with_capacity(config.seen_ids_capacity));
        Self {
            config,
            pool,
            seen_ids,
            seen_service,
        }
    }

    /// Applies every admission rule and, if the event is admitted,
    /// constructs a descriptor and inserts it into the pool. Returns
    /// whether the event resulted in a new pool entry.
    pub fn ingest(&self, event: Event, replay: bool) -> bool {
        match self.admit(&event, replay) {
            Ok(()) => {}
            Err(reason) => {
                tracing::debug!(id = %event.id, ?reason, "event rejected during admission");
                return false;
            }
        }

        let descriptor = match admission::build_descriptor(&event) {
            Ok(d) => d,
            Err(reason) => {
                tracing::debug!(id = %event.id, ?reason, "event rejected during admission");
                return false;
            }
        };

        let inserted = self.pool.add_descriptor(descriptor);
        if inserted {
            self.seen_ids.lock().insert(event.id.clone());
            self.seen_service.mark_seen(&event.id);
        }
        inserted
    }

    fn admit(&self, event: &Event, replay: bool) -> Result<(), AdmissionRejection> {
        // Rule 1 + "duplicates across subscriptions": the same id arriving
        // twice keeps only the first instance, discarded silently here.
        if self.seen_ids.lock().contains(&event.id) {
            return Err(AdmissionRejection::AlreadyAdmitted);
        }
        // Rule 5.
        if !replay && self.seen_service.has_seen(&event.id) {
            return Err(AdmissionRejection::AlreadySeenByUser);
        }
        let now = chrono::Utc::now().timestamp();
        if let Some(reason) = admission::check_content_and_age(event, now, self.config.max_event_age) {
            return Err(reason);
        }
        Ok(())
    }
}

/// Owns the subscribe → ingest → health-monitor loop: restarts
/// subscriptions atomically after a silence window.
pub struct FeedIngestionBridge {
    pipeline: Arc<FeedPipeline>,
    subscriptions: Arc<SubscriptionManager>,
}

impl FeedIngestionBridge {
    pub fn new(pipeline: Arc<FeedPipeline>, subscriptions: Arc<SubscriptionManager>) -> Self {
        Self {
            pipeline,
            subscriptions,
        }
    }

    /// Runs forever (until `requests` is empty or the caller's task is
    /// cancelled), recreating the given subscriptions with identical
    /// parameters any time the silence threshold elapses.
    pub async fn run(&self, requests: Vec<SubscriptionRequest>) {
        loop {
            let mut receivers = Vec::new();
            for req in &requests {
                let created = self
                    .subscriptions
                    .create_subscription(SubscriptionRequest {
                        name: req.name.clone(),
                        filters: req.filters.clone(),
                        timeout: req.timeout,
                        priority: req.priority,
                    })
                    .await;
                receivers.push(created);
            }

            let should_restart = self.run_until_silent_or_closed(receivers).await;
            if !should_restart {
                return;
            }
            tracing::warn!("feed subscriptions silent past threshold, restarting");
        }
    }

    async fn run_until_silent_or_closed(&self, created: Vec<crate::subscription::CreatedSubscription>) -> bool {
        if created.is_empty() {
            return false;
        }
        let merged = futures::stream::select_all(
            created.into_iter().map(|c| tokio_stream::wrappers::ReceiverStream::new(c.events)),
        );
        tokio::pin!(merged);
        let silence = self.pipeline.config.health_check_silence_threshold;
        loop {
            match tokio::time::timeout(silence, merged.next()).await {
                Ok(Some(event)) => {
                    self.pipeline.ingest(event, false);
                }
                Ok(None) => return false,
                Err(_elapsed) => return true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkClass;
    use crate::pool::VideoControllerPool;
    use crate::transport::{ControllerHandle, MediaInitializer};
    use async_trait::async_trait;
    use reelcast_model::EventKind;
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    struct NoopMedia;
    #[async_trait]
    impl MediaInitializer for NoopMedia {
        async fn initialize(&self, url: &str, _timeout: Duration) -> std::result::Result<ControllerHandle, ()> {
            Ok(ControllerHandle::for_test(url.to_string()))
        }
    }

    struct FakeSeenService {
        seen: StdMutex<HashSet<String>>,
    }
    impl SeenService for FakeSeenService {
        fn has_seen(&self, id: &str) -> bool {
            self.seen.lock().unwrap().contains(id)
        }
        fn mark_seen(&self, id: &str) {
            self.seen.lock().unwrap().insert(id.to_string());
        }
    }

    fn video_event(id: &str, created_at: i64) -> Event {
        Event {
            id: id.into(),
            pubkey: "author".into(),
            created_at,
            kind: EventKind::AddressableShortVideo.as_u32(),
            tags: vec![
                vec!["url".into(), "https://cdn.example.com/clip.mp4".into()],
                vec!["d".into(), id.into()],
            ],
            content: "a clip".into(),
            sig: "sig".into(),
        }
    }

    fn pipeline() -> FeedPipeline {
        let pool_config = crate::config::PoolConfig::for_network(NetworkClass::Testing);
        let pool = VideoControllerPool::new(pool_config, Arc::new(NoopMedia));
        let seen_service = Arc::new(FakeSeenService {
            seen: StdMutex::new(HashSet::new()),
        });
        FeedPipeline::new(FeedConfig::default(), pool, seen_service)
    }

    #[test]
    fn admits_a_valid_event() {
        let p = pipeline();
        assert!(p.ingest(video_event("aaaa", chrono::Utc::now().timestamp()), false));
        assert_eq!(p.pool.videos().len(), 1);
    }

    #[test]
    fn rejects_event_with_no_usable_url() {
        let p = pipeline();
        let mut e = video_event("aaaa", chrono::Utc::now().timestamp());
        e.tags.retain(|t| t.first().map(String::as_str) != Some("url"));
        assert!(!p.ingest(e, false));
    }

    #[test]
    fn second_occurrence_of_same_id_is_discarded() {
        let p = pipeline();
        let now = chrono::Utc::now().timestamp();
        assert!(p.ingest(video_event("aaaa", now), false));
        assert!(!p.ingest(video_event("aaaa", now), false));
        assert_eq!(p.pool.videos().len(), 1);
    }

    #[test]
    fn rejects_already_user_seen_unless_replay() {
        let p = pipeline();
        let now = chrono::Utc::now().timestamp();
        p.seen_service.mark_seen("aaaa");
        assert!(!p.ingest(video_event("aaaa", now), false));
        assert!(p.ingest(video_event("aaaa", now), true));
    }

    #[test]
    fn rejects_stale_event() {
        let p = pipeline();
        assert!(!p.ingest(video_event("aaaa", 1), false));
    }
}
