//! The Subscription Manager: multiplexes filter subscriptions over
//! the event-stream transport, intercepting the parts already answerable
//! from cache before any relay traffic is sent.

pub mod cache_intercept;

use crate::transport::EventTransport;
use reelcast_model::{ClientMessage, Event, Filter, ServerMessage};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

pub struct SubscriptionRequest {
    pub name: String,
    pub filters: Vec<Filter>,
    pub timeout: Option<Duration>,
    pub priority: Priority,
}

impl SubscriptionRequest {
    pub fn new(name: impl Into<String>, filters: Vec<Filter>) -> Self {
        Self {
            name: name.into(),
            filters,
            timeout: None,
            priority: Priority::default(),
        }
    }
}

/// A live subscription's delivered-event stream. Dropping this (or letting
/// it complete) does not by itself cancel the subscription — callers that
/// want to stop early should hold the `id` and call
/// [`SubscriptionManager::cancel`].
pub struct CreatedSubscription {
    pub id: String,
    pub events: mpsc::Receiver<Event>,
}

/// Read-only capability closures, injected to break what would otherwise
/// be a subscription-manager ↔ cache ownership cycle.
pub type CachedEventLookup = Arc<dyn Fn(&str) -> Option<Event> + Send + Sync>;
pub type FreshProfileLookup = Arc<dyn Fn(&str) -> bool + Send + Sync>;

struct LiveSubscription {
    name: String,
    relay_sub_ids: Vec<String>,
    timeout_task: Option<JoinHandle<()>>,
    forward_task: JoinHandle<()>,
}

struct Inner {
    subs: HashMap<String, LiveSubscription>,
}

pub struct SubscriptionManager {
    transport: Arc<dyn EventTransport>,
    get_cached_event: CachedEventLookup,
    has_fresh_profile: FreshProfileLookup,
    inner: tokio::sync::Mutex<Inner>,
}

impl SubscriptionManager {
    pub fn new(
        transport: Arc<dyn EventTransport>,
        get_cached_event: CachedEventLookup,
        has_fresh_profile: FreshProfileLookup,
    ) -> Self {
        Self {
            transport,
            get_cached_event,
            has_fresh_profile,
            inner: tokio::sync::Mutex::new(Inner { subs: HashMap::new() }),
        }
    }

    /// Splits each filter against cache state, dispatches only what's
    /// missing, and returns a merged event stream under one logical
    /// subscription id.
    pub async fn create_subscription(&self, request: SubscriptionRequest) -> CreatedSubscription {
        let sub_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(256);

        let mut cached_events = Vec::new();
        let mut dispatch_filters = Vec::new();
        for filter in request.filters {
            let (cached, mut remaining) = cache_intercept::split_filter(
                filter,
                |id| (self.get_cached_event)(id),
                |pk| (self.has_fresh_profile)(pk),
            );
            cached_events.extend(cached);
            if let Some(f) = remaining.take() {
                dispatch_filters.push(f);
            }
        }

        for f in dispatch_filters.iter_mut() {
            f.normalize_limit();
        }

        let mut relay_sub_ids = Vec::new();
        let mut relay_handles = Vec::new();
        if !dispatch_filters.is_empty() {
            let relay_sub_id = format!("{sub_id}-relay");
            let message = ClientMessage::Req {
                sub_id: relay_sub_id.clone(),
                filters: dispatch_filters,
            };
            let handle = self.transport.open_subscription(message).await;
            relay_sub_ids.push(handle.sub_id().to_string());
            relay_handles.push(handle);
        }

        let forward_task = tokio::spawn(forward_loop(tx, cached_events, relay_handles));

        let timeout_task = request.timeout.map(|deadline| {
            let transport = Arc::clone(&self.transport);
            let relay_ids = relay_sub_ids.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                for id in relay_ids {
                    transport.close_subscription(&id).await;
                }
            })
        });

        let mut inner = self.inner.lock().await;
        inner.subs.insert(
            sub_id.clone(),
            LiveSubscription {
                name: request.name,
                relay_sub_ids,
                timeout_task,
                forward_task,
            },
        );

        CreatedSubscription { id: sub_id, events: rx }
    }

    /// Idempotent: cancelling an unknown or already-cancelled id is a no-op.
    pub async fn cancel(&self, id: &str) {
        let removed = { self.inner.lock().await.subs.remove(id) };
        if let Some(sub) = removed {
            if let Some(t) = sub.timeout_task {
                t.abort();
            }
            sub.forward_task.abort();
            for relay_id in sub.relay_sub_ids {
                self.transport.close_subscription(&relay_id).await;
            }
        }
    }

    pub async fn cancel_by_name(&self, prefix: &str) {
        let matching: Vec<String> = {
            let inner = self.inner.lock().await;
            inner.subs.iter().filter(|(_, s)| s.name.starts_with(prefix)).map(|(id, _)| id.clone()).collect()
        };
        for id in matching {
            self.cancel(&id).await;
        }
    }

    pub async fn dispose(&self) {
        let ids: Vec<String> = { self.inner.lock().await.subs.keys().cloned().collect() };
        for id in ids {
            self.cancel(&id).await;
        }
    }
}

async fn forward_loop(
    tx: mpsc::Sender<Event>,
    cached: Vec<Event>,
    mut relay: Vec<crate::transport::SubscriptionHandle>,
) {
    // Cached events are delivered first, synchronously relative to relay
    // traffic — callers see what's already known before anything new
    // arrives, then only the missing ids are requested from the relay.
    for event in cached {
        if tx.send(event).await.is_err() {
            return;
        }
    }

    if relay.is_empty() {
        return; // nothing missing: subscription completes without transport traffic
    }

    // Single-filter dispatch today always yields one relay handle; iterate
    // defensively in case a future caller merges several.
    for handle in relay.iter_mut() {
        loop {
            match handle.frames.recv().await {
                Some(ServerMessage::Event { event, .. }) => {
                    if tx.send(*event).await.is_err() {
                        return;
                    }
                }
                Some(ServerMessage::Eose { .. }) => break,
                Some(ServerMessage::Notice { message }) => {
                    tracing::debug!(message, "relay notice during subscription");
                }
                Some(ServerMessage::Ok { .. }) | None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{BroadcastOutcome, SubscriptionHandle};
    use async_trait::async_trait;
    use reelcast_model::EventKind;
    use tokio::sync::Mutex as AsyncMutex;

    struct FakeTransport {
        next: AsyncMutex<Vec<ServerMessage>>,
    }

    #[async_trait]
    impl EventTransport for FakeTransport {
        async fn open_subscription(&self, message: ClientMessage) -> SubscriptionHandle {
            let ClientMessage::Req { sub_id, .. } = message else {
                panic!("unexpected message");
            };
            let (tx, rx) = mpsc::channel(16);
            let frames = self.next.lock().await.drain(..).collect::<Vec<_>>();
            tokio::spawn(async move {
                for f in frames {
                    let _ = tx.send(f).await;
                }
            });
            SubscriptionHandle::new(sub_id, rx)
        }

        async fn close_subscription(&self, _sub_id: &str) {}

        async fn broadcast(&self, _event: &Event) -> BroadcastOutcome {
            BroadcastOutcome {
                acknowledged: vec![],
                failed: vec![],
            }
        }
    }

    fn event(id: &str) -> Event {
        Event {
            id: id.into(),
            pubkey: "pk".into(),
            created_at: 1_000,
            kind: EventKind::Note.as_u32(),
            tags: vec![],
            content: "hi".into(),
            sig: "sig".into(),
        }
    }

    #[tokio::test]
    async fn id_lookup_serves_cached_and_dispatches_only_missing() {
        let transport = Arc::new(FakeTransport {
            next: AsyncMutex::new(vec![ServerMessage::Event {
                sub_id: "x".into(),
                event: Box::new(event("missing")),
            }, ServerMessage::Eose { sub_id: "x".into() }]),
        });
        let cache: HashMap<String, Event> = [("cached".to_string(), event("cached"))].into_iter().collect();
        let get_cached: CachedEventLookup = Arc::new(move |id| cache.get(id).cloned());
        let has_fresh: FreshProfileLookup = Arc::new(|_| false);
        let manager = SubscriptionManager::new(transport, get_cached, has_fresh);

        let request = SubscriptionRequest::new(
            "test",
            vec![Filter::new().with_ids(vec!["cached".into(), "missing".into()])],
        );
        let mut created = manager.create_subscription(request).await;

        let first = created.events.recv().await.unwrap();
        let second = created.events.recv().await.unwrap();
        let mut ids = vec![first.id, second.id];
        ids.sort();
        assert_eq!(ids, vec!["cached", "missing"]);
    }

    #[tokio::test]
    async fn fully_cached_id_lookup_never_dispatches() {
        let transport = Arc::new(FakeTransport { next: AsyncMutex::new(vec![]) });
        let cache: HashMap<String, Event> = [("cached".to_string(), event("cached"))].into_iter().collect();
        let get_cached: CachedEventLookup = Arc::new(move |id| cache.get(id).cloned());
        let has_fresh: FreshProfileLookup = Arc::new(|_| false);
        let manager = SubscriptionManager::new(transport, get_cached, has_fresh);

        let request = SubscriptionRequest::new("test", vec![Filter::new().with_ids(vec!["cached".into()])]);
        let mut created = manager.create_subscription(request).await;
        let first = created.events.recv().await.unwrap();
        assert_eq!(first.id, "cached");
        assert!(created.events.recv().await.is_none());
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let transport = Arc::new(FakeTransport { next: AsyncMutex::new(vec![]) });
        let get_cached: CachedEventLookup = Arc::new(|_| None);
        let has_fresh: FreshProfileLookup = Arc::new(|_| false);
        let manager = SubscriptionManager::new(transport, get_cached, has_fresh);
        let request = SubscriptionRequest::new("test", vec![Filter::new().with_kinds(vec![1])]);
        let created = manager.create_subscription(request).await;
        manager.cancel(&created.id).await;
        manager.cancel(&created.id).await;
    }
}
