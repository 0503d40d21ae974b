//! The Video Controller Pool: a bounded map of live media decoders
//! layered over an unbounded, ordered video list. The hardest-engineering
//! piece of the client — eviction, preload windows, grace-period reclaim,
//! and the per-`id` circuit breaker all live here.
//!
//! Internal state sits behind one coarse [`parking_lot::Mutex`];
//! controller initialization itself runs outside the lock,
//! so no suspension point is ever reached while it's held.

pub mod eviction;
pub mod state;

use crate::config::PoolConfig;
use crate::notify::Notifier;
use crate::transport::{ControllerHandle, MediaInitializer};
use eviction::Candidate;
use parking_lot::Mutex;
use reelcast_core::{ReelcastError, Result};
use reelcast_model::{FeedOrderKey, VideoDescriptor};
use state::{PoolEvent, Slot, VideoState};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, Default)]
pub struct DebugInfo {
    pub total_videos: usize,
    pub controllers: usize,
    pub ready: usize,
    pub loading: usize,
    pub failed: usize,
    pub permanently_failed: usize,
}

struct Inner {
    videos: Vec<VideoDescriptor>,
    ids: HashSet<String>,
    slots: HashMap<String, Slot>,
    controllers: HashMap<String, Arc<ControllerHandle>>,
    cursor: usize,
    current_window: HashSet<String>,
    pending_disposal: HashMap<String, u64>,
    disposal_generation: u64,
    cancelled_inits: HashSet<String>,
}

impl Inner {
    fn new() -> Self {
        Self {
            videos: Vec::new(),
            ids: HashSet::new(),
            slots: HashMap::new(),
            controllers: HashMap::new(),
            cursor: 0,
            current_window: HashSet::new(),
            pending_disposal: HashMap::new(),
            disposal_generation: 0,
            cancelled_inits: HashSet::new(),
        }
    }

}

struct Shared {
    config: PoolConfig,
    media: Arc<dyn MediaInitializer>,
    notifier: Notifier<PoolEvent>,
    inner: Mutex<Inner>,
}

/// Owning handle to the pool. Cheap to clone (an `Arc` inside); clones share
/// the same underlying state and controller set.
#[derive(Clone)]
pub struct VideoControllerPool {
    shared: Arc<Shared>,
}

impl VideoControllerPool {
    pub fn new(config: PoolConfig, media: Arc<dyn MediaInitializer>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                media,
                notifier: Notifier::default(),
                inner: Mutex::new(Inner::new()),
            }),
        }
    }

    /// Fails-silently if `id` already present.
    /// Returns whether the descriptor was newly inserted.
    pub fn add_descriptor(&self, v: VideoDescriptor) -> bool {
        let mut inner = self.shared.inner.lock();
        if inner.ids.contains(&v.id) {
            return false;
        }
        let key = FeedOrderKey::of(&v);
        let pos = inner.videos.partition_point(|existing| FeedOrderKey::of(existing) <= key);
        inner.ids.insert(v.id.clone());
        inner.slots.entry(v.id.clone()).or_insert_with(Slot::fresh);
        inner.videos.insert(pos, v);

        let max_videos = self.shared.config.max_videos;
        let mut evicted = Vec::new();
        while inner.videos.len() > max_videos {
            let victim = inner.videos.pop().expect("len > max_videos implies non-empty");
            inner.ids.remove(&victim.id);
            inner.slots.remove(&victim.id);
            inner.pending_disposal.remove(&victim.id);
            if inner.controllers.remove(&victim.id).is_some() {
                evicted.push(victim.id);
            }
        }
        for id in evicted {
            self.shared.notifier.emit(PoolEvent::Evicted { id });
        }
        true
    }

    /// No-op if `id` is `Ready`, `Loading`, `PermanentlyFailed`, or unknown.
    pub async fn preload(&self, id: &str) -> Result<()> {
        let url = {
            let mut inner = self.shared.inner.lock();
            if !inner.ids.contains(id) {
                return Ok(());
            }
            match inner.slots.get(id).map(|s| s.state.clone()) {
                Some(VideoState::Ready | VideoState::Loading | VideoState::PermanentlyFailed) => {
                    return Ok(());
                }
                _ => {}
            }

            if inner.controllers.len() >= self.shared.config.max_controllers
                && !inner.controllers.contains_key(id)
            {
                match Self::select_victim(&inner, id) {
                    Some(victim) => self.dispose_locked(&mut inner, &victim),
                    None => {
                        return Err(ReelcastError::PoolSaturated {
                            limit: self.shared.config.max_controllers,
                        });
                    }
                }
            }

            inner.cancelled_inits.remove(id);
            if let Some(slot) = inner.slots.get_mut(id) {
                slot.state = VideoState::Loading;
            }
            inner.videos.iter().find(|v| v.id == id).and_then(|v| v.best_url()).map(str::to_string)
        };
        self.shared.notifier.emit(PoolEvent::StateChanged {
            id: id.to_string(),
            state: VideoState::Loading,
        });

        let Some(url) = url else {
            return self.record_init_failure(id, "no usable video url").await;
        };

        let timeout = self.shared.config.preload_timeout;
        let outcome = tokio::time::timeout(timeout, self.shared.media.initialize(&url, timeout)).await;

        let mut inner = self.shared.inner.lock();
        if inner.cancelled_inits.remove(id) {
            if let Some(slot) = inner.slots.get_mut(id) {
                slot.state = VideoState::Disposed;
            }
            drop(inner);
            self.shared.notifier.emit(PoolEvent::Disposed { id: id.to_string() });
            return Ok(());
        }

        match outcome {
            Ok(Ok(handle)) => {
                inner.controllers.insert(id.to_string(), Arc::new(handle));
                if let Some(slot) = inner.slots.get_mut(id) {
                    slot.state = VideoState::Ready;
                    slot.retry_count = 0;
                    slot.last_error = None;
                    slot.touch();
                }
                drop(inner);
                self.shared.notifier.emit(PoolEvent::StateChanged {
                    id: id.to_string(),
                    state: VideoState::Ready,
                });
                Ok(())
            }
            Ok(Err(())) => {
                drop(inner);
                self.record_init_failure(id, "media initialization error").await
            }
            Err(_elapsed) => {
                drop(inner);
                self.record_init_failure(id, "preload timed out").await
            }
        }
    }

    async fn record_init_failure(&self, id: &str, reason: &str) -> Result<()> {
        let (state, permanently_failed) = {
            let mut inner = self.shared.inner.lock();
            let max_retries = self.shared.config.max_retries;
            let Some(slot) = inner.slots.get_mut(id) else {
                return Ok(());
            };
            slot.retry_count += 1;
            slot.last_error = Some(reason.to_string());
            let permanent = slot.retry_count >= max_retries;
            slot.state = if permanent {
                VideoState::PermanentlyFailed
            } else {
                VideoState::Failed
            };
            (slot.state.clone(), permanent)
        };
        if permanently_failed {
            tracing::warn!(id, reason, "video permanently failed after exhausting retries");
        } else {
            tracing::debug!(id, reason, "preload attempt failed, will retry");
        }
        self.shared.notifier.emit(PoolEvent::StateChanged {
            id: id.to_string(),
            state,
        });
        Ok(())
    }

    /// Computes the target window, filters `PermanentlyFailed` ids, and
    /// issues `preload` in priority order: cursor, then forward, then
    /// backward. Ready ids that fall outside the
    /// window are scheduled for grace-period disposal.
    pub async fn preload_window(&self, cursor: usize, ahead: usize, behind: usize) -> Result<()> {
        let (priority_ids, window) = {
            let mut inner = self.shared.inner.lock();
            inner.cursor = cursor;
            let len = inner.videos.len();

            let mut priority_ids = Vec::new();
            if cursor < len {
                priority_ids.push(inner.videos[cursor].id.clone());
            }
            for offset in 1..=ahead {
                if let Some(v) = inner.videos.get(cursor + offset) {
                    priority_ids.push(v.id.clone());
                }
            }
            for offset in 1..=behind {
                if let Some(idx) = cursor.checked_sub(offset) {
                    if let Some(v) = inner.videos.get(idx) {
                        priority_ids.push(v.id.clone());
                    }
                }
            }
            priority_ids.retain(|id| {
                inner.slots.get(id).map(|s| s.state != VideoState::PermanentlyFailed).unwrap_or(true)
            });

            let lo = cursor.saturating_sub(behind);
            let hi = (cursor + ahead).min(len.saturating_sub(1));
            let window: HashSet<String> = if len == 0 {
                HashSet::new()
            } else {
                (lo..=hi).filter_map(|i| inner.videos.get(i).map(|v| v.id.clone())).collect()
            };
            inner.current_window = window.clone();
            (priority_ids, window)
        };

        for id in &priority_ids {
            if let Err(err) = self.preload(id).await {
                tracing::warn!(id, error = %err, "preload within window did not complete");
            }
        }

        self.schedule_grace_disposal(window);
        Ok(())
    }

    fn schedule_grace_disposal(&self, window: HashSet<String>) {
        let scheduled: Vec<(String, u64)> = {
            let mut inner = self.shared.inner.lock();
            inner.disposal_generation += 1;
            let generation = inner.disposal_generation;
            let stale: Vec<String> =
                inner.controllers.keys().filter(|id| !window.contains(*id)).cloned().collect();
            for id in &stale {
                inner.pending_disposal.insert(id.clone(), generation);
            }
            stale.into_iter().map(|id| (id, generation)).collect()
        };

        let grace = self.shared.config.grace_period;
        for (id, generation) in scheduled {
            let pool = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                pool.finalize_grace_disposal(&id, generation);
            });
        }
    }

    fn finalize_grace_disposal(&self, id: &str, generation: u64) {
        let mut inner = self.shared.inner.lock();
        if inner.pending_disposal.get(id) != Some(&generation) {
            return; // reclaimed or superseded by a newer window
        }
        inner.pending_disposal.remove(id);
        if inner.current_window.contains(id) {
            return;
        }
        if inner.controllers.remove(id).is_some() {
            if let Some(slot) = inner.slots.get_mut(id) {
                slot.state = VideoState::Disposed;
            }
            drop(inner);
            self.shared.notifier.emit(PoolEvent::Disposed { id: id.to_string() });
        }
    }

    fn select_victim(inner: &Inner, requesting_id: &str) -> Option<String> {
        let cursor = inner.cursor;
        let candidates: Vec<Candidate> = inner
            .videos
            .iter()
            .enumerate()
            .filter(|(_, v)| v.id != requesting_id)
            .filter(|(_, v)| {
                inner.slots.get(&v.id).map(|s| s.state == VideoState::Ready).unwrap_or(false)
            })
            .filter(|(_, v)| !inner.current_window.contains(&v.id))
            .map(|(idx, v)| Candidate {
                id: v.id.clone(),
                distance_from_cursor: idx.abs_diff(cursor),
                last_access: inner.slots.get(&v.id).map(|s| s.last_access).unwrap_or_else(Instant::now),
            })
            .collect();
        eviction::select_victim(&candidates).map(str::to_string)
    }

    fn dispose_locked(&self, inner: &mut Inner, id: &str) {
        if inner.controllers.remove(id).is_some() {
            if let Some(slot) = inner.slots.get_mut(id) {
                slot.state = VideoState::Disposed;
            }
            self.shared.notifier.emit(PoolEvent::Disposed { id: id.to_string() });
        }
    }

    /// Explicit caller-requested disposal: if `id` is
    /// mid-initialization, marks it cancelled so the pending init disposes
    /// its resource instead of publishing it when it completes.
    pub fn dispose(&self, id: &str) {
        let mut inner = self.shared.inner.lock();
        if inner.slots.get(id).map(|s| s.state.clone()) == Some(VideoState::Loading) {
            inner.cancelled_inits.insert(id.to_string());
            return;
        }
        self.dispose_locked(&mut inner, id);
    }

    /// Disposes every controller except the one at the cursor and its
    /// immediate successor.
    pub fn handle_memory_pressure(&self) {
        let mut inner = self.shared.inner.lock();
        let cursor = inner.cursor;
        let keep: HashSet<String> =
            [cursor, cursor + 1].into_iter().filter_map(|i| inner.videos.get(i).map(|v| v.id.clone())).collect();
        let to_dispose: Vec<String> =
            inner.controllers.keys().filter(|id| !keep.contains(*id)).cloned().collect();
        for id in to_dispose {
            self.dispose_locked(&mut inner, &id);
        }
    }

    /// Disposes every live controller unconditionally.
    pub fn dispose_all(&self) {
        let mut inner = self.shared.inner.lock();
        let all: Vec<String> = inner.controllers.keys().cloned().collect();
        for id in all {
            self.dispose_locked(&mut inner, &id);
        }
    }

    pub fn stop_all(&self) {
        self.dispose_all();
    }

    /// Playback pause/resume are rendering-layer concerns, out of scope
    /// here; these exist to satisfy the pool's contract surface but only
    /// touch `last_access` bookkeeping, not lifecycle state.
    pub fn pause(&self, id: &str) {
        let mut inner = self.shared.inner.lock();
        if let Some(slot) = inner.slots.get_mut(id) {
            slot.touch();
        }
    }

    pub fn pause_all(&self) {
        let mut inner = self.shared.inner.lock();
        let ids: Vec<String> = inner.controllers.keys().cloned().collect();
        for id in ids {
            if let Some(slot) = inner.slots.get_mut(&id) {
                slot.touch();
            }
        }
    }

    pub fn resume(&self, id: &str) {
        self.pause(id);
    }

    pub fn handle_for(&self, id: &str) -> Option<Arc<ControllerHandle>> {
        self.shared.inner.lock().controllers.get(id).cloned()
    }

    pub fn state_changes(&self) -> broadcast::Receiver<PoolEvent> {
        self.shared.notifier.subscribe()
    }

    pub fn videos(&self) -> Vec<VideoDescriptor> {
        self.shared.inner.lock().videos.clone()
    }

    pub fn ready_videos(&self) -> Vec<VideoDescriptor> {
        let inner = self.shared.inner.lock();
        inner
            .videos
            .iter()
            .filter(|v| inner.slots.get(&v.id).map(|s| s.state == VideoState::Ready).unwrap_or(false))
            .cloned()
            .collect()
    }

    pub fn state_of(&self, id: &str) -> Option<VideoState> {
        self.shared.inner.lock().slots.get(id).map(|s| s.state.clone())
    }

    pub fn controller_count(&self) -> usize {
        self.shared.inner.lock().controllers.len()
    }

    pub fn debug_info(&self) -> DebugInfo {
        let inner = self.shared.inner.lock();
        let mut info = DebugInfo {
            total_videos: inner.videos.len(),
            controllers: inner.controllers.len(),
            ..DebugInfo::default()
        };
        for slot in inner.slots.values() {
            match slot.state {
                VideoState::Ready => info.ready += 1,
                VideoState::Loading => info.loading += 1,
                VideoState::Failed => info.failed += 1,
                VideoState::PermanentlyFailed => info.permanently_failed += 1,
                _ => {}
            }
        }
        info
    }
}
