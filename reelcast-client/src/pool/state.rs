//! Per-`id` state machine for controller lifecycle.

use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoState {
    NotLoaded,
    Loading,
    Ready,
    Failed,
    PermanentlyFailed,
    Disposed,
}

#[derive(Debug, Clone)]
pub struct Slot {
    pub state: VideoState,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub last_access: Instant,
}

impl Slot {
    pub fn fresh() -> Self {
        Self {
            state: VideoState::NotLoaded,
            retry_count: 0,
            last_error: None,
            last_access: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_access = Instant::now();
    }
}

/// One state-transition or eviction notification; edge-triggered, may be
/// coalesced by a slow consumer since
/// it travels over a [`crate::notify::Notifier`] broadcast channel.
#[derive(Debug, Clone)]
pub enum PoolEvent {
    StateChanged { id: String, state: VideoState },
    Evicted { id: String },
    Disposed { id: String },
}
