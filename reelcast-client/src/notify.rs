//! A single edge-triggered notification stream per component. Backed by
//! a broadcast-style channel: late subscribers miss past events, which is
//! the correct semantics for a UI that re-reads current state on attach
//! and only needs to know *that* something changed afterward.

use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub struct Notifier<T: Clone> {
    tx: broadcast::Sender<T>,
}

impl<T: Clone> Notifier<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.tx.subscribe()
    }

    /// Best-effort emit: a notification with no current subscribers is
    /// simply dropped, which is fine for an edge-triggered signal.
    pub fn emit(&self, event: T) {
        let _ = self.tx.send(event);
    }
}

impl<T: Clone> Default for Notifier<T> {
    fn default() -> Self {
        Self::new(64)
    }
}
