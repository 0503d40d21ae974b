//! Crate-wide error taxonomy. Each variant maps to one of the five
//! categories the design separates retry/propagation policy by; the variant
//! names are what call sites match on, the categories are documented per
//! variant rather than encoded as a separate enum.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReelcastError {
    /// Connection failure, send timeout, or 5xx response. Retried with
    /// exponential backoff by the caller; this variant is what survives
    /// after retries are exhausted.
    #[error("transport error after retries: {0}")]
    Transport(String),

    /// Bad or missing signing authorization (HTTP 401 or relay rejection).
    #[error("authorization required: {0}")]
    AuthRequired(String),

    /// Malformed event or filter. Never retried.
    #[error("malformed input: {0}")]
    Malformed(String),

    /// Controller pool has no evictable slot for a new preload request.
    #[error("controller pool saturated (limit {limit})")]
    PoolSaturated { limit: usize },

    /// Host is under memory pressure; caller should back off or request
    /// pressure relief before retrying.
    #[error("memory pressure, relief requested")]
    MemoryPressure,

    /// Media initialization failed in a way the circuit breaker should
    /// count. `permanent` is true once the per-id retry budget is spent.
    #[error("media initialization failed: {reason}")]
    Media { reason: String, permanent: bool },

    /// Disk or permission failure in a persistent store. Never retried;
    /// surfaced to the owning subsystem, not the whole process.
    #[error("storage error: {0}")]
    Storage(String),

    /// The operation was cancelled before completion. Always safe to
    /// observe after the fact; never itself retried.
    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl ReelcastError {
    /// Whether the retry policy allows another attempt at this error.
    /// Transient transport errors are retryable by the backoff loop itself
    /// (this predicate is for callers inspecting an error that already
    /// exhausted its attempts, or one that arrived out of that loop).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReelcastError::Transport(_) | ReelcastError::MemoryPressure | ReelcastError::Timeout(_)
        )
    }
}

impl From<cacache::Error> for ReelcastError {
    fn from(e: cacache::Error) -> Self {
        ReelcastError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for ReelcastError {
    fn from(e: serde_json::Error) -> Self {
        ReelcastError::Malformed(e.to_string())
    }
}

impl From<std::io::Error> for ReelcastError {
    fn from(e: std::io::Error) -> Self {
        ReelcastError::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReelcastError>;
