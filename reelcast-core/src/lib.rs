//! Shared plumbing for the feed client: the error taxonomy, the
//! exponential backoff policy, and a generic TTL/size-capped
//! disk cache used by every persisted-state namespace.

pub mod backoff;
pub mod cache;
pub mod error;

pub use backoff::{retry, BackoffPolicy};
pub use cache::{open_with_recovery, CacheHandle, CleanupStats, TtlStore, TtlStoreLimits, VolatileStore};
pub use error::{ReelcastError, Result};
