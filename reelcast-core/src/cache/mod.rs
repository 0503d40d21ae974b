pub mod eviction;
pub mod recovery;
pub mod ttl_store;

pub use recovery::{open_with_recovery, CacheHandle, VolatileStore};
pub use ttl_store::{CleanupStats, TtlStore, TtlStoreLimits};
