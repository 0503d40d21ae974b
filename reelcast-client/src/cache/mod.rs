//! Concrete persisted-state namespaces, built on the generic
//! recovery-aware store in `reelcast-core`.

pub mod personal_events;
pub mod profile_store;

pub use personal_events::PersonalEventCache;
pub use profile_store::DiskProfileStore;
