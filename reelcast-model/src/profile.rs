//! [`ProfileRecord`]: the replaceable kind-0 view for a pubkey.

use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRecord {
    pub pubkey: String,
    /// Raw kind-0 `content` JSON, left unparsed here — parsing it into a
    /// display model is a UI concern outside this crate's scope.
    pub metadata_json: String,
    pub event_created_at: i64,
    pub fetched_at: SystemTime,
}

impl ProfileRecord {
    /// Newest-wins comparison used by the persistent cache: of two kind-0
    /// records for the same pubkey, the greater `event_created_at` wins;
    /// ties keep the first observed (i.e. `self`, the existing record, is
    /// preferred on a tie).
    pub fn should_replace_with(&self, candidate: &ProfileRecord) -> bool {
        candidate.event_created_at > self.event_created_at
    }

    pub fn is_fresh(&self, hard_ttl: Duration, now: SystemTime) -> bool {
        now.duration_since(self.fetched_at)
            .map(|age| age < hard_ttl)
            .unwrap_or(true)
    }

    /// Past the soft-refresh threshold but still within the hard TTL:
    /// stale-while-revalidate territory.
    pub fn needs_background_refresh(&self, soft_ttl: Duration, now: SystemTime) -> bool {
        now.duration_since(self.fetched_at)
            .map(|age| age >= soft_ttl)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(created_at: i64) -> ProfileRecord {
        ProfileRecord {
            pubkey: "pk".into(),
            metadata_json: "{}".into(),
            event_created_at: created_at,
            fetched_at: SystemTime::now(),
        }
    }

    #[test]
    fn newest_wins_on_strictly_greater_created_at() {
        let existing = record(100);
        assert!(existing.should_replace_with(&record(200)));
        assert!(!existing.should_replace_with(&record(100)));
        assert!(!existing.should_replace_with(&record(50)));
    }

    #[test]
    fn freshness_windows() {
        let old = ProfileRecord {
            pubkey: "pk".into(),
            metadata_json: "{}".into(),
            event_created_at: 1,
            fetched_at: SystemTime::now() - Duration::from_secs(8 * 24 * 60 * 60),
        };
        let now = SystemTime::now();
        assert!(old.is_fresh(Duration::from_secs(365 * 24 * 60 * 60), now));
        assert!(old.needs_background_refresh(Duration::from_secs(7 * 24 * 60 * 60), now));
    }
}
