//! TTL-expiry and size-cap eviction planning, factored out of
//! [`super::ttl_store::TtlStore`] so it can be unit tested without a disk.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    TtlExpired,
    OverSizeCap,
}

#[derive(Debug, Clone)]
pub struct CacheEntryInfo {
    pub key: String,
    pub size_bytes: u64,
    pub last_access_ms: u64,
}

#[derive(Debug, Clone)]
pub struct PlannedEviction {
    pub key: String,
    pub reason: EvictionReason,
}

#[derive(Debug, Default)]
pub struct EvictionPlan {
    pub planned: Vec<PlannedEviction>,
    pub total_bytes_after: u64,
}

/// TTL eviction runs first (idle timeout since last access), then
/// size-cap eviction removes the least-recently-accessed survivors until
/// total usage is back under `max_bytes`.
pub fn plan_evictions(
    mut entries: Vec<CacheEntryInfo>,
    now_ms: u64,
    ttl_ms: u64,
    max_bytes: u64,
) -> EvictionPlan {
    let mut plan = EvictionPlan::default();
    let mut total_bytes: u64 = entries.iter().map(|e| e.size_bytes).sum();

    let mut kept = Vec::with_capacity(entries.len());
    for e in entries.drain(..) {
        let age_ms = now_ms.saturating_sub(e.last_access_ms);
        if ttl_ms > 0 && age_ms > ttl_ms {
            total_bytes = total_bytes.saturating_sub(e.size_bytes);
            plan.planned.push(PlannedEviction {
                key: e.key,
                reason: EvictionReason::TtlExpired,
            });
        } else {
            kept.push(e);
        }
    }

    if max_bytes > 0 && total_bytes > max_bytes {
        kept.sort_by_key(|e| e.last_access_ms);
        for e in kept {
            if total_bytes <= max_bytes {
                break;
            }
            total_bytes = total_bytes.saturating_sub(e.size_bytes);
            plan.planned.push(PlannedEviction {
                key: e.key,
                reason: EvictionReason::OverSizeCap,
            });
        }
    }

    plan.total_bytes_after = total_bytes;
    plan
}
