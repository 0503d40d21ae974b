//! Eviction-victim selection, factored
//! out so the ordering rule is unit-testable without a running pool.

use std::time::Instant;

#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub distance_from_cursor: usize,
    pub last_access: Instant,
}

/// Farthest from the cursor is evicted first; ties broken by earliest
/// (least recently used) access time. `candidates` must already exclude
/// ids inside the current window and ids not in `Ready` — this function
/// only orders what's left.
pub fn select_victim(candidates: &[Candidate]) -> Option<&str> {
    candidates
        .iter()
        .max_by(|a, b| {
            a.distance_from_cursor
                .cmp(&b.distance_from_cursor)
                .then_with(|| b.last_access.cmp(&a.last_access))
        })
        .map(|c| c.id.as_str())
}
