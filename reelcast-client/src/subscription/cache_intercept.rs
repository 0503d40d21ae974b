//! Cache interception: before a filter reaches the transport, split
//! it against what's already known so only the gap is requested.

use reelcast_model::{Event, Filter};

/// Returns the events servable straight from cache, plus the filter to
/// actually dispatch (`None` if nothing is missing — the subscription
/// completes without any transport traffic).
pub fn split_filter<E, P>(mut filter: Filter, get_cached_event: E, has_fresh_profile: P) -> (Vec<Event>, Option<Filter>)
where
    E: Fn(&str) -> Option<Event>,
    P: Fn(&str) -> bool,
{
    if filter.is_id_lookup() {
        let ids = filter.ids.clone().unwrap_or_default();
        let mut cached = Vec::new();
        let mut missing = Vec::new();
        for id in ids {
            match get_cached_event(&id) {
                Some(event) => cached.push(event),
                None => missing.push(id),
            }
        }
        if missing.is_empty() {
            return (cached, None);
        }
        filter.ids = Some(missing);
        return (cached, Some(filter));
    }

    if filter.is_profile_lookup() {
        let authors = filter.authors.clone().unwrap_or_default();
        let missing: Vec<String> = authors.into_iter().filter(|a| !has_fresh_profile(a)).collect();
        if missing.is_empty() {
            return (Vec::new(), None);
        }
        filter.authors = Some(missing);
        return (Vec::new(), Some(filter));
    }

    (Vec::new(), Some(filter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelcast_model::EventKind;

    fn event(id: &str) -> Event {
        Event {
            id: id.into(),
            pubkey: "pk".into(),
            created_at: 1,
            kind: EventKind::Note.as_u32(),
            tags: vec![],
            content: "hi".into(),
            sig: "sig".into(),
        }
    }

    #[test]
    fn id_lookup_splits_cached_from_missing() {
        let filter = Filter::new().with_ids(vec!["a".into(), "b".into()]);
        let (cached, remaining) = split_filter(filter, |id| (id == "a").then(|| event("a")), |_| false);
        assert_eq!(cached.len(), 1);
        assert_eq!(remaining.unwrap().ids, Some(vec!["b".to_string()]));
    }

    #[test]
    fn id_lookup_fully_cached_needs_no_dispatch() {
        let filter = Filter::new().with_ids(vec!["a".into()]);
        let (cached, remaining) = split_filter(filter, |_| Some(event("a")), |_| false);
        assert_eq!(cached.len(), 1);
        assert!(remaining.is_none());
    }

    #[test]
    fn profile_lookup_omits_fresh_authors() {
        let filter = Filter::new().with_kinds(vec![0]).with_authors(vec!["p1".into(), "p2".into()]);
        let (cached, remaining) = split_filter(filter, |_| None, |pk| pk == "p1");
        assert!(cached.is_empty());
        assert_eq!(remaining.unwrap().authors, Some(vec!["p2".to_string()]));
    }

    #[test]
    fn non_lookup_filter_passes_through_unchanged() {
        let filter = Filter::new().with_kinds(vec![1]);
        let (cached, remaining) = split_filter(filter.clone(), |_| None, |_| false);
        assert!(cached.is_empty());
        assert_eq!(remaining, Some(filter));
    }
}
