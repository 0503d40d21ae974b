//! Subscription filters, as sent in a `REQ` frame.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Relay-side limit ceiling; anything above this is clamped before dispatch.
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Tag selectors: `#e`, `#p`, `#t`, `#h`, keyed by the letter without
    /// the `#`.
    #[serde(flatten)]
    pub tags: BTreeMap<String, Vec<String>>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids(mut self, ids: Vec<String>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn with_authors(mut self, authors: Vec<String>) -> Self {
        self.authors = Some(authors);
        self
    }

    pub fn with_kinds(mut self, kinds: Vec<u32>) -> Self {
        self.kinds = Some(kinds);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn tag_values(&self, letter: &str) -> Option<&[String]> {
        self.tags.get(&format!("#{letter}")).map(Vec::as_slice)
    }

    /// Clamp `limit` to [`MAX_LIMIT`] in place, returning whether a
    /// reduction happened (useful for logging/telemetry).
    pub fn normalize_limit(&mut self) -> bool {
        match self.limit {
            Some(limit) if limit > MAX_LIMIT => {
                self.limit = Some(MAX_LIMIT);
                true
            }
            None => false,
            Some(_) => false,
        }
    }

    /// This filter requests events by explicit id — the shape the
    /// Subscription Manager's cache interception recognizes for `ids`
    /// splitting.
    pub fn is_id_lookup(&self) -> bool {
        self.ids.as_ref().is_some_and(|ids| !ids.is_empty())
    }

    /// This filter is a profile-metadata lookup by author — the shape the
    /// Subscription Manager recognizes for `authors` splitting.
    pub fn is_profile_lookup(&self) -> bool {
        self.kinds.as_deref() == Some(&[PROFILE_METADATA_KIND])
            && self.authors.as_ref().is_some_and(|a| !a.is_empty())
    }
}

/// Kind 0, duplicated from [`crate::event::EventKind::ProfileMetadata`] to
/// avoid a module cycle; the wire value `0` is fixed by the protocol.
const PROFILE_METADATA_KIND: u32 = 0;
