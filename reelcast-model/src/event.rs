//! The signed event that every other type in this crate is derived from.
//!
//! Wire shape is fixed by the protocol: `{id, pubkey, created_at, kind,
//! tags, content, sig}`. `id` is the lowercase hex SHA-256 of the canonical
//! serialization `[0, pubkey, created_at, kind, tags, content]`; computing
//! that hash is left to the caller (it lives at a component boundary that
//! owns a crypto dependency), but the canonical serialization itself is
//! pure data shaping and belongs here.

use serde::{Deserialize, Serialize};

/// Kinds the pipeline actually interprets. Unknown kinds still round-trip
/// through [`Event`] as a raw `u32`; this enum exists for the call sites
/// that branch on meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ProfileMetadata,
    Note,
    Contacts,
    Repost,
    Reaction,
    AccountVanishRequest,
    FileMetadata,
    StorageAuthorization,
    AddressableCurationSet,
    AddressableShortVideo,
    Other(u32),
}

impl EventKind {
    pub const fn as_u32(self) -> u32 {
        match self {
            EventKind::ProfileMetadata => 0,
            EventKind::Note => 1,
            EventKind::Contacts => 3,
            EventKind::Repost => 6,
            EventKind::Reaction => 7,
            EventKind::AccountVanishRequest => 62,
            EventKind::FileMetadata => 1063,
            EventKind::StorageAuthorization => 24242,
            EventKind::AddressableCurationSet => 30005,
            EventKind::AddressableShortVideo => 34236,
            EventKind::Other(n) => n,
        }
    }

    pub const fn from_u32(n: u32) -> Self {
        match n {
            0 => EventKind::ProfileMetadata,
            1 => EventKind::Note,
            3 => EventKind::Contacts,
            6 => EventKind::Repost,
            7 => EventKind::Reaction,
            62 => EventKind::AccountVanishRequest,
            1063 => EventKind::FileMetadata,
            24242 => EventKind::StorageAuthorization,
            30005 => EventKind::AddressableCurationSet,
            34236 => EventKind::AddressableShortVideo,
            other => EventKind::Other(other),
        }
    }

    /// Addressable events are replaced by `{pubkey, kind, d}`, not by `id`.
    pub const fn is_addressable(self) -> bool {
        matches!(
            self,
            EventKind::AddressableCurationSet | EventKind::AddressableShortVideo
        )
    }
}

/// A tag is a non-empty list of strings; the first element is the tag name
/// (`e`, `p`, `t`, `h`, `d`, `imeta`, `url`, …) and the rest are its values.
pub type Tag = Vec<String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub pubkey: String,
    pub created_at: i64,
    pub kind: u32,
    pub tags: Vec<Tag>,
    pub content: String,
    pub sig: String,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        EventKind::from_u32(self.kind)
    }

    /// The canonical array this event's `id` is the hash of. Callers that
    /// need to verify or mint an `id` hash this JSON array themselves.
    pub fn canonical_array(&self) -> serde_json::Value {
        serde_json::json!([0, self.pubkey, self.created_at, self.kind, self.tags, self.content])
    }

    pub fn canonical_json(&self) -> String {
        // serde_json serializes arrays/strings in field order with no
        // whitespace ambiguity; this is deterministic for a fixed input.
        self.canonical_array().to_string()
    }

    /// First value of the first tag named `name`, if any.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.first().map(String::as_str) == Some(name))
            .and_then(|t| t.get(1))
            .map(String::as_str)
    }

    /// All values (index 1) of every tag named `name`, in document order.
    pub fn tag_values(&self, name: &str) -> Vec<&str> {
        self.tags
            .iter()
            .filter(|t| t.first().map(String::as_str) == Some(name))
            .filter_map(|t| t.get(1))
            .map(String::as_str)
            .collect()
    }

    /// The `d` tag value of an addressable event, if present.
    pub fn d_tag(&self) -> Option<&str> {
        self.tag_value("d")
    }

    /// Replaceable-event identity: `{pubkey, kind, d}`. Two addressable
    /// events with the same identity are the same logical resource; the one
    /// with the greater `created_at` wins (ties keep the first observed).
    pub fn replaceable_identity(&self) -> Option<(String, u32, String)> {
        if !self.kind().is_addressable() {
            return None;
        }
        self.d_tag()
            .map(|d| (self.pubkey.clone(), self.kind, d.to_string()))
    }
}
