//! [`VideoDescriptor`]: the validated, normalized view of a received event
//! that the feed pipeline and controller pool operate on.

use crate::event::Event;
use std::cmp::Ordering;

/// Known video file extensions used by admission rule 2.
const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".m3u8", ".webm", ".mov"];

/// Hosts trusted to serve streamable video even without a recognized file
/// extension (e.g. CDN redirectors), per admission rule 2.
const STREAMING_HOST_ALLOWLIST: &[&str] = &["blossom.band", "nostr.build", "void.cat"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// A single candidate playback URL with the quality/source signal used to
/// rank it. Lower `rank` is preferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoUrl {
    pub url: String,
    pub rank: UrlRank,
}

/// "prefer streaming MP4 with quality suffix, then R2 fallback MP4, then
/// HLS" — the only externally observable ordering contract, so ranks are
/// ordered exactly in that priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UrlRank {
    StreamingMp4WithQuality,
    FallbackMp4,
    Hls,
    Other,
}

pub fn score_video_url(url: &str) -> UrlRank {
    let lower = url.to_ascii_lowercase();
    if lower.ends_with(".m3u8") {
        UrlRank::Hls
    } else if lower.contains("quality=") || lower.contains("/720") || lower.contains("/1080") {
        UrlRank::StreamingMp4WithQuality
    } else if lower.ends_with(".mp4") {
        UrlRank::FallbackMp4
    } else {
        UrlRank::Other
    }
}

/// Does this URL resolve the way admission rule 2 requires: `http(s)`, and
/// either a known video extension or an allow-listed streaming host?
pub fn is_usable_video_url(raw: &str) -> bool {
    let Ok(parsed) = url::Url::parse(raw) else {
        return false;
    };
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return false;
    }
    let path = parsed.path().to_ascii_lowercase();
    if VIDEO_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return true;
    }
    parsed
        .host_str()
        .is_some_and(|host| STREAMING_HOST_ALLOWLIST.iter().any(|h| host.ends_with(h)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDescriptor {
    pub id: String,
    pub author_key: String,
    pub created_at_seconds: i64,
    pub content_text: String,
    pub tags: Vec<Vec<String>>,
    /// Priority-ranked playback candidates, best first.
    pub video_urls: Vec<VideoUrl>,
    pub thumbnail_url: Option<String>,
    pub hashtags: Vec<String>,
    pub duration_seconds: Option<u32>,
    pub dims: Option<Dimensions>,
    pub blurhash: Option<String>,
}

impl VideoDescriptor {
    /// Best playback URL, if any usable candidate exists.
    pub fn best_url(&self) -> Option<&str> {
        self.video_urls.first().map(|v| v.url.as_str())
    }

    /// Build a descriptor from a raw event, returning `None` if the event
    /// doesn't carry at least one usable video URL (admission rule 2 is
    /// enforced by the caller; this just extracts what's extractable).
    pub fn from_event(event: &Event) -> Option<Self> {
        let urls: Vec<VideoUrl> = event
            .tag_values("url")
            .into_iter()
            .filter(|u| is_usable_video_url(u))
            .map(|u| VideoUrl {
                url: u.to_string(),
                rank: score_video_url(u),
            })
            .collect();

        let imeta_urls: Vec<VideoUrl> = event
            .tags
            .iter()
            .filter(|t| t.first().map(String::as_str) == Some("imeta"))
            .flat_map(|t| t.iter().skip(1))
            .filter_map(|kv| kv.strip_prefix("url "))
            .filter(|u| is_usable_video_url(u))
            .map(|u| VideoUrl {
                url: u.to_string(),
                rank: score_video_url(u),
            })
            .collect();

        let mut all_urls = urls;
        all_urls.extend(imeta_urls);
        if all_urls.is_empty() {
            return None;
        }
        all_urls.sort_by(|a, b| a.rank.cmp(&b.rank));
        all_urls.dedup_by(|a, b| a.url == b.url);

        let hashtags = event.tag_values("t").into_iter().map(String::from).collect();

        let dims = event.tag_value("dim").and_then(|d| {
            let (w, h) = d.split_once('x')?;
            Some(Dimensions {
                width: w.parse().ok()?,
                height: h.parse().ok()?,
            })
        });

        Some(VideoDescriptor {
            id: event.id.clone(),
            author_key: event.pubkey.clone(),
            created_at_seconds: event.created_at,
            content_text: event.content.clone(),
            tags: event.tags.clone(),
            video_urls: all_urls,
            thumbnail_url: event.tag_value("image").map(String::from),
            hashtags,
            duration_seconds: event
                .tag_value("duration")
                .and_then(|d| d.parse().ok()),
            dims,
            blurhash: event.tag_value("blurhash").map(String::from),
        })
    }
}

/// Feed ordering key: strictly descending by `(created_at, id)` (V4).
/// `Ord` is implemented so a `VideoDescriptor` list sorted with this key —
/// or a `BTreeMap` keyed by it — satisfies the ordering invariant directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedOrderKey<'a> {
    pub created_at_seconds: i64,
    pub id: &'a str,
}

impl<'a> FeedOrderKey<'a> {
    pub fn of(v: &'a VideoDescriptor) -> Self {
        Self {
            created_at_seconds: v.created_at_seconds,
            id: &v.id,
        }
    }
}

impl<'a> PartialOrd for FeedOrderKey<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<'a> Ord for FeedOrderKey<'a> {
    fn cmp(&self, other: &Self) -> Ordering {
        // descending created_at, descending id — so reverse the natural
        // field order to get a key usable directly in ascending containers
        // when wrapped in Reverse, or compared directly for descending sort.
        other
            .created_at_seconds
            .cmp(&self.created_at_seconds)
            .then_with(|| other.id.cmp(self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(id: &str, created_at: i64, urls: &[&str]) -> Event {
        let mut tags: Vec<Vec<String>> =
            urls.iter().map(|u| vec!["url".into(), u.to_string()]).collect();
        tags.push(vec!["t".into(), "shorts".into()]);
        Event {
            id: id.into(),
            pubkey: "author".into(),
            created_at,
            kind: 34236,
            tags,
            content: "a clip".into(),
            sig: "sig".into(),
        }
    }

    #[test]
    fn from_event_requires_a_usable_url() {
        let e = ev("id1", 100, &["not a url"]);
        assert!(VideoDescriptor::from_event(&e).is_none());
    }

    #[test]
    fn from_event_ranks_urls_by_score() {
        let e = ev(
            "id1",
            100,
            &[
                "https://cdn.example.com/clip.m3u8",
                "https://cdn.example.com/clip.mp4",
                "https://cdn.example.com/clip_720.mp4",
            ],
        );
        let d = VideoDescriptor::from_event(&e).unwrap();
        assert_eq!(d.best_url(), Some("https://cdn.example.com/clip_720.mp4"));
        assert_eq!(d.video_urls.last().unwrap().rank, UrlRank::Hls);
    }

    #[test]
    fn is_usable_video_url_accepts_allowlisted_hosts_without_extension() {
        assert!(is_usable_video_url("https://blossom.band/abcd"));
        assert!(!is_usable_video_url("https://evil.example.com/abcd"));
        assert!(!is_usable_video_url("ftp://cdn.example.com/clip.mp4"));
    }

    #[test]
    fn feed_order_key_sorts_strictly_descending() {
        let a = ev("aaaa", 200, &["https://cdn.example.com/a.mp4"]);
        let b = ev("bbbb", 200, &["https://cdn.example.com/b.mp4"]);
        let c = ev("cccc", 100, &["https://cdn.example.com/c.mp4"]);
        let da = VideoDescriptor::from_event(&a).unwrap();
        let db = VideoDescriptor::from_event(&b).unwrap();
        let dc = VideoDescriptor::from_event(&c).unwrap();

        let mut v = vec![&da, &db, &dc];
        v.sort_by_key(|d| FeedOrderKey::of(d));
        // same created_at: id descending -> "bbbb" before "aaaa"
        assert_eq!(v[0].id, "bbbb");
        assert_eq!(v[1].id, "aaaa");
        assert_eq!(v[2].id, "cccc");
    }
}
