//! Addressable short-video event assembly: builds the tag
//! list in a fixed order, since relays and clients that
//! parse `imeta` positionally depend on it.

use reelcast_model::Tag;

#[derive(Debug, Clone, Default)]
pub struct AssetMetadata {
    pub best_url: String,
    pub fallback_urls: Vec<String>,
    pub mime_type: String,
    pub thumbnail_url: Option<String>,
    pub dims: Option<(u32, u32)>,
    pub size_bytes: Option<u64>,
    pub hash_hex: String,
    pub blurhash: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PublishMetadata {
    pub title: String,
    pub summary: Option<String>,
    pub hashtags: Vec<String>,
    pub client: String,
    pub duration_seconds: Option<u32>,
    pub alt: Option<String>,
    pub expiration_seconds: Option<i64>,
    pub attestations: Vec<Tag>,
}

/// Builds the full tag list for a kind-34236 event. `stable_identifier` is
/// the `d` tag value — the content hash, which is what makes re-publishing
/// the same file idempotent.
pub fn build_tags(stable_identifier: &str, asset: &AssetMetadata, metadata: &PublishMetadata, published_at: i64) -> Vec<Tag> {
    let mut tags = Vec::new();

    tags.push(vec!["d".to_string(), stable_identifier.to_string()]);
    tags.push(build_imeta_tag(asset));

    tags.push(vec!["title".to_string(), metadata.title.clone()]);
    if let Some(summary) = &metadata.summary {
        tags.push(vec!["summary".to_string(), summary.clone()]);
    }
    for hashtag in &metadata.hashtags {
        tags.push(vec!["t".to_string(), hashtag.clone()]);
    }
    tags.push(vec!["client".to_string(), metadata.client.clone()]);
    tags.push(vec!["published_at".to_string(), published_at.to_string()]);
    if let Some(duration) = metadata.duration_seconds {
        tags.push(vec!["duration".to_string(), duration.to_string()]);
    }
    if let Some(alt) = &metadata.alt {
        tags.push(vec!["alt".to_string(), alt.clone()]);
    }
    if let Some(expiration) = metadata.expiration_seconds {
        tags.push(vec!["expiration".to_string(), expiration.to_string()]);
    }
    tags.extend(metadata.attestations.iter().cloned());

    tags
}

fn build_imeta_tag(asset: &AssetMetadata) -> Tag {
    let mut elements = vec!["imeta".to_string(), format!("url {}", asset.best_url)];
    for fallback in &asset.fallback_urls {
        elements.push(format!("url {fallback}"));
    }
    elements.push(format!("m {}", asset.mime_type));
    if let Some(thumb) = &asset.thumbnail_url {
        elements.push(format!("image {thumb}"));
    }
    if let Some((w, h)) = asset.dims {
        elements.push(format!("dim {w}x{h}"));
    }
    if let Some(size) = asset.size_bytes {
        elements.push(format!("size {size}"));
    }
    elements.push(format!("x {}", asset.hash_hex));
    if let Some(blurhash) = &asset.blurhash {
        elements.push(format!("blurhash {blurhash}"));
    }
    elements
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset() -> AssetMetadata {
        AssetMetadata {
            best_url: "https://cdn.example.com/H.mp4".into(),
            fallback_urls: vec!["https://r2.example.com/H.mp4".into()],
            mime_type: "video/mp4".into(),
            thumbnail_url: Some("https://cdn.example.com/H.jpg".into()),
            dims: Some((1080, 1920)),
            size_bytes: Some(123_456),
            hash_hex: "H".into(),
            blurhash: None,
        }
    }

    #[test]
    fn tag_order_matches_the_spec() {
        let metadata = PublishMetadata {
            title: "My clip".into(),
            hashtags: vec!["rust".into(), "shorts".into()],
            client: "reelcast".into(),
            ..Default::default()
        };
        let tags = build_tags("H", &asset(), &metadata, 1_700_000_000);
        assert_eq!(tags[0], vec!["d".to_string(), "H".to_string()]);
        assert_eq!(tags[1][0], "imeta");
        assert_eq!(tags[2], vec!["title".to_string(), "My clip".to_string()]);
        assert_eq!(tags[3], vec!["t".to_string(), "rust".to_string()]);
        assert_eq!(tags[4], vec!["t".to_string(), "shorts".to_string()]);
        assert_eq!(tags[5], vec!["client".to_string(), "reelcast".to_string()]);
        assert_eq!(tags[6][0], "published_at");
    }

    #[test]
    fn imeta_tag_carries_fields_in_order_with_best_url_first() {
        let tag = build_imeta_tag(&asset());
        assert_eq!(tag[0], "imeta");
        assert_eq!(tag[1], "url https://cdn.example.com/H.mp4");
        assert_eq!(tag[2], "url https://r2.example.com/H.mp4");
        assert!(tag.contains(&"m video/mp4".to_string()));
        assert!(tag.iter().any(|e| e.starts_with("x ")));
    }

    #[test]
    fn optional_fields_are_omitted_when_absent() {
        let metadata = PublishMetadata {
            title: "t".into(),
            client: "reelcast".into(),
            ..Default::default()
        };
        let tags = build_tags("H", &asset(), &metadata, 1);
        assert!(!tags.iter().any(|t| t.first().map(String::as_str) == Some("summary")));
        assert!(!tags.iter().any(|t| t.first().map(String::as_str) == Some("alt")));
    }
}
