//! Scoped upload authorization: a
//! short-lived kind-24242 capability event, signed and base64-encoded into
//! the `Authorization` header value.

use crate::transport::{Signer, UnsignedEvent};
use base64::Engine;
use reelcast_core::Result;

pub async fn build_authorization_header(
    signer: &dyn Signer,
    size_bytes: u64,
    hash_hex: &str,
    expiration_seconds: i64,
    now: i64,
) -> Result<String> {
    let unsigned = UnsignedEvent {
        pubkey: signer.public_key(),
        created_at: now,
        kind: 24242,
        tags: vec![
            vec!["t".into(), "upload".into()],
            vec!["expiration".into(), expiration_seconds.to_string()],
            vec!["size".into(), size_bytes.to_string()],
            vec!["x".into(), hash_hex.to_string()],
        ],
        content: String::new(),
    };
    let signed = signer
        .sign(unsigned)
        .await
        .map_err(|e| reelcast_core::ReelcastError::AuthRequired(e.0))?;
    let canonical = serde_json::to_string(&signed).map_err(reelcast_core::ReelcastError::from)?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(canonical);
    Ok(format!("Nostr {encoded}"))
}

/// The canonical URL a `409` ("already exists") response resolves to.
pub fn canonical_url(server: &str, hash_hex: &str, extension: &str) -> String {
    format!("{}/{}.{}", server.trim_end_matches('/'), hash_hex, extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SignError;
    use async_trait::async_trait;

    struct FakeSigner;
    #[async_trait]
    impl Signer for FakeSigner {
        async fn sign(&self, unsigned: UnsignedEvent) -> std::result::Result<reelcast_model::Event, SignError> {
            Ok(reelcast_model::Event {
                id: "a".repeat(64),
                pubkey: unsigned.pubkey,
                created_at: unsigned.created_at,
                kind: unsigned.kind,
                tags: unsigned.tags,
                content: unsigned.content,
                sig: "deadbeef".into(),
            })
        }
        fn public_key(&self) -> String {
            "pk".into()
        }
    }

    #[tokio::test]
    async fn builds_a_nostr_prefixed_base64_header() {
        let header = build_authorization_header(&FakeSigner, 1024, "abc123", 2_000, 1_700).await.unwrap();
        assert!(header.starts_with("Nostr "));
    }

    #[test]
    fn canonical_url_uses_server_hash_and_extension() {
        assert_eq!(canonical_url("https://cdn.example.com", "H", "mp4"), "https://cdn.example.com/H.mp4");
        assert_eq!(canonical_url("https://cdn.example.com/", "H", "mp4"), "https://cdn.example.com/H.mp4");
    }
}
