//! The Publish Pipeline: hash, authorize, upload, assemble, and
//! broadcast a locally-recorded video, then reconcile it back into the
//! feed as if it had arrived from the network.

pub mod auth;
pub mod event_assembly;
pub mod hash;
pub mod uploader;

use crate::config::PublishConfig;
use crate::feed::FeedPipeline;
use crate::transport::{EventTransport, Signer, StorageUploader, UnsignedEvent, UploadRequest, UploadTransportError};
use async_trait::async_trait;
use event_assembly::{AssetMetadata, PublishMetadata};
use reelcast_core::backoff::{retry, BackoffPolicy};
use reelcast_core::{ReelcastError, Result};
use reelcast_model::{PendingUpload, ResultUrls, UploadStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use event_assembly::PublishMetadata as Metadata;
pub use uploader::ReqwestUploader;

/// Best-effort local video analysis. Absence of a usable
/// result from either method is acceptable — the publish still succeeds.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    async fn extract_thumbnail(&self, video_path: &Path) -> Option<PathBuf>;
    async fn perceptual_hash(&self, frame_path: &Path) -> Option<String>;
}

pub struct PublishPipeline {
    config: PublishConfig,
    storage_endpoint: String,
    signer: Arc<dyn Signer>,
    uploader: Arc<dyn StorageUploader>,
    transport: Arc<dyn EventTransport>,
    frames: Arc<dyn FrameExtractor>,
    feed: Arc<FeedPipeline>,
}

impl PublishPipeline {
    pub fn new(
        config: PublishConfig,
        storage_endpoint: impl Into<String>,
        signer: Arc<dyn Signer>,
        uploader: Arc<dyn StorageUploader>,
        transport: Arc<dyn EventTransport>,
        frames: Arc<dyn FrameExtractor>,
        feed: Arc<FeedPipeline>,
    ) -> Self {
        Self {
            config,
            storage_endpoint: storage_endpoint.into(),
            signer,
            uploader,
            transport,
            frames,
            feed,
        }
    }

    pub async fn publish(&self, upload: &mut PendingUpload, metadata: PublishMetadata) -> Result<String> {
        let hashed = hash::hash_file(&upload.local_path).await.map_err(ReelcastError::from)?;
        upload.video_hash = Some(hashed.hash_hex.clone());
        upload.transition(UploadStatus::Uploading);

        let video_upload = self.upload_with_auth(&upload.local_path, &hashed, "video/mp4", "mp4").await;
        let video_upload = match video_upload {
            Ok(u) => u,
            Err(err) => {
                upload.transition(UploadStatus::Failed {
                    reason: err.to_string(),
                    retryable: err.is_retryable(),
                });
                return Err(err);
            }
        };
        upload.transition(UploadStatus::Uploaded);

        let thumbnail_url = self.upload_thumbnail(&upload.local_path).await;
        let blurhash = self.extract_blurhash(&upload.local_path).await;

        upload.result_urls = Some(ResultUrls {
            url: video_upload.url.clone(),
            fallback_url: video_upload.fallback_url.clone(),
            streaming_mp4: video_upload.streaming_mp4.clone(),
            streaming_hls: video_upload.streaming_hls.clone(),
            thumbnail_url: thumbnail_url.clone(),
        });

        upload.transition(UploadStatus::Publishing);

        let asset = AssetMetadata {
            best_url: video_upload.url.clone(),
            fallback_urls: video_upload.fallback_url.clone().into_iter().collect(),
            mime_type: "video/mp4".to_string(),
            thumbnail_url,
            dims: None,
            size_bytes: Some(hashed.size_bytes),
            hash_hex: hashed.hash_hex.clone(),
            blurhash,
        };

        let published_at = chrono::Utc::now().timestamp();
        let tags = event_assembly::build_tags(&hashed.hash_hex, &asset, &metadata, published_at);

        let unsigned = UnsignedEvent {
            pubkey: self.signer.public_key(),
            created_at: published_at,
            kind: 34236,
            tags,
            content: metadata.summary.clone().unwrap_or_default(),
        };
        let signed = self
            .signer
            .sign(unsigned)
            .await
            .map_err(|e| ReelcastError::AuthRequired(e.0))?;

        let outcome = self.transport.broadcast(&signed).await;
        if !outcome.succeeded() {
            let reason = format!("broadcast acknowledged by none of {} endpoints", outcome.failed.len());
            upload.transition(UploadStatus::Failed {
                reason: reason.clone(),
                retryable: true,
            });
            return Err(ReelcastError::Transport(reason));
        }
        tracing::info!(
            event_id = %signed.id,
            acknowledged = outcome.acknowledged.len(),
            failed = outcome.failed.len(),
            "publish broadcast complete"
        );

        // Reconciliation: insert locally as if received from the network.
        // `replay = true` bypasses the user-seen check — this is a brand
        // new self-authored event, not a re-delivery.
        self.feed.ingest(signed.clone(), true);

        upload.transition(UploadStatus::Published {
            event_id: signed.id.clone(),
        });
        Ok(signed.id)
    }

    async fn upload_with_auth(
        &self,
        path: &Path,
        hashed: &hash::HashedFile,
        content_type: &str,
        extension: &str,
    ) -> Result<crate::transport::UploadResponse> {
        let now = chrono::Utc::now().timestamp();
        let expiration = now + self.config.authorization_ttl.as_secs() as i64;
        let header = auth::build_authorization_header(
            self.signer.as_ref(),
            hashed.size_bytes,
            &hashed.hash_hex,
            expiration,
            now,
        )
        .await?;

        let bytes = tokio::fs::read(path).await.map_err(ReelcastError::from)?;
        let policy = BackoffPolicy::with_max_attempts(3);
        let hash_hex = hashed.hash_hex.clone();
        let server = self.storage_endpoint.clone();
        let extension = extension.to_string();

        retry(policy, || {
            let bytes = bytes.clone();
            let header = header.clone();
            let content_type = content_type.to_string();
            let hash_hex = hash_hex.clone();
            let server = server.clone();
            let extension = extension.clone();
            async move {
                let request = UploadRequest {
                    bytes,
                    content_type,
                    authorization_header: header,
                    connect_timeout: self.config.connect_timeout,
                    send_timeout: self.config.send_timeout,
                };
                match self.uploader.upload(request).await {
                    Ok(response) => Ok(response),
                    Err(UploadTransportError::ClientError(409)) => Ok(crate::transport::UploadResponse {
                        url: auth::canonical_url(&server, &hash_hex, &extension),
                        fallback_url: None,
                        streaming_mp4: None,
                        streaming_hls: None,
                        thumbnail_url: None,
                        already_existed: true,
                    }),
                    Err(UploadTransportError::AuthRejected) => {
                        Err(ReelcastError::AuthRequired("upload rejected (401)".into()))
                    }
                    Err(UploadTransportError::ClientError(code)) => {
                        Err(ReelcastError::Malformed(format!("upload rejected by server ({code})")))
                    }
                    Err(UploadTransportError::ServerError(code)) => {
                        Err(ReelcastError::Transport(format!("upload server error ({code})")))
                    }
                    Err(UploadTransportError::Io(msg)) => Err(ReelcastError::Transport(msg)),
                }
            }
        })
        .await
    }

    async fn upload_thumbnail(&self, video_path: &Path) -> Option<String> {
        let extract = tokio::time::timeout(
            self.config.thumbnail_extract_timeout,
            self.frames.extract_thumbnail(video_path),
        )
        .await
        .ok()
        .flatten()?;

        let hashed = hash::hash_file(&extract).await.ok()?;
        // The server is known to misreport thumbnail content type as
        // `.mp4`; the extension is fixed client-side.
        let response = self.upload_with_auth(&extract, &hashed, "image/jpeg", "jpg").await.ok()?;
        Some(response.url)
    }

    async fn extract_blurhash(&self, video_path: &Path) -> Option<String> {
        let frame = tokio::time::timeout(
            self.config.thumbnail_extract_timeout,
            self.frames.extract_thumbnail(video_path),
        )
        .await
        .ok()
        .flatten()?;
        tokio::time::timeout(self.config.thumbnail_hash_timeout, self.frames.perceptual_hash(&frame))
            .await
            .ok()
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkClass;
    use crate::transport::{BroadcastOutcome, ControllerHandle, MediaInitializer, SignError, SubscriptionHandle, UploadResponse};
    use reelcast_model::{ClientMessage, Event};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    struct FakeSigner;
    #[async_trait]
    impl Signer for FakeSigner {
        async fn sign(&self, unsigned: UnsignedEvent) -> std::result::Result<Event, SignError> {
            Ok(Event {
                id: format!("{:0>64}", unsigned.created_at),
                pubkey: unsigned.pubkey,
                created_at: unsigned.created_at,
                kind: unsigned.kind,
                tags: unsigned.tags,
                content: unsigned.content,
                sig: "sig".into(),
            })
        }
        fn public_key(&self) -> String {
            "author".into()
        }
    }

    struct FlakyUploader {
        attempts: AtomicUsize,
        fail_times: usize,
    }
    #[async_trait]
    impl StorageUploader for FlakyUploader {
        async fn upload(&self, _request: UploadRequest) -> std::result::Result<UploadResponse, UploadTransportError> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                return Err(UploadTransportError::ServerError(503));
            }
            Ok(UploadResponse {
                url: "https://cdn.example.com/H.mp4".into(),
                fallback_url: None,
                streaming_mp4: None,
                streaming_hls: None,
                thumbnail_url: None,
                already_existed: false,
            })
        }
    }

    struct ConflictUploader;
    #[async_trait]
    impl StorageUploader for ConflictUploader {
        async fn upload(&self, _request: UploadRequest) -> std::result::Result<UploadResponse, UploadTransportError> {
            Err(UploadTransportError::ClientError(409))
        }
    }

    struct NoopTransport {
        acked: StdMutex<Vec<Event>>,
    }
    #[async_trait]
    impl EventTransport for NoopTransport {
        async fn open_subscription(&self, message: ClientMessage) -> SubscriptionHandle {
            let ClientMessage::Req { sub_id, .. } = message else { panic!("unexpected") };
            let (_tx, rx) = tokio::sync::mpsc::channel(1);
            SubscriptionHandle::new(sub_id, rx)
        }
        async fn close_subscription(&self, _sub_id: &str) {}
        async fn broadcast(&self, event: &Event) -> BroadcastOutcome {
            self.acked.lock().unwrap().push(event.clone());
            BroadcastOutcome {
                acknowledged: vec!["relay1".into()],
                failed: vec![],
            }
        }
    }

    struct NoFrames;
    #[async_trait]
    impl FrameExtractor for NoFrames {
        async fn extract_thumbnail(&self, _video_path: &Path) -> Option<PathBuf> {
            None
        }
        async fn perceptual_hash(&self, _frame_path: &Path) -> Option<String> {
            None
        }
    }

    struct NoopMedia;
    #[async_trait]
    impl MediaInitializer for NoopMedia {
        async fn initialize(&self, url: &str, _timeout: Duration) -> std::result::Result<ControllerHandle, ()> {
            Ok(ControllerHandle::for_test(url.to_string()))
        }
    }

    struct FakeSeenService;
    impl crate::feed::SeenService for FakeSeenService {
        fn has_seen(&self, _id: &str) -> bool {
            false
        }
        fn mark_seen(&self, _id: &str) {}
    }

    fn feed() -> Arc<FeedPipeline> {
        let pool = crate::pool::VideoControllerPool::new(
            crate::config::PoolConfig::for_network(NetworkClass::Testing),
            Arc::new(NoopMedia),
        );
        Arc::new(FeedPipeline::new(crate::config::FeedConfig::default(), pool, Arc::new(FakeSeenService)))
    }

    async fn sample_file() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        tokio::fs::write(&path, b"video bytes").await.unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn publish_retries_through_transient_5xx_then_succeeds() {
        let (_dir, path) = sample_file().await;
        let pipeline = PublishPipeline::new(
            PublishConfig::default(),
            "https://cdn.example.com",
            Arc::new(FakeSigner),
            Arc::new(FlakyUploader {
                attempts: AtomicUsize::new(0),
                fail_times: 2,
            }),
            Arc::new(NoopTransport { acked: StdMutex::new(vec![]) }),
            Arc::new(NoFrames),
            feed(),
        );
        let mut upload = PendingUpload::new("local-1", path);
        let metadata = PublishMetadata {
            title: "clip".into(),
            client: "reelcast".into(),
            ..Default::default()
        };
        let event_id = pipeline.publish(&mut upload, metadata).await.unwrap();
        assert!(!event_id.is_empty());
        assert!(matches!(upload.status, UploadStatus::Published { .. }));
    }

    #[tokio::test]
    async fn conflict_upload_is_idempotent_success_with_canonical_url() {
        let (_dir, path) = sample_file().await;
        let pipeline = PublishPipeline::new(
            PublishConfig::default(),
            "https://cdn.example.com",
            Arc::new(FakeSigner),
            Arc::new(ConflictUploader),
            Arc::new(NoopTransport { acked: StdMutex::new(vec![]) }),
            Arc::new(NoFrames),
            feed(),
        );
        let mut upload = PendingUpload::new("local-1", path);
        let metadata = PublishMetadata {
            title: "clip".into(),
            client: "reelcast".into(),
            ..Default::default()
        };
        pipeline.publish(&mut upload, metadata).await.unwrap();
        let urls = upload.result_urls.unwrap();
        assert!(urls.url.ends_with(".mp4"));
        assert!(urls.url.contains(upload.video_hash.unwrap().as_str()));
    }
}
