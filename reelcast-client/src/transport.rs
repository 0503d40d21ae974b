//! External collaborators, injected rather than reached for globally.
//! Every subsystem that needs the network, a signing key,
//! or the platform media layer takes one of these through its
//! constructor.

use async_trait::async_trait;
use reelcast_model::{ClientMessage, Event, ServerMessage};
use std::time::Duration;
use tokio::sync::mpsc;

/// A live subscription's inbound frame stream plus its cancellation handle.
pub struct SubscriptionHandle {
    pub frames: mpsc::Receiver<ServerMessage>,
    sub_id: String,
}

impl SubscriptionHandle {
    pub fn new(sub_id: String, frames: mpsc::Receiver<ServerMessage>) -> Self {
        Self { sub_id, frames }
    }

    pub fn sub_id(&self) -> &str {
        &self.sub_id
    }
}

/// The event-stream transport. One implementation talks real
/// websockets to one or more relays; the test implementation is an
/// in-memory channel pair.
#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn open_subscription(&self, message: ClientMessage) -> SubscriptionHandle;
    async fn close_subscription(&self, sub_id: &str);
    /// Broadcast a signed event to every configured endpoint in parallel.
    /// Returns the endpoints that acknowledged and the
    /// total endpoint count attempted.
    async fn broadcast(&self, event: &Event) -> BroadcastOutcome;
}

#[derive(Debug, Clone)]
pub struct BroadcastOutcome {
    pub acknowledged: Vec<String>,
    pub failed: Vec<String>,
}

impl BroadcastOutcome {
    pub fn succeeded(&self) -> bool {
        !self.acknowledged.is_empty()
    }
}

/// A zeroizing signing capability: hands back a fully signed event without
/// ever exposing the key material itself to callers; the signing key is
/// never copied into message bodies.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, unsigned: UnsignedEvent) -> Result<Event, SignError>;
    fn public_key(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct UnsignedEvent {
    pub pubkey: String,
    pub created_at: i64,
    pub kind: u32,
    pub tags: Vec<reelcast_model::Tag>,
    pub content: String,
}

#[derive(Debug, thiserror::Error)]
#[error("signing failed: {0}")]
pub struct SignError(pub String);

/// The storage protocol: `PUT` raw bytes, get back a canonical URL.
#[async_trait]
pub trait StorageUploader: Send + Sync {
    async fn upload(&self, request: UploadRequest) -> Result<UploadResponse, UploadTransportError>;
}

pub struct UploadRequest {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub authorization_header: String,
    pub connect_timeout: Duration,
    pub send_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct UploadResponse {
    pub url: String,
    pub fallback_url: Option<String>,
    pub streaming_mp4: Option<String>,
    pub streaming_hls: Option<String>,
    pub thumbnail_url: Option<String>,
    /// `true` when the server answered 409 ("already exists"): the
    /// upload is treated as an idempotent success.
    pub already_existed: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadTransportError {
    #[error("auth rejected (401)")]
    AuthRejected,
    #[error("client error: {0}")]
    ClientError(u16),
    #[error("server error: {0}")]
    ServerError(u16),
    #[error("transport error: {0}")]
    Io(String),
}

/// The platform media layer: owns actual decoder resources. The
/// pool only ever holds a [`ControllerHandle`]; it never constructs one
/// itself.
#[async_trait]
pub trait MediaInitializer: Send + Sync {
    async fn initialize(&self, url: &str, timeout: Duration) -> Result<ControllerHandle, ()>;
}

/// Opaque handle to a live decoder resource. Dropping it disposes the
/// underlying resource; the pool is the only owner.
#[derive(Debug)]
pub struct ControllerHandle {
    pub id: String,
    resource: Option<Box<dyn std::any::Any + Send + Sync>>,
}

impl ControllerHandle {
    pub fn new(id: impl Into<String>, resource: Box<dyn std::any::Any + Send + Sync>) -> Self {
        Self {
            id: id.into(),
            resource: Some(resource),
        }
    }

    #[cfg(test)]
    pub fn for_test(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resource: Some(Box::new(())),
        }
    }

    pub fn resource(&self) -> Option<&(dyn std::any::Any + Send + Sync)> {
        self.resource.as_deref()
    }
}
