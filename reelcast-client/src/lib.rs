//! The feed client core: a bounded pool of live media controllers, a feed
//! ingestion pipeline that turns raw network events into an ordered,
//! deduplicated video list, a cache-aware subscription multiplexer, a
//! debounced/batched profile fetcher, a content-addressed publish
//! pipeline, and the persistent caches that back all of the above.
//!
//! External collaborators — the event transport, the signing capability,
//! the storage uploader, and the platform media layer — are injected as
//! trait objects (see [`transport`]); this crate owns no network socket,
//! no keychain access, and no codec.

pub mod cache;
pub mod config;
pub mod feed;
pub mod notify;
pub mod pool;
pub mod profile;
pub mod publish;
pub mod subscription;
pub mod transport;

pub use cache::{DiskProfileStore, PersonalEventCache};
pub use config::{FeedConfig, NetworkClass, PoolConfig, ProfileFetcherConfig, PublishConfig};
pub use feed::admission::AdmissionRejection;
pub use feed::{FeedIngestionBridge, FeedPipeline, SeenService};
pub use notify::Notifier;
pub use pool::state::{PoolEvent, Slot, VideoState};
pub use pool::{DebugInfo, VideoControllerPool};
pub use profile::{ProfileFetcher, ProfileStore};
pub use publish::{FrameExtractor, PublishPipeline, ReqwestUploader};
pub use subscription::{CreatedSubscription, Priority, SubscriptionManager, SubscriptionRequest};
pub use transport::{
    ControllerHandle, EventTransport, MediaInitializer, Signer, StorageUploader, SubscriptionHandle,
};
