//! Domain types shared between the feed client and its collaborators: the
//! signed event wire shape, subscription filters, the validated video
//! descriptor the feed pipeline operates on, profile records, and the
//! pending-upload status lattice.
//!
//! No networking, no storage, no signing — those live one layer up.

pub mod descriptor;
pub mod event;
pub mod filter;
pub mod profile;
pub mod relay_message;
pub mod upload;

pub use descriptor::{Dimensions, FeedOrderKey, UrlRank, VideoDescriptor, VideoUrl};
pub use event::{Event, EventKind, Tag};
pub use filter::Filter;
pub use profile::ProfileRecord;
pub use relay_message::{ClientMessage, ServerMessage};
pub use upload::{PendingUpload, ResultUrls, UploadStatus};
