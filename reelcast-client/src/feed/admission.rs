//! Pure admission-rule evaluation, factored out so the rules are
//! unit-testable without a running pipeline, pool, or seen-service.

use reelcast_model::{Event, VideoDescriptor};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionRejection {
    AlreadyAdmitted,
    AlreadySeenByUser,
    MissingTextAndTitle,
    StaleEvent,
    NoUsableVideoUrl,
}

/// Everything admission rule 3 and 4 need; rules 1/5 (seen sets) are
/// evaluated by the caller since they require mutable/external state.
pub fn check_content_and_age(event: &Event, now_seconds: i64, max_event_age: Duration) -> Option<AdmissionRejection> {
    let has_text = !event.content.trim().is_empty();
    let has_title = event.tag_value("title").map(|t| !t.trim().is_empty()).unwrap_or(false);
    if !has_text && !has_title {
        return Some(AdmissionRejection::MissingTextAndTitle);
    }

    let age_seconds = now_seconds - event.created_at;
    if age_seconds < 0 || age_seconds as u64 > max_event_age.as_secs() {
        return Some(AdmissionRejection::StaleEvent);
    }

    None
}

/// Rule 2: admission succeeds only if a [`VideoDescriptor`] can be built at
/// all, since that construction itself requires a usable video URL.
pub fn build_descriptor(event: &Event) -> Result<VideoDescriptor, AdmissionRejection> {
    VideoDescriptor::from_event(event).ok_or(AdmissionRejection::NoUsableVideoUrl)
}
