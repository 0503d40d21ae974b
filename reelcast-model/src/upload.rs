//! [`PendingUpload`] and its status lattice.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Pending,
    Uploading,
    Uploaded,
    Publishing,
    Published { event_id: String },
    Failed { reason: String, retryable: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultUrls {
    pub url: String,
    pub fallback_url: Option<String>,
    pub streaming_mp4: Option<String>,
    pub streaming_hls: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub local_id: String,
    pub local_path: PathBuf,
    pub video_hash: Option<String>,
    pub result_urls: Option<ResultUrls>,
    pub status: UploadStatus,
}

impl PendingUpload {
    pub fn new(local_id: impl Into<String>, local_path: PathBuf) -> Self {
        Self {
            local_id: local_id.into(),
            local_path,
            video_hash: None,
            result_urls: None,
            status: UploadStatus::Pending,
        }
    }

    /// Status-lattice transition table. Returns `false` (and leaves
    /// `self` untouched) for a transition the lattice doesn't allow.
    pub fn transition(&mut self, next: UploadStatus) -> bool {
        use UploadStatus::*;
        let allowed = matches!(
            (&self.status, &next),
            (Pending, Uploading)
                | (Uploading, Uploaded)
                | (Uploaded, Publishing)
                | (Publishing, Published { .. })
                // Failure is reachable from any non-terminal state.
                | (Pending | Uploading | Uploaded | Publishing, Failed { .. })
        );
        if allowed {
            self.status = next;
        }
        allowed
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            UploadStatus::Published { .. } | UploadStatus::Failed { retryable: false, .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lattice_follows_happy_path() {
        let mut u = PendingUpload::new("local-1", "/tmp/a.mp4".into());
        assert!(u.transition(UploadStatus::Uploading));
        assert!(u.transition(UploadStatus::Uploaded));
        assert!(u.transition(UploadStatus::Publishing));
        assert!(u.transition(UploadStatus::Published {
            event_id: "evt".into()
        }));
        assert!(u.is_terminal());
    }

    #[test]
    fn lattice_rejects_skipping_states() {
        let mut u = PendingUpload::new("local-1", "/tmp/a.mp4".into());
        assert!(!u.transition(UploadStatus::Uploaded));
        assert_eq!(u.status, UploadStatus::Pending);
    }

    #[test]
    fn failure_reachable_from_any_non_terminal_state() {
        let mut u = PendingUpload::new("local-1", "/tmp/a.mp4".into());
        assert!(u.transition(UploadStatus::Failed {
            reason: "disk full".into(),
            retryable: true
        }));
    }
}
