//! Transient user-facing notices and their copy.
//!
//! Every string a notice can show lives here as a constant, so flows and
//! tests agree on the exact wording.

use tokio::sync::mpsc;
use tracing::debug;

pub const SIGN_IN_TITLE: &str = "Please sign in";
pub const SIGN_IN_TO_LIKE: &str = "You need to be signed in to like pins";
pub const SIGN_IN_TO_COMMENT: &str = "You need to be signed in to comment";
pub const SIGN_IN_TO_REPORT: &str = "You need to be signed in to report content";
pub const SIGN_IN_TO_FOLLOW: &str = "You need to be signed in to follow people";
pub const SIGN_IN_TO_SAVE: &str = "You need to be signed in to save pins";

pub const ERROR_TITLE: &str = "Error";
pub const SUCCESS_TITLE: &str = "Success";

pub const LIKE_FAILED: &str = "Failed to update like status";
pub const FOLLOW_FAILED: &str = "Failed to update follow status";

pub const COMMENT_POSTED: &str = "Comment posted successfully";
pub const COMMENT_FAILED: &str = "Failed to post comment";

pub const REPORT_SUBMITTED_TITLE: &str = "Report submitted";
pub const REPORT_THANKS: &str = "Thank you for helping keep our community safe";
pub const REPORT_FAILED: &str = "Failed to submit report";

pub const PIN_ADDED: &str = "Pin added to collection";
pub const PIN_ADDED_TO_NEW: &str = "Pin added to new collection";
pub const PIN_ADD_FAILED: &str = "Failed to add pin to collection";
pub const COLLECTION_CREATE_FAILED: &str = "Failed to create collection";

pub const PIN_CREATED_TITLE: &str = "Pin created successfully!";
pub const PIN_CREATE_FAILED_TITLE: &str = "Error creating pin";

pub const PROFILE_UPDATED_TITLE: &str = "Profile Updated";
pub const PROFILE_UPDATED_BODY: &str = "Your profile changes have been saved successfully.";

pub const UPGRADE_SOON_TITLE: &str = "Coming Soon";
pub const UPGRADE_SOON_BODY: &str = "Payment processing will be implemented shortly.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: Option<String>,
    pub level: NoticeLevel,
}

impl Notice {
    pub fn info(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            level: NoticeLevel::Info,
        }
    }

    pub fn destructive(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            level: NoticeLevel::Destructive,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Where flows drop their notices.  The receiving half belongs to whatever
/// surface renders them.
#[derive(Clone)]
pub struct NoticeSink {
    out: mpsc::UnboundedSender<Notice>,
}

impl NoticeSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (out, rx) = mpsc::unbounded_channel();
        (Self { out }, rx)
    }

    pub fn push(&self, notice: Notice) {
        if self.out.send(notice).is_err() {
            debug!("notice dropped, receiver is gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_flow_through_the_sink_in_order() {
        let (sink, mut rx) = NoticeSink::new();

        sink.push(Notice::destructive(SIGN_IN_TITLE).describe(SIGN_IN_TO_LIKE));
        sink.push(Notice::info(REPORT_SUBMITTED_TITLE).describe(REPORT_THANKS));

        let first = rx.try_recv().unwrap();
        assert_eq!(first.title, "Please sign in");
        assert_eq!(
            first.description.as_deref(),
            Some("You need to be signed in to like pins")
        );
        assert_eq!(first.level, NoticeLevel::Destructive);

        let second = rx.try_recv().unwrap();
        assert_eq!(second.title, "Report submitted");
        assert_eq!(second.level, NoticeLevel::Info);

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn pushing_after_the_receiver_drops_is_harmless() {
        let (sink, rx) = NoticeSink::new();
        drop(rx);

        sink.push(Notice::info(SUCCESS_TITLE));
    }
}
