//! User-facing notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Asset passed moderation and is live
    ModerationApproved,
    /// Asset failed moderation and went back to draft
    ModerationRejected,
    /// Encoding or ingest failed
    IngestFailed,
    /// Engagement milestone or digest
    Engagement,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ModerationApproved => "moderation_approved",
            NotificationKind::ModerationRejected => "moderation_rejected",
            NotificationKind::IngestFailed => "ingest_failed",
            NotificationKind::Engagement => "engagement",
        }
    }

    /// Kinds that also get a delayed email on top of the persisted row.
    pub fn wants_email(&self) -> bool {
        matches!(
            self,
            NotificationKind::ModerationApproved
                | NotificationKind::ModerationRejected
                | NotificationKind::IngestFailed
        )
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted notification row.
///
/// Created exactly once per triggering event; the read flag is mutated by
/// the UI layer, not by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub kind: NotificationKind,
    pub entity_id: String,
    pub entity_type: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: impl Into<String>,
        kind: NotificationKind,
        entity_id: impl Into<String>,
        entity_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            kind,
            entity_id: entity_id.into(),
            entity_type: entity_type.into(),
            message: message.into(),
            read: false,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_notification_is_unread() {
        let n = Notification::new(
            "user_1",
            NotificationKind::ModerationApproved,
            "asset_1",
            "video",
            "Your video is live",
        );
        assert!(!n.read);
        assert_eq!(n.kind, NotificationKind::ModerationApproved);
    }

    #[test]
    fn test_email_subset() {
        assert!(NotificationKind::ModerationRejected.wants_email());
        assert!(NotificationKind::IngestFailed.wants_email());
        assert!(!NotificationKind::Engagement.wants_email());
    }
}
