//! Shared data models for the Veristream pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Content assets and their publication lifecycle
//! - Moderation outcomes and the append-only audit log
//! - Frame references and classification results
//! - Daily analytics snapshots and engagement events
//! - Notifications

pub mod analytics;
pub mod asset;
pub mod frame;
pub mod ids;
pub mod moderation;
pub mod notification;

// Re-export common types
pub use analytics::{DailySnapshot, EngagementCounts, EngagementEvent, EventKind, SnapshotSubject};
pub use asset::{AssetStatus, ContentAsset};
pub use frame::{FrameClass, FrameRef, SafetyCategory, SafetyScores};
pub use ids::{AssetId, JobId};
pub use moderation::{ModerationDecision, ModerationLog, ModerationOutcome};
pub use notification::{Notification, NotificationKind};
