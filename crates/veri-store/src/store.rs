//! The relational-store collaborator, at its interface boundary.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use veri_models::{
    AssetId, AssetStatus, ContentAsset, DailySnapshot, EngagementCounts, ModerationLog,
    Notification, SnapshotSubject,
};

use crate::error::StoreResult;

/// Increments applied to a daily snapshot row by the event path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct SnapshotDelta {
    pub views: u64,
    pub watch_time_minutes: f64,
    pub engagement: EngagementCounts,
    pub estimated_revenue: f64,
}

/// Read/write access to assets, audit logs, snapshots, and notifications.
///
/// The pipeline only depends on this trait; the actual relational engine
/// lives behind it.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetch an asset by ID.
    async fn get_asset(&self, id: &AssetId) -> StoreResult<Option<ContentAsset>>;

    /// Insert or fully replace an asset row.
    async fn put_asset(&self, asset: ContentAsset) -> StoreResult<()>;

    /// Update just the status column.
    async fn set_asset_status(&self, id: &AssetId, status: AssetStatus) -> StoreResult<()>;

    /// Append one audit entry. Entries are never updated.
    async fn append_moderation_log(&self, entry: ModerationLog) -> StoreResult<()>;

    /// All audit entries for an asset, oldest first.
    async fn moderation_logs(&self, asset_id: &AssetId) -> StoreResult<Vec<ModerationLog>>;

    /// Insert or replace a snapshot row keyed by `(subject, date)`.
    async fn upsert_snapshot(&self, snapshot: DailySnapshot) -> StoreResult<()>;

    /// Upsert-increment the `(subject, date)` row; creates it zeroed first
    /// if missing. Never overwrites accumulated values.
    async fn increment_snapshot(
        &self,
        subject: SnapshotSubject,
        date: NaiveDate,
        delta: SnapshotDelta,
    ) -> StoreResult<()>;

    /// Fetch one snapshot row.
    async fn get_snapshot(
        &self,
        subject: &SnapshotSubject,
        date: NaiveDate,
    ) -> StoreResult<Option<DailySnapshot>>;

    /// All per-asset rows for a date (rollup input).
    async fn asset_snapshots_for_date(&self, date: NaiveDate) -> StoreResult<Vec<DailySnapshot>>;

    /// Insert a notification row.
    async fn insert_notification(&self, notification: Notification) -> StoreResult<()>;

    /// A user's notifications, newest first.
    async fn notifications_for_user(&self, user_id: &str) -> StoreResult<Vec<Notification>>;
}
