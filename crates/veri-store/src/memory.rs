//! In-process reference implementations of the collaborator traits.
//!
//! Used by tests and by degraded environments with no backing services.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDate;
use metrics::counter;
use tracing::debug;

use veri_models::{
    AssetId, AssetStatus, ContentAsset, DailySnapshot, ModerationLog, Notification,
    SnapshotSubject,
};

use crate::cache::Cache;
use crate::error::{StoreError, StoreResult};
use crate::store::{ContentStore, SnapshotDelta};

/// In-memory `ContentStore`.
#[derive(Default)]
pub struct MemoryStore {
    assets: Mutex<HashMap<AssetId, ContentAsset>>,
    moderation_logs: Mutex<Vec<ModerationLog>>,
    snapshots: Mutex<HashMap<(SnapshotSubject, NaiveDate), DailySnapshot>>,
    notifications: Mutex<Vec<Notification>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn get_asset(&self, id: &AssetId) -> StoreResult<Option<ContentAsset>> {
        Ok(self.assets.lock().unwrap().get(id).cloned())
    }

    async fn put_asset(&self, asset: ContentAsset) -> StoreResult<()> {
        counter!("veri_store_asset_writes_total").increment(1);
        self.assets.lock().unwrap().insert(asset.id.clone(), asset);
        Ok(())
    }

    async fn set_asset_status(&self, id: &AssetId, status: AssetStatus) -> StoreResult<()> {
        let mut assets = self.assets.lock().unwrap();
        let asset = assets
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(format!("asset {}", id)))?;
        asset.status = status;
        asset.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn append_moderation_log(&self, entry: ModerationLog) -> StoreResult<()> {
        counter!("veri_store_moderation_log_appends_total").increment(1);
        self.moderation_logs.lock().unwrap().push(entry);
        Ok(())
    }

    async fn moderation_logs(&self, asset_id: &AssetId) -> StoreResult<Vec<ModerationLog>> {
        Ok(self
            .moderation_logs
            .lock()
            .unwrap()
            .iter()
            .filter(|l| &l.asset_id == asset_id)
            .cloned()
            .collect())
    }

    async fn upsert_snapshot(&self, snapshot: DailySnapshot) -> StoreResult<()> {
        self.snapshots
            .lock()
            .unwrap()
            .insert((snapshot.subject.clone(), snapshot.date), snapshot);
        Ok(())
    }

    async fn increment_snapshot(
        &self,
        subject: SnapshotSubject,
        date: NaiveDate,
        delta: SnapshotDelta,
    ) -> StoreResult<()> {
        let mut snapshots = self.snapshots.lock().unwrap();
        let row = snapshots
            .entry((subject.clone(), date))
            .or_insert_with(|| DailySnapshot::zeroed(subject, date));

        row.views += delta.views;
        row.watch_time_minutes += delta.watch_time_minutes;
        row.engagement = row.engagement.add(delta.engagement);
        row.estimated_revenue += delta.estimated_revenue;
        Ok(())
    }

    async fn get_snapshot(
        &self,
        subject: &SnapshotSubject,
        date: NaiveDate,
    ) -> StoreResult<Option<DailySnapshot>> {
        Ok(self
            .snapshots
            .lock()
            .unwrap()
            .get(&(subject.clone(), date))
            .cloned())
    }

    async fn asset_snapshots_for_date(&self, date: NaiveDate) -> StoreResult<Vec<DailySnapshot>> {
        Ok(self
            .snapshots
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.date == date && matches!(s.subject, SnapshotSubject::Asset(_)))
            .cloned()
            .collect())
    }

    async fn insert_notification(&self, notification: Notification) -> StoreResult<()> {
        counter!("veri_store_notification_inserts_total").increment(1);
        debug!(
            user_id = %notification.user_id,
            kind = %notification.kind,
            "Stored notification"
        );
        self.notifications.lock().unwrap().push(notification);
        Ok(())
    }

    async fn notifications_for_user(&self, user_id: &str) -> StoreResult<Vec<Notification>> {
        let mut rows: Vec<Notification> = self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}

/// In-memory `Cache` with TTL expiry.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn live(entry: &(String, Option<Instant>)) -> bool {
        entry.1.map(|deadline| Instant::now() < deadline).unwrap_or(true)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if Self::live(entry) => Ok(Some(entry.0.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let deadline = ttl.map(|t| Instant::now() + t);
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if Self::live(entry) => Ok(false),
            _ => {
                entries.insert(
                    key.to_string(),
                    (value.to_string(), Some(Instant::now() + ttl)),
                );
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veri_models::{EngagementCounts, ModerationDecision, SafetyScores};

    #[tokio::test]
    async fn increment_snapshot_accumulates_one_row() {
        let store = MemoryStore::new();
        let subject = SnapshotSubject::Asset(AssetId::from("a1"));
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let delta = SnapshotDelta {
            views: 1,
            ..Default::default()
        };
        store
            .increment_snapshot(subject.clone(), date, delta)
            .await
            .unwrap();
        store
            .increment_snapshot(subject.clone(), date, delta)
            .await
            .unwrap();

        let row = store.get_snapshot(&subject, date).await.unwrap().unwrap();
        assert_eq!(row.views, 2);
        assert_eq!(store.asset_snapshots_for_date(date).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn increment_starts_from_zeroed_row() {
        let store = MemoryStore::new();
        let subject = SnapshotSubject::Asset(AssetId::from("a2"));
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        store
            .increment_snapshot(
                subject.clone(),
                date,
                SnapshotDelta {
                    watch_time_minutes: 2.5,
                    engagement: EngagementCounts {
                        likes: 1,
                        comments: 0,
                        shares: 0,
                    },
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let row = store.get_snapshot(&subject, date).await.unwrap().unwrap();
        assert_eq!(row.views, 0);
        assert_eq!(row.watch_time_minutes, 2.5);
        assert_eq!(row.engagement.likes, 1);
    }

    #[tokio::test]
    async fn moderation_logs_filter_by_asset() {
        let store = MemoryStore::new();
        let decision = ModerationDecision {
            approved: true,
            authenticity_ratio: 1.0,
            safety: SafetyScores::default(),
            reason: "ok".to_string(),
        };

        store
            .append_moderation_log(ModerationLog::from_decision(AssetId::from("a1"), &decision))
            .await
            .unwrap();
        store
            .append_moderation_log(ModerationLog::from_decision(AssetId::from("a2"), &decision))
            .await
            .unwrap();

        let logs = store.moderation_logs(&AssetId::from("a1")).await.unwrap();
        assert_eq!(logs.len(), 1);
    }

    #[tokio::test]
    async fn memory_cache_set_nx_respects_ttl() {
        let cache = MemoryCache::new();

        assert!(cache
            .set_nx("lock", "v", Duration::from_millis(20))
            .await
            .unwrap());
        assert!(!cache
            .set_nx("lock", "v", Duration::from_millis(20))
            .await
            .unwrap());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache
            .set_nx("lock", "v", Duration::from_millis(20))
            .await
            .unwrap());
    }
}
