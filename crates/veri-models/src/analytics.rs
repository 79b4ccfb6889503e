//! Daily analytics snapshots and engagement events.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::AssetId;

/// Subject a daily snapshot aggregates over.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SnapshotSubject {
    /// Per-asset row, incremented by the event path
    Asset(AssetId),
    /// Per-creator row, recomputed by the periodic rollup
    Creator(String),
}

impl fmt::Display for SnapshotSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotSubject::Asset(id) => write!(f, "asset:{}", id),
            SnapshotSubject::Creator(id) => write!(f, "creator:{}", id),
        }
    }
}

/// Discrete engagement counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EngagementCounts {
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
}

impl EngagementCounts {
    pub fn add(mut self, other: EngagementCounts) -> Self {
        self.likes += other.likes;
        self.comments += other.comments;
        self.shares += other.shares;
        self
    }
}

/// One day of aggregated metrics for a subject.
///
/// Upserted idempotently keyed by `(subject, date)` — incremented per event
/// and recomputed from scratch by the rollup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub subject: SnapshotSubject,
    pub date: NaiveDate,
    pub views: u64,
    pub watch_time_minutes: f64,
    pub engagement: EngagementCounts,
    pub estimated_revenue: f64,
}

impl DailySnapshot {
    /// A zeroed row for a subject/date, created when an asset enters the pipeline.
    pub fn zeroed(subject: SnapshotSubject, date: NaiveDate) -> Self {
        Self {
            subject,
            date,
            views: 0,
            watch_time_minutes: 0.0,
            engagement: EngagementCounts::default(),
            estimated_revenue: 0.0,
        }
    }
}

/// What an engagement event records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A playback start
    View,
    /// Likes/comments/shares deltas
    Engagement {
        #[serde(default)]
        likes: u64,
        #[serde(default)]
        comments: u64,
        #[serde(default)]
        shares: u64,
    },
    /// Minutes of watch time observed
    Retention { watch_minutes: f64 },
}

/// A single engagement event flowing into the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementEvent {
    pub asset_id: AssetId,
    pub creator_id: String,
    pub kind: EventKind,
    pub occurred_at: DateTime<Utc>,
}

impl EngagementEvent {
    pub fn new(asset_id: AssetId, creator_id: impl Into<String>, kind: EventKind) -> Self {
        Self {
            asset_id,
            creator_id: creator_id.into(),
            kind,
            occurred_at: Utc::now(),
        }
    }

    /// Day bucket the event lands in.
    pub fn date(&self) -> NaiveDate {
        self.occurred_at.date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_display() {
        let s = SnapshotSubject::Creator("c1".to_string());
        assert_eq!(s.to_string(), "creator:c1");
    }

    #[test]
    fn test_engagement_counts_add() {
        let a = EngagementCounts {
            likes: 1,
            comments: 2,
            shares: 0,
        };
        let b = EngagementCounts {
            likes: 3,
            comments: 0,
            shares: 5,
        };
        let sum = a.add(b);
        assert_eq!(sum.likes, 4);
        assert_eq!(sum.comments, 2);
        assert_eq!(sum.shares, 5);
    }

    #[test]
    fn test_event_kind_serde_tagging() {
        let kind = EventKind::Engagement {
            likes: 1,
            comments: 0,
            shares: 0,
        };
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains("\"type\":\"engagement\""));

        let back: EventKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);
    }
}
