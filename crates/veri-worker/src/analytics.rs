//! Analytics aggregator: per-event increments and the periodic rollup.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use veri_models::{DailySnapshot, EngagementCounts, EventKind, SnapshotSubject};
use veri_queue::{JobEnvelope, PipelineJob};
use veri_store::{ContentStore, SnapshotDelta};

use crate::context::PipelineContext;
use crate::error::{WorkerError, WorkerResult};
use crate::executor::JobHandler;
use crate::retry::FailureTracker;

/// Snapshot increments for one event.
pub fn event_delta(kind: &EventKind, revenue_per_mille: f64) -> SnapshotDelta {
    match kind {
        EventKind::View => SnapshotDelta {
            views: 1,
            estimated_revenue: revenue_per_mille / 1_000.0,
            ..Default::default()
        },
        EventKind::Engagement {
            likes,
            comments,
            shares,
        } => SnapshotDelta {
            engagement: EngagementCounts {
                likes: *likes,
                comments: *comments,
                shares: *shares,
            },
            ..Default::default()
        },
        EventKind::Retention { watch_minutes } => SnapshotDelta {
            watch_time_minutes: *watch_minutes,
            ..Default::default()
        },
    }
}

/// Handler for the analytics-events queue.
pub struct AnalyticsWorker {
    ctx: Arc<PipelineContext>,
}

impl AnalyticsWorker {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl JobHandler for AnalyticsWorker {
    fn operation(&self) -> &'static str {
        "analytics_event"
    }

    async fn handle(&self, envelope: &JobEnvelope) -> WorkerResult<()> {
        let PipelineJob::AnalyticsEvent(job) = &envelope.payload else {
            return Err(WorkerError::terminal("unexpected payload on analytics queue"));
        };

        let delta = event_delta(&job.event.kind, self.ctx.config.revenue_per_mille);
        self.ctx
            .store
            .increment_snapshot(
                SnapshotSubject::Asset(job.event.asset_id.clone()),
                job.event.date(),
                delta,
            )
            .await?;
        Ok(())
    }
}

/// Recompute every creator's daily snapshot from that day's per-asset rows.
///
/// Run serially; transient per-event failures self-heal here because the
/// rollup starts from the stored per-asset counts, not from its own state.
/// Returns the number of creator rows written.
pub async fn run_rollup(
    store: &dyn ContentStore,
    date: NaiveDate,
    revenue_per_mille: f64,
) -> WorkerResult<usize> {
    let rows = store.asset_snapshots_for_date(date).await?;

    let mut per_creator: HashMap<String, (u64, f64, EngagementCounts)> = HashMap::new();
    for row in rows {
        let SnapshotSubject::Asset(asset_id) = &row.subject else {
            continue;
        };
        let Some(asset) = store.get_asset(asset_id).await? else {
            warn!(asset_id = %asset_id, "Rollup skipping snapshot for unknown asset");
            continue;
        };

        let entry = per_creator
            .entry(asset.creator_id)
            .or_insert((0, 0.0, EngagementCounts::default()));
        entry.0 += row.views;
        entry.1 += row.watch_time_minutes;
        entry.2 = entry.2.add(row.engagement);
    }

    let count = per_creator.len();
    for (creator_id, (views, watch_time_minutes, engagement)) in per_creator {
        let snapshot = DailySnapshot {
            subject: SnapshotSubject::Creator(creator_id),
            date,
            views,
            watch_time_minutes,
            engagement,
            estimated_revenue: views as f64 / 1_000.0 * revenue_per_mille,
        };
        store.upsert_snapshot(snapshot).await?;
    }

    Ok(count)
}

/// Spawn the periodic rollup pass. One serialized pass per tick.
pub fn spawn_rollup_loop(
    ctx: Arc<PipelineContext>,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(ctx.config.rollup_interval);
        let mut failures = FailureTracker::new(3);
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    let date = Utc::now().date_naive();
                    match run_rollup(ctx.store.as_ref(), date, ctx.config.revenue_per_mille).await {
                        Ok(creators) => {
                            failures.record_success();
                            info!(date = %date, creators, "Analytics rollup complete");
                        }
                        Err(e) => {
                            if failures.record_failure() {
                                warn!(date = %date, "Analytics rollup failed: {}", e);
                            }
                        }
                    }
                }
            }
        }
    })
}
