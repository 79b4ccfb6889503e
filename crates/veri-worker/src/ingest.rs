//! Video ingest worker: encoder polling and pipeline advance.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use veri_models::{AssetStatus, NotificationKind, SnapshotSubject};
use veri_providers::EncoderAssetStatus;
use veri_queue::{
    queues, EnqueueOptions, IngestJob, JobEnvelope, ModerationJob, NotifyJob, PipelineJob,
};
use veri_store::SnapshotDelta;

use crate::context::PipelineContext;
use crate::error::{WorkerError, WorkerResult};
use crate::executor::JobHandler;
use crate::logging::JobLogger;
use crate::retry::{retry_async, RetryConfig};

/// Handler for the ingest queue.
pub struct IngestWorker {
    ctx: Arc<PipelineContext>,
}

impl IngestWorker {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    async fn process(
        &self,
        job: &IngestJob,
        envelope: &JobEnvelope,
        logger: &JobLogger,
    ) -> WorkerResult<()> {
        logger.log_start(&format!(
            "Polling encoder for asset {} (encoding id {})",
            job.asset_id, job.encoding_asset_id
        ));

        let encoder_asset = self.ctx.encoder.retrieve_asset(&job.encoding_asset_id).await?;

        match encoder_asset.status {
            EncoderAssetStatus::Errored => {
                return Err(WorkerError::terminal(format!(
                    "encoding errored: {}",
                    encoder_asset.errors.join("; ")
                )));
            }
            EncoderAssetStatus::Preparing => {
                // Not ready is not a failure: re-delay without consuming an
                // attempt, up to the poll bound.
                if envelope.re_delays >= self.ctx.config.encoder_poll_limit {
                    return Err(WorkerError::terminal(format!(
                        "encoder still processing after {} polls",
                        envelope.re_delays
                    )));
                }
                return Err(WorkerError::reschedule(
                    self.ctx.config.encoder_poll_delay,
                    "encoder still processing",
                ));
            }
            EncoderAssetStatus::Ready => {}
        }

        let playback_id = encoder_asset
            .primary_playback_id()
            .ok_or_else(|| WorkerError::job_failed("encoder ready without a playback id"))?
            .to_string();
        let duration_secs = encoder_asset.duration_secs.unwrap_or(0.0);

        let asset = self
            .ctx
            .store
            .get_asset(&job.asset_id)
            .await?
            .ok_or_else(|| WorkerError::terminal(format!("asset {} not found", job.asset_id)))?;
        let updated = asset.begin_processing(playback_id.clone(), duration_secs);

        let retry = RetryConfig::new("persist_playback");
        retry_async(&retry, || {
            let asset = updated.clone();
            async move { self.ctx.store.put_asset(asset).await }
        })
        .await?;
        logger.log_progress(&format!(
            "Playback {} ({:.0}s) persisted, asset moved to processing",
            playback_id, duration_secs
        ));

        // Moderation is the causally next stage; enqueue failures propagate
        self.ctx
            .dispatcher
            .enqueue(
                queues::MODERATION,
                PipelineJob::Moderation(ModerationJob::new(
                    job.asset_id.clone(),
                    playback_id,
                    duration_secs,
                    &job.creator_id,
                )),
                EnqueueOptions::default(),
            )
            .await?;

        // Zeroed analytics row for today; an increment of nothing creates
        // the row without clobbering events that already landed
        self.ctx
            .store
            .increment_snapshot(
                SnapshotSubject::Asset(job.asset_id.clone()),
                Utc::now().date_naive(),
                SnapshotDelta::default(),
            )
            .await?;

        logger.log_completion("Asset handed to moderation");
        Ok(())
    }
}

#[async_trait]
impl JobHandler for IngestWorker {
    fn operation(&self) -> &'static str {
        "video_ingest"
    }

    async fn handle(&self, envelope: &JobEnvelope) -> WorkerResult<()> {
        let PipelineJob::Ingest(job) = &envelope.payload else {
            return Err(WorkerError::terminal("unexpected payload on ingest queue"));
        };
        let logger = JobLogger::new(&job.job_id, self.operation());

        match self.process(job, envelope, &logger).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_reschedule() => Err(e),
            Err(e) => {
                logger.log_error(&e.to_string());
                // Known-safe status before re-raising
                if let Err(reset_err) = self
                    .ctx
                    .store
                    .set_asset_status(&job.asset_id, AssetStatus::Draft)
                    .await
                {
                    logger.log_warning(&format!("Failed to reset asset status: {reset_err}"));
                }
                Err(e)
            }
        }
    }

    async fn on_dead_letter(&self, envelope: &JobEnvelope, error: &str) {
        let PipelineJob::Ingest(job) = &envelope.payload else {
            return;
        };

        if let Err(e) = self
            .ctx
            .store
            .set_asset_status(&job.asset_id, AssetStatus::Draft)
            .await
        {
            warn!(asset_id = %job.asset_id, "Failed to reset asset status: {}", e);
        }

        // Exactly one user-visible failure per dead-lettered ingest
        let notify = NotifyJob::new(
            &job.creator_id,
            NotificationKind::IngestFailed,
            job.asset_id.as_str(),
            "video",
            format!("We couldn't process your upload: {error}"),
        );
        if let Err(e) = self
            .ctx
            .dispatcher
            .enqueue(
                queues::NOTIFICATIONS,
                PipelineJob::Notify(notify),
                EnqueueOptions::default(),
            )
            .await
        {
            warn!(asset_id = %job.asset_id, "Failed to enqueue failure notification: {}", e);
        }
    }
}
