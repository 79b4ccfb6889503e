//! Moderation worker: AI-authenticity and safety screening.
//!
//! Frames are sampled per second of playback (bounded window), classified
//! through the provider chains, interpolated to a full frame set, and
//! resolved to an approval decision. The asset, the audit log, and the
//! outcome notification are all written before the job completes.

pub mod decision;
pub mod sampling;

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use tracing::warn;

use veri_models::{
    AssetStatus, FrameClass, FrameRef, ModerationDecision, ModerationLog, NotificationKind,
};
use veri_providers::{AuthenticityChain, SafetyChain};
use veri_queue::{queues, EnqueueOptions, JobEnvelope, ModerationJob, NotifyJob, PipelineJob};

use crate::config::Thresholds;
use crate::context::PipelineContext;
use crate::error::{WorkerError, WorkerResult};
use crate::executor::JobHandler;
use crate::logging::JobLogger;
use crate::retry::{retry_async, RetryConfig};

pub use decision::{aggregate_safety, authenticity_ratio, decide};
pub use sampling::{
    enumerate_frames, interpolate, safety_indices, sample_indices, EDGE_DECAY, MAX_AUTH_SAMPLES,
    MAX_FRAMES, SAFETY_STRIDE,
};

/// Screen a set of frames and produce a decision.
///
/// Direct entry point, also used outside the queue for manual re-screening.
/// Authenticity and safety classification run concurrently; each falls
/// back through its provider chain, so a decision is always produced.
pub async fn moderate_video(
    authenticity: &AuthenticityChain,
    safety: &SafetyChain,
    frames: &[FrameRef],
    thresholds: &Thresholds,
) -> WorkerResult<ModerationDecision> {
    let auth_task = async {
        let indices = sampling::sample_indices(frames.len(), MAX_AUTH_SAMPLES);
        let sampled: Vec<FrameRef> = indices.iter().map(|&i| frames[i].clone()).collect();
        let results = authenticity.detect(&sampled).await?;
        let samples: Vec<(usize, FrameClass)> =
            indices.into_iter().zip(results.into_iter()).collect();
        Ok::<_, WorkerError>(sampling::interpolate(&samples, frames.len()))
    };

    let safety_task = async {
        let indices = sampling::safety_indices(frames.len());
        let sampled: Vec<FrameRef> = indices.iter().map(|&i| frames[i].clone()).collect();
        let scores = safety.score(&sampled).await?;
        Ok::<_, WorkerError>(decision::aggregate_safety(&scores))
    };

    let (classes, safety_scores) = tokio::try_join!(auth_task, safety_task)?;

    let ratio = decision::authenticity_ratio(&classes);
    Ok(decision::decide(ratio, safety_scores, thresholds))
}

/// Handler for the moderation queue.
pub struct ModerationWorker {
    ctx: Arc<PipelineContext>,
}

impl ModerationWorker {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    async fn process(&self, job: &ModerationJob, logger: &JobLogger) -> WorkerResult<()> {
        logger.log_start(&format!(
            "Screening asset {} ({:.0}s)",
            job.asset_id, job.duration_secs
        ));

        let frames = sampling::enumerate_frames(
            &job.playback_id,
            job.duration_secs,
            &self.ctx.config.frame_url_base,
        );
        logger.log_progress(&format!("Enumerated {} frames", frames.len()));

        let decision = moderate_video(
            &self.ctx.authenticity,
            &self.ctx.safety,
            &frames,
            &self.ctx.config.thresholds,
        )
        .await?;

        self.persist_decision(job, &decision).await?;

        counter!(
            "veri_moderation_decisions_total",
            "outcome" => decision.outcome().as_str()
        )
        .increment(1);
        logger.log_completion(&decision.reason);
        Ok(())
    }

    /// Write the asset, append the audit entry, and enqueue the outcome
    /// notification. The asset row is resolved before anything else so a
    /// crash later never leaves it inconsistent with the audit trail.
    async fn persist_decision(
        &self,
        job: &ModerationJob,
        decision: &ModerationDecision,
    ) -> WorkerResult<()> {
        let asset = self
            .ctx
            .store
            .get_asset(&job.asset_id)
            .await?
            .ok_or_else(|| WorkerError::terminal(format!("asset {} not found", job.asset_id)))?;

        let updated = if decision.approved {
            asset.publish(decision.authenticity_ratio)
        } else {
            asset.reject(decision.authenticity_ratio)
        };

        let retry = RetryConfig::new("persist_moderation");
        retry_async(&retry, || {
            let asset = updated.clone();
            async move { self.ctx.store.put_asset(asset).await }
        })
        .await?;

        self.ctx
            .store
            .append_moderation_log(ModerationLog::from_decision(job.asset_id.clone(), decision))
            .await?;

        let kind = if decision.approved {
            NotificationKind::ModerationApproved
        } else {
            NotificationKind::ModerationRejected
        };
        self.ctx
            .dispatcher
            .enqueue(
                queues::NOTIFICATIONS,
                PipelineJob::Notify(NotifyJob::new(
                    &job.creator_id,
                    kind,
                    job.asset_id.as_str(),
                    "video",
                    decision.reason.clone(),
                )),
                EnqueueOptions::default(),
            )
            .await?;

        Ok(())
    }
}

#[async_trait]
impl JobHandler for ModerationWorker {
    fn operation(&self) -> &'static str {
        "moderation"
    }

    async fn handle(&self, envelope: &JobEnvelope) -> WorkerResult<()> {
        let PipelineJob::Moderation(job) = &envelope.payload else {
            return Err(WorkerError::terminal("unexpected payload on moderation queue"));
        };
        let logger = JobLogger::new(&job.job_id, self.operation());

        let limiter = self.ctx.moderation_rate_limiter();
        if !limiter.try_acquire(&job.asset_id).await? {
            logger.log_warning("Moderation attempt inside the rate-limit window, skipping");
            return Err(WorkerError::rate_limited(format!(
                "asset {} was moderated within the window",
                job.asset_id
            )));
        }

        match self.process(job, &logger).await {
            Ok(()) => Ok(()),
            Err(e) => {
                logger.log_error(&e.to_string());
                // Free the slot so the broker's retry is not starved
                if let Err(release_err) = limiter.release(&job.asset_id).await {
                    logger.log_warning(&format!("Failed to release rate limit: {release_err}"));
                }
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
        let PipelineJob::Moderation(job) = &envelope.payload else {
            return;
        };
        warn!(
            asset_id = %job.asset_id,
            "Moderation dead-lettered, asset stays in draft: {}",
            error
        );
        if let Err(e) = self
            .ctx
            .store
            .set_asset_status(&job.asset_id, AssetStatus::Draft)
            .await
        {
            warn!(asset_id = %job.asset_id, "Failed to reset asset status: {}", e);
        }
    }
}
