//! Job payload types and the broker-owned envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use veri_models::{AssetId, EngagementEvent, JobId, NotificationKind};

/// Well-known queue names.
pub mod queues {
    /// Upload-completion jobs polled against the encoder.
    pub const INGEST: &str = "video-ingest";
    /// Authenticity + safety screening.
    pub const MODERATION: &str = "video-moderation";
    /// Discrete engagement events.
    pub const ANALYTICS: &str = "analytics-events";
    /// Fan-out notifications.
    pub const NOTIFICATIONS: &str = "notifications";
    /// Delayed email dispatch.
    pub const EMAIL: &str = "email";
}

/// Job to advance an uploaded asset once the encoder finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Asset being ingested
    pub asset_id: AssetId,
    /// Asset ID at the encoding provider
    pub encoding_asset_id: String,
    /// Creator to notify on failure
    pub creator_id: String,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl IngestJob {
    pub fn new(
        asset_id: AssetId,
        encoding_asset_id: impl Into<String>,
        creator_id: impl Into<String>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            asset_id,
            encoding_asset_id: encoding_asset_id.into(),
            creator_id: creator_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Job to screen an encoded asset before publication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Asset to screen
    pub asset_id: AssetId,
    /// Playback identifier frames are sampled from
    pub playback_id: String,
    /// Duration in seconds
    pub duration_secs: f64,
    /// Creator to notify of the outcome
    pub creator_id: String,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl ModerationJob {
    pub fn new(
        asset_id: AssetId,
        playback_id: impl Into<String>,
        duration_secs: f64,
        creator_id: impl Into<String>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            asset_id,
            playback_id: playback_id.into(),
            duration_secs,
            creator_id: creator_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Job carrying a single engagement event into the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsEventJob {
    /// Unique job ID
    pub job_id: JobId,
    /// The event to record
    pub event: EngagementEvent,
}

impl AnalyticsEventJob {
    pub fn new(event: EngagementEvent) -> Self {
        Self {
            job_id: JobId::new(),
            event,
        }
    }
}

/// Job to fan out a completed pipeline stage to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Recipient user
    pub user_id: String,
    /// What happened
    pub kind: NotificationKind,
    /// Entity the notification is about
    pub entity_id: String,
    /// Entity type, e.g. "video"
    pub entity_type: String,
    /// Human-readable message
    pub message: String,
}

impl NotifyJob {
    pub fn new(
        user_id: impl Into<String>,
        kind: NotificationKind,
        entity_id: impl Into<String>,
        entity_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            user_id: user_id.into(),
            kind,
            entity_id: entity_id.into(),
            entity_type: entity_type.into(),
            message: message.into(),
        }
    }
}

/// Delayed email dispatch for a curated subset of notification kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Recipient user
    pub user_id: String,
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub body: String,
}

impl EmailJob {
    pub fn new(
        user_id: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            user_id: user_id.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Generic job wrapper for queue storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineJob {
    /// Poll the encoder and advance the asset into moderation
    Ingest(IngestJob),
    /// Screen an encoded asset
    Moderation(ModerationJob),
    /// Record an engagement event
    AnalyticsEvent(AnalyticsEventJob),
    /// Persist and fan out a notification
    Notify(NotifyJob),
    /// Send a queued email
    EmailSend(EmailJob),
}

impl PipelineJob {
    pub fn job_id(&self) -> &JobId {
        match self {
            PipelineJob::Ingest(j) => &j.job_id,
            PipelineJob::Moderation(j) => &j.job_id,
            PipelineJob::AnalyticsEvent(j) => &j.job_id,
            PipelineJob::Notify(j) => &j.job_id,
            PipelineJob::EmailSend(j) => &j.job_id,
        }
    }

    /// Returns the asset_id if this job is tied to one.
    pub fn asset_id(&self) -> Option<&AssetId> {
        match self {
            PipelineJob::Ingest(j) => Some(&j.asset_id),
            PipelineJob::Moderation(j) => Some(&j.asset_id),
            PipelineJob::AnalyticsEvent(j) => Some(&j.event.asset_id),
            PipelineJob::Notify(_) | PipelineJob::EmailSend(_) => None,
        }
    }
}

/// Lifecycle of an envelope inside the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// In the stream, waiting for a consumer
    #[default]
    Waiting,
    /// Parked in the delayed set until `scheduled_at`
    Delayed,
    /// Claimed by a consumer
    Active,
    /// Acked and trimmed
    Completed,
    /// Dead-lettered after exhausting attempts
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Delayed => "delayed",
            JobStatus::Active => "active",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// Broker-owned bookkeeping around a payload.
///
/// Handlers read the payload; only the queue layer mutates attempts,
/// status, and scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEnvelope {
    /// Broker-level ID (distinct from the payload's own job_id)
    pub id: JobId,
    /// Queue the envelope belongs to
    pub queue: String,
    /// The typed payload
    pub payload: PipelineJob,
    /// Delivery attempts consumed so far
    pub attempts: u32,
    /// Attempts allowed before dead-lettering
    pub max_attempts: u32,
    /// Non-failure re-delays so far (not counted against attempts)
    #[serde(default)]
    pub re_delays: u32,
    /// Base for exponential retry backoff, in seconds
    pub backoff_base_secs: u64,
    /// Current lifecycle state
    pub status: JobStatus,
    /// When the envelope becomes (or became) runnable
    pub scheduled_at: DateTime<Utc>,
}

impl JobEnvelope {
    /// Delay before the next retry attempt: base doubled per consumed attempt.
    pub fn backoff_delay(&self) -> Duration {
        let exp = self.attempts.saturating_sub(1).min(16);
        Duration::from_secs(self.backoff_base_secs.saturating_mul(1u64 << exp))
    }

    /// Whether another retry attempt is allowed.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

/// Per-enqueue options; unset fields fall back to the queue's defaults.
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    /// Run no earlier than now + delay
    pub delay: Option<Duration>,
    /// Override the default attempt budget
    pub max_attempts: Option<u32>,
    /// Override the default backoff base
    pub backoff_base: Option<Duration>,
}

impl EnqueueOptions {
    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }
}
