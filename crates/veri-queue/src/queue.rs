//! Named job queues over Redis Streams.
//!
//! Each queue is one stream plus a delayed ZSET and a dead-letter stream.
//! Delivery runs through a consumer group; retries and deliberate re-delays
//! both go through the delayed set so scheduling stays in the broker.

use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use veri_models::JobId;

use crate::error::{QueueError, QueueResult};
use crate::job::{EnqueueOptions, JobEnvelope, JobStatus, PipelineJob};

/// Queue configuration shared by every queue in a registry.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Default attempt budget per job
    pub default_max_attempts: u32,
    /// Default base for exponential retry backoff
    pub default_backoff_base: Duration,
    /// Approximate retention bound for live streams
    pub stream_maxlen: usize,
    /// Approximate retention bound for dead-letter streams
    pub dlq_maxlen: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            consumer_group: "veri:workers".to_string(),
            default_max_attempts: 3,
            default_backoff_base: Duration::from_secs(2),
            stream_maxlen: 1_000,
            dlq_maxlen: 10_000,
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or_else(|_| "veri:workers".to_string()),
            default_max_attempts: std::env::var("QUEUE_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            default_backoff_base: Duration::from_secs(
                std::env::var("QUEUE_BACKOFF_BASE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            ),
            stream_maxlen: std::env::var("QUEUE_STREAM_MAXLEN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1_000),
            dlq_maxlen: std::env::var("QUEUE_DLQ_MAXLEN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10_000),
        }
    }
}

/// What the queue did with a failed delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDisposition {
    /// Re-scheduled through the delayed set
    Retried { delay: Duration },
    /// Attempt budget exhausted, parked on the dead-letter stream
    DeadLettered,
}

/// One named durable queue.
#[derive(Debug)]
pub struct JobQueue {
    client: redis::Client,
    name: String,
    config: QueueConfig,
}

impl JobQueue {
    pub(crate) fn new(client: redis::Client, name: impl Into<String>, config: QueueConfig) -> Self {
        Self {
            client,
            name: name.into(),
            config,
        }
    }

    /// Queue name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn stream_key(&self) -> String {
        format!("veri:q:{}", self.name)
    }

    fn delayed_key(&self) -> String {
        format!("veri:q:{}:delayed", self.name)
    }

    fn dlq_key(&self) -> String {
        format!("veri:q:{}:dlq", self.name)
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(self.stream_key())
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!(queue = %self.name, "Created consumer group"),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(queue = %self.name, "Consumer group already exists");
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Enqueue a payload.
    ///
    /// Failure here means a scheduled side effect was lost, so the error is
    /// always surfaced to the caller.
    pub async fn enqueue(
        &self,
        payload: PipelineJob,
        options: EnqueueOptions,
    ) -> QueueResult<JobId> {
        let now = Utc::now();
        let delay = options.delay.unwrap_or_default();
        let envelope = JobEnvelope {
            id: JobId::new(),
            queue: self.name.clone(),
            payload,
            attempts: 0,
            max_attempts: options
                .max_attempts
                .unwrap_or(self.config.default_max_attempts),
            re_delays: 0,
            backoff_base_secs: options
                .backoff_base
                .unwrap_or(self.config.default_backoff_base)
                .as_secs(),
            status: if delay.is_zero() {
                JobStatus::Waiting
            } else {
                JobStatus::Delayed
            },
            scheduled_at: now + chrono::Duration::from_std(delay).unwrap_or_default(),
        };

        if delay.is_zero() {
            self.push_to_stream(&envelope).await?;
        } else {
            self.park_delayed(&envelope).await?;
        }

        counter!("veri_queue_enqueued_total", "queue" => self.name.clone()).increment(1);
        debug!(
            queue = %self.name,
            envelope_id = %envelope.id,
            delay_secs = delay.as_secs(),
            "Enqueued job"
        );

        Ok(envelope.id)
    }

    async fn push_to_stream(&self, envelope: &JobEnvelope) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let json = serde_json::to_string(envelope)?;

        // MAXLEN ~ keeps completed history bounded without exact trims
        redis::cmd("XADD")
            .arg(self.stream_key())
            .arg("MAXLEN")
            .arg("~")
            .arg(self.config.stream_maxlen)
            .arg("*")
            .arg("job")
            .arg(&json)
            .query_async::<String>(&mut conn)
            .await?;
        Ok(())
    }

    async fn park_delayed(&self, envelope: &JobEnvelope) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let json = serde_json::to_string(envelope)?;
        let score = envelope.scheduled_at.timestamp_millis();

        conn.zadd::<_, _, _, ()>(self.delayed_key(), json, score)
            .await?;
        Ok(())
    }

    /// Move due delayed envelopes into the live stream.
    ///
    /// Returns how many were promoted. ZREM-before-XADD keeps concurrent
    /// promoters from double-delivering the same envelope.
    pub async fn promote_due(&self) -> QueueResult<usize> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let now = Utc::now().timestamp_millis();

        let due: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(self.delayed_key())
            .arg("-inf")
            .arg(now)
            .arg("LIMIT")
            .arg(0)
            .arg(128)
            .query_async(&mut conn)
            .await?;

        let mut promoted = 0usize;
        for member in due {
            let removed: u32 = conn.zrem(self.delayed_key(), &member).await?;
            if removed == 0 {
                continue;
            }
            let mut envelope: JobEnvelope = match serde_json::from_str(&member) {
                Ok(e) => e,
                Err(e) => {
                    warn!(queue = %self.name, "Dropping malformed delayed envelope: {}", e);
                    continue;
                }
            };
            envelope.status = JobStatus::Waiting;
            self.push_to_stream(&envelope).await?;
            promoted += 1;
        }

        if promoted > 0 {
            debug!(queue = %self.name, promoted, "Promoted delayed jobs");
        }
        Ok(promoted)
    }

    /// Consume envelopes for a named consumer.
    /// Returns (message_id, envelope) pairs.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, JobEnvelope)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(self.stream_key())
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();

        for stream_key in result.keys {
            for entry in stream_key.ids {
                let message_id = entry.id.clone();

                if let Some(redis::Value::BulkString(payload)) = entry.map.get("job") {
                    let payload_str = String::from_utf8_lossy(payload);
                    match serde_json::from_str::<JobEnvelope>(&payload_str) {
                        Ok(mut envelope) => {
                            envelope.status = JobStatus::Active;
                            jobs.push((message_id, envelope));
                        }
                        Err(e) => {
                            warn!(queue = %self.name, "Failed to parse envelope: {}", e);
                            // Ack the malformed message to prevent reprocessing
                            self.ack(&message_id).await.ok();
                        }
                    }
                }
            }
        }

        Ok(jobs)
    }

    /// Acknowledge a delivery (completed, trimmed from the stream).
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(self.stream_key())
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(self.stream_key())
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        counter!("veri_queue_completed_total", "queue" => self.name.clone()).increment(1);
        Ok(())
    }

    /// Handle a failed delivery: consume an attempt, then either re-schedule
    /// with exponential backoff or dead-letter the envelope.
    pub async fn retry(
        &self,
        message_id: &str,
        mut envelope: JobEnvelope,
        error: &str,
    ) -> QueueResult<RetryDisposition> {
        envelope.attempts += 1;

        if envelope.can_retry() {
            let delay = envelope.backoff_delay();
            envelope.status = JobStatus::Delayed;
            envelope.scheduled_at =
                Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();

            self.park_delayed(&envelope).await?;
            self.ack(message_id).await?;

            counter!("veri_queue_retried_total", "queue" => self.name.clone()).increment(1);
            info!(
                queue = %self.name,
                envelope_id = %envelope.id,
                attempt = envelope.attempts,
                max_attempts = envelope.max_attempts,
                delay_secs = delay.as_secs(),
                "Job re-scheduled after failure: {}",
                error
            );
            Ok(RetryDisposition::Retried { delay })
        } else {
            self.dead_letter(message_id, envelope, error).await?;
            Ok(RetryDisposition::DeadLettered)
        }
    }

    /// Re-schedule a delivery without consuming an attempt.
    ///
    /// This is the not-ready-yet path, distinct from the failure path: the
    /// attempt counter is untouched.
    pub async fn re_delay(
        &self,
        message_id: &str,
        mut envelope: JobEnvelope,
        delay: Duration,
    ) -> QueueResult<()> {
        envelope.status = JobStatus::Delayed;
        envelope.re_delays += 1;
        envelope.scheduled_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();

        self.park_delayed(&envelope).await?;
        self.ack(message_id).await?;

        counter!("veri_queue_redelayed_total", "queue" => self.name.clone()).increment(1);
        debug!(
            queue = %self.name,
            envelope_id = %envelope.id,
            delay_secs = delay.as_secs(),
            "Job re-delayed"
        );
        Ok(())
    }

    /// Park an envelope on the dead-letter stream.
    pub async fn dead_letter(
        &self,
        message_id: &str,
        mut envelope: JobEnvelope,
        error: &str,
    ) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        envelope.status = JobStatus::Failed;
        let json = serde_json::to_string(&envelope)?;

        redis::cmd("XADD")
            .arg(self.dlq_key())
            .arg("MAXLEN")
            .arg("~")
            .arg(self.config.dlq_maxlen)
            .arg("*")
            .arg("job")
            .arg(&json)
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(message_id).await?;

        counter!("veri_queue_failed_total", "queue" => self.name.clone()).increment(1);
        warn!(
            queue = %self.name,
            envelope_id = %envelope.id,
            "Job dead-lettered: {}",
            error
        );
        Ok(())
    }

    /// Claim pending deliveries idle longer than `min_idle_ms`.
    /// This recovers jobs from crashed workers.
    pub async fn claim_pending(
        &self,
        consumer_name: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, JobEnvelope)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let pending: redis::streams::StreamPendingReply = redis::cmd("XPENDING")
            .arg(self.stream_key())
            .arg(&self.config.consumer_group)
            .query_async(&mut conn)
            .await?;

        if pending.count() == 0 {
            return Ok(Vec::new());
        }

        let result: redis::streams::StreamClaimReply = redis::cmd("XCLAIM")
            .arg(self.stream_key())
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(min_idle_ms)
            .arg("0-0")
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();

        for entry in result.ids {
            let message_id = entry.id.clone();

            if let Some(redis::Value::BulkString(payload)) = entry.map.get("job") {
                let payload_str = String::from_utf8_lossy(&payload);
                match serde_json::from_str::<JobEnvelope>(&payload_str) {
                    Ok(envelope) => {
                        info!(
                            queue = %self.name,
                            envelope_id = %envelope.id,
                            "Claimed pending job"
                        );
                        jobs.push((message_id, envelope));
                    }
                    Err(e) => {
                        warn!(queue = %self.name, "Failed to parse claimed envelope: {}", e);
                        self.ack(&message_id).await.ok();
                    }
                }
            }
        }

        Ok(jobs)
    }

    /// Live stream length.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(self.stream_key()).await?;
        Ok(len)
    }

    /// Delayed set size.
    pub async fn delayed_len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.zcard(self.delayed_key()).await?;
        Ok(len)
    }

    /// Dead-letter stream length.
    pub async fn dlq_len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(self.dlq_key()).await?;
        Ok(len)
    }
}
