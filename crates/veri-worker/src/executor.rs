//! Bounded-concurrency worker pool over one queue.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use veri_queue::{JobEnvelope, JobQueue, RetryDisposition};

use crate::error::{WorkerError, WorkerResult};

/// A worker's job-processing logic.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    /// Operation name for logs and the consumer name.
    fn operation(&self) -> &'static str;

    /// Process one delivery.
    async fn handle(&self, envelope: &JobEnvelope) -> WorkerResult<()>;

    /// Called once when a job is dead-lettered (terminal error or attempts
    /// exhausted). The place for the single user-visible failure effect.
    async fn on_dead_letter(&self, _envelope: &JobEnvelope, _error: &str) {}
}

/// How a handler result resolves at the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolution {
    Ack,
    ReDelay(Duration),
    Retry,
    DeadLetter,
}

fn resolve(result: &WorkerResult<()>) -> Resolution {
    match result {
        Ok(()) => Resolution::Ack,
        Err(WorkerError::Reschedule { delay, .. }) => Resolution::ReDelay(*delay),
        // A rate-limited duplicate is dropped, not failed
        Err(e) if e.is_rate_limited() => Resolution::Ack,
        Err(e) if e.is_terminal() => Resolution::DeadLetter,
        Err(_) => Resolution::Retry,
    }
}

/// Pool scheduling knobs.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum concurrent jobs
    pub concurrency: usize,
    /// How long a consume call blocks on an empty stream
    pub block_ms: u64,
    /// How often due delayed jobs are promoted
    pub promote_interval: Duration,
    /// How often orphaned pending jobs are scanned for
    pub claim_interval: Duration,
    /// Minimum idle time before a pending job can be claimed
    pub claim_min_idle: Duration,
    /// Drain timeout on shutdown
    pub shutdown_timeout: Duration,
}

/// Pool of concurrent executors pulling one queue.
pub struct WorkerPool {
    queue: Arc<JobQueue>,
    handler: Arc<dyn JobHandler>,
    config: PoolConfig,
    semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
}

impl WorkerPool {
    pub fn new(queue: Arc<JobQueue>, handler: Arc<dyn JobHandler>, config: PoolConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.concurrency));
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("{}-{}", handler.operation(), Uuid::new_v4());

        Self {
            queue,
            handler,
            config,
            semaphore,
            shutdown,
            consumer_name,
        }
    }

    /// Run until shutdown, then drain in-flight jobs.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            consumer = %self.consumer_name,
            queue = self.queue.name(),
            concurrency = self.config.concurrency,
            "Starting worker pool"
        );

        let mut shutdown_rx = self.shutdown.subscribe();

        // Promote due delayed jobs (re-delays and retry backoffs land here)
        let promote_queue = Arc::clone(&self.queue);
        let promote_interval = self.config.promote_interval;
        let mut shutdown_rx_promote = self.shutdown.subscribe();
        let promote_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(promote_interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx_promote.changed() => {
                        if *shutdown_rx_promote.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        if let Err(e) = promote_queue.promote_due().await {
                            warn!(queue = promote_queue.name(), "Failed to promote delayed jobs: {}", e);
                        }
                    }
                }
            }
        });

        // Reclaim jobs orphaned by crashed workers
        let claim_queue = Arc::clone(&self.queue);
        let claim_handler = Arc::clone(&self.handler);
        let claim_semaphore = Arc::clone(&self.semaphore);
        let claim_consumer = self.consumer_name.clone();
        let claim_interval = self.config.claim_interval;
        let claim_min_idle = self.config.claim_min_idle;
        let mut shutdown_rx_claim = self.shutdown.subscribe();
        let claim_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(claim_interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx_claim.changed() => {
                        if *shutdown_rx_claim.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        match claim_queue
                            .claim_pending(&claim_consumer, claim_min_idle.as_millis() as u64, 5)
                            .await
                        {
                            Ok(jobs) if !jobs.is_empty() => {
                                info!(queue = claim_queue.name(), count = jobs.len(), "Claimed pending jobs");
                                for (message_id, envelope) in jobs {
                                    let queue = Arc::clone(&claim_queue);
                                    let handler = Arc::clone(&claim_handler);
                                    let Ok(permit) =
                                        Arc::clone(&claim_semaphore).acquire_owned().await
                                    else {
                                        break;
                                    };
                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        Self::execute_job(queue, handler, message_id, envelope)
                                            .await;
                                    });
                                }
                            }
                            Ok(_) => {}
                            Err(e) => {
                                warn!(queue = claim_queue.name(), "Failed to claim pending jobs: {}", e);
                            }
                        }
                    }
                }
            }
        });

        // Main consumption loop
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!(consumer = %self.consumer_name, "Shutdown signal received, stopping pool");
                        break;
                    }
                }
                result = self.consume_once() => {
                    if let Err(e) = result {
                        error!(queue = self.queue.name(), "Error consuming jobs: {}", e);
                        // Back off on error
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        promote_task.abort();
        claim_task.abort();

        // Drain in-flight jobs
        info!(consumer = %self.consumer_name, "Waiting for in-flight jobs to complete...");
        let _ = tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs()).await;

        info!(consumer = %self.consumer_name, "Worker pool stopped");
        Ok(())
    }

    async fn consume_once(&self) -> WorkerResult<()> {
        let available = self.semaphore.available_permits();
        if available == 0 {
            // All slots busy, wait a bit
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .queue
            .consume(&self.consumer_name, self.config.block_ms, available.min(5))
            .await?;

        if jobs.is_empty() {
            return Ok(());
        }

        debug!(queue = self.queue.name(), count = jobs.len(), "Consumed jobs");

        for (message_id, envelope) in jobs {
            let queue = Arc::clone(&self.queue);
            let handler = Arc::clone(&self.handler);
            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::job_failed("Semaphore closed"))?;

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(queue, handler, message_id, envelope).await;
            });
        }

        Ok(())
    }

    /// Execute a single delivery and resolve it at the broker.
    async fn execute_job(
        queue: Arc<JobQueue>,
        handler: Arc<dyn JobHandler>,
        message_id: String,
        envelope: JobEnvelope,
    ) {
        let envelope_id = envelope.id.to_string();
        debug!(envelope_id = %envelope_id, queue = queue.name(), "Executing job");

        let result = handler.handle(&envelope).await;

        match resolve(&result) {
            Resolution::Ack => {
                if let Err(e) = queue.ack(&message_id).await {
                    error!(envelope_id = %envelope_id, "Failed to ack job: {}", e);
                }
            }
            Resolution::ReDelay(delay) => {
                debug!(envelope_id = %envelope_id, delay_secs = delay.as_secs(), "Job not ready, re-delaying");
                if let Err(e) = queue.re_delay(&message_id, envelope, delay).await {
                    error!(envelope_id = %envelope_id, "Failed to re-delay job: {}", e);
                }
            }
            Resolution::DeadLetter => {
                let reason = result
                    .as_ref()
                    .err()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                if let Err(e) = queue.dead_letter(&message_id, envelope.clone(), &reason).await {
                    error!(envelope_id = %envelope_id, "Failed to dead-letter job: {}", e);
                }
                handler.on_dead_letter(&envelope, &reason).await;
            }
            Resolution::Retry => {
                let reason = result
                    .as_ref()
                    .err()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                match queue.retry(&message_id, envelope.clone(), &reason).await {
                    Ok(RetryDisposition::Retried { .. }) => {}
                    Ok(RetryDisposition::DeadLettered) => {
                        handler.on_dead_letter(&envelope, &reason).await;
                    }
                    Err(e) => {
                        error!(envelope_id = %envelope_id, "Failed to schedule retry: {}", e);
                    }
                }
            }
        }
    }

    /// Wait for all in-flight jobs to complete.
    async fn wait_for_jobs(&self) {
        loop {
            if self.semaphore.available_permits() == self.config.concurrency {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal cooperative shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_resolves_to_ack() {
        assert_eq!(resolve(&Ok(())), Resolution::Ack);
    }

    #[test]
    fn reschedule_resolves_to_re_delay_with_its_delay() {
        let result = Err(WorkerError::reschedule(
            Duration::from_secs(10),
            "still processing",
        ));
        assert_eq!(resolve(&result), Resolution::ReDelay(Duration::from_secs(10)));
    }

    #[test]
    fn terminal_resolves_to_dead_letter() {
        let result = Err(WorkerError::terminal("encoding errored"));
        assert_eq!(resolve(&result), Resolution::DeadLetter);
    }

    #[test]
    fn rate_limited_is_dropped_without_side_effects() {
        let limited = Err(WorkerError::rate_limited("one attempt per hour"));
        assert_eq!(resolve(&limited), Resolution::Ack);
    }

    #[test]
    fn transient_resolves_to_retry() {
        let result = Err(WorkerError::job_failed("store contention"));
        assert_eq!(resolve(&result), Resolution::Retry);
    }
}
