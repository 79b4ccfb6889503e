//! Worker error types.

use std::time::Duration;

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Reschedule in {delay:?}: {reason}")]
    Reschedule { delay: Duration, reason: String },

    #[error("Terminal: {0}")]
    Terminal(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Provider error: {0}")]
    Provider(#[from] veri_providers::ProviderError),

    #[error("Store error: {0}")]
    Store(#[from] veri_store::StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] veri_queue::QueueError),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    /// Create a reschedule error - the job should run again later without
    /// consuming an attempt.
    ///
    /// Used for the not-ready-yet path, where the encoder is still
    /// processing and the job must wait rather than fail.
    pub fn reschedule(delay: Duration, reason: impl Into<String>) -> Self {
        Self::Reschedule {
            delay,
            reason: reason.into(),
        }
    }

    /// Create a terminal error - the business outcome is resolved and the
    /// job must not be retried.
    pub fn terminal(msg: impl Into<String>) -> Self {
        Self::Terminal(msg.into())
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Check if error is a reschedule request.
    pub fn is_reschedule(&self) -> bool {
        matches!(self, WorkerError::Reschedule { .. })
    }

    /// Check if this failure must not consume further attempts.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerError::Terminal(_))
    }

    /// Check if the delivery should be dropped without side effects.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, WorkerError::RateLimited(_))
    }

    /// Check if error is retryable via the broker's attempt/backoff policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkerError::JobFailed(_)
                | WorkerError::Provider(_)
                | WorkerError::Store(_)
                | WorkerError::Queue(_)
        )
    }
}
