//! Redis Streams job queue facade.
//!
//! This crate provides:
//! - An explicit registry of named queues
//! - Typed enqueue with delay / attempts / backoff options
//! - Consumer-group delivery with retry, re-delay, and dead-lettering
//! - Realtime events via Redis Pub/Sub

pub mod dispatch;
pub mod error;
pub mod job;
pub mod queue;
pub mod realtime;
pub mod registry;

pub use dispatch::{Dispatcher, MemoryDispatcher};
pub use error::{QueueError, QueueResult};
pub use job::{
    queues, AnalyticsEventJob, EmailJob, EnqueueOptions, IngestJob, JobEnvelope, JobStatus,
    ModerationJob, NotifyJob, PipelineJob,
};
pub use queue::{JobQueue, QueueConfig, RetryDisposition};
pub use realtime::{RealtimeChannel, RealtimeEvent};
pub use registry::QueueRegistry;
