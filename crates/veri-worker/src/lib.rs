//! Veristream content pipeline workers.
//!
//! This crate provides:
//! - The bounded-concurrency worker pool over the queue facade
//! - The four worker types: ingest, moderation, analytics, notification
//! - The pipeline orchestrator with graceful shutdown
//! - The moderation core (sampling, interpolation, decision)

pub mod analytics;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod ingest;
pub mod logging;
pub mod moderation;
pub mod notification;
pub mod orchestrator;
pub mod rate_limit;
pub mod retry;

pub use config::{Thresholds, WorkerConfig};
pub use context::PipelineContext;
pub use error::{WorkerError, WorkerResult};
pub use executor::{JobHandler, PoolConfig, WorkerPool};
pub use logging::JobLogger;
pub use moderation::moderate_video;
pub use orchestrator::Pipeline;
pub use rate_limit::ModerationRateLimiter;
