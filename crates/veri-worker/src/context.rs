//! Shared state handed to every worker.

use std::sync::Arc;

use veri_providers::{AuthenticityChain, EncodingProvider, Mailer, PushProvider, SafetyChain};
use veri_queue::{Dispatcher, RealtimeChannel};
use veri_store::{Cache, ContentStore};

use crate::config::WorkerConfig;
use crate::rate_limit::ModerationRateLimiter;

/// Collaborators and config shared by all worker handlers.
///
/// Built once by the orchestrator and passed by reference; workers never
/// reach for ambient globals.
pub struct PipelineContext {
    pub config: WorkerConfig,
    pub store: Arc<dyn ContentStore>,
    pub cache: Arc<dyn Cache>,
    pub dispatcher: Arc<dyn Dispatcher>,
    pub encoder: Arc<dyn EncodingProvider>,
    pub authenticity: Arc<AuthenticityChain>,
    pub safety: Arc<SafetyChain>,
    /// Realtime channel; absent in environments without one attached
    pub realtime: Option<Arc<RealtimeChannel>>,
    /// Push provider; absent when unconfigured
    pub push: Option<Arc<dyn PushProvider>>,
    pub mailer: Arc<dyn Mailer>,
}

impl PipelineContext {
    /// Rate limiter for re-moderation attempts, over the cache collaborator.
    pub fn moderation_rate_limiter(&self) -> ModerationRateLimiter {
        ModerationRateLimiter::new(Arc::clone(&self.cache), self.config.remoderation_window)
    }
}
