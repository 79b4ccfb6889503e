//! Enqueue seam used by workers.
//!
//! Handlers schedule follow-up jobs through `Dispatcher` rather than a
//! concrete broker, mirroring how the rest of the pipeline consumes its
//! collaborators at an interface boundary.

use async_trait::async_trait;
use std::sync::Mutex;

use veri_models::JobId;

use crate::error::QueueResult;
use crate::job::{EnqueueOptions, PipelineJob};
use crate::registry::QueueRegistry;

/// Schedules a payload onto a named queue.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn enqueue(
        &self,
        queue: &str,
        payload: PipelineJob,
        options: EnqueueOptions,
    ) -> QueueResult<JobId>;
}

#[async_trait]
impl Dispatcher for QueueRegistry {
    async fn enqueue(
        &self,
        queue: &str,
        payload: PipelineJob,
        options: EnqueueOptions,
    ) -> QueueResult<JobId> {
        self.queue(queue).await?.enqueue(payload, options).await
    }
}

/// Records enqueues instead of delivering them. Test double.
#[derive(Default)]
pub struct MemoryDispatcher {
    enqueued: Mutex<Vec<(String, PipelineJob, EnqueueOptions)>>,
}

impl MemoryDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything enqueued so far, in order.
    pub fn drain(&self) -> Vec<(String, PipelineJob, EnqueueOptions)> {
        std::mem::take(&mut *self.enqueued.lock().unwrap())
    }

    /// Enqueued payloads for one queue.
    pub fn jobs_for(&self, queue: &str) -> Vec<PipelineJob> {
        self.enqueued
            .lock()
            .unwrap()
            .iter()
            .filter(|(q, _, _)| q == queue)
            .map(|(_, j, _)| j.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.enqueued.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Dispatcher for MemoryDispatcher {
    async fn enqueue(
        &self,
        queue: &str,
        payload: PipelineJob,
        options: EnqueueOptions,
    ) -> QueueResult<JobId> {
        let id = JobId::new();
        self.enqueued
            .lock()
            .unwrap()
            .push((queue.to_string(), payload, options));
        Ok(id)
    }
}
