//! Explicit queue registry.
//!
//! One registry is constructed at process start and passed by reference to
//! every worker; there is no ambient global queue map.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::error::{QueueError, QueueResult};
use crate::queue::{JobQueue, QueueConfig};

/// Registry of named queues sharing one Redis client and policy.
pub struct QueueRegistry {
    client: redis::Client,
    config: QueueConfig,
    queues: RwLock<HashMap<String, Arc<JobQueue>>>,
    closed: RwLock<bool>,
}

impl QueueRegistry {
    /// Create a registry from config.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self {
            client,
            config,
            queues: RwLock::new(HashMap::new()),
            closed: RwLock::new(false),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    /// Get or create the queue with the given name.
    ///
    /// Idempotent: repeated calls for the same name return the same handle.
    pub async fn queue(&self, name: &str) -> QueueResult<Arc<JobQueue>> {
        if *self.closed.read().await {
            return Err(QueueError::RegistryClosed);
        }

        if let Some(q) = self.queues.read().await.get(name) {
            return Ok(Arc::clone(q));
        }

        let mut queues = self.queues.write().await;
        // Re-check under the write lock; another task may have created it
        if let Some(q) = queues.get(name) {
            return Ok(Arc::clone(q));
        }

        let queue = Arc::new(JobQueue::new(
            self.client.clone(),
            name,
            self.config.clone(),
        ));
        queue.init().await?;
        queues.insert(name.to_string(), Arc::clone(&queue));
        info!(queue = name, "Registered queue");
        Ok(queue)
    }

    /// Names of the queues registered so far.
    pub async fn names(&self) -> Vec<String> {
        self.queues.read().await.keys().cloned().collect()
    }

    /// Drop every handle and refuse further lookups.
    ///
    /// Connections are multiplexed per call, so dropping the handles is the
    /// drain; in-flight operations finish on their own connections.
    pub async fn close_all(&self) {
        let mut closed = self.closed.write().await;
        *closed = true;
        let mut queues = self.queues.write().await;
        let count = queues.len();
        queues.clear();
        info!(count, "Closed all queues");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_registry() -> QueueRegistry {
        QueueRegistry::new(QueueConfig::default()).expect("registry")
    }

    #[tokio::test]
    async fn closed_registry_refuses_lookups() {
        let registry = test_registry();
        registry.close_all().await;

        match registry.queue("anything").await {
            Err(QueueError::RegistryClosed) => {}
            other => panic!("expected RegistryClosed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn names_is_empty_before_first_queue() {
        let registry = test_registry();
        assert!(registry.names().await.is_empty());
    }
}
