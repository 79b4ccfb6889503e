//! Pipeline orchestrator: starts every worker pool and owns shutdown.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use veri_queue::{queues, QueueRegistry};

use crate::analytics::{spawn_rollup_loop, AnalyticsWorker};
use crate::context::PipelineContext;
use crate::error::WorkerResult;
use crate::executor::{JobHandler, PoolConfig, WorkerPool};
use crate::ingest::IngestWorker;
use crate::moderation::ModerationWorker;
use crate::notification::{EmailWorker, NotificationWorker};

/// All worker pools plus the rollup pass, started and stopped as a unit.
pub struct Pipeline {
    pools: Vec<Arc<WorkerPool>>,
    pool_handles: Vec<JoinHandle<()>>,
    rollup_shutdown: tokio::sync::watch::Sender<bool>,
    rollup_handle: JoinHandle<()>,
    registry: Arc<QueueRegistry>,
}

impl Pipeline {
    /// Start every worker pool and the analytics rollup.
    pub async fn start(
        ctx: Arc<PipelineContext>,
        registry: Arc<QueueRegistry>,
    ) -> WorkerResult<Self> {
        let cfg = &ctx.config;
        let specs: Vec<(&str, Arc<dyn JobHandler>, usize)> = vec![
            (
                queues::INGEST,
                Arc::new(IngestWorker::new(Arc::clone(&ctx))),
                cfg.ingest_concurrency,
            ),
            (
                queues::MODERATION,
                Arc::new(ModerationWorker::new(Arc::clone(&ctx))),
                cfg.moderation_concurrency,
            ),
            (
                queues::ANALYTICS,
                Arc::new(AnalyticsWorker::new(Arc::clone(&ctx))),
                cfg.analytics_concurrency,
            ),
            (
                queues::NOTIFICATIONS,
                Arc::new(NotificationWorker::new(Arc::clone(&ctx))),
                cfg.notification_concurrency,
            ),
            (
                queues::EMAIL,
                Arc::new(EmailWorker::new(Arc::clone(&ctx))),
                cfg.email_concurrency,
            ),
        ];

        let mut pools = Vec::with_capacity(specs.len());
        let mut pool_handles = Vec::with_capacity(specs.len());

        for (queue_name, handler, concurrency) in specs {
            let queue = registry.queue(queue_name).await?;
            let pool = Arc::new(WorkerPool::new(
                queue,
                handler,
                PoolConfig {
                    concurrency,
                    block_ms: cfg.block_ms,
                    promote_interval: cfg.promote_interval,
                    claim_interval: cfg.claim_interval,
                    claim_min_idle: cfg.claim_min_idle,
                    shutdown_timeout: cfg.shutdown_timeout,
                },
            ));

            let runner = Arc::clone(&pool);
            pool_handles.push(tokio::spawn(async move {
                if let Err(e) = runner.run().await {
                    error!(queue = queue_name, "Worker pool exited with error: {}", e);
                }
            }));
            pools.push(pool);
        }

        let (rollup_shutdown, rollup_rx) = tokio::sync::watch::channel(false);
        let rollup_handle = spawn_rollup_loop(Arc::clone(&ctx), rollup_rx);

        info!(pools = pools.len(), "Pipeline started");
        Ok(Self {
            pools,
            pool_handles,
            rollup_shutdown,
            rollup_handle,
            registry,
        })
    }

    /// Cooperative shutdown: stop consuming, drain in-flight jobs, close
    /// the queues.
    pub async fn shutdown(self) {
        info!("Shutting down pipeline");

        for pool in &self.pools {
            pool.shutdown();
        }
        let _ = self.rollup_shutdown.send(true);

        for handle in self.pool_handles {
            handle.await.ok();
        }
        self.rollup_handle.await.ok();

        self.registry.close_all().await;
        info!("Pipeline shutdown complete");
    }

    /// Block until a termination signal, then shut down.
    pub async fn run_until_signal(self) -> WorkerResult<()> {
        wait_for_signal().await;
        info!("Received shutdown signal");
        self.shutdown().await;
        Ok(())
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            tokio::signal::ctrl_c().await.ok();
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    tokio::signal::ctrl_c().await.ok();
}
