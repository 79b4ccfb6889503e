//! Content pipeline worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use veri_providers::{
    AuthenticityChain, ClassifyConfig, HttpEncodingProvider, HttpMailer, HttpPushProvider,
    Mailer, NoopMailer, PushProvider, SafetyChain,
};
use veri_queue::{QueueConfig, QueueRegistry, RealtimeChannel};
use veri_store::{MemoryStore, RedisCache};
use veri_worker::{Pipeline, PipelineContext, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("veri=info".parse().unwrap())
        .add_directive("hyper=warn".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting veri-worker");

    if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new().install() {
        error!("Failed to install Prometheus exporter: {}", e);
    }

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let queue_config = QueueConfig::from_env();
    let redis_url = queue_config.redis_url.clone();

    let registry = match QueueRegistry::new(queue_config) {
        Ok(r) => Arc::new(r),
        Err(e) => {
            error!("Failed to create queue registry: {}", e);
            std::process::exit(1);
        }
    };

    let cache = match RedisCache::new(&redis_url) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Failed to create cache: {}", e);
            std::process::exit(1);
        }
    };

    let encoder = match HttpEncodingProvider::from_env() {
        Ok(p) => Arc::new(p),
        Err(e) => {
            error!("Failed to create encoder client: {}", e);
            std::process::exit(1);
        }
    };

    let classify_config = ClassifyConfig::from_env();
    let authenticity = Arc::new(AuthenticityChain::from_config(&classify_config));
    let safety = Arc::new(SafetyChain::from_config(&classify_config));

    let realtime = match RealtimeChannel::new(&redis_url) {
        Ok(c) => Some(Arc::new(c)),
        Err(e) => {
            error!("Realtime channel unavailable, continuing without it: {}", e);
            None
        }
    };

    let push: Option<Arc<dyn PushProvider>> = match HttpPushProvider::from_env() {
        Ok(Some(p)) => Some(Arc::new(p)),
        Ok(None) => None,
        Err(e) => {
            error!("Push provider misconfigured, continuing without it: {}", e);
            None
        }
    };

    let mailer: Arc<dyn Mailer> = match HttpMailer::from_env() {
        Ok(Some(m)) => Arc::new(m),
        Ok(None) => Arc::new(NoopMailer),
        Err(e) => {
            error!("Mailer misconfigured, falling back to noop: {}", e);
            Arc::new(NoopMailer)
        }
    };

    let dispatcher: Arc<dyn veri_queue::Dispatcher> = registry.clone();
    let ctx = Arc::new(PipelineContext {
        config,
        store: Arc::new(MemoryStore::new()),
        cache,
        dispatcher,
        encoder,
        authenticity,
        safety,
        realtime,
        push,
        mailer,
    });

    let pipeline = match Pipeline::start(ctx, registry).await {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to start pipeline: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = pipeline.run_until_signal().await {
        error!("Pipeline error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
