//! Worker configuration.

use std::time::Duration;

use veri_models::SafetyCategory;

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Approval thresholds for the moderation decision.
#[derive(Debug, Clone)]
pub struct Thresholds {
    /// Minimum AI-generated frame ratio required for approval
    pub authenticity: f64,
    /// Per-category safety ceilings; a score above its ceiling rejects
    pub explicit: f64,
    pub violence: f64,
    pub hate: f64,
    pub self_harm: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            authenticity: 0.3,
            explicit: 0.8,
            violence: 0.8,
            hate: 0.8,
            self_harm: 0.8,
        }
    }
}

impl Thresholds {
    /// Create thresholds from environment variables.
    pub fn from_env() -> Self {
        Self {
            authenticity: env_parse("AUTHENTICITY_THRESHOLD", 0.3),
            explicit: env_parse("SAFETY_THRESHOLD_EXPLICIT", 0.8),
            violence: env_parse("SAFETY_THRESHOLD_VIOLENCE", 0.8),
            hate: env_parse("SAFETY_THRESHOLD_HATE", 0.8),
            self_harm: env_parse("SAFETY_THRESHOLD_SELF_HARM", 0.8),
        }
    }

    /// Ceiling for a category.
    pub fn safety_ceiling(&self, category: SafetyCategory) -> f64 {
        match category {
            SafetyCategory::Explicit => self.explicit,
            SafetyCategory::Violence => self.violence,
            SafetyCategory::Hate => self.hate,
            SafetyCategory::SelfHarm => self.self_harm,
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Concurrent ingest jobs
    pub ingest_concurrency: usize,
    /// Concurrent moderation jobs (externally rate-limited, keep small)
    pub moderation_concurrency: usize,
    /// Concurrent analytics event jobs
    pub analytics_concurrency: usize,
    /// Concurrent notification jobs
    pub notification_concurrency: usize,
    /// Concurrent email dispatch jobs
    pub email_concurrency: usize,
    /// How long a consume call blocks on an empty stream
    pub block_ms: u64,
    /// How often each pool promotes due delayed jobs
    pub promote_interval: Duration,
    /// How often a pool scans for orphaned pending jobs
    pub claim_interval: Duration,
    /// Minimum idle time before a pending job can be claimed (crash recovery)
    pub claim_min_idle: Duration,
    /// Graceful shutdown drain timeout
    pub shutdown_timeout: Duration,
    /// Delay between encoder polls while an asset is still processing
    pub encoder_poll_delay: Duration,
    /// Encoder polls allowed before the ingest is treated as failed
    pub encoder_poll_limit: u32,
    /// Base URL frames are sampled from
    pub frame_url_base: String,
    /// Delay before a queued notification email is sent
    pub email_delay: Duration,
    /// One moderation attempt per asset per this window
    pub remoderation_window: Duration,
    /// Interval between analytics rollup passes
    pub rollup_interval: Duration,
    /// Revenue per thousand views
    pub revenue_per_mille: f64,
    /// Moderation decision thresholds
    pub thresholds: Thresholds,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            ingest_concurrency: 5,
            moderation_concurrency: 3,
            analytics_concurrency: 10,
            notification_concurrency: 20,
            email_concurrency: 5,
            block_ms: 1_000,
            promote_interval: Duration::from_secs(1),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(300),
            shutdown_timeout: Duration::from_secs(30),
            encoder_poll_delay: Duration::from_secs(10),
            encoder_poll_limit: 90,
            frame_url_base: "https://frames.veristream.example".to_string(),
            email_delay: Duration::from_secs(5),
            remoderation_window: Duration::from_secs(3_600),
            rollup_interval: Duration::from_secs(3_600),
            revenue_per_mille: 2.0,
            thresholds: Thresholds::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ingest_concurrency: env_parse("WORKER_INGEST_CONCURRENCY", defaults.ingest_concurrency),
            moderation_concurrency: env_parse(
                "WORKER_MODERATION_CONCURRENCY",
                defaults.moderation_concurrency,
            ),
            analytics_concurrency: env_parse(
                "WORKER_ANALYTICS_CONCURRENCY",
                defaults.analytics_concurrency,
            ),
            notification_concurrency: env_parse(
                "WORKER_NOTIFICATION_CONCURRENCY",
                defaults.notification_concurrency,
            ),
            email_concurrency: env_parse("WORKER_EMAIL_CONCURRENCY", defaults.email_concurrency),
            block_ms: env_parse("WORKER_BLOCK_MS", defaults.block_ms),
            promote_interval: Duration::from_millis(env_parse(
                "WORKER_PROMOTE_INTERVAL_MS",
                defaults.promote_interval.as_millis() as u64,
            )),
            claim_interval: Duration::from_secs(env_parse(
                "WORKER_CLAIM_INTERVAL_SECS",
                defaults.claim_interval.as_secs(),
            )),
            claim_min_idle: Duration::from_secs(env_parse(
                "WORKER_CLAIM_MIN_IDLE_SECS",
                defaults.claim_min_idle.as_secs(),
            )),
            shutdown_timeout: Duration::from_secs(env_parse(
                "WORKER_SHUTDOWN_TIMEOUT",
                defaults.shutdown_timeout.as_secs(),
            )),
            encoder_poll_delay: Duration::from_secs(env_parse(
                "INGEST_POLL_DELAY_SECS",
                defaults.encoder_poll_delay.as_secs(),
            )),
            encoder_poll_limit: env_parse("INGEST_POLL_LIMIT", defaults.encoder_poll_limit),
            frame_url_base: std::env::var("FRAME_URL_BASE")
                .unwrap_or(defaults.frame_url_base),
            email_delay: Duration::from_secs(env_parse(
                "NOTIFICATION_EMAIL_DELAY_SECS",
                defaults.email_delay.as_secs(),
            )),
            remoderation_window: Duration::from_secs(env_parse(
                "REMODERATION_WINDOW_SECS",
                defaults.remoderation_window.as_secs(),
            )),
            rollup_interval: Duration::from_secs(env_parse(
                "ANALYTICS_ROLLUP_INTERVAL_SECS",
                defaults.rollup_interval.as_secs(),
            )),
            revenue_per_mille: env_parse("ANALYTICS_RPM", defaults.revenue_per_mille),
            thresholds: Thresholds::from_env(),
        }
    }
}
