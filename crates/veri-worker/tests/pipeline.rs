//! End-to-end pipeline scenarios over in-process collaborators.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use veri_models::{
    AssetId, AssetStatus, ContentAsset, EngagementEvent, EventKind, FrameClass, FrameRef, JobId,
    ModerationOutcome, NotificationKind, SafetyScores, SnapshotSubject,
};
use veri_providers::{
    AuthenticityChain, AuthenticityClassifier, EncoderAsset, EncoderAssetStatus,
    EncodingProvider, NoopMailer, ProviderResult, SafetyChain, SafetyClassifier,
};
use veri_queue::{
    queues, AnalyticsEventJob, IngestJob, JobEnvelope, JobStatus, MemoryDispatcher, ModerationJob,
    NotifyJob, PipelineJob,
};
use veri_store::{ContentStore, MemoryCache, MemoryStore};
use veri_worker::analytics::AnalyticsWorker;
use veri_worker::ingest::IngestWorker;
use veri_worker::moderation::ModerationWorker;
use veri_worker::notification::NotificationWorker;
use veri_worker::{JobHandler, PipelineContext, WorkerConfig};

/// Encoder stub with a fixed answer.
struct StubEncoder(EncoderAsset);

#[async_trait]
impl EncodingProvider for StubEncoder {
    async fn retrieve_asset(&self, _encoding_asset_id: &str) -> ProviderResult<EncoderAsset> {
        Ok(self.0.clone())
    }
}

/// Classifies a frame AI-generated iff its index is below the cutoff.
struct AiBelowIndex {
    cutoff: usize,
    confidence: f64,
}

#[async_trait]
impl AuthenticityClassifier for AiBelowIndex {
    fn name(&self) -> &str {
        "stub-authenticity"
    }

    async fn detect(&self, frames: &[FrameRef]) -> ProviderResult<Vec<FrameClass>> {
        Ok(frames
            .iter()
            .map(|f| FrameClass::new(f.index < self.cutoff, self.confidence))
            .collect())
    }
}

/// Returns the same safety scores for every frame.
struct FixedSafety(SafetyScores);

#[async_trait]
impl SafetyClassifier for FixedSafety {
    fn name(&self) -> &str {
        "stub-safety"
    }

    async fn score(&self, frames: &[FrameRef]) -> ProviderResult<Vec<SafetyScores>> {
        Ok(vec![self.0; frames.len()])
    }
}

struct TestHarness {
    ctx: Arc<PipelineContext>,
    store: Arc<MemoryStore>,
    dispatcher: Arc<MemoryDispatcher>,
}

fn harness(
    encoder_status: EncoderAssetStatus,
    ai_cutoff: usize,
    safety: SafetyScores,
) -> TestHarness {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = Arc::new(MemoryDispatcher::new());

    let encoder = StubEncoder(EncoderAsset {
        status: encoder_status,
        playback_ids: vec!["play_1".to_string()],
        duration_secs: Some(120.0),
        errors: vec![],
    });

    let store_dyn: Arc<dyn ContentStore> = store.clone();
    let dispatcher_dyn: Arc<dyn veri_queue::Dispatcher> = dispatcher.clone();
    let ctx = Arc::new(PipelineContext {
        config: WorkerConfig::default(),
        store: store_dyn,
        cache: Arc::new(MemoryCache::new()),
        dispatcher: dispatcher_dyn,
        encoder: Arc::new(encoder),
        authenticity: Arc::new(AuthenticityChain::with_providers(vec![Arc::new(
            AiBelowIndex {
                cutoff: ai_cutoff,
                confidence: 0.9,
            },
        )])),
        safety: Arc::new(SafetyChain::with_providers(vec![Arc::new(FixedSafety(
            safety,
        ))])),
        realtime: None,
        push: None,
        mailer: Arc::new(NoopMailer),
    });

    TestHarness {
        ctx,
        store,
        dispatcher,
    }
}

fn envelope(queue: &str, payload: PipelineJob) -> JobEnvelope {
    JobEnvelope {
        id: JobId::new(),
        queue: queue.to_string(),
        payload,
        attempts: 0,
        max_attempts: 3,
        re_delays: 0,
        backoff_base_secs: 2,
        status: JobStatus::Active,
        scheduled_at: Utc::now(),
    }
}

async fn seed_processing_asset(store: &MemoryStore, id: &str, creator: &str) {
    let asset = ContentAsset::new(AssetId::from(id), creator, "enc_1")
        .begin_processing("play_1", 120.0);
    store.put_asset(asset).await.unwrap();
}

#[tokio::test]
async fn all_ai_frames_publish_the_asset() {
    // 120s, every frame AI at 0.9, all safety clean
    let h = harness(EncoderAssetStatus::Ready, usize::MAX, SafetyScores::default());
    seed_processing_asset(&h.store, "asset_1", "creator_1").await;

    let worker = ModerationWorker::new(Arc::clone(&h.ctx));
    let job = ModerationJob::new(AssetId::from("asset_1"), "play_1", 120.0, "creator_1");
    worker
        .handle(&envelope(queues::MODERATION, PipelineJob::Moderation(job)))
        .await
        .unwrap();

    let asset = h
        .store
        .get_asset(&AssetId::from("asset_1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(asset.status, AssetStatus::Published);
    assert_eq!(asset.is_approved, Some(true));
    assert_eq!(asset.authenticity_ratio, Some(1.0));
    assert!(asset.published_at.is_some());

    let logs = h
        .store
        .moderation_logs(&AssetId::from("asset_1"))
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].outcome, ModerationOutcome::Approved);

    let notifications = h.dispatcher.jobs_for(queues::NOTIFICATIONS);
    assert_eq!(notifications.len(), 1);
    match &notifications[0] {
        PipelineJob::Notify(n) => assert_eq!(n.kind, NotificationKind::ModerationApproved),
        other => panic!("unexpected job: {other:?}"),
    }
}

#[tokio::test]
async fn low_ai_ratio_rejects_back_to_draft() {
    // 60s, ~10 of 60 frames AI: well under the 30% floor
    let h = harness(EncoderAssetStatus::Ready, 10, SafetyScores::default());
    seed_processing_asset(&h.store, "asset_1", "creator_1").await;

    let worker = ModerationWorker::new(Arc::clone(&h.ctx));
    let job = ModerationJob::new(AssetId::from("asset_1"), "play_1", 60.0, "creator_1");
    worker
        .handle(&envelope(queues::MODERATION, PipelineJob::Moderation(job)))
        .await
        .unwrap();

    let asset = h
        .store
        .get_asset(&AssetId::from("asset_1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(asset.status, AssetStatus::Draft);
    assert_eq!(asset.is_approved, Some(false));

    let logs = h
        .store
        .moderation_logs(&AssetId::from("asset_1"))
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].outcome, ModerationOutcome::Rejected);
    // the reason cites the measured percentage and the floor
    assert!(logs[0].reason.contains('%'), "reason: {}", logs[0].reason);
    assert!(
        logs[0].reason.contains("below the required 30%"),
        "reason: {}",
        logs[0].reason
    );
}

#[tokio::test]
async fn violent_frame_rejects_despite_authentic_content() {
    let safety = SafetyScores {
        violence: 0.85,
        ..Default::default()
    };
    let h = harness(EncoderAssetStatus::Ready, usize::MAX, safety);
    seed_processing_asset(&h.store, "asset_1", "creator_1").await;

    let worker = ModerationWorker::new(Arc::clone(&h.ctx));
    let job = ModerationJob::new(AssetId::from("asset_1"), "play_1", 120.0, "creator_1");
    worker
        .handle(&envelope(queues::MODERATION, PipelineJob::Moderation(job)))
        .await
        .unwrap();

    let asset = h
        .store
        .get_asset(&AssetId::from("asset_1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(asset.status, AssetStatus::Draft);

    let logs = h
        .store
        .moderation_logs(&AssetId::from("asset_1"))
        .await
        .unwrap();
    assert!(
        logs[0].reason.contains("violence"),
        "reason: {}",
        logs[0].reason
    );
}

#[tokio::test]
async fn re_moderation_within_window_is_skipped() {
    let h = harness(EncoderAssetStatus::Ready, usize::MAX, SafetyScores::default());
    seed_processing_asset(&h.store, "asset_1", "creator_1").await;

    let worker = ModerationWorker::new(Arc::clone(&h.ctx));
    let job = ModerationJob::new(AssetId::from("asset_1"), "play_1", 120.0, "creator_1");

    worker
        .handle(&envelope(queues::MODERATION, PipelineJob::Moderation(job.clone())))
        .await
        .unwrap();

    let second = worker
        .handle(&envelope(queues::MODERATION, PipelineJob::Moderation(job)))
        .await;
    assert!(matches!(
        second,
        Err(veri_worker::WorkerError::RateLimited(_))
    ));

    // one attempt, one audit entry
    let logs = h
        .store
        .moderation_logs(&AssetId::from("asset_1"))
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
}

#[tokio::test]
async fn ready_encoder_advances_asset_into_moderation() {
    let h = harness(EncoderAssetStatus::Ready, usize::MAX, SafetyScores::default());
    h.store
        .put_asset(ContentAsset::new(AssetId::from("asset_1"), "creator_1", "enc_1"))
        .await
        .unwrap();

    let worker = IngestWorker::new(Arc::clone(&h.ctx));
    let job = IngestJob::new(AssetId::from("asset_1"), "enc_1", "creator_1");
    worker
        .handle(&envelope(queues::INGEST, PipelineJob::Ingest(job)))
        .await
        .unwrap();

    let asset = h
        .store
        .get_asset(&AssetId::from("asset_1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(asset.status, AssetStatus::Processing);
    assert_eq!(asset.playback_id.as_deref(), Some("play_1"));
    assert_eq!(asset.duration_secs, Some(120.0));

    let moderation_jobs = h.dispatcher.jobs_for(queues::MODERATION);
    assert_eq!(moderation_jobs.len(), 1);

    // zeroed analytics row for today
    let snapshot = h
        .store
        .get_snapshot(
            &SnapshotSubject::Asset(AssetId::from("asset_1")),
            Utc::now().date_naive(),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.views, 0);
}

#[tokio::test]
async fn processing_encoder_re_delays_without_failing() {
    let h = harness(
        EncoderAssetStatus::Preparing,
        usize::MAX,
        SafetyScores::default(),
    );
    h.store
        .put_asset(ContentAsset::new(AssetId::from("asset_1"), "creator_1", "enc_1"))
        .await
        .unwrap();

    let worker = IngestWorker::new(Arc::clone(&h.ctx));
    let job = IngestJob::new(AssetId::from("asset_1"), "enc_1", "creator_1");
    let result = worker
        .handle(&envelope(queues::INGEST, PipelineJob::Ingest(job)))
        .await;

    let err = result.unwrap_err();
    assert!(err.is_reschedule());

    // asset untouched, nothing advanced
    let asset = h
        .store
        .get_asset(&AssetId::from("asset_1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(asset.status, AssetStatus::Draft);
    assert!(h.dispatcher.jobs_for(queues::MODERATION).is_empty());
}

#[tokio::test]
async fn poll_budget_exhaustion_is_terminal() {
    let h = harness(
        EncoderAssetStatus::Preparing,
        usize::MAX,
        SafetyScores::default(),
    );
    h.store
        .put_asset(ContentAsset::new(AssetId::from("asset_1"), "creator_1", "enc_1"))
        .await
        .unwrap();

    let worker = IngestWorker::new(Arc::clone(&h.ctx));
    let job = IngestJob::new(AssetId::from("asset_1"), "enc_1", "creator_1");
    let mut env = envelope(queues::INGEST, PipelineJob::Ingest(job));
    env.re_delays = h.ctx.config.encoder_poll_limit;

    let err = worker.handle(&env).await.unwrap_err();
    assert!(err.is_terminal());
}

#[tokio::test]
async fn errored_encoder_dead_letters_with_one_notification() {
    let h = harness(
        EncoderAssetStatus::Errored,
        usize::MAX,
        SafetyScores::default(),
    );
    h.store
        .put_asset(ContentAsset::new(AssetId::from("asset_1"), "creator_1", "enc_1"))
        .await
        .unwrap();

    let worker = IngestWorker::new(Arc::clone(&h.ctx));
    let job = IngestJob::new(AssetId::from("asset_1"), "enc_1", "creator_1");
    let env = envelope(queues::INGEST, PipelineJob::Ingest(job));

    let err = worker.handle(&env).await.unwrap_err();
    assert!(err.is_terminal());
    worker.on_dead_letter(&env, &err.to_string()).await;

    let asset = h
        .store
        .get_asset(&AssetId::from("asset_1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(asset.status, AssetStatus::Draft);

    let notifications = h.dispatcher.jobs_for(queues::NOTIFICATIONS);
    assert_eq!(notifications.len(), 1);
    match &notifications[0] {
        PipelineJob::Notify(n) => {
            assert_eq!(n.kind, NotificationKind::IngestFailed);
            assert_eq!(n.user_id, "creator_1");
        }
        other => panic!("unexpected job: {other:?}"),
    }
}

#[tokio::test]
async fn same_day_events_share_one_snapshot_row() {
    let h = harness(EncoderAssetStatus::Ready, usize::MAX, SafetyScores::default());
    let worker = AnalyticsWorker::new(Arc::clone(&h.ctx));

    for _ in 0..2 {
        let event = EngagementEvent::new(AssetId::from("asset_1"), "creator_1", EventKind::View);
        let job = AnalyticsEventJob::new(event);
        worker
            .handle(&envelope(queues::ANALYTICS, PipelineJob::AnalyticsEvent(job)))
            .await
            .unwrap();
    }

    let date = Utc::now().date_naive();
    let row = h
        .store
        .get_snapshot(&SnapshotSubject::Asset(AssetId::from("asset_1")), date)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.views, 2);
    assert_eq!(h.store.asset_snapshots_for_date(date).await.unwrap().len(), 1);
}

#[tokio::test]
async fn notification_persists_row_and_queues_delayed_email() {
    let h = harness(EncoderAssetStatus::Ready, usize::MAX, SafetyScores::default());
    let worker = NotificationWorker::new(Arc::clone(&h.ctx));

    let job = NotifyJob::new(
        "creator_1",
        NotificationKind::ModerationRejected,
        "asset_1",
        "video",
        "Rejected: AI-authenticity ratio 16.7% is below the required 30%",
    );
    worker
        .handle(&envelope(queues::NOTIFICATIONS, PipelineJob::Notify(job)))
        .await
        .unwrap();

    let rows = h.store.notifications_for_user("creator_1").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].read);

    let enqueued = h.dispatcher.drain();
    let (queue, payload, options) = &enqueued[0];
    assert_eq!(queue, queues::EMAIL);
    assert!(matches!(payload, PipelineJob::EmailSend(_)));
    assert_eq!(options.delay, Some(Duration::from_secs(5)));
}

#[tokio::test]
async fn engagement_notification_sends_no_email() {
    let h = harness(EncoderAssetStatus::Ready, usize::MAX, SafetyScores::default());
    let worker = NotificationWorker::new(Arc::clone(&h.ctx));

    let job = NotifyJob::new(
        "creator_1",
        NotificationKind::Engagement,
        "asset_1",
        "video",
        "Your video passed 1,000 views",
    );
    worker
        .handle(&envelope(queues::NOTIFICATIONS, PipelineJob::Notify(job)))
        .await
        .unwrap();

    assert_eq!(h.store.notifications_for_user("creator_1").await.unwrap().len(), 1);
    assert!(h.dispatcher.is_empty());
}

#[tokio::test]
async fn full_pipeline_flow_ingest_to_published() {
    let h = harness(EncoderAssetStatus::Ready, usize::MAX, SafetyScores::default());
    h.store
        .put_asset(ContentAsset::new(AssetId::from("asset_1"), "creator_1", "enc_1"))
        .await
        .unwrap();

    // ingest advances the asset and hands off to moderation
    let ingest = IngestWorker::new(Arc::clone(&h.ctx));
    ingest
        .handle(&envelope(
            queues::INGEST,
            PipelineJob::Ingest(IngestJob::new(AssetId::from("asset_1"), "enc_1", "creator_1")),
        ))
        .await
        .unwrap();

    let moderation_jobs = h.dispatcher.jobs_for(queues::MODERATION);
    let PipelineJob::Moderation(mod_job) = &moderation_jobs[0] else {
        panic!("expected moderation job");
    };

    // moderation publishes and notifies
    let moderation = ModerationWorker::new(Arc::clone(&h.ctx));
    moderation
        .handle(&envelope(
            queues::MODERATION,
            PipelineJob::Moderation(mod_job.clone()),
        ))
        .await
        .unwrap();

    let asset = h
        .store
        .get_asset(&AssetId::from("asset_1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(asset.status, AssetStatus::Published);

    // the published asset has a matching approved audit entry
    let logs = h
        .store
        .moderation_logs(&AssetId::from("asset_1"))
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].outcome, ModerationOutcome::Approved);

    // notification fan-out persists the outcome for the creator
    let notify_jobs = h.dispatcher.jobs_for(queues::NOTIFICATIONS);
    assert_eq!(notify_jobs.len(), 1);
    let PipelineJob::Notify(notify) = &notify_jobs[0] else {
        panic!("expected notify job");
    };
    let notifier = NotificationWorker::new(Arc::clone(&h.ctx));
    notifier
        .handle(&envelope(queues::NOTIFICATIONS, PipelineJob::Notify(notify.clone())))
        .await
        .unwrap();

    assert_eq!(h.store.notifications_for_user("creator_1").await.unwrap().len(), 1);
}
