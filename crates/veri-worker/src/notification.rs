//! Notification worker: authoritative row plus best-effort fan-out.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use veri_models::{Notification, NotificationKind};
use veri_queue::{queues, EmailJob, EnqueueOptions, JobEnvelope, PipelineJob};

use crate::context::PipelineContext;
use crate::error::{WorkerError, WorkerResult};
use crate::executor::JobHandler;
use crate::logging::JobLogger;

/// Email/push subject line per notification kind.
fn subject_for(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::ModerationApproved => "Your video is live",
        NotificationKind::ModerationRejected => "Your video needs changes",
        NotificationKind::IngestFailed => "We couldn't process your upload",
        NotificationKind::Engagement => "Your content is getting attention",
    }
}

/// Handler for the notifications queue.
pub struct NotificationWorker {
    ctx: Arc<PipelineContext>,
}

impl NotificationWorker {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    /// Ordered best-effort extensions after the authoritative write. Each
    /// is caught independently; none can roll back the persisted row.
    async fn run_extensions(&self, notification: &Notification) {
        if let Some(realtime) = &self.ctx.realtime {
            if let Err(e) = realtime.notify(notification).await {
                warn!(
                    user_id = %notification.user_id,
                    "Realtime publish failed: {}", e
                );
            }
        }

        if notification.kind.wants_email() {
            let email = EmailJob::new(
                &notification.user_id,
                subject_for(notification.kind),
                notification.message.clone(),
            );
            if let Err(e) = self
                .ctx
                .dispatcher
                .enqueue(
                    queues::EMAIL,
                    PipelineJob::EmailSend(email),
                    EnqueueOptions::delayed(self.ctx.config.email_delay),
                )
                .await
            {
                warn!(
                    user_id = %notification.user_id,
                    "Email job enqueue failed: {}", e
                );
            }
        }

        if let Some(push) = &self.ctx.push {
            if let Err(e) = push
                .dispatch(
                    &notification.user_id,
                    subject_for(notification.kind),
                    &notification.message,
                )
                .await
            {
                warn!(
                    user_id = %notification.user_id,
                    "Push dispatch failed: {}", e
                );
            }
        }
    }
}

#[async_trait]
impl JobHandler for NotificationWorker {
    fn operation(&self) -> &'static str {
        "notification"
    }

    async fn handle(&self, envelope: &JobEnvelope) -> WorkerResult<()> {
        let PipelineJob::Notify(job) = &envelope.payload else {
            return Err(WorkerError::terminal("unexpected payload on notifications queue"));
        };
        let logger = JobLogger::new(&job.job_id, self.operation());

        let notification = Notification::new(
            &job.user_id,
            job.kind,
            &job.entity_id,
            &job.entity_type,
            &job.message,
        );

        // Source of truth first; extensions only run once this commits
        self.ctx
            .store
            .insert_notification(notification.clone())
            .await?;
        self.run_extensions(&notification).await;

        logger.log_completion(&format!(
            "Notification {} stored for {}",
            notification.kind, notification.user_id
        ));
        Ok(())
    }
}

/// Handler for the email queue.
pub struct EmailWorker {
    ctx: Arc<PipelineContext>,
}

impl EmailWorker {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl JobHandler for EmailWorker {
    fn operation(&self) -> &'static str {
        "email_send"
    }

    async fn handle(&self, envelope: &JobEnvelope) -> WorkerResult<()> {
        let PipelineJob::EmailSend(job) = &envelope.payload else {
            return Err(WorkerError::terminal("unexpected payload on email queue"));
        };

        self.ctx
            .mailer
            .send(&job.user_id, &job.subject, &job.body)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subjects_cover_every_kind() {
        assert_eq!(
            subject_for(NotificationKind::ModerationApproved),
            "Your video is live"
        );
        assert_eq!(
            subject_for(NotificationKind::IngestFailed),
            "We couldn't process your upload"
        );
    }
}
