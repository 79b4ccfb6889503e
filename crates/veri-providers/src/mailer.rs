//! Email dispatch collaborator.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

/// Sends transactional email for queued email jobs.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, user_id: &str, subject: &str, body: &str) -> ProviderResult<()>;
}

#[derive(Serialize)]
struct MailPayload<'a> {
    user_id: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// HTTP mail API client.
pub struct HttpMailer {
    http: Client,
    base_url: String,
    api_key: String,
}

impl HttpMailer {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(ProviderError::Network)?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Build from environment; falls back to `None` when unconfigured.
    pub fn from_env() -> ProviderResult<Option<Self>> {
        match std::env::var("MAIL_API_URL") {
            Ok(url) if !url.is_empty() => {
                let key = std::env::var("MAIL_API_KEY").unwrap_or_default();
                Ok(Some(Self::new(url, key)?))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, user_id: &str, subject: &str, body: &str) -> ProviderResult<()> {
        let url = format!("{}/v1/send", self.base_url);
        debug!(user_id, subject, "Sending email");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&MailPayload {
                user_id,
                subject,
                body,
            })
            .send()
            .await
            .map_err(ProviderError::Network)?;

        if !response.status().is_success() {
            return Err(ProviderError::request_failed(format!(
                "Mail API returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Logs instead of sending. Used when no mail API is configured.
#[derive(Debug, Clone, Default)]
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, user_id: &str, subject: &str, _body: &str) -> ProviderResult<()> {
        info!(user_id, subject, "Mail API not configured, skipping send");
        Ok(())
    }
}
