//! Push-notification provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

/// Push dispatch collaborator. Optional: the notification worker only
/// attempts a dispatch when a provider is configured.
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Deliver a push message to a user's registered devices.
    async fn dispatch(&self, user_id: &str, title: &str, body: &str) -> ProviderResult<()>;
}

#[derive(Serialize)]
struct PushPayload<'a> {
    user_id: &'a str,
    title: &'a str,
    body: &'a str,
}

/// HTTP push provider.
pub struct HttpPushProvider {
    http: Client,
    base_url: String,
    api_key: String,
}

impl HttpPushProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(ProviderError::Network)?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Build from environment; `None` when no provider is configured.
    pub fn from_env() -> ProviderResult<Option<Self>> {
        match std::env::var("PUSH_PROVIDER_URL") {
            Ok(url) if !url.is_empty() => {
                let key = std::env::var("PUSH_PROVIDER_KEY").unwrap_or_default();
                Ok(Some(Self::new(url, key)?))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl PushProvider for HttpPushProvider {
    async fn dispatch(&self, user_id: &str, title: &str, body: &str) -> ProviderResult<()> {
        let url = format!("{}/v1/push", self.base_url);
        debug!(user_id, "Dispatching push notification");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&PushPayload {
                user_id,
                title,
                body,
            })
            .send()
            .await
            .map_err(ProviderError::Network)?;

        if !response.status().is_success() {
            return Err(ProviderError::request_failed(format!(
                "Push provider returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn dispatch_posts_to_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/push"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpPushProvider::new(server.uri(), "key").unwrap();
        provider.dispatch("u1", "Video live", "Your upload passed review").await.unwrap();
    }
}
