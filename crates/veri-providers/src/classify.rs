//! Classification providers: AI-authenticity detection and safety scoring.
//!
//! Providers are strategy implementations behind the two classifier traits.
//! A chain tries each configured provider in priority order and ends in the
//! deterministic mock, so classification always completes even with no
//! external service configured.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use veri_models::{FrameClass, FrameRef, SafetyScores};

use crate::error::{ProviderError, ProviderResult};
use crate::mock::MockClassifier;

/// AI-authenticity detection over a batch of frames.
#[async_trait]
pub trait AuthenticityClassifier: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Classify each frame; the result is index-aligned with the input.
    async fn detect(&self, frames: &[FrameRef]) -> ProviderResult<Vec<FrameClass>>;
}

/// Content-safety scoring over a batch of frames.
#[async_trait]
pub trait SafetyClassifier: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Score each frame; the result is index-aligned with the input.
    async fn score(&self, frames: &[FrameRef]) -> ProviderResult<Vec<SafetyScores>>;
}

/// Configuration for the classification stack.
#[derive(Debug, Clone, Default)]
pub struct ClassifyConfig {
    /// Authenticity provider base URLs, highest priority first
    pub authenticity_urls: Vec<String>,
    /// Safety provider base URLs, highest priority first
    pub safety_urls: Vec<String>,
    /// API key sent to every provider
    pub api_key: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries per provider call
    pub max_retries: u32,
}

impl ClassifyConfig {
    /// Create config from environment variables.
    ///
    /// Provider URL lists are comma-separated; empty means mock-only.
    pub fn from_env() -> Self {
        Self {
            authenticity_urls: parse_urls(std::env::var("AUTHENTICITY_PROVIDER_URLS").ok()),
            safety_urls: parse_urls(std::env::var("SAFETY_PROVIDER_URLS").ok()),
            api_key: std::env::var("CLASSIFY_API_KEY").unwrap_or_default(),
            timeout: Duration::from_secs(
                std::env::var("CLASSIFY_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            max_retries: std::env::var("CLASSIFY_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),
        }
    }
}

fn parse_urls(raw: Option<String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    frames: Vec<&'a str>,
}

#[derive(Deserialize)]
struct DetectResponse {
    results: Vec<FrameClass>,
}

#[derive(Deserialize)]
struct ScoreResponse {
    results: Vec<SafetyScores>,
}

/// HTTP classification provider speaking the batch classify protocol.
pub struct HttpClassifier {
    name: String,
    http: Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

impl HttpClassifier {
    pub fn new(base_url: impl Into<String>, config: &ClassifyConfig) -> ProviderResult<Self> {
        let base_url = base_url.into();
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ProviderError::Network)?;

        Ok(Self {
            name: format!("http:{}", base_url),
            http,
            base_url,
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
        })
    }

    async fn post_batch<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        frames: &[FrameRef],
    ) -> ProviderResult<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        let request = ClassifyRequest {
            frames: frames.iter().map(|f| f.url.as_str()).collect(),
        };

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            let result = async {
                let response = self
                    .http
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&request)
                    .send()
                    .await
                    .map_err(ProviderError::Network)?;

                if !response.status().is_success() {
                    let status = response.status();
                    return Err(ProviderError::request_failed(format!(
                        "{} returned {}",
                        url, status
                    )));
                }

                response
                    .json::<T>()
                    .await
                    .map_err(|e| ProviderError::invalid_response(e.to_string()))
            }
            .await;

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        provider = %self.name,
                        "Classify request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(ProviderError::request_failed("Unknown error")))
    }
}

#[async_trait]
impl AuthenticityClassifier for HttpClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn detect(&self, frames: &[FrameRef]) -> ProviderResult<Vec<FrameClass>> {
        let response: DetectResponse = self.post_batch("/v1/detect", frames).await?;
        if response.results.len() != frames.len() {
            return Err(ProviderError::invalid_response(format!(
                "expected {} results, got {}",
                frames.len(),
                response.results.len()
            )));
        }
        Ok(response.results)
    }
}

#[async_trait]
impl SafetyClassifier for HttpClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score(&self, frames: &[FrameRef]) -> ProviderResult<Vec<SafetyScores>> {
        let response: ScoreResponse = self.post_batch("/v1/moderate", frames).await?;
        if response.results.len() != frames.len() {
            return Err(ProviderError::invalid_response(format!(
                "expected {} results, got {}",
                frames.len(),
                response.results.len()
            )));
        }
        Ok(response.results)
    }
}

/// Priority-ordered authenticity providers ending in the mock.
pub struct AuthenticityChain {
    providers: Vec<Arc<dyn AuthenticityClassifier>>,
}

impl AuthenticityChain {
    /// Build the chain from configuration. Pure: the provider list is a
    /// function of config, nothing is discovered at runtime.
    pub fn from_config(config: &ClassifyConfig) -> Self {
        let mut providers: Vec<Arc<dyn AuthenticityClassifier>> = Vec::new();
        for url in &config.authenticity_urls {
            match HttpClassifier::new(url.clone(), config) {
                Ok(p) => providers.push(Arc::new(p)),
                Err(e) => warn!("Skipping authenticity provider {}: {}", url, e),
            }
        }
        providers.push(Arc::new(MockClassifier::new()));
        Self { providers }
    }

    /// Chain over explicit providers (the mock is appended).
    pub fn with_providers(mut providers: Vec<Arc<dyn AuthenticityClassifier>>) -> Self {
        providers.push(Arc::new(MockClassifier::new()));
        Self { providers }
    }

    /// Classify with the first provider that answers.
    pub async fn detect(&self, frames: &[FrameRef]) -> ProviderResult<Vec<FrameClass>> {
        let mut last_error = None;
        for provider in &self.providers {
            match provider.detect(frames).await {
                Ok(results) => {
                    debug!(provider = provider.name(), "Authenticity classification done");
                    return Ok(results);
                }
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        "Authenticity provider failed, falling through: {}", e
                    );
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(ProviderError::unavailable("no providers configured")))
    }
}

/// Priority-ordered safety providers ending in the mock.
pub struct SafetyChain {
    providers: Vec<Arc<dyn SafetyClassifier>>,
}

impl SafetyChain {
    /// Build the chain from configuration.
    pub fn from_config(config: &ClassifyConfig) -> Self {
        let mut providers: Vec<Arc<dyn SafetyClassifier>> = Vec::new();
        for url in &config.safety_urls {
            match HttpClassifier::new(url.clone(), config) {
                Ok(p) => providers.push(Arc::new(p)),
                Err(e) => warn!("Skipping safety provider {}: {}", url, e),
            }
        }
        providers.push(Arc::new(MockClassifier::new()));
        Self { providers }
    }

    /// Chain over explicit providers (the mock is appended).
    pub fn with_providers(mut providers: Vec<Arc<dyn SafetyClassifier>>) -> Self {
        providers.push(Arc::new(MockClassifier::new()));
        Self { providers }
    }

    /// Score with the first provider that answers.
    pub async fn score(&self, frames: &[FrameRef]) -> ProviderResult<Vec<SafetyScores>> {
        let mut last_error = None;
        for provider in &self.providers {
            match provider.score(frames).await {
                Ok(results) => {
                    debug!(provider = provider.name(), "Safety scoring done");
                    return Ok(results);
                }
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        "Safety provider failed, falling through: {}", e
                    );
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(ProviderError::unavailable("no providers configured")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn frames(n: usize) -> Vec<FrameRef> {
        (0..n)
            .map(|i| FrameRef::new(i, format!("https://frames.example/f{i}.jpg")))
            .collect()
    }

    #[test]
    fn parse_urls_splits_and_trims() {
        let urls = parse_urls(Some("https://a.example, https://b.example ,".to_string()));
        assert_eq!(urls, vec!["https://a.example", "https://b.example"]);
    }

    #[tokio::test]
    async fn empty_config_falls_back_to_mock() {
        let chain = AuthenticityChain::from_config(&ClassifyConfig::default());
        let results = chain.detect(&frames(4)).await.unwrap();
        assert_eq!(results.len(), 4);
    }

    #[tokio::test]
    async fn failing_provider_falls_through_to_mock() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/detect"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let config = ClassifyConfig {
            authenticity_urls: vec![server.uri()],
            max_retries: 0,
            timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let chain = AuthenticityChain::from_config(&config);

        let results = chain.detect(&frames(3)).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn http_provider_result_is_used_when_healthy() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/moderate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"explicit": 0.1, "violence": 0.9, "hate": 0.0, "self_harm": 0.0}
                ]
            })))
            .mount(&server)
            .await;

        let config = ClassifyConfig {
            safety_urls: vec![server.uri()],
            timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let chain = SafetyChain::from_config(&config);

        let results = chain.score(&frames(1)).await.unwrap();
        assert_eq!(results[0].violence, 0.9);
    }

    #[tokio::test]
    async fn length_mismatch_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/detect"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": []
            })))
            .mount(&server)
            .await;

        let config = ClassifyConfig {
            timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let provider = HttpClassifier::new(server.uri(), &config).unwrap();

        assert!(provider.detect(&frames(2)).await.is_err());
    }
}
