//! Encoder/streaming provider client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};

/// Encoding state reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderAssetStatus {
    /// Still transcoding
    Preparing,
    /// Playback ready
    Ready,
    /// Transcoding failed
    Errored,
}

/// Snapshot of an asset at the encoding provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderAsset {
    pub status: EncoderAssetStatus,
    #[serde(default)]
    pub playback_ids: Vec<String>,
    #[serde(default)]
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl EncoderAsset {
    /// First playback ID, if any.
    pub fn primary_playback_id(&self) -> Option<&str> {
        self.playback_ids.first().map(String::as_str)
    }
}

/// The encoder collaborator, at its interface boundary.
#[async_trait]
pub trait EncodingProvider: Send + Sync {
    /// Fetch the current state of an asset.
    async fn retrieve_asset(&self, encoding_asset_id: &str) -> ProviderResult<EncoderAsset>;
}

/// Configuration for the HTTP encoder client.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Base URL of the encoder API
    pub base_url: String,
    /// API token
    pub api_token: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries
    pub max_retries: u32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.encoder.example".to_string(),
            api_token: String::new(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }
}

impl EncoderConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("ENCODER_API_URL")
                .unwrap_or_else(|_| "https://api.encoder.example".to_string()),
            api_token: std::env::var("ENCODER_API_TOKEN").unwrap_or_default(),
            timeout: Duration::from_secs(
                std::env::var("ENCODER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            max_retries: std::env::var("ENCODER_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        }
    }
}

/// HTTP client for the encoding provider.
pub struct HttpEncodingProvider {
    http: Client,
    config: EncoderConfig,
}

impl HttpEncodingProvider {
    /// Create a new encoder client.
    pub fn new(config: EncoderConfig) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ProviderError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Self::new(EncoderConfig::from_env())
    }

    /// Execute with bounded exponential retry.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> ProviderResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = ProviderResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "Encoder request failed (attempt {}), retrying in {:?}: {}",
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
impl EncodingProvider for HttpEncodingProvider {
    async fn retrieve_asset(&self, encoding_asset_id: &str) -> ProviderResult<EncoderAsset> {
        let url = format!("{}/video/v1/assets/{}", self.config.base_url, encoding_asset_id);

        debug!("Fetching encoder asset from {}", url);

        let response = self
            .with_retry(|| async {
                self.http
                    .get(&url)
                    .bearer_auth(&self.config.api_token)
                    .send()
                    .await
                    .map_err(ProviderError::Network)
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::request_failed(format!(
                "Encoder returned {}: {}",
                status, body
            )));
        }

        let asset: EncoderAsset = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(e.to_string()))?;
        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_config_defaults() {
        let config = EncoderConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 2);
    }

    #[tokio::test]
    async fn retrieve_asset_parses_ready_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/video/v1/assets/enc_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ready",
                "playback_ids": ["play_abc"],
                "duration_secs": 120.0,
                "errors": []
            })))
            .mount(&server)
            .await;

        let provider = HttpEncodingProvider::new(EncoderConfig {
            base_url: server.uri(),
            ..Default::default()
        })
        .unwrap();

        let asset = provider.retrieve_asset("enc_1").await.unwrap();
        assert_eq!(asset.status, EncoderAssetStatus::Ready);
        assert_eq!(asset.primary_playback_id(), Some("play_abc"));
        assert_eq!(asset.duration_secs, Some(120.0));
    }

    #[tokio::test]
    async fn retrieve_asset_surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let provider = HttpEncodingProvider::new(EncoderConfig {
            base_url: server.uri(),
            max_retries: 0,
            ..Default::default()
        })
        .unwrap();

        assert!(provider.retrieve_asset("missing").await.is_err());
    }
}
