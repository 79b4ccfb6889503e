//! Content asset models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::AssetId;

/// Publication status of a content asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    /// Uploaded but not yet in the pipeline (or sent back after rejection/failure)
    #[default]
    Draft,
    /// Encoding finished, moderation in flight
    Processing,
    /// Approved and publicly visible
    Published,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Draft => "draft",
            AssetStatus::Processing => "processing",
            AssetStatus::Published => "published",
        }
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A creator-uploaded video asset moving through the pipeline.
///
/// Created as `Draft` when the upload is registered; the ingest worker
/// advances it to `Processing`, the moderation worker resolves it to
/// `Published` or back to `Draft`. The pipeline never deletes assets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentAsset {
    /// Unique asset ID
    pub id: AssetId,

    /// Creator (owner) user ID
    pub creator_id: String,

    /// Asset ID at the external encoding provider
    pub encoding_asset_id: String,

    /// Playback identifier, available once encoding is ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback_id: Option<String>,

    /// Duration in seconds, available once encoding is ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,

    /// Publication status
    #[serde(default)]
    pub status: AssetStatus,

    /// Fraction of frames classified AI-generated, set by moderation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authenticity_ratio: Option<f64>,

    /// Moderation verdict, set by moderation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_approved: Option<bool>,

    /// Publication timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ContentAsset {
    /// Create a new draft asset for a registered upload.
    pub fn new(
        id: AssetId,
        creator_id: impl Into<String>,
        encoding_asset_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            creator_id: creator_id.into(),
            encoding_asset_id: encoding_asset_id.into(),
            playback_id: None,
            duration_secs: None,
            status: AssetStatus::Draft,
            authenticity_ratio: None,
            is_approved: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record encoder output and move into the moderation stage.
    pub fn begin_processing(mut self, playback_id: impl Into<String>, duration_secs: f64) -> Self {
        self.playback_id = Some(playback_id.into());
        self.duration_secs = Some(duration_secs);
        self.status = AssetStatus::Processing;
        self.updated_at = Utc::now();
        self
    }

    /// Publish an approved asset.
    pub fn publish(mut self, authenticity_ratio: f64) -> Self {
        self.authenticity_ratio = Some(authenticity_ratio);
        self.is_approved = Some(true);
        self.status = AssetStatus::Published;
        self.published_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }

    /// Send a rejected asset back to draft.
    pub fn reject(mut self, authenticity_ratio: f64) -> Self {
        self.authenticity_ratio = Some(authenticity_ratio);
        self.is_approved = Some(false);
        self.status = AssetStatus::Draft;
        self.updated_at = Utc::now();
        self
    }
}
