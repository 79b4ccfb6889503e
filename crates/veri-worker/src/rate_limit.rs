//! Per-asset moderation rate limit.
//!
//! One moderation attempt per asset per window, enforced through the cache
//! collaborator with a set-if-absent lock. A successful attempt leaves the
//! lock to expire with the window; a failed attempt releases it so the
//! broker's retry is not starved.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use veri_models::AssetId;
use veri_store::Cache;

use crate::error::WorkerResult;

/// Time-boxed rate-limit key per asset.
pub struct ModerationRateLimiter {
    cache: Arc<dyn Cache>,
    window: Duration,
}

impl ModerationRateLimiter {
    pub fn new(cache: Arc<dyn Cache>, window: Duration) -> Self {
        Self { cache, window }
    }

    fn key(asset_id: &AssetId) -> String {
        format!("veri:modlock:{}", asset_id)
    }

    /// Try to claim the moderation slot for an asset.
    ///
    /// Returns `false` when another attempt ran inside the window.
    pub async fn try_acquire(&self, asset_id: &AssetId) -> WorkerResult<bool> {
        let acquired = self
            .cache
            .set_nx(&Self::key(asset_id), "1", self.window)
            .await?;
        debug!(asset_id = %asset_id, acquired, "Moderation rate-limit check");
        Ok(acquired)
    }

    /// Release the slot early (failed attempt; the retry must get through).
    pub async fn release(&self, asset_id: &AssetId) -> WorkerResult<()> {
        self.cache.delete(&Self::key(asset_id)).await?;
        Ok(())
    }
}
