//! The key-value cache collaborator.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};

/// Generic get/set/delete cache with TTLs.
///
/// The pipeline uses it for the re-moderation rate limit and transient
/// upload metadata.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch a value.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store a value, optionally expiring.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    /// Store a value only if the key is absent. Returns whether it was set.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool>;

    /// Remove a key.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// Redis-backed `Cache`.
pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    pub fn new(redis_url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::write_failed(format!("Redis client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        match ttl {
            Some(t) => {
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("EX")
                    .arg(t.as_secs().max(1))
                    .query_async::<()>(&mut conn)
                    .await?;
            }
            None => {
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .query_async::<()>(&mut conn)
                    .await?;
            }
        }
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        // SET key value NX EX ttl; returns OK if set, nil if the key exists
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;

        Ok(result.is_some())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("DEL").arg(key).query_async::<()>(&mut conn).await?;
        Ok(())
    }
}
