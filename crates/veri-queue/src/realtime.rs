//! Realtime events via Redis Pub/Sub.

use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::debug;

use veri_models::Notification;

use crate::error::QueueResult;

/// Event published to a user's realtime channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeEvent {
    /// Recipient user
    pub user_id: String,
    /// The notification being pushed
    pub notification: Notification,
}

/// Channel for publishing/subscribing to per-user realtime events.
pub struct RealtimeChannel {
    client: redis::Client,
}

impl RealtimeChannel {
    /// Create a new realtime channel.
    pub fn new(redis_url: &str) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// Get the channel name for a user.
    pub fn channel_name(user_id: &str) -> String {
        format!("veri:events:{}", user_id)
    }

    /// Publish an event to the user's channel.
    pub async fn publish(&self, event: &RealtimeEvent) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let channel = Self::channel_name(&event.user_id);
        let payload = serde_json::to_string(event)?;

        debug!("Publishing realtime event to {}", channel);
        conn.publish::<_, _, ()>(channel, payload).await?;

        Ok(())
    }

    /// Publish a notification to its recipient.
    pub async fn notify(&self, notification: &Notification) -> QueueResult<()> {
        self.publish(&RealtimeEvent {
            user_id: notification.user_id.clone(),
            notification: notification.clone(),
        })
        .await
    }

    /// Subscribe to a user's events.
    /// Returns a pinned stream that can be polled with `.next()`.
    pub async fn subscribe(
        &self,
        user_id: &str,
    ) -> QueueResult<std::pin::Pin<Box<dyn futures_util::Stream<Item = RealtimeEvent> + Send>>>
    {
        use futures_util::StreamExt;

        let mut pubsub = self.client.get_async_pubsub().await?;
        let channel = Self::channel_name(user_id);

        pubsub.subscribe(&channel).await?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = msg.get_payload().ok()?;
            serde_json::from_str(&payload).ok()
        });

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_name_format() {
        assert_eq!(RealtimeChannel::channel_name("u42"), "veri:events:u42");
    }
}
