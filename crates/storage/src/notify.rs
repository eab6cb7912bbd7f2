//! Announcements of newly stored catalog entries.

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use tracing::{debug, info};

use stac_common::{StacError, StacResult};

/// Fire-and-forget publisher.
///
/// Callers treat failures as best-effort: they are logged, never retried and
/// never roll back the write that triggered them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, topic: &str, message: &str) -> StacResult<()>;
}

/// Publishes over Redis pub/sub.
pub struct RedisNotifier {
    conn: MultiplexedConnection,
}

impl RedisNotifier {
    /// Connect to Redis.
    pub async fn connect(redis_url: &str) -> StacResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| StacError::InternalError(format!("Redis connection failed: {}", e)))?;

        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StacError::InternalError(format!("Redis connection failed: {}", e)))?;

        info!(url = %redis_url, "Connected notifier to Redis");
        Ok(Self { conn })
    }
}

#[async_trait]
impl Notifier for RedisNotifier {
    async fn publish(&self, topic: &str, message: &str) -> StacResult<()> {
        let mut conn = self.conn.clone();
        let receivers: i64 = conn
            .publish(topic, message)
            .await
            .map_err(|e| StacError::PublishError {
                topic: topic.to_string(),
                message: e.to_string(),
            })?;

        debug!(topic = %topic, receivers, "Published notification");
        Ok(())
    }
}

/// Drops every message. Used when no notification channel is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn publish(&self, topic: &str, message: &str) -> StacResult<()> {
        debug!(topic = %topic, size = message.len(), "Notification channel disabled, dropping");
        Ok(())
    }
}
