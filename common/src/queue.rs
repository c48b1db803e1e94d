//! Redis-backed ingestion queue: `LPUSH` to enqueue, `BRPOP` to dequeue.
//! Grounded in the teacher's pre-workspace `src/redis/client.rs`
//! (`RedisClientTrait` + `RedisClient`, `get_multiplexed_async_connection`),
//! generalized from a key-value file-metadata store to a work queue.

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::error::AppError;

/// Behavior a queue client must provide; lets ingestion pipeline tests swap
/// in a fake rather than requiring a live Redis instance.
#[async_trait]
pub trait QueueClient: Send + Sync {
    async fn enqueue(&self, queue_name: &str, payload: &str) -> Result<(), AppError>;

    /// Blocks up to `timeout_secs` waiting for a payload; `Ok(None)` on
    /// timeout so the worker loop can check for shutdown between polls.
    async fn dequeue(&self, queue_name: &str, timeout_secs: u64) -> Result<Option<String>, AppError>;
}

pub struct RedisQueueClient {
    client: redis::Client,
}

impl RedisQueueClient {
    pub fn new(redis_uri: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(redis_uri)
            .map_err(|err| AppError::InternalError(format!("invalid redis uri: {err}")))?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, AppError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(AppError::from)
    }
}

#[async_trait]
impl QueueClient for RedisQueueClient {
    async fn enqueue(&self, queue_name: &str, payload: &str) -> Result<(), AppError> {
        let mut conn = self.connection().await?;
        conn.lpush::<_, _, ()>(queue_name, payload).await?;
        Ok(())
    }

    async fn dequeue(&self, queue_name: &str, timeout_secs: u64) -> Result<Option<String>, AppError> {
        let mut conn = self.connection().await?;
        let result: Option<(String, String)> = conn.brpop(queue_name, timeout_secs as f64).await?;
        Ok(result.map(|(_, payload)| payload))
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod fake {
    use super::{AppError, QueueClient};
    use async_trait::async_trait;
    use tokio::sync::Mutex;
    use std::collections::VecDeque;

    /// In-memory stand-in for `RedisQueueClient`, used by ingestion-pipeline
    /// unit tests that don't spin up a real Redis.
    #[derive(Default)]
    pub struct FakeQueueClient {
        items: Mutex<VecDeque<String>>,
    }

    #[async_trait]
    impl QueueClient for FakeQueueClient {
        async fn enqueue(&self, _queue_name: &str, payload: &str) -> Result<(), AppError> {
            self.items.lock().await.push_back(payload.to_string());
            Ok(())
        }

        async fn dequeue(&self, _queue_name: &str, _timeout_secs: u64) -> Result<Option<String>, AppError> {
            Ok(self.items.lock().await.pop_front())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeQueueClient;
    use super::QueueClient;

    #[tokio::test]
    async fn fake_queue_is_fifo() {
        let queue = FakeQueueClient::default();
        queue.enqueue("jobs", "first").await.unwrap();
        queue.enqueue("jobs", "second").await.unwrap();

        assert_eq!(queue.dequeue("jobs", 0).await.unwrap(), Some("first".to_string()));
        assert_eq!(queue.dequeue("jobs", 0).await.unwrap(), Some("second".to_string()));
        assert_eq!(queue.dequeue("jobs", 0).await.unwrap(), None);
    }
}
