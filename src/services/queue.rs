use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::job::Operation;

const QUEUE_KEY: &str = "render:jobs";
const PROCESSING_KEY: &str = "render:processing";
const PRODUCT_LOCK_PREFIX: &str = "render:lock:product:";

/// Job payload serialized into Redis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedRenderJob {
    pub job_id: Uuid,
    pub product_id: Uuid,
    /// Source model URL at submission time.
    pub model_url: String,
    pub operations: Vec<Operation>,
}

/// Redis-backed async job queue with per-product advisory locking.
///
/// Jobs for different products run concurrently across workers; jobs for the
/// same product are serialized so the final product-record update never races.
pub struct JobQueue {
    client: redis::Client,
}

impl JobQueue {
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self { client })
    }

    /// Enqueue a render job.
    pub async fn enqueue(&self, job: &QueuedRenderJob) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        let payload = serde_json::to_string(job).map_err(QueueError::Serialize)?;
        conn.lpush::<_, _, ()>(QUEUE_KEY, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Dequeue a job for processing (pop with move to processing list).
    pub async fn dequeue(&self) -> Result<Option<QueuedRenderJob>, QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        let result: Option<String> = conn
            .rpoplpush(QUEUE_KEY, PROCESSING_KEY)
            .await
            .map_err(QueueError::Redis)?;

        match result {
            Some(payload) => {
                let job: QueuedRenderJob =
                    serde_json::from_str(&payload).map_err(QueueError::Serialize)?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    /// Mark a job as done with the queue (remove from processing list).
    pub async fn complete(&self, job: &QueuedRenderJob) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        let payload = serde_json::to_string(job).map_err(QueueError::Serialize)?;
        conn.lrem::<_, _, ()>(PROCESSING_KEY, 1, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Push a dequeued job back to the tail of the queue (product was locked
    /// by another worker). Also drops it from the processing list.
    pub async fn requeue(&self, job: &QueuedRenderJob) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        let payload = serde_json::to_string(job).map_err(QueueError::Serialize)?;
        conn.lrem::<_, _, ()>(PROCESSING_KEY, 1, &payload)
            .await
            .map_err(QueueError::Redis)?;
        conn.lpush::<_, _, ()>(QUEUE_KEY, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Try to take the per-product advisory lock. Returns false if another
    /// worker holds it. The TTL bounds lock leakage if a worker dies mid-job.
    pub async fn try_lock_product(
        &self,
        product_id: Uuid,
        ttl_secs: u64,
    ) -> Result<bool, QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        let key = format!("{PRODUCT_LOCK_PREFIX}{product_id}");
        // SET NX replies OK when taken, nil when already held.
        let reply: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(reply.is_some())
    }

    /// Release the per-product advisory lock.
    pub async fn unlock_product(&self, product_id: Uuid) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        let key = format!("{PRODUCT_LOCK_PREFIX}{product_id}");
        conn.del::<_, ()>(&key).await.map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Check Redis connectivity (for health checks).
    pub async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Get the current queue depth (pending jobs).
    pub async fn queue_depth(&self) -> Result<u64, QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        let depth: u64 = conn.llen(QUEUE_KEY).await.map_err(QueueError::Redis)?;
        Ok(depth)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_job_payload_round_trips() {
        let job = QueuedRenderJob {
            job_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            model_url: "https://assets.example.com/models/ring.obj".to_string(),
            operations: vec![Operation::Optimize, Operation::Render360],
        };

        let payload = serde_json::to_string(&job).unwrap();
        // Wire format must match the HTTP operation names.
        assert!(payload.contains("\"render_360\""));

        let back: QueuedRenderJob = serde_json::from_str(&payload).unwrap();
        assert_eq!(back.job_id, job.job_id);
        assert_eq!(back.operations, job.operations);
    }
}
