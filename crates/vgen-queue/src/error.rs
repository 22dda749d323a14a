//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    /// Broker unreachable; the caller may retry the operation later.
    #[error("Queue unavailable: {0}")]
    Unavailable(String),

    /// Payload with the same idempotency key is already queued.
    #[error("Duplicate job: {0}")]
    Duplicate(String),

    #[error("Delivery not found: {0}")]
    DeliveryNotFound(String),

    #[error("Redis error: {0}")]
    Redis(redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, QueueError::Unavailable(_))
    }
}

impl From<redis::RedisError> for QueueError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
        {
            QueueError::Unavailable(e.to_string())
        } else {
            QueueError::Redis(e)
        }
    }
}
