use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

/// Top-level error type threaded through the query builder, persistence layer,
/// ingestion pipeline, and retrieval resolver.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Authorization error: {0}")]
    Auth(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("LLM parsing error: {0}")]
    LLMParsing(String),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Ingestion processing error: {0}")]
    Processing(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Whether a failed ingestion job attempt should be retried, per the
    /// retryable/non-retryable split spec'd for the worker.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AppError::Validation(_) | AppError::Conflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_and_conflict_are_not_retryable() {
        assert!(!AppError::Validation("bad".into()).is_retryable());
        assert!(!AppError::Conflict("dup".into()).is_retryable());
    }

    #[test]
    fn other_errors_are_retryable() {
        assert!(AppError::Processing("timeout".into()).is_retryable());
        assert!(AppError::NotFound("artifact".into()).is_retryable());
    }
}
