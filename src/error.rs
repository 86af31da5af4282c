//! Error types for the analysis orchestrator

use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Specialist error: {0}")]
    Specialist(String),

    #[error("Specialist timed out after {0:?}")]
    SpecialistTimeout(std::time::Duration),

    #[error("Conversation memory error: {0}")]
    Conversation(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown error: {0}")]
    Unknown(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Binary encoding error: {0}")]
    BinaryEncodingError(#[from] bincode::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl OrchestrationError {
    /// Whether this error came from a specialist call (recoverable by the executor)
    pub fn is_specialist_failure(&self) -> bool {
        matches!(
            self,
            OrchestrationError::Specialist(_)
                | OrchestrationError::SpecialistTimeout(_)
                | OrchestrationError::LlmError(_)
                | OrchestrationError::HttpError(_)
        )
    }
}
