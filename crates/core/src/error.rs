//! Error types for the HR advisor.
//!
//! One enum covers every failure category of the pipeline. Configuration
//! problems are fatal at startup; ingestion and query failures are turned
//! into user-facing messages by the orchestrator.

use thiserror::Error;

/// Unified error type for the HR advisor.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Required environment variables are absent. Lists every missing key.
    #[error("缺少必要的環境變量: {}", .0.join(", "))]
    MissingEnv(Vec<String>),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Chat completion provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Rerank provider errors
    #[error("Rerank error: {0}")]
    Rerank(String),

    /// Document parsing errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Vector store errors
    #[error("Vector store error: {0}")]
    Store(String),

    /// Ingestion aborted
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// Question answering failed
    #[error("Query error: {0}")]
    Query(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// True for errors that should abort startup rather than be reported
    /// as a per-request failure.
    pub fn is_config(&self) -> bool {
        matches!(self, AppError::Config(_) | AppError::MissingEnv(_))
    }

    /// The message without this error's category prefix.
    pub fn detail(&self) -> String {
        match self {
            AppError::Config(m)
            | AppError::Llm(m)
            | AppError::Embedding(m)
            | AppError::Rerank(m)
            | AppError::Parse(m)
            | AppError::Store(m)
            | AppError::Ingestion(m)
            | AppError::Query(m)
            | AppError::Prompt(m)
            | AppError::Serialization(m)
            | AppError::Other(m) => m.clone(),
            AppError::MissingEnv(_) | AppError::Io(_) => self.to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
