//! Error types shared across the workspace

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, OaError>;

/// Main error type for shared types and utilities
#[derive(Error, Debug)]
pub enum OaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown source type: {0}")]
    UnknownSourceType(String),

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
