//! Error types for source acquisition

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for acquisition operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    /// The extension of a URL could not be determined
    #[error("Could not resolve extension for {url}: {reason}")]
    Resolution { url: String, reason: String },

    /// A transfer, metadata fetch or feature query failed
    #[error("Download failed for {url}: {message}")]
    Download {
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Artifact does not exist: {0}")]
    MissingArtifact(PathBuf),

    #[error("Unknown source type: {0}")]
    UnknownSourceType(String),

    #[error("Source produced no files")]
    EmptySource,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Common(#[from] oa_common::OaError),
}

impl IngestError {
    pub fn download(url: impl ToString, message: impl ToString) -> Self {
        IngestError::Download {
            url: url.to_string(),
            status: None,
            message: message.to_string(),
        }
    }

    pub fn http_status(url: impl ToString, status: reqwest::StatusCode) -> Self {
        IngestError::Download {
            url: url.to_string(),
            status: Some(status.as_u16()),
            message: format!("HTTP {}", status),
        }
    }

    pub fn resolution(url: impl ToString, reason: impl ToString) -> Self {
        IngestError::Resolution {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Why an ESRI geometry could not be turned into a point and WKT
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("feature has no geometry")]
    Missing,

    #[error("unsupported geometry type: {0}")]
    Unsupported(String),

    #[error("malformed geometry: {0}")]
    Malformed(String),

    /// Recovered in place with the bounding-box midpoint
    #[error("degenerate geometry")]
    Degenerate,

    #[error("empty geometry")]
    Empty,
}
