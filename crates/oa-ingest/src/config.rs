//! Engine configuration
//!
//! Everything the acquisition engine needs to know about timeouts, identity
//! and retries is carried in [`IngestConfig`] and handed to components through
//! an [`IngestContext`].

use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Defaults
// ============================================================================

/// Timeout applied to every HTTP request, in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 180;

/// User-Agent sent with every HTTP request.
pub const DEFAULT_USER_AGENT: &str =
    "openaddresses-extract/1.0 (https://github.com/openaddresses/openaddresses)";

/// Attempts per ESRI tile query, including the first.
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

/// Constant pause between ESRI tile query attempts, in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

pub const DEFAULT_FTP_USERNAME: &str = "anonymous";

pub const DEFAULT_FTP_PASSWORD: &str = "anonymous@openaddresses.io";

/// Deepest ESRI tile subdivision before a branch is cut off.
pub const DEFAULT_MAX_TILE_DEPTH: u32 = 32;

/// Name of the result store directory under the destination directory.
pub const DEFAULT_STORE_DIR_NAME: &str = "cached";

/// Retry policy for ESRI tile queries. The delay does not grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub retry: RetryPolicy,

    /// Used when an `ftp://` URL carries no credentials
    pub ftp_username: String,
    pub ftp_password: String,

    pub max_tile_depth: u32,
    pub store_dir_name: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry: RetryPolicy::default(),
            ftp_username: DEFAULT_FTP_USERNAME.to_string(),
            ftp_password: DEFAULT_FTP_PASSWORD.to_string(),
            max_tile_depth: DEFAULT_MAX_TILE_DEPTH,
            store_dir_name: DEFAULT_STORE_DIR_NAME.to_string(),
        }
    }
}

impl IngestConfig {
    /// Load configuration from `.env`, the environment and defaults
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = IngestConfig {
            http_timeout_secs: env_or("OA_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS),
            user_agent: std::env::var("OA_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
            retry: RetryPolicy {
                max_attempts: env_or("OA_RETRY_MAX_ATTEMPTS", DEFAULT_RETRY_MAX_ATTEMPTS),
                delay_ms: env_or("OA_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS),
            },
            ftp_username: std::env::var("OA_FTP_USERNAME")
                .unwrap_or_else(|_| DEFAULT_FTP_USERNAME.to_string()),
            ftp_password: std::env::var("OA_FTP_PASSWORD")
                .unwrap_or_else(|_| DEFAULT_FTP_PASSWORD.to_string()),
            max_tile_depth: env_or("OA_MAX_TILE_DEPTH", DEFAULT_MAX_TILE_DEPTH),
            store_dir_name: std::env::var("OA_STORE_DIR")
                .unwrap_or_else(|_| DEFAULT_STORE_DIR_NAME.to_string()),
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.http_timeout_secs == 0 {
            return Err(IngestError::Config("HTTP timeout must be greater than 0".to_string()));
        }

        if self.user_agent.trim().is_empty() {
            return Err(IngestError::Config("User agent cannot be empty".to_string()));
        }

        if self.retry.max_attempts == 0 {
            return Err(IngestError::Config("Retry max_attempts must be at least 1".to_string()));
        }

        if self.max_tile_depth == 0 {
            return Err(IngestError::Config("Max tile depth must be greater than 0".to_string()));
        }

        let store = self.store_dir_name.trim();
        if store.is_empty() || store.contains('/') || store.contains('\\') || store == ".." {
            return Err(IngestError::Config(format!(
                "Store directory name must be a single path component, got '{}'",
                self.store_dir_name
            )));
        }

        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Validated configuration plus the HTTP client built from it
#[derive(Debug, Clone)]
pub struct IngestContext {
    pub config: IngestConfig,
    pub client: reqwest::Client,
}

impl IngestContext {
    pub fn new(config: IngestConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| IngestError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }
}
