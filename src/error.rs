//! Error types for slack-file-harvest
//!
//! Every failure in the harvest pipeline is fatal for the run: there is no
//! local recovery, so each variant carries just enough context to tell the
//! operator which call broke.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Main error type for the harvest pipeline and the Slack client.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// `SLACK_BOT_TOKEN` is unset or blank
    #[error("SLACK_BOT_TOKEN environment variable not set")]
    MissingToken,

    /// A configuration value could not be parsed or is out of range
    #[error("invalid configuration for {key}: {message}")]
    InvalidConfig {
        /// The offending setting (e.g. "SLACK_PAGE_LIMIT")
        key: String,
        message: String,
    },

    /// Slack answered with `ok: false`
    #[error("Slack API call {method} failed: {error}")]
    Api { method: String, error: String },

    /// Non-success HTTP status from an API call or a file download
    #[error("request to {url} returned status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// Transport failure (connect, timeout, body read)
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not match the expected shape
    #[error("failed to decode Slack response: {0}")]
    Decode(#[from] serde_json::Error),

    /// A public file has no private download URL
    #[error("file {file_id} has no url_private_download")]
    MissingDownloadUrl { file_id: String },

    /// Writing harvested files to disk failed
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HarvestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HarvestError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_config(key: &str, message: impl Into<String>) -> Self {
        HarvestError::InvalidConfig {
            key: key.to_string(),
            message: message.into(),
        }
    }
}
