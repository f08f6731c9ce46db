//! # contract: the two remote capabilities a harvest run depends on
//!
//! The pipeline never talks to Slack directly. It asks a [`SlackApi`] for
//! channels and files, and a [`FileFetcher`] for file bytes. The real
//! implementation of both lives in [`crate::slack::SlackClient`]; tests
//! substitute the `mockall` generated `MockSlackApi` / `MockFileFetcher`.
//!
//! ## Mocking & Testing
//! - Mocks are generated for unit tests and, with the default
//!   `test-export-mocks` feature, exported for integration tests.
//!
//! ## Record types
//! - [`Channel`] and [`SlackFile`] mirror the subset of the Slack JSON objects
//!   the pipeline reads. Unknown fields are ignored on decode.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::Result;

/// A conversation as returned by `conversations.list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_private: bool,
}

/// A file object as returned by `files.list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackFile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    /// Absent for external and tombstoned files.
    #[serde(default)]
    pub url_private_download: Option<String>,
}

/// Listing capability of the Slack Web API.
///
/// Implementors return complete results: pagination is their concern, not
/// the caller's.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// All conversations of type `private_channel` visible to the token.
    async fn list_private_channels(&self) -> Result<Vec<Channel>>;

    /// All files shared in the given channel.
    async fn list_channel_files(&self, channel_id: &str) -> Result<Vec<SlackFile>>;
}

/// Authenticated download of a private file URL.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait FileFetcher: Send + Sync {
    /// GET the URL and return the full response body.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}
