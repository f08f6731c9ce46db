//! Slack Web API client backing the [`SlackApi`] and [`FileFetcher`] contracts.
//!
//! Every request carries the bot token as a default `Authorization: Bearer`
//! header, API methods are POSTed with a form body, and both listings are
//! paginated to completion: `conversations.list` by cursor, `files.list` by
//! page number.

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::{HarvestConfig, TOKEN_ENV};
use crate::contract::{Channel, FileFetcher, SlackApi, SlackFile};
use crate::error::{HarvestError, Result};

const CONVERSATIONS_LIST: &str = "conversations.list";
const FILES_LIST: &str = "files.list";

pub struct SlackClient {
    client: Client,
    api_base_url: String,
    page_limit: u32,
}

/// Fields common to every Web API response.
#[derive(Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ConversationsListResponse {
    #[serde(default)]
    channels: Vec<Channel>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct FilesListResponse {
    #[serde(default)]
    files: Vec<SlackFile>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Deserialize)]
struct Paging {
    #[serde(default)]
    page: u32,
    #[serde(default)]
    pages: u32,
}

impl SlackClient {
    pub fn new(config: &HarvestConfig) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&config.token.bearer()).map_err(|e| {
            error!(error = ?e, "Bot token is not a valid header value");
            HarvestError::invalid_config(
                TOKEN_ENV,
                "token contains characters not allowed in a header",
            )
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);

        let client = ClientBuilder::new().default_headers(headers).build()?;

        info!(
            api_base_url = %config.api_base_url,
            page_limit = config.page_limit,
            "Initialized SlackClient"
        );

        Ok(SlackClient {
            client,
            api_base_url: config.api_base_url.clone(),
            page_limit: config.page_limit,
        })
    }

    async fn api_call<T, P>(&self, method: &str, params: &P) -> Result<T>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.api_base_url, method);
        let resp = self
            .client
            .post(&url)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, url = %url, "Failed to call Slack API");
                HarvestError::Http(e)
            })?;

        let status = resp.status();
        if !status.is_success() {
            error!(status = %status, url = %url, "Slack API returned non-success status");
            return Err(HarvestError::Status { url, status });
        }

        let body = resp.bytes().await?;
        let envelope: Envelope = serde_json::from_slice(&body).map_err(|e| {
            error!(error = ?e, url = %url, "Slack API response is not a JSON envelope");
            HarvestError::Decode(e)
        })?;
        if !envelope.ok {
            let slack_error = envelope.error.unwrap_or_else(|| "unknown_error".to_string());
            error!(method, error = %slack_error, "Slack API reported failure");
            return Err(HarvestError::Api {
                method: method.to_string(),
                error: slack_error,
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl SlackApi for SlackClient {
    async fn list_private_channels(&self) -> Result<Vec<Channel>> {
        let mut result = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut params = vec![
                ("types", "private_channel".to_string()),
                ("exclude_archived", "false".to_string()),
                ("limit", self.page_limit.to_string()),
            ];
            if let Some(c) = &cursor {
                params.push(("cursor", c.clone()));
            }

            let page: ConversationsListResponse =
                self.api_call(CONVERSATIONS_LIST, &params).await?;
            debug!(
                received = page.channels.len(),
                cursor = cursor.as_deref().unwrap_or(""),
                "Fetched conversations.list page"
            );
            result.extend(page.channels);

            match page.response_metadata.and_then(|m| m.next_cursor) {
                Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                    error!(cursor = %next, "conversations.list returned the same cursor twice");
                    return Err(HarvestError::Api {
                        method: CONVERSATIONS_LIST.to_string(),
                        error: "repeated_cursor".to_string(),
                    });
                }
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        info!(channels = result.len(), "Listed private channels");
        Ok(result)
    }

    async fn list_channel_files(&self, channel_id: &str) -> Result<Vec<SlackFile>> {
        let mut result = Vec::new();
        let mut page_no: u32 = 1;

        loop {
            let params = [
                ("channel", channel_id.to_string()),
                ("count", self.page_limit.to_string()),
                ("page", page_no.to_string()),
            ];
            let page: FilesListResponse = self.api_call(FILES_LIST, &params).await?;
            let received = page.files.len();
            debug!(channel_id, page = page_no, received, "Fetched files.list page");
            result.extend(page.files);

            match page.paging {
                Some(paging) if received > 0 && paging.page.max(page_no) < paging.pages => {
                    page_no = paging.page.max(page_no) + 1;
                }
                _ => break,
            }
        }

        info!(channel_id, files = result.len(), "Listed channel files");
        Ok(result)
    }
}

#[async_trait]
impl FileFetcher for SlackClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.client.get(url).send().await.map_err(|e| {
            error!(error = ?e, url = %url, "Failed to download file");
            HarvestError::Http(e)
        })?;

        let status = resp.status();
        if !status.is_success() {
            error!(status = %status, url = %url, "File download returned non-success status");
            return Err(HarvestError::Status {
                url: url.to_string(),
                status,
            });
        }

        let bytes = resp.bytes().await?;
        debug!(url = %url, bytes = bytes.len(), "Downloaded file");
        Ok(bytes.to_vec())
    }
}
