use std::fmt;
use std::path::PathBuf;
use tracing::{debug, error, info};

use crate::error::{HarvestError, Result};

pub const TOKEN_ENV: &str = "SLACK_BOT_TOKEN";
pub const API_BASE_URL_ENV: &str = "SLACK_API_BASE_URL";
pub const PAGE_LIMIT_ENV: &str = "SLACK_PAGE_LIMIT";
pub const CONCURRENCY_ENV: &str = "SLACK_HARVEST_CONCURRENCY";

pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api/";
pub const DEFAULT_PAGE_LIMIT: u32 = 200;
pub const MAX_PAGE_LIMIT: u32 = 1000;
pub const DEFAULT_OUTPUT_DIR: &str = "./harvest";

/// Opaque bot token. Loaded once, never refreshed, never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct BotToken(String);

impl BotToken {
    pub fn new(token: impl Into<String>) -> Self {
        BotToken(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for BotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BotToken(<redacted, {} chars>)", self.0.len())
    }
}

/// Everything a harvest run needs, resolved up front and passed explicitly.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub token: BotToken,
    pub api_base_url: String,
    pub page_limit: u32,
    pub concurrency: usize,
    pub output_dir: PathBuf,
}

impl HarvestConfig {
    /// Build a config from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. The token is mandatory;
    /// everything else falls back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = match lookup(TOKEN_ENV).filter(|t| !t.trim().is_empty()) {
            Some(token) => {
                info!(token_len = token.len(), "{TOKEN_ENV} found in env");
                BotToken::new(token.trim())
            }
            None => {
                error!("{TOKEN_ENV} environment variable not set");
                return Err(HarvestError::MissingToken);
            }
        };

        let api_base_url = lookup(API_BASE_URL_ENV)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let page_limit = match lookup(PAGE_LIMIT_ENV) {
            Some(raw) => parse_page_limit(PAGE_LIMIT_ENV, &raw)?,
            None => DEFAULT_PAGE_LIMIT,
        };

        let concurrency = match lookup(CONCURRENCY_ENV) {
            Some(raw) => parse_concurrency(CONCURRENCY_ENV, &raw)?,
            None => 1,
        };

        Ok(HarvestConfig {
            token,
            api_base_url: normalise_base_url(&api_base_url),
            page_limit,
            concurrency,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        })
    }

    pub fn trace_loaded(&self) {
        info!(
            api_base_url = %self.api_base_url,
            page_limit = self.page_limit,
            concurrency = self.concurrency,
            output_dir = %self.output_dir.display(),
            "Loaded HarvestConfig"
        );
        debug!(?self, "HarvestConfig loaded (full debug)");
    }
}

/// Slack method names are appended to the base, so it must end in '/'.
pub(crate) fn normalise_base_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

pub(crate) fn parse_page_limit(key: &str, raw: &str) -> Result<u32> {
    let value: u32 = raw.trim().parse().map_err(|e| {
        error!(error = ?e, raw = %raw, "{key} must be a positive integer");
        HarvestError::invalid_config(key, format!("not a positive integer: {raw:?}"))
    })?;
    check_page_limit(key, value)
}

pub(crate) fn check_page_limit(key: &str, value: u32) -> Result<u32> {
    if value == 0 || value > MAX_PAGE_LIMIT {
        error!(value, "{key} out of range");
        return Err(HarvestError::invalid_config(
            key,
            format!("must be between 1 and {MAX_PAGE_LIMIT}, got {value}"),
        ));
    }
    Ok(value)
}

pub(crate) fn parse_concurrency(key: &str, raw: &str) -> Result<usize> {
    let value: usize = raw.trim().parse().map_err(|e| {
        error!(error = ?e, raw = %raw, "{key} must be a positive integer");
        HarvestError::invalid_config(key, format!("not a positive integer: {raw:?}"))
    })?;
    check_concurrency(key, value)
}

pub(crate) fn check_concurrency(key: &str, value: usize) -> Result<usize> {
    if value == 0 {
        return Err(HarvestError::invalid_config(key, "must be at least 1"));
    }
    Ok(value)
}
