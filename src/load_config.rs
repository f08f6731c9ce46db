use crate::config::{
    check_concurrency, check_page_limit, HarvestConfig, API_BASE_URL_ENV, CONCURRENCY_ENV,
    PAGE_LIMIT_ENV,
};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Static, secret-free settings. The bot token is only ever read from the
/// environment, so a `token` key here is rejected as unknown.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StaticConfig {
    #[serde(default)]
    api_base_url: Option<String>,
    #[serde(default)]
    page_limit: Option<u32>,
    #[serde(default)]
    concurrency: Option<usize>,
    #[serde(default)]
    output_dir: Option<PathBuf>,
}

/// Loads an optional static YAML config file and merges it with the
/// environment. Precedence: environment, then file, then defaults.
pub fn load_config(path: Option<&Path>) -> Result<HarvestConfig> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with an injected environment lookup.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<HarvestConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let static_conf = match path {
        Some(path) => read_static_config(path)?,
        None => {
            info!("No config file given, using environment and defaults");
            StaticConfig::default()
        }
    };

    if let Some(limit) = static_conf.page_limit {
        check_page_limit("page_limit", limit)?;
    }
    if let Some(concurrency) = static_conf.concurrency {
        check_concurrency("concurrency", concurrency)?;
    }

    let file_value = |key: &str| -> Option<String> {
        match key {
            API_BASE_URL_ENV => static_conf.api_base_url.clone(),
            PAGE_LIMIT_ENV => static_conf.page_limit.map(|v| v.to_string()),
            CONCURRENCY_ENV => static_conf.concurrency.map(|v| v.to_string()),
            _ => None,
        }
    };

    let mut config = HarvestConfig::from_lookup(|key| lookup(key).or_else(|| file_value(key)))
        .context("Failed to resolve harvest configuration")?;

    if let Some(output_dir) = static_conf.output_dir {
        config.output_dir = output_dir;
    }

    info!(
        api_base_url = %config.api_base_url,
        output_dir = %config.output_dir.display(),
        "Config loaded and merged successfully"
    );
    Ok(config)
}

fn read_static_config(path: &Path) -> Result<StaticConfig> {
    info!(config_path = ?path, "Loading configuration from file");

    let content = match fs::read_to_string(path) {
        Ok(content) => {
            info!(config_path = ?path, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(anyhow::anyhow!("Failed to read config file {:?}: {}", path, e));
        }
    };

    // An empty file is a valid "all defaults" config.
    if content.trim().is_empty() {
        return Ok(StaticConfig::default());
    }

    match serde_yaml::from_str(&content) {
        Ok(conf) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}
