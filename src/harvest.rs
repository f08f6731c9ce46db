//! High-level pipeline: private channels → their files → public files → bytes.
//!
//! This module is the orchestration step of a harvest run. Given a
//! [`SlackApi`] and a [`FileFetcher`], it:
//!   - lists conversations and indexes the private ones by name
//!   - lists the files of every indexed channel, in index order
//!   - keeps only files flagged `is_public`
//!   - downloads each of those files and pairs the bytes with their record
//!
//! # Error Handling
//! A run is all-or-nothing. The first failing call aborts the pipeline and
//! its error is returned; bytes already downloaded are dropped with it.
//!
//! # Ordering
//! Output order is channel index order, then the order Slack listed the
//! files in. With `concurrency > 1` calls run in parallel through an
//! order-preserving buffered stream, so the result is identical to a
//! sequential run.

use std::collections::HashMap;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, error, info};

use crate::config::HarvestConfig;
use crate::contract::{Channel, FileFetcher, SlackApi, SlackFile};
use crate::error::{HarvestError, Result};

/// Insertion-ordered channel name → channel id mapping.
///
/// Re-inserting a name replaces its id in place, keeping the position of
/// the first insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelIndex {
    entries: Vec<(String, String)>,
    positions: HashMap<String, usize>,
}

impl ChannelIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id previously stored under `name`, if any.
    pub fn insert(&mut self, name: impl Into<String>, id: impl Into<String>) -> Option<String> {
        let name = name.into();
        let id = id.into();
        match self.positions.get(&name) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos].1, id)),
            None => {
                self.positions.insert(name.clone(), self.entries.len());
                self.entries.push((name, id));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.positions
            .get(name)
            .map(|&pos| self.entries[pos].1.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(name, id)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, id)| (name.as_str(), id.as_str()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, id)| id.as_str())
    }
}

/// Files listed for one indexed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelFiles {
    pub channel_id: String,
    pub channel_name: String,
    pub files: Vec<SlackFile>,
}

/// A public file together with the private channel it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicFile {
    pub channel_id: String,
    pub channel_name: String,
    pub file: SlackFile,
}

/// Downloaded bytes paired with the record they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestedFile {
    pub channel_id: String,
    pub channel_name: String,
    pub file: SlackFile,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestReport {
    pub channels: ChannelIndex,
    pub files: Vec<HarvestedFile>,
}

impl HarvestReport {
    pub fn total_bytes(&self) -> usize {
        self.files.iter().map(|f| f.content.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarvestOptions {
    /// Maximum number of in-flight listing or download calls.
    pub concurrency: usize,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        HarvestOptions { concurrency: 1 }
    }
}

impl From<&HarvestConfig> for HarvestOptions {
    fn from(config: &HarvestConfig) -> Self {
        HarvestOptions {
            concurrency: config.concurrency.max(1),
        }
    }
}

/// Keep the channels flagged private, keyed by name.
pub fn index_private_channels(channels: &[Channel]) -> ChannelIndex {
    let mut index = ChannelIndex::new();
    for channel in channels.iter().filter(|c| c.is_private) {
        if let Some(previous) = index.insert(channel.name.clone(), channel.id.clone()) {
            debug!(
                name = %channel.name,
                previous_id = %previous,
                id = %channel.id,
                "Duplicate channel name, later id wins"
            );
        }
    }
    index
}

/// List the files of every indexed channel, preserving index order.
pub async fn list_files_per_channel<A>(
    api: &A,
    index: &ChannelIndex,
    options: HarvestOptions,
) -> Result<Vec<ChannelFiles>>
where
    A: SlackApi + ?Sized,
{
    stream::iter(index.iter())
        .map(|(name, id)| async move {
            let files = api.list_channel_files(id).await.map_err(|e| {
                error!(
                    channel_id = %id,
                    channel_name = %name,
                    error = ?e,
                    "[HARVEST][ERROR] files.list failed"
                );
                e
            })?;
            debug!(channel_id = %id, files = files.len(), "[HARVEST] Listed files for channel");
            Ok::<_, HarvestError>(ChannelFiles {
                channel_id: id.to_string(),
                channel_name: name.to_string(),
                files,
            })
        })
        .buffered(options.concurrency.max(1))
        .try_collect()
        .await
}

/// Flatten the per-channel listings and keep the public files.
pub fn public_files(listings: &[ChannelFiles]) -> Vec<PublicFile> {
    listings
        .iter()
        .flat_map(|listing| {
            listing
                .files
                .iter()
                .filter(|file| file.is_public)
                .map(move |file| PublicFile {
                    channel_id: listing.channel_id.clone(),
                    channel_name: listing.channel_name.clone(),
                    file: file.clone(),
                })
        })
        .collect()
}

/// Download every public file; the result is positionally aligned with the input.
pub async fn download_public_files<F>(
    fetcher: &F,
    files: Vec<PublicFile>,
    options: HarvestOptions,
) -> Result<Vec<HarvestedFile>>
where
    F: FileFetcher + ?Sized,
{
    stream::iter(files)
        .map(|public| async move {
            let url = match public.file.url_private_download.as_deref() {
                Some(url) => url,
                None => {
                    error!(
                        file_id = %public.file.id,
                        "[HARVEST][ERROR] Public file has no download URL"
                    );
                    return Err(HarvestError::MissingDownloadUrl {
                        file_id: public.file.id.clone(),
                    });
                }
            };
            let content = fetcher.fetch(url).await.map_err(|e| {
                error!(
                    file_id = %public.file.id,
                    error = ?e,
                    "[HARVEST][ERROR] Download failed"
                );
                e
            })?;
            debug!(file_id = %public.file.id, bytes = content.len(), "[HARVEST] Downloaded file");
            Ok::<_, HarvestError>(HarvestedFile {
                channel_id: public.channel_id,
                channel_name: public.channel_name,
                file: public.file,
                content,
            })
        })
        .buffered(options.concurrency.max(1))
        .try_collect()
        .await
}

/// Entrypoint: run the whole pipeline.
pub async fn harvest<A, F>(api: &A, fetcher: &F, options: HarvestOptions) -> Result<HarvestReport>
where
    A: SlackApi + ?Sized,
    F: FileFetcher + ?Sized,
{
    info!(concurrency = options.concurrency, "[HARVEST] Starting harvest pipeline");

    let channels = api.list_private_channels().await.map_err(|e| {
        error!(error = ?e, "[HARVEST][ERROR] conversations.list failed");
        e
    })?;
    let index = index_private_channels(&channels);
    info!(
        listed = channels.len(),
        private = index.len(),
        "[HARVEST] Indexed private channels"
    );

    let listings = list_files_per_channel(api, &index, options).await?;
    let listed_files: usize = listings.iter().map(|l| l.files.len()).sum();

    let public = public_files(&listings);
    info!(
        listed = listed_files,
        public = public.len(),
        "[HARVEST] Filtered public files"
    );

    let files = download_public_files(fetcher, public, options).await?;
    let report = HarvestReport {
        channels: index,
        files,
    };
    info!(
        files = report.files.len(),
        bytes = report.total_bytes(),
        "[HARVEST] Harvest complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(id: &str, name: &str, is_private: bool) -> Channel {
        Channel {
            id: id.into(),
            name: name.into(),
            is_private,
        }
    }

    fn file(id: &str, is_public: bool) -> SlackFile {
        SlackFile {
            id: id.into(),
            name: Some(format!("{id}.bin")),
            title: None,
            is_public,
            url_private_download: Some(format!("https://files.example/{id}")),
        }
    }

    #[test]
    fn test_index_keeps_only_private_channels_with_ids_intact() {
        let channels = vec![
            channel("C1", "a", true),
            channel("C9", "general", false),
            channel("C2", "b", true),
        ];
        let index = index_private_channels(&channels);
        let pairs: Vec<(&str, &str)> = index.iter().collect();
        assert_eq!(pairs, vec![("a", "C1"), ("b", "C2")]);
        assert_eq!(index.get("general"), None);
    }

    #[test]
    fn test_duplicate_names_overwrite_in_place() {
        let channels = vec![
            channel("C1", "a", true),
            channel("C2", "b", true),
            channel("C3", "a", true),
        ];
        let index = index_private_channels(&channels);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("a"), Some("C3"));
        let ids: Vec<&str> = index.ids().collect();
        assert_eq!(ids, vec!["C3", "C2"]);
    }

    #[test]
    fn test_public_files_preserves_channel_then_file_order() {
        let listings = vec![
            ChannelFiles {
                channel_id: "C1".into(),
                channel_name: "a".into(),
                files: vec![file("F1", true), file("F2", false), file("F3", true)],
            },
            ChannelFiles {
                channel_id: "C2".into(),
                channel_name: "b".into(),
                files: vec![file("F4", false)],
            },
            ChannelFiles {
                channel_id: "C3".into(),
                channel_name: "c".into(),
                files: vec![file("F5", true)],
            },
        ];
        let public = public_files(&listings);
        let ids: Vec<(&str, &str)> = public
            .iter()
            .map(|p| (p.channel_id.as_str(), p.file.id.as_str()))
            .collect();
        assert_eq!(ids, vec![("C1", "F1"), ("C1", "F3"), ("C3", "F5")]);
    }

    #[test]
    fn test_public_files_of_empty_listing_is_empty() {
        assert!(public_files(&[]).is_empty());
    }

    #[test]
    fn test_options_from_config_never_drop_below_one() {
        let config = HarvestConfig {
            token: crate::config::BotToken::new("t"),
            api_base_url: "http://x/".into(),
            page_limit: 10,
            concurrency: 0,
            output_dir: "out".into(),
        };
        assert_eq!(HarvestOptions::from(&config).concurrency, 1);
    }
}
