//! Command-line surface of slack-file-harvest.
//!
//! All business logic lives in [`crate::harvest`]; this module only resolves
//! configuration, wires the real [`SlackClient`] into the pipeline and
//! reports the outcome. [`run`] is kept separate from `main` so integration
//! tests can drive it with a constructed [`Cli`].

use crate::contract::SlackApi;
use crate::harvest::{harvest, index_private_channels, HarvestOptions};
use crate::load_config::load_config;
use crate::sink::write_report;
use crate::slack::SlackClient;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI for slack-file-harvest: download public files shared in private channels.
#[derive(Parser)]
#[clap(
    name = "slack-file-harvest",
    version,
    about = "Download the publicly shared files of a Slack workspace's private channels"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Harvest public files from every private channel and write them to disk
    Harvest {
        /// Optional YAML config file (never holds the token)
        #[clap(long)]
        config: Option<PathBuf>,
        /// Directory to write harvested files to (overrides the config file)
        #[clap(long)]
        output_dir: Option<PathBuf>,
    },
    /// Print the private channel index (name and id) without touching files
    Channels {
        /// Optional YAML config file (never holds the token)
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Harvest { config, output_dir } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            config.trace_loaded();
            tracing::info!(command = "harvest", "Starting harvest");

            let client = SlackClient::new(&config)?;
            let report = match harvest(&client, &client, HarvestOptions::from(&config)).await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!(command = "harvest", error = %e, "Harvest failed");
                    return Err(anyhow::Error::new(e).context("Harvest failed"));
                }
            };

            let written = write_report(&config.output_dir, &report)
                .context("Failed to write harvested files")?;
            for (path, file) in written.iter().zip(&report.files) {
                println!("{} ({} bytes)", path.display(), file.content.len());
            }
            println!(
                "Harvested {} files ({} bytes) from {} private channels into {}",
                report.files.len(),
                report.total_bytes(),
                report.channels.len(),
                config.output_dir.display()
            );
            tracing::info!(command = "harvest", files = written.len(), "Harvest complete");
            Ok(())
        }
        Commands::Channels { config } => {
            let config = load_config(config.as_deref())?;
            config.trace_loaded();
            tracing::info!(command = "channels", "Listing private channels");

            let client = SlackClient::new(&config)?;
            let channels = client
                .list_private_channels()
                .await
                .context("Failed to list private channels")?;
            let index = index_private_channels(&channels);
            for (name, id) in index.iter() {
                println!("{name}\t{id}");
            }
            tracing::info!(command = "channels", channels = index.len(), "Listed private channels");
            Ok(())
        }
    }
}
