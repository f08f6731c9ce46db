#![doc = "slack-file-harvest: collect publicly shared files from private Slack channels."]

//! The crate is a single linear pipeline (see [`harvest`]) over two remote
//! capabilities defined in [`contract`]. [`slack`] provides the real Web API
//! implementation, [`config`] and [`load_config`] resolve the token and
//! settings, and [`sink`] writes a finished report to disk.

pub mod cli;
pub mod config;
pub mod contract;
pub mod error;
pub mod harvest;
pub mod load_config;
pub mod sink;
pub mod slack;

pub use cli::{run, Cli, Commands};
pub use error::{HarvestError, Result};
pub use harvest::{harvest, HarvestOptions, HarvestReport, HarvestedFile};
