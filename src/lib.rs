#![doc = "drive-relink: re-host the contents of Drive folders referenced from a CSV table."]

//! The pipeline, leaf first:
//!
//! - [`link`]: self link → resource link, cell → folder id
//! - [`listing`]: paginated folder listing
//! - [`download`] and [`retry`]: throttle-aware fetching with back-off
//! - [`upload`]: multipart re-upload to the destination store
//! - [`synchronise`] and [`pacing`]: the row orchestrator
//!
//! [`contract`] holds the collaborator traits (mockable), [`table`],
//! [`credentials`], [`config`] and [`load_config`] the surrounding plumbing.

pub mod cli;
pub mod config;
pub mod contract;
pub mod credentials;
pub mod download;
pub mod link;
pub mod listing;
pub mod load_config;
pub mod pacing;
pub mod retry;
pub mod synchronise;
pub mod table;
pub mod upload;

pub use cli::{run, Cli, Commands};
