// drive-relink/src/config.rs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::download::DownloadConfig;
use crate::link::{LinkPattern, DEFAULT_FOLDER_PREFIX};
use crate::listing::DEFAULT_API_BASE;
use crate::pacing::PacingConfig;
use crate::synchronise::{ListingFailurePolicy, SynchroniseConfig, DEFAULT_LINK_COLUMN};
use crate::upload::UploadConfig;

/// Everything a run needs, as loaded from YAML plus environment overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub table: TableConfig,
    pub drive: DriveConfig,
    pub download: DownloadConfig,
    pub upload: UploadConfig,
    pub pacing: PacingConfig,
    pub on_listing_error: ListingFailurePolicy,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub link_column: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            input: None,
            output: None,
            link_column: DEFAULT_LINK_COLUMN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub api_base: String,
    pub folder_prefix: String,
    pub token_path: PathBuf,
    /// Overrides the pattern picked by the subcommand.
    pub link_pattern: Option<LinkPattern>,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            folder_prefix: DEFAULT_FOLDER_PREFIX.to_string(),
            token_path: PathBuf::from("token.json"),
            link_pattern: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: Option<u64>,
}

impl HttpConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    pub fn trace_loaded(&self) {
        info!(
            link_column = self.table.link_column,
            api_base = %self.drive.api_base,
            download_dir = %self.download.dir.display(),
            upload_url = %self.upload.url,
            max_attempts = ?self.download.retry.max_attempts,
            pacing_every = self.pacing.every,
            on_listing_error = ?self.on_listing_error,
            "Loaded Config"
        );
        debug!(?self, "Config loaded (full debug)");
    }

    /// Pipeline settings for a run using `default_pattern` unless the
    /// config pins one.
    pub fn synchronise_config(&self, default_pattern: LinkPattern) -> SynchroniseConfig {
        SynchroniseConfig {
            link_column: self.table.link_column,
            folder_prefix: self.drive.folder_prefix.clone(),
            link_pattern: self.drive.link_pattern.clone().unwrap_or(default_pattern),
            retry: self.download.retry.clone(),
            pacing: self.pacing.clone(),
            on_listing_error: self.on_listing_error,
        }
    }
}
