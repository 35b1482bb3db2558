use crate::config::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

/// Overrides `drive.token_path`.
pub const ENV_TOKEN_PATH: &str = "DRIVE_TOKEN_PATH";
/// Overrides `upload.url`.
pub const ENV_UPLOAD_URL: &str = "UPLOAD_URL";
/// Overrides `upload.public_host`.
pub const ENV_UPLOAD_PUBLIC_HOST: &str = "UPLOAD_PUBLIC_HOST";

/// Longest single back-off a config may ask for (one week).
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Loads a static YAML config file and applies environment overrides for
/// the values that differ per machine or per deployment.
/// Returns a validated [`Config`] or an error.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!("Failed to read config file {:?}: {}", path_ref, e));
        }
    };

    let mut config = parse_config(&config_content)?;
    apply_env_overrides(&mut config);
    validate(&config)?;

    config.trace_loaded();
    Ok(config)
}

/// Parses YAML text into a [`Config`]. An empty document yields the defaults.
pub fn parse_config(content: &str) -> Result<Config> {
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    match serde_yaml::from_str::<Config>(content) {
        Ok(conf) => {
            info!("Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

fn apply_env_overrides(config: &mut Config) {
    if let Some(path) = non_empty_env(ENV_TOKEN_PATH) {
        info!(var = ENV_TOKEN_PATH, "Token path taken from environment");
        config.drive.token_path = PathBuf::from(path);
    }
    if let Some(url) = non_empty_env(ENV_UPLOAD_URL) {
        info!(var = ENV_UPLOAD_URL, "Upload URL taken from environment");
        config.upload.url = url;
    }
    if let Some(host) = non_empty_env(ENV_UPLOAD_PUBLIC_HOST) {
        info!(var = ENV_UPLOAD_PUBLIC_HOST, "Public host taken from environment");
        config.upload.public_host = host;
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Rejects settings the pipeline cannot run with.
pub fn validate(config: &Config) -> Result<()> {
    if config.pacing.every == 0 {
        anyhow::bail!("pacing.every must be greater than zero");
    }
    if config.pacing.min_delay_secs > config.pacing.max_delay_secs {
        anyhow::bail!(
            "pacing.min_delay_secs ({}) exceeds pacing.max_delay_secs ({})",
            config.pacing.min_delay_secs,
            config.pacing.max_delay_secs
        );
    }
    if config.download.retry.max_attempts == Some(0) {
        anyhow::bail!("download.retry.max_attempts must be at least 1 (or null for unbounded)");
    }
    let multiplier = config.download.retry.backoff_multiplier;
    if !multiplier.is_finite() || multiplier < 1.0 {
        anyhow::bail!("download.retry.backoff_multiplier must be a finite number >= 1.0, got {multiplier}");
    }
    let max_delay = config.download.retry.max_delay;
    if max_delay > MAX_RETRY_DELAY {
        anyhow::bail!(
            "download.retry.max_delay_secs ({}) exceeds the limit of {} seconds",
            max_delay.as_secs(),
            MAX_RETRY_DELAY.as_secs()
        );
    }
    if config.download.retry.initial_delay > max_delay {
        anyhow::bail!("download.retry.initial_delay_secs exceeds download.retry.max_delay_secs");
    }
    reqwest::Url::parse(&config.upload.url)
        .with_context(|| format!("upload.url is not a valid URL: {}", config.upload.url))?;
    reqwest::Url::parse(&config.drive.api_base)
        .with_context(|| format!("drive.api_base is not a valid URL: {}", config.drive.api_base))?;
    Ok(())
}
