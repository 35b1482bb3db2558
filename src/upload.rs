#![doc = "Re-upload of fetched artifacts to the destination image store."]
//
//! # Publisher
//!
//! [`HttpPublisher`] implements [`Publisher`] against a plain multipart upload
//! endpoint: one form field (`media`) holding the file, POSTed to `url`. The
//! store answers with a `Location` header naming the stored object; the
//! public link is `public_host` followed by that location.
//!
//! - No retry: any I/O or transport failure is returned to the caller.
//! - A response without `Location` is an error rather than a link made of the
//!   host alone.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::multipart::{Form, Part};
use reqwest::{redirect, Client};
use serde::{Deserialize, Serialize};

use crate::contract::{FetchedArtifact, PublishedLink, Publisher};

/// Name of the multipart field carrying the file.
pub const MEDIA_FIELD: &str = "media";

/// Destination store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Endpoint the multipart form is POSTed to.
    pub url: String,
    /// Prepended to the returned `Location` to form the public link.
    pub public_host: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            url: "https://image001.pixtrek.com/".to_string(),
            public_host: "https://image001.pixtrek.com".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("could not read artifact {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upload of {file} returned status {status} without a usable Location header")]
    MissingLocation { file: String, status: u16 },
}

pub struct HttpPublisher {
    client: Client,
    config: UploadConfig,
}

impl HttpPublisher {
    /// Redirects are not followed: the `Location` of the upload response is
    /// the payload.
    pub fn new(config: UploadConfig, timeout: Option<Duration>) -> Result<Self, PublishError> {
        let mut builder = Client::builder().redirect(redirect::Policy::none());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        tracing::info!(url = %config.url, public_host = %config.public_host, "Initialized HttpPublisher");
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&self, artifact: &FetchedArtifact) -> Result<PublishedLink, PublishError> {
        let file_name = artifact.file_name();
        tracing::info!(
            file = %file_name,
            bytes = artifact.bytes,
            url = %self.config.url,
            "[UPLOAD] Uploading artifact"
        );

        let content = match tokio::fs::read(&artifact.path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::error!(error = ?e, path = %artifact.path.display(), "[UPLOAD] Failed to read artifact");
                return Err(PublishError::Io {
                    path: artifact.path.clone(),
                    source: e,
                });
            }
        };

        let form = Form::new().part(MEDIA_FIELD, Part::bytes(content).file_name(file_name.clone()));

        let response = match self.client.post(&self.config.url).multipart(form).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::error!(error = ?e, file = %file_name, "[UPLOAD] Upload request failed");
                return Err(PublishError::Transport(e));
            }
        };

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_owned);

        match location {
            Some(location) => {
                let link = PublishedLink(format!("{}{}", self.config.public_host, location));
                tracing::info!(file = %file_name, status, link = %link, "[UPLOAD] Artifact published");
                Ok(link)
            }
            None => {
                tracing::error!(file = %file_name, status, "[UPLOAD] Response carried no Location header");
                Err(PublishError::MissingLocation {
                    file: file_name,
                    status,
                })
            }
        }
    }
}
