//! Throttle-aware resource fetching.
//!
//! [`HttpFetcher`] performs a single GET per call: it follows redirects by hand
//! (so every hop is logged and the `Location` target is joined onto the
//! current URL as-is), classifies the final status and streams a 200 body to
//! `<dir>/<resource_id><extension>`. [`fetch_with_retry`] layers the
//! [`RetryPolicy`] on top, retrying only what [`FetchError::is_retryable`]
//! accepts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::LOCATION;
use reqwest::{redirect, Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::contract::{FetchedArtifact, Fetcher, Sleeper};
use crate::link::ResourceLink;
use crate::retry::{with_retry, IsRetryable, RetryFailure, RetryPolicy};

/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

/// Where and how fetched resources are stored, and how throttling is retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub dir: PathBuf,
    /// Appended to the resource id to form the artifact's file name.
    pub extension: String,
    /// Treat every non-200 status as throttling.
    pub retry_any_status: bool,
    pub retry: RetryPolicy,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            extension: ".jpg".to_string(),
            retry_any_status: false,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} was throttled (status {status})")]
    Throttled { url: String, status: u16 },

    #[error("request to {url} was rejected (status {status})")]
    Rejected { url: String, status: u16 },

    #[error("resource link {url} carries no resource id")]
    EmptyResourceId { url: String },

    #[error("resource id {resource_id:?} from {url} is not usable as a file name")]
    InvalidResourceId { url: String, resource_id: String },

    #[error("invalid URL {url}")]
    InvalidUrl { url: String },

    #[error("redirect from {url} to unusable location {location:?}")]
    InvalidRedirect { url: String, location: String },

    #[error("more than {MAX_REDIRECTS} redirects starting at {url}")]
    TooManyRedirects { url: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<FetchError>,
    },
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Throttled { .. })
    }
}

/// Statuses that signal rate limiting or a temporarily unavailable backend.
pub fn is_throttle_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::FORBIDDEN | StatusCode::REQUEST_TIMEOUT
    ) || status.is_server_error()
}

/// True when `resource_id` names a single file inside the download dir.
pub fn is_safe_resource_id(resource_id: &str) -> bool {
    !resource_id.is_empty()
        && resource_id != "."
        && resource_id != ".."
        && !resource_id.contains(['/', '\\', '\0'])
}

/// Single-attempt HTTP [`Fetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    dir: PathBuf,
    extension: String,
    retry_any_status: bool,
}

impl HttpFetcher {
    /// Builds a fetcher with its own client. Automatic redirects are off;
    /// [`HttpFetcher`] follows them itself.
    pub fn new(config: &DownloadConfig, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = Client::builder().redirect(redirect::Policy::none());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            dir: config.dir.clone(),
            extension: config.extension.clone(),
            retry_any_status: config.retry_any_status,
        })
    }

    /// Local path an artifact for `resource_id` is written to. Depends only on
    /// the id, so reruns land on the same file.
    pub fn artifact_path(&self, resource_id: &str) -> PathBuf {
        self.dir.join(format!("{}{}", resource_id, self.extension))
    }

    fn classify(&self, url: &str, status: StatusCode) -> FetchError {
        if self.retry_any_status || is_throttle_status(status) {
            FetchError::Throttled {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Rejected {
                url: url.to_string(),
                status: status.as_u16(),
            }
        }
    }

    async fn get_following_redirects(&self, url: &str) -> Result<Response, FetchError> {
        let mut current = Url::parse(url).map_err(|_| FetchError::InvalidUrl {
            url: url.to_string(),
        })?;

        for hop in 0..=MAX_REDIRECTS {
            let response = self.client.get(current.clone()).send().await?;
            if !response.status().is_redirection() {
                return Ok(response);
            }
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let Some(location) = location else {
                // a 3xx without a target is classified with the final status
                return Ok(response);
            };
            let next = current
                .join(&location)
                .map_err(|_| FetchError::InvalidRedirect {
                    url: current.to_string(),
                    location: location.clone(),
                })?;
            debug!(hop, from = %current, to = %next, "[FETCH] Following redirect");
            current = next;
        }

        Err(FetchError::TooManyRedirects {
            url: url.to_string(),
        })
    }
}

async fn write_body(response: Response, part: &Path) -> Result<u64, FetchError> {
    let io_err = |source: std::io::Error| FetchError::Io {
        path: part.to_path_buf(),
        source,
    };
    let mut file = tokio::fs::File::create(part).await.map_err(io_err)?;
    let mut stream = response.bytes_stream();
    let mut bytes = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(io_err)?;
        bytes += chunk.len() as u64;
    }
    file.flush().await.map_err(io_err)?;
    Ok(bytes)
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, link: &ResourceLink) -> Result<FetchedArtifact, FetchError> {
        if link.resource_id.is_empty() {
            return Err(FetchError::EmptyResourceId {
                url: link.url.clone(),
            });
        }
        if !is_safe_resource_id(&link.resource_id) {
            warn!(url = %link.url, resource_id = %link.resource_id, "[FETCH] Refusing resource id outside the download dir");
            return Err(FetchError::InvalidResourceId {
                url: link.url.clone(),
                resource_id: link.resource_id.clone(),
            });
        }

        info!(url = %link.url, resource_id = %link.resource_id, "[FETCH] Downloading resource");
        let response = self.get_following_redirects(&link.url).await?;
        let status = response.status();
        debug!(url = %link.url, status = status.as_u16(), "[FETCH] Response received");

        if status != StatusCode::OK {
            let err = self.classify(&link.url, status);
            warn!(url = %link.url, status = status.as_u16(), retryable = err.is_retryable(), "[FETCH] Non-200 response");
            return Err(err);
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| FetchError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.artifact_path(&link.resource_id);
        let part = self
            .dir
            .join(format!("{}.{}.part", link.resource_id, uuid::Uuid::new_v4()));

        let bytes = match write_body(response, &part).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e);
            }
        };
        tokio::fs::rename(&part, &path)
            .await
            .map_err(|source| FetchError::Io {
                path: path.clone(),
                source,
            })?;

        info!(path = %path.display(), bytes, "[FETCH] Resource downloaded");
        Ok(FetchedArtifact {
            resource_id: link.resource_id.clone(),
            path,
            bytes,
        })
    }
}

/// Fetches `link`, backing off and retrying while the fetcher reports
/// throttling. Returns only once a fetch succeeded, a fatal error occurred,
/// or `policy` ran out of attempts.
pub async fn fetch_with_retry<F, S>(
    fetcher: &F,
    link: &ResourceLink,
    policy: &RetryPolicy,
    sleeper: &S,
) -> Result<FetchedArtifact, FetchError>
where
    F: Fetcher + ?Sized,
    S: Sleeper + ?Sized,
{
    with_retry(policy, sleeper, || fetcher.fetch(link))
        .await
        .map_err(|failure| match failure {
            RetryFailure::Fatal(e) => e,
            RetryFailure::Exhausted { attempts, last } => FetchError::RetriesExhausted {
                attempts,
                source: Box::new(last),
            },
        })
}
