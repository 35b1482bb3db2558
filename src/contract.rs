#![allow(unused)]

//! # contract: the seams of the relink pipeline
//!
//! Every remote collaborator the orchestrator talks to sits behind one of the
//! traits in this module:
//!
//! - [`ListingApi`]: one page of a folder's children.
//! - [`Fetcher`]: one attempt at pulling a resource down to a local artifact.
//! - [`Publisher`]: pushes a local artifact to the destination store.
//! - [`Sleeper`]: every wait the pipeline performs (throttle back-off, pacing).
//!
//! The traits are annotated for `mockall` so tests can script each
//! collaborator independently. Mocks are exported behind the default
//! `test-export-mocks` feature so the integration tests under `tests/` can use them.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use mockall::{automock, predicate::*};

use crate::download::FetchError;
use crate::link::ResourceLink;
use crate::listing::ListingError;
use crate::upload::PublishError;

/// One entry of a folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildReference {
    /// Self-referential link of the entry, e.g.
    /// `https://www.googleapis.com/drive/v2/files/<folder>/children/<id>`.
    pub self_link: String,
}

/// One page returned by the listing API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildPage {
    pub items: Vec<ChildReference>,
    /// Cursor for the next page. `None` or an empty string marks the last page.
    pub next_page_token: Option<String>,
}

/// A resource that was written to local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArtifact {
    /// Identifier the artifact was fetched for.
    pub resource_id: String,
    /// Where the bytes live.
    pub path: PathBuf,
    /// Number of bytes copied from the response body.
    pub bytes: u64,
}

impl FetchedArtifact {
    /// File name component of [`FetchedArtifact::path`].
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.resource_id.clone())
    }
}

/// Public address of a re-uploaded artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedLink(pub String);

impl PublishedLink {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PublishedLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote listing API, one page per call.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ListingApi: Send + Sync {
    /// List one page of children of `folder_id`. The first page is requested
    /// with `page_token = None`.
    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<String>,
    ) -> Result<ChildPage, ListingError>;
}

/// Single-attempt resource retrieval. Retrying is layered on top by
/// [`crate::retry`], driven by the error's classification.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, link: &ResourceLink) -> Result<FetchedArtifact, FetchError>;
}

/// Destination store for fetched artifacts.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, artifact: &FetchedArtifact) -> Result<PublishedLink, PublishError>;
}

/// Every wait in the pipeline goes through this, so tests can observe
/// back-off and pacing without actually sleeping.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
