//! Paginated folder listing.
//!
//! [`list_all_children`] walks a [`ListingApi`] page by page until the API
//! returns an empty cursor. [`DriveListingClient`] is the HTTP implementation
//! against the Drive v2 `children` endpoint.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::contract::{ChildPage, ChildReference, ListingApi};

/// Upper bound on page requests for a single folder.
pub const MAX_PAGES: usize = 10_000;

/// Default base of the Drive REST API.
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com";

#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("listing request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("listing API returned status {status} for folder {folder_id}: {body}")]
    Status {
        folder_id: String,
        status: u16,
        body: String,
    },

    #[error("could not decode listing response for folder {folder_id}: {source}")]
    Decode {
        folder_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("folder {folder_id} exceeded {max} listing pages")]
    TooManyPages { folder_id: String, max: usize },

    #[error("empty folder id")]
    EmptyFolderId,
}

/// Collects every child of `folder_id` across all pages.
///
/// Children are returned in listing order. An entry whose self link was
/// already seen on an earlier page is dropped, so the result is always a
/// subset of what the API returned and never loses a distinct entry.
///
/// Any failed page aborts the walk; nothing collected so far is returned.
pub async fn list_all_children<A>(
    api: &A,
    folder_id: &str,
) -> Result<Vec<ChildReference>, ListingError>
where
    A: ListingApi + ?Sized,
{
    if folder_id.is_empty() {
        return Err(ListingError::EmptyFolderId);
    }

    let mut children = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        if pages >= MAX_PAGES {
            error!(folder_id, pages, "[LIST] Page limit reached, giving up");
            return Err(ListingError::TooManyPages {
                folder_id: folder_id.to_string(),
                max: MAX_PAGES,
            });
        }

        let page = match api.list_children(folder_id, page_token.clone()).await {
            Ok(page) => page,
            Err(e) => {
                error!(folder_id, page = pages + 1, error = %e, "[LIST] Page request failed");
                return Err(e);
            }
        };
        pages += 1;

        debug!(
            folder_id,
            page = pages,
            items = page.items.len(),
            "[LIST] Received page"
        );

        for child in page.items {
            if seen.insert(child.self_link.clone()) {
                children.push(child);
            } else {
                debug!(folder_id, self_link = %child.self_link, "[LIST] Dropping duplicate child");
            }
        }

        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    info!(folder_id, pages, children = children.len(), "[LIST] Folder listed");
    Ok(children)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChildListResponse {
    #[serde(default)]
    items: Vec<ChildItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChildItem {
    #[serde(default)]
    self_link: String,
}

/// [`ListingApi`] over the Drive v2 REST endpoint
/// `GET {api_base}/drive/v2/files/{folder_id}/children`.
///
/// The client is expected to carry authentication already, see
/// [`crate::credentials`].
#[derive(Debug, Clone)]
pub struct DriveListingClient {
    client: Client,
    api_base: String,
}

impl DriveListingClient {
    pub fn new(client: Client, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn children_url(&self, folder_id: &str) -> String {
        format!("{}/drive/v2/files/{}/children", self.api_base, folder_id)
    }
}

#[async_trait]
impl ListingApi for DriveListingClient {
    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<String>,
    ) -> Result<ChildPage, ListingError> {
        let url = self.children_url(folder_id);
        let mut request = self.client.get(&url);
        if let Some(token) = page_token.as_deref().filter(|t| !t.is_empty()) {
            request = request.query(&[("pageToken", token)]);
        }

        debug!(url = %url, has_cursor = page_token.is_some(), "[LIST] Requesting page");
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ListingError::Status {
                folder_id: folder_id.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChildListResponse =
            serde_json::from_str(&body).map_err(|source| ListingError::Decode {
                folder_id: folder_id.to_string(),
                source,
            })?;

        Ok(ChildPage {
            items: parsed
                .items
                .into_iter()
                .map(|item| ChildReference {
                    self_link: item.self_link,
                })
                .collect(),
            next_page_token: parsed.next_page_token,
        })
    }
}
