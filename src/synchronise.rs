//! High-level pipeline: rewrites a table's folder links with re-hosted resource links.
//!
//! For every data row (the header is skipped) whose link column starts with
//! `http`, the [`Synchroniser`]:
//!   - extracts the folder id and lists the folder through [`ListingApi`]
//!   - in [`Mode::Rehost`], turns each child into a download link, fetches it
//!     with throttle back-off and publishes the artifact
//!   - in [`Mode::LinkOnly`], turns each child into a link without fetching
//!   - writes the collected links back into the column, each followed by `" | "`
//!
//! Rows are processed strictly in order and children one at a time. The
//! [`Pacer`] lives inside the synchroniser and counts completed children
//! across the whole run, pausing between batches.
//!
//! # Error Handling
//! Listing failures are reported per row as [`RowOutcome::ListingFailed`]
//! and handled according to [`ListingFailurePolicy`]. Fetch and publish
//! failures that survive the retry policy abort the run; nothing is written.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::contract::{ChildReference, Fetcher, ListingApi, Publisher, Sleeper};
use crate::download::{fetch_with_retry, FetchError};
use crate::link::{self, LinkPattern, DEFAULT_FOLDER_PREFIX};
use crate::listing::{list_all_children, ListingError};
use crate::pacing::{Pacer, PacingConfig};
use crate::retry::RetryPolicy;
use crate::table::{Row, Table};
use crate::upload::PublishError;

/// Follows every link in a rewritten cell.
pub const LINK_DELIMITER: &str = " | ";

/// Default link column, the tenth column of the inventory sheet.
pub const DEFAULT_LINK_COLUMN: usize = 9;

/// What to do with a row whose folder could not be listed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingFailurePolicy {
    /// Leave the original folder reference in place so a rerun picks it up.
    #[default]
    Keep,
    /// Empty the cell.
    Clear,
    /// Stop the run.
    Abort,
}

/// Pipeline settings that do not involve a remote collaborator.
#[derive(Debug, Clone)]
pub struct SynchroniseConfig {
    pub link_column: usize,
    pub folder_prefix: String,
    /// Pattern children are turned into links with.
    pub link_pattern: LinkPattern,
    pub retry: RetryPolicy,
    pub pacing: PacingConfig,
    pub on_listing_error: ListingFailurePolicy,
}

impl SynchroniseConfig {
    /// Settings for the full re-host pipeline (download links).
    pub fn rehost() -> Self {
        Self {
            link_column: DEFAULT_LINK_COLUMN,
            folder_prefix: DEFAULT_FOLDER_PREFIX.to_string(),
            link_pattern: LinkPattern::Download,
            retry: RetryPolicy::default(),
            pacing: PacingConfig::default(),
            on_listing_error: ListingFailurePolicy::default(),
        }
    }

    /// Settings for the viewer-link-only pipeline.
    pub fn link_only() -> Self {
        Self {
            link_pattern: LinkPattern::View,
            ..Self::rehost()
        }
    }
}

/// Which stages run per child.
#[derive(Clone, Copy)]
pub enum Mode<'a> {
    /// Children become links directly; nothing is fetched or uploaded.
    LinkOnly,
    /// Children are fetched and re-uploaded; the row receives the published links.
    Rehost {
        fetcher: &'a dyn Fetcher,
        publisher: &'a dyn Publisher,
    },
}

impl Mode<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::LinkOnly => "link_only",
            Mode::Rehost { .. } => "rehost",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SynchroniseError {
    #[error("row {row}: listing folder {folder_id} failed: {source}")]
    Listing {
        row: usize,
        folder_id: String,
        #[source]
        source: ListingError,
    },

    #[error("row {row}: fetching resource {resource_id} failed: {source}")]
    Fetch {
        row: usize,
        resource_id: String,
        #[source]
        source: FetchError,
    },

    #[error("row {row}: publishing resource {resource_id} failed: {source}")]
    Publish {
        row: usize,
        resource_id: String,
        #[source]
        source: PublishError,
    },
}

/// What happened to one data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// The link column was missing or did not hold a URL.
    Skipped,
    /// The column was rewritten with `links`.
    Relinked { folder_id: String, links: Vec<String> },
    /// Listing failed; `policy` says what was done to the cell.
    ListingFailed {
        folder_id: String,
        error: String,
        policy: ListingFailurePolicy,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowReport {
    /// Index into the table, header being row 0.
    pub row: usize,
    pub outcome: RowOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynchroniseReport {
    pub rows: Vec<RowReport>,
    /// Children fetched and published during the run.
    pub completed: u64,
}

impl SynchroniseReport {
    pub fn relinked(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::Relinked { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::ListingFailed { .. }))
    }

    pub fn links(&self) -> usize {
        self.rows
            .iter()
            .map(|r| match &r.outcome {
                RowOutcome::Relinked { links, .. } => links.len(),
                _ => 0,
            })
            .sum()
    }

    fn count(&self, pred: impl Fn(&RowOutcome) -> bool) -> usize {
        self.rows.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Concatenates links, each followed by [`LINK_DELIMITER`].
pub fn join_links(links: &[String]) -> String {
    links
        .iter()
        .map(|l| format!("{l}{LINK_DELIMITER}"))
        .collect()
}

/// Row pipeline with its run-wide pacing state.
pub struct Synchroniser<'a> {
    config: SynchroniseConfig,
    lister: &'a dyn ListingApi,
    sleeper: &'a dyn Sleeper,
    mode: Mode<'a>,
    pacer: Pacer,
}

impl<'a> Synchroniser<'a> {
    pub fn new(
        config: SynchroniseConfig,
        lister: &'a dyn ListingApi,
        sleeper: &'a dyn Sleeper,
        mode: Mode<'a>,
    ) -> Self {
        let pacer = Pacer::new(config.pacing.clone());
        Self {
            config,
            lister,
            sleeper,
            mode,
            pacer,
        }
    }

    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    /// Processes every data row of `table` in place.
    pub async fn run(&mut self, table: &mut Table) -> Result<SynchroniseReport, SynchroniseError> {
        info!(
            rows = table.data_len(),
            mode = self.mode.name(),
            link_column = self.config.link_column,
            "[SYNC] Starting relink pipeline"
        );

        let mut report = SynchroniseReport::default();
        for (index, row) in table.rows.iter_mut().enumerate().skip(1) {
            let outcome = self.process_row(index, row).await?;
            report.rows.push(RowReport {
                row: index,
                outcome,
            });
        }
        report.completed = self.pacer.completed();

        info!(
            relinked = report.relinked(),
            skipped = report.skipped(),
            failed = report.failed(),
            links = report.links(),
            "[SYNC] Relink pipeline finished"
        );
        Ok(report)
    }

    async fn process_row(&mut self, index: usize, row: &mut Row) -> Result<RowOutcome, SynchroniseError> {
        let column = self.config.link_column;
        let Some(cell) = row.get(column) else {
            debug!(row = index, columns = row.len(), "[SYNC] Row has no link column, skipping");
            return Ok(RowOutcome::Skipped);
        };
        let Some(folder) = link::folder_ref(cell, &self.config.folder_prefix) else {
            debug!(row = index, "[SYNC] Link column holds no URL, skipping");
            return Ok(RowOutcome::Skipped);
        };
        let folder_id = folder.as_str().to_string();
        info!(row = index, folder_id = %folder_id, "[SYNC] Processing folder");

        let children = match list_all_children(self.lister, &folder_id).await {
            Ok(children) => children,
            Err(e) => return self.listing_failed(index, row, folder_id, e),
        };

        let mut links = Vec::with_capacity(children.len());
        for child in &children {
            links.push(self.process_child(index, child).await?);
        }

        row[column] = join_links(&links);
        info!(row = index, folder_id = %folder_id, links = links.len(), "[SYNC] Row relinked");
        Ok(RowOutcome::Relinked { folder_id, links })
    }

    fn listing_failed(
        &self,
        index: usize,
        row: &mut Row,
        folder_id: String,
        e: ListingError,
    ) -> Result<RowOutcome, SynchroniseError> {
        let policy = self.config.on_listing_error;
        error!(row = index, folder_id = %folder_id, error = %e, ?policy, "[SYNC][ERROR] Listing failed");
        match policy {
            ListingFailurePolicy::Abort => Err(SynchroniseError::Listing {
                row: index,
                folder_id,
                source: e,
            }),
            ListingFailurePolicy::Clear | ListingFailurePolicy::Keep => {
                if policy == ListingFailurePolicy::Clear {
                    row[self.config.link_column] = String::new();
                }
                Ok(RowOutcome::ListingFailed {
                    folder_id,
                    error: e.to_string(),
                    policy,
                })
            }
        }
    }

    async fn process_child(&mut self, index: usize, child: &ChildReference) -> Result<String, SynchroniseError> {
        let resource = link::resource_link(&child.self_link, &self.config.link_pattern);
        if resource.resource_id.is_empty() {
            warn!(row = index, self_link = %child.self_link, "[SYNC] Child link carries no resource id");
        }

        let (fetcher, publisher) = match self.mode {
            Mode::LinkOnly => return Ok(resource.url),
            Mode::Rehost { fetcher, publisher } => (fetcher, publisher),
        };

        self.pacer.pace(self.sleeper).await;

        let artifact = fetch_with_retry(fetcher, &resource, &self.config.retry, self.sleeper)
            .await
            .map_err(|source| SynchroniseError::Fetch {
                row: index,
                resource_id: resource.resource_id.clone(),
                source,
            })?;

        let published = publisher
            .publish(&artifact)
            .await
            .map_err(|source| SynchroniseError::Publish {
                row: index,
                resource_id: resource.resource_id.clone(),
                source,
            })?;

        self.pacer.record_success();
        debug!(
            row = index,
            resource_id = %resource.resource_id,
            completed = self.pacer.completed(),
            "[SYNC] Child completed"
        );
        Ok(published.0)
    }
}

/// Runs the pipeline once over `table` with a fresh pacer.
pub async fn synchronise<'a>(
    config: SynchroniseConfig,
    lister: &'a dyn ListingApi,
    sleeper: &'a dyn Sleeper,
    mode: Mode<'a>,
    table: &mut Table,
) -> Result<SynchroniseReport, SynchroniseError> {
    Synchroniser::new(config, lister, sleeper, mode).run(table).await
}
