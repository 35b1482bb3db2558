//! Turns listing self-links into resource URLs, and row cells into folder ids.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Path marker that precedes the resource id in a child's self link.
pub const CHILDREN_MARKER: &str = "/children/";

/// Viewer link, renders the resource in the browser.
pub const VIEW_PATTERN: &str = "https://drive.google.com/uc?id=";

/// Forced-download link, returns the raw bytes.
pub const DOWNLOAD_PATTERN: &str = "https://docs.google.com/uc?export=download&id=";

/// Default prefix of folder URLs found in the link column.
pub const DEFAULT_FOLDER_PREFIX: &str = "https://drive.google.com/drive/folders/";

/// Prefix a cell must start with to be treated as a folder reference.
pub const HTTP_PREFIX: &str = "http";

/// URL pattern a resource id is appended to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkPattern {
    View,
    Download,
    Custom(String),
}

impl LinkPattern {
    pub fn as_str(&self) -> &str {
        match self {
            LinkPattern::View => VIEW_PATTERN,
            LinkPattern::Download => DOWNLOAD_PATTERN,
            LinkPattern::Custom(p) => p,
        }
    }
}

/// Fully qualified URL for one resource, plus the id it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLink {
    pub url: String,
    pub resource_id: String,
}

/// Opaque identifier of a remote folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRef(pub String);

impl FolderRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Substring following the last `/children/` in `self_link`.
///
/// Empty when the marker is absent or is the last thing in the string.
pub fn resource_id(self_link: &str) -> &str {
    match self_link.rfind(CHILDREN_MARKER) {
        Some(pos) => &self_link[pos + CHILDREN_MARKER.len()..],
        None => "",
    }
}

/// Builds `pattern + resource_id(self_link)`.
///
/// Never fails: malformed input yields a link equal to the bare pattern and
/// an empty `resource_id`, which callers validate downstream.
pub fn resource_link(self_link: &str, pattern: &LinkPattern) -> ResourceLink {
    let id = resource_id(self_link);
    ResourceLink {
        url: format!("{}{}", pattern.as_str(), id),
        resource_id: id.to_string(),
    }
}

/// True when the cell holds something the pipeline should process.
pub fn is_folder_cell(cell: &str) -> bool {
    cell.starts_with(HTTP_PREFIX)
}

fn folder_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // stops at the first query, fragment or path separator
    RE.get_or_init(|| Regex::new(r"^[^?#/]*").expect("static regex"))
}

/// Extracts the folder id from a link cell by trimming `prefix`.
///
/// Returns `None` for cells that do not start with `http`. A cell that starts
/// with `http` but not with `prefix` is passed through untrimmed, like
/// `str::trim_start_matches` would.
pub fn folder_ref(cell: &str, prefix: &str) -> Option<FolderRef> {
    if !is_folder_cell(cell) {
        return None;
    }
    let trimmed = cell.trim().strip_prefix(prefix).unwrap_or(cell.trim());
    if trimmed.starts_with(HTTP_PREFIX) {
        return Some(FolderRef(trimmed.to_string()));
    }
    let id = folder_id_re()
        .find(trimmed)
        .map(|m| m.as_str())
        .unwrap_or_default();
    Some(FolderRef(id.to_string()))
}
