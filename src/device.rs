//! HTTP client for the tablet's USB web interface.
//!
//! With the web interface enabled (Settings -> Storage) the device serves a
//! small JSON API on `http://10.11.99.1`: `GET /documents/{folder}` lists
//! one folder, `GET /download/{id}/{format}` returns one document, rendered
//! to PDF on the device for the `placeholder` format. Enumeration walks the
//! folder listings iteratively and assembles the tree afterwards, with
//! children ordered by name so traversal is stable across runs.

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use async_trait::async_trait;
use chrono::DateTime;
use futures::StreamExt;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::contract::DeviceClient;
use crate::document::{DocumentNode, DocumentTree};
use crate::error::DeviceError;

/// Address the tablet exposes when connected over USB.
pub const DEFAULT_BASE_URL: &str = "http://10.11.99.1";

/// Environment variable overriding the device address.
pub const BASE_URL_ENV: &str = "RMEXPORT_DEVICE_URL";

/// Client for the USB web interface.
#[derive(Debug, Clone)]
pub struct UsbWebClient {
    base_url: String,
    http: reqwest::Client,
}

impl UsbWebClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            http: reqwest::Client::new(),
        }
    }

    /// Uses `RMEXPORT_DEVICE_URL` when set, the standard USB address
    /// otherwise.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        Self::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One folder listing. The device addresses the root as an empty id.
    async fn list_folder(&self, folder_id: &str) -> Result<Vec<RawEntry>, DeviceError> {
        let url = format!("{}/documents/{}", self.base_url, folder_id);
        debug!(url = %url, "Listing folder");
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(DeviceError::UnexpectedStatus {
                status: response.status().as_u16(),
                url,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl DeviceClient for UsbWebClient {
    async fn fetch_file_structure(&self) -> Result<DocumentTree, DeviceError> {
        let mut listings: HashMap<String, Vec<RawEntry>> = HashMap::new();
        let mut pending = VecDeque::from([String::new()]);
        while let Some(folder_id) = pending.pop_front() {
            let entries = self.list_folder(&folder_id).await?;
            for entry in &entries {
                if entry.is_folder() {
                    pending.push_back(entry.id.clone());
                }
            }
            listings.insert(folder_id, entries);
        }
        Ok(build_tree(&listings))
    }

    async fn export_doc(&self, doc: &DocumentNode, dest: &Path) -> Result<(), DeviceError> {
        let url = format!(
            "{}/download/{}/{}",
            self.base_url,
            doc.id,
            download_format(dest)
        );
        debug!(url = %url, dest = %dest.display(), "Downloading document");
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(DeviceError::UnexpectedStatus {
                status: response.status().as_u16(),
                url,
            });
        }

        let write_error = |source| DeviceError::Write {
            path: dest.to_path_buf(),
            source,
        };
        let mut file = tokio::fs::File::create(dest).await.map_err(write_error)?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            file.write_all(&chunk?).await.map_err(write_error)?;
        }
        file.flush().await.map_err(write_error)?;
        Ok(())
    }
}

/// Endpoint segment for a destination: the raw archive for `.rmdoc`, the
/// device-rendered PDF (served as `placeholder`) for everything else.
fn download_format(dest: &Path) -> &'static str {
    match dest.extension().and_then(|ext| ext.to_str()) {
        Some("rmdoc") => "rmdoc",
        _ => "placeholder",
    }
}

/// One entry of a `/documents/` listing.
#[derive(Debug, Clone, Deserialize)]
struct RawEntry {
    #[serde(rename = "ID")]
    id: String,
    // The device API really does spell it with the double s.
    #[serde(rename = "VissibleName")]
    visible_name: String,
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Bookmarked", default)]
    bookmarked: bool,
    #[serde(rename = "ModifiedClient", default)]
    modified_client: Option<String>,
    #[serde(rename = "fileType", default)]
    file_type: Option<String>,
}

impl RawEntry {
    fn is_folder(&self) -> bool {
        self.kind == "CollectionType"
    }

    fn is_notebook(&self) -> bool {
        self.file_type.as_deref() == Some("notebook")
    }

    /// UTC epoch seconds from the RFC 3339 `ModifiedClient` field. Entries
    /// without a parsable timestamp are logged and sorted as the epoch,
    /// which makes them look ancient rather than fresh.
    fn modified_timestamp(&self) -> i64 {
        let Some(raw) = self.modified_client.as_deref() else {
            return 0;
        };
        match DateTime::parse_from_rfc3339(raw) {
            Ok(parsed) => parsed.timestamp(),
            Err(parse_error) => {
                warn!(
                    name = %self.visible_name,
                    raw,
                    error = %parse_error,
                    "Unparsable modification time, treating as epoch"
                );
                0
            }
        }
    }
}

fn build_tree(listings: &HashMap<String, Vec<RawEntry>>) -> DocumentTree {
    DocumentTree::new(children_of(listings, ""))
}

/// Assembles one folder's children from the collected listings, sorted by
/// case-insensitive name with the id as tiebreak, so traversal order is
/// deterministic.
fn children_of(listings: &HashMap<String, Vec<RawEntry>>, folder_id: &str) -> Vec<DocumentNode> {
    let mut entries = listings.get(folder_id).cloned().unwrap_or_default();
    entries.sort_by(|a, b| {
        a.visible_name
            .to_lowercase()
            .cmp(&b.visible_name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
    entries
        .into_iter()
        .map(|entry| {
            if entry.is_folder() {
                let children = children_of(listings, &entry.id);
                DocumentNode::folder(entry.id, entry.visible_name, children)
            } else {
                let modified = entry.modified_timestamp();
                let is_notebook = entry.is_notebook();
                DocumentNode::document(entry.id, entry.visible_name, modified)
                    .with_notebook(is_notebook)
                    .with_bookmarked(entry.bookmarked)
            }
        })
        .collect()
}
