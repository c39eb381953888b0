//! Microsoft Graph API client
//!
//! Provides a typed HTTP client for the drive endpoints the watcher needs:
//! listing a folder's children, creating a folder, downloading and
//! uploading file content. Handles the bearer header, paging and status
//! mapping to [`GraphError`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use skywatch_graph::client::GraphClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = GraphClient::new("access-token-here");
//! for entry in client.list_children("/me/drive/root/children").await? {
//!     println!("{} ({})", entry.name, entry.id);
//! }
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use skywatch_core::config::DEFAULT_GRAPH_BASE_URL;
use skywatch_core::ports::DirectoryEntry;

use crate::GraphError;

// ============================================================================
// Graph API response types
// ============================================================================

/// One page of a `children` collection
#[derive(Debug, Deserialize)]
struct ChildrenPage {
    /// Items on this page
    #[serde(default)]
    value: Vec<DriveItem>,
    /// Absolute URL of the next page, if any
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

/// The fields of a DriveItem this client reads
#[derive(Debug, Deserialize)]
struct DriveItem {
    id: String,
    name: String,
}

impl From<DriveItem> for DirectoryEntry {
    fn from(item: DriveItem) -> Self {
        DirectoryEntry {
            download_ref: item.id.clone(),
            name: item.name,
            id: item.id,
        }
    }
}

// ============================================================================
// GraphClient
// ============================================================================

/// HTTP client for Microsoft Graph API calls
///
/// Wraps `reqwest::Client` with authentication headers and base URL
/// construction for the Microsoft Graph API.
#[derive(Debug, Clone)]
pub struct GraphClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests
    base_url: String,
    /// OAuth2 access token sent as bearer
    access_token: String,
}

impl GraphClient {
    /// Creates a new GraphClient with the given access token
    ///
    /// # Arguments
    /// * `access_token` - A valid OAuth2 access token for Microsoft Graph
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, DEFAULT_GRAPH_BASE_URL)
    }

    /// Creates a new GraphClient with a custom base URL (useful for testing)
    ///
    /// # Arguments
    /// * `access_token` - A valid OAuth2 access token
    /// * `base_url` - Custom base URL for API requests
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    /// Returns a reference to the current access token
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates an authenticated request builder for the given method and path
    ///
    /// Automatically prepends the base URL and adds the Authorization header.
    ///
    /// # Arguments
    /// * `method` - HTTP method (GET, POST, PUT, DELETE, etc.)
    /// * `path` - API path relative to base URL (e.g., "/me/drive/root/children")
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, &url)
            .bearer_auth(&self.access_token)
    }

    /// Lists every child of a folder, following `@odata.nextLink` pages
    ///
    /// # Arguments
    /// * `endpoint` - Listing path relative to the base URL, e.g.
    ///   `/me/drive/items/{id}/children`
    pub async fn list_children(&self, endpoint: &str) -> Result<Vec<DirectoryEntry>> {
        debug!(endpoint, "Listing children");

        let mut entries = Vec::new();
        let mut request = self.request(Method::GET, endpoint);
        let mut pages = 0usize;

        loop {
            let response = request
                .send()
                .await
                .with_context(|| format!("Failed to list {endpoint}"))?;
            let page: ChildrenPage = GraphError::check(response)
                .await
                .with_context(|| format!("GET {endpoint} returned error status"))?
                .json()
                .await
                .with_context(|| format!("Failed to parse listing of {endpoint}"))?;

            pages += 1;
            entries.extend(page.value.into_iter().map(DirectoryEntry::from));

            match page.next_link {
                // nextLink is absolute and already carries the query
                Some(next) => {
                    request = self.client.get(&next).bearer_auth(&self.access_token);
                }
                None => break,
            }
        }

        debug!(endpoint, pages, count = entries.len(), "Listed children");
        Ok(entries)
    }

    /// Creates a folder; fails with a conflict if the name is taken
    ///
    /// # Returns
    /// The id of the new folder
    pub async fn create_folder(&self, parent_id: &str, name: &str) -> Result<String> {
        let path = format!("/me/drive/items/{parent_id}/children");
        debug!(parent_id, name, "Creating folder");

        let body = json!({
            "name": name,
            "folder": {},
            "@microsoft.graph.conflictBehavior": "fail",
        });

        let response = self
            .request(Method::POST, &path)
            .json(&body)
            .send()
            .await
            .context("Failed to send create folder request")?;
        let item: DriveItem = GraphError::check(response)
            .await
            .with_context(|| format!("Creating folder '{name}' under {parent_id} failed"))?
            .json()
            .await
            .context("Failed to parse create folder response")?;

        debug!(parent_id, name, id = %item.id, "Created folder");
        Ok(item.id)
    }

    /// Downloads a file by its remote item ID
    ///
    /// Makes `GET /me/drive/items/{id}/content`; the Graph API answers with a
    /// redirect to the actual download URL, which reqwest follows.
    pub async fn download(&self, item_id: &str) -> Result<Vec<u8>> {
        let path = format!("/me/drive/items/{item_id}/content");
        debug!(item_id, "Downloading file");

        let response = self
            .request(Method::GET, &path)
            .send()
            .await
            .context("Failed to send download request")?;
        let bytes = GraphError::check(response)
            .await
            .with_context(|| format!("Download of {item_id} failed"))?
            .bytes()
            .await
            .context("Failed to read download response body")?;

        debug!(item_id, size = bytes.len(), "Downloaded file");
        Ok(bytes.to_vec())
    }

    /// Uploads a file into a folder, replacing any existing file of that name
    ///
    /// Uses the simple upload endpoint
    /// `PUT /me/drive/items/{parent}:/{name}:/content`.
    pub async fn upload(&self, parent_id: &str, name: &str, data: &[u8]) -> Result<()> {
        let path = format!(
            "/me/drive/items/{parent_id}:/{}:/content?@microsoft.graph.conflictBehavior=replace",
            urlencoding::encode(name)
        );
        debug!(parent_id, name, size = data.len(), "Uploading file");

        let response = self
            .request(Method::PUT, &path)
            .header("Content-Type", "application/octet-stream")
            .body(data.to_vec())
            .send()
            .await
            .context("Failed to send upload request")?;
        GraphError::check(response)
            .await
            .with_context(|| format!("Upload of '{name}' into {parent_id} failed"))?;

        debug!(parent_id, name, "Uploaded file");
        Ok(())
    }
}
