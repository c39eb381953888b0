//! Remote directory port (driven/secondary port)
//!
//! The minimal set of drive operations the access controller needs to walk
//! a folder hierarchy and move file content. Implementations are expected
//! to surface transport failures as `anyhow::Error` without retrying.

use serde::{Deserialize, Serialize};

/// One child entry of a remote container listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Entry name as shown in the drive
    pub name: String,
    /// Opaque identifier, usable as a container id for folders
    pub id: String,
    /// Opaque reference passed to [`IRemoteDirectory::download`]
    pub download_ref: String,
}

/// Port trait for remote drive folder and content operations
#[async_trait::async_trait]
pub trait IRemoteDirectory: Send + Sync {
    /// Lists the direct children behind a listing endpoint
    ///
    /// # Arguments
    /// * `endpoint` - A listing endpoint produced by `RemotePath`
    async fn list(&self, endpoint: &str) -> anyhow::Result<Vec<DirectoryEntry>>;

    /// Creates a folder under `parent_id`
    ///
    /// # Returns
    /// The id of the new folder
    async fn create_folder(&self, parent_id: &str, name: &str) -> anyhow::Result<String>;

    /// Downloads the raw content of an entry
    async fn download(&self, download_ref: &str) -> anyhow::Result<Vec<u8>>;

    /// Uploads `data` as `name` under `parent_id`, overwriting an existing file
    async fn upload(&self, parent_id: &str, name: &str, data: &[u8]) -> anyhow::Result<()>;
}
