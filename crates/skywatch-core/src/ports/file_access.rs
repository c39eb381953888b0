//! Remote file access port (driving port of the access controller)
//!
//! [`IRemoteFileAccess`] is what a watcher or the CLI uses to read and
//! write one remote file by its delimited path. The implementation owns
//! authentication and serializes all remote traffic.
//!
//! ## Design Notes
//!
//! - Once access is permanently revoked, `get_file` returns `Ok(None)` and
//!   `save_file` returns `Ok(())` without touching the remote. Subscribers
//!   learn about the revocation once, through [`IAccessObserver`].
//! - Observers are held as `Weak` so subscribing never keeps a watcher alive.

use std::sync::Weak;

use thiserror::Error;

use crate::domain::errors::DomainError;

/// Errors surfaced by remote file access
#[derive(Debug, Error)]
pub enum AccessError {
    /// The path or another argument is malformed
    #[error(transparent)]
    InvalidArgument(#[from] DomainError),

    /// A container on the path does not exist and folder creation is disabled
    #[error("Remote folder '{segment}' not found while resolving '{path}'")]
    RemoteNotFound {
        /// The first segment that could not be found
        segment: String,
        /// The full container path being resolved
        path: String,
    },

    /// Sign-in or token exchange failed; the next operation tries again
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A remote call failed at the transport level
    #[error("Remote access failed: {0}")]
    Remote(#[source] anyhow::Error),
}

/// Receives the one-time notification that access was permanently revoked
pub trait IAccessObserver: Send + Sync {
    /// Called exactly once, after the revocation has taken effect
    ///
    /// Must not block: it runs on the task that performed the failed sign-in.
    fn access_revoked(&self);
}

/// Port trait for serialized, authenticated access to remote files by path
#[async_trait::async_trait]
pub trait IRemoteFileAccess: Send + Sync {
    /// Reads a remote file as text
    ///
    /// # Arguments
    /// * `path` - Delimited path, e.g. `folder\file.txt`
    ///
    /// # Returns
    /// `Some(content)` if the file exists, `None` if it does not or access
    /// has been revoked
    async fn get_file(&self, path: &str) -> Result<Option<String>, AccessError>;

    /// Writes a remote file, overwriting any existing content
    ///
    /// A silent no-op once access has been revoked.
    async fn save_file(&self, path: &str, content: &str) -> Result<(), AccessError>;

    /// Registers an observer for the access-revoked notification
    fn subscribe(&self, observer: Weak<dyn IAccessObserver>);
}
