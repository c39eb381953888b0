//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteDirectory`] - Folder listing, creation, download and upload on the remote drive
//! - [`ISessionProvider`] - OAuth consent URLs, code exchange, refresh, session opening
//! - [`ISignInPrompt`] - The user-facing consent step
//! - [`ICredentialStore`] - Persistence of OAuth tokens
//! - [`IRemoteFileAccess`] - Serialized, authenticated get/save of a remote file by path
//! - [`IScheduler`] - Periodic, non-overlapping tick source

pub mod file_access;
pub mod remote_directory;
pub mod scheduler;
pub mod session;

pub use file_access::{AccessError, IAccessObserver, IRemoteFileAccess};
pub use remote_directory::{DirectoryEntry, IRemoteDirectory};
pub use scheduler::{IScheduler, TickFuture, TickHandler};
pub use session::{
    AuthorizationResponse, ConsentRequest, ICredentialStore, ISessionProvider, ISignInPrompt,
    InMemoryCredentialStore, PendingConsent, Tokens,
};
