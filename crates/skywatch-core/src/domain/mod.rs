//! Domain types and validation
//!
//! This module contains the core domain types for SkyWatch:
//! - Remote path parsing and listing endpoint construction
//! - Authentication and watcher state machines
//! - Content fingerprints used for change detection
//! - Domain-specific error types

pub mod errors;
pub mod newtypes;
pub mod path;
pub mod state;

// Re-export commonly used types
pub use errors::DomainError;
pub use newtypes::Fingerprint;
pub use path::RemotePath;
pub use state::{AuthState, WatcherState};
