//! SkyWatch Sync - serialized remote access and change detection
//!
//! Provides:
//! - A single-slot FIFO gate that can permanently reject all callers
//! - The access controller: sign-in, session restore and path resolution
//! - A non-overlapping interval scheduler on the tokio runtime
//! - A watcher that fingerprints one remote file on every tick
//!
//! ## Modules
//!
//! - [`gate`] - Single-slot access gate with a rejection broadcast
//! - [`controller`] - [`AccessController`], the `IRemoteFileAccess` implementation
//! - [`scheduler`] - [`IntervalScheduler`], the `IScheduler` implementation
//! - [`watcher`] - [`ChangeWatcher`] and its [`WatchEvent`] stream

pub mod controller;
pub mod gate;
pub mod scheduler;
pub mod watcher;

pub use controller::AccessController;
pub use gate::{AccessGate, GateError, GateGuard};
pub use scheduler::{IntervalScheduler, DEFAULT_POLL_INTERVAL};
pub use watcher::{ChangeWatcher, WatchEvent};
