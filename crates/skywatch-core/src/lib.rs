//! SkyWatch Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `RemotePath`, `AuthState`, `WatcherState`, `Fingerprint`
//! - **Port definitions** - Traits for adapters: `IRemoteDirectory`, `ISessionProvider`,
//!   `ISignInPrompt`, `ICredentialStore`, `IRemoteFileAccess`, `IScheduler`
//! - **Configuration** - YAML-backed settings shared by the CLI and the adapters
//!
//! # Architecture
//!
//! The domain module is pure data and validation with no I/O.
//! Ports define trait interfaces that adapter crates implement
//! (`skywatch-graph` for the remote drive, `skywatch-sync` for the
//! access controller, scheduler and watcher).

pub mod config;
pub mod domain;
pub mod ports;
