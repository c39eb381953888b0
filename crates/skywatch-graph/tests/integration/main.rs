//! Integration tests for skywatch-graph
//!
//! Uses wiremock to simulate the Microsoft Graph API and the identity
//! platform token endpoint.

mod common;

mod test_auth;
mod test_directory;
