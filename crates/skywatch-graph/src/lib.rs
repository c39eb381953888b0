//! SkyWatch Graph - Microsoft Graph drive adapter
//!
//! Provides async client for:
//! - OAuth2 authentication (Authorization Code with PKCE)
//! - Folder listing, folder creation, download and upload on OneDrive
//!
//! ## Modules
//!
//! - [`auth`] - OAuth2 PKCE flow, loopback callback server, keyring storage
//! - [`client`] - Microsoft Graph API HTTP client
//! - [`provider`] - [`IRemoteDirectory`](skywatch_core::ports::IRemoteDirectory)
//!   and [`ISessionProvider`](skywatch_core::ports::ISessionProvider) adapters

pub mod auth;
pub mod client;
pub mod provider;

use std::time::Duration;

use reqwest::{header::RETRY_AFTER, Response, StatusCode};
use thiserror::Error;
use tracing::warn;

/// Retry-After used when a 429 response carries no usable header
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Errors that can occur when communicating with the Microsoft Graph API
#[derive(Debug, Error)]
pub enum GraphError {
    /// Authentication credentials are invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient permissions for the requested operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A conflict was detected (e.g., a folder with that name already exists)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limit exceeded; the server asked to wait this long
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Duration the server asked to wait
        retry_after: Duration,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The API response could not be parsed or had an unexpected status
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl GraphError {
    /// Maps a status code and response body to an error
    ///
    /// # Arguments
    /// * `status` - A non-success HTTP status
    /// * `body` - Response body, used as the error message
    /// * `retry_after` - Raw `Retry-After` header value, if any
    pub fn from_status(status: StatusCode, body: String, retry_after: Option<&str>) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => GraphError::Unauthorized(body),
            StatusCode::FORBIDDEN => GraphError::Forbidden(body),
            StatusCode::NOT_FOUND => GraphError::NotFound(body),
            StatusCode::CONFLICT => GraphError::Conflict(body),
            StatusCode::TOO_MANY_REQUESTS => GraphError::TooManyRequests {
                retry_after: retry_after
                    .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER))
                    .unwrap_or(DEFAULT_RETRY_AFTER),
            },
            s if s.is_server_error() => GraphError::ServerError(format!("{s}: {body}")),
            s => GraphError::InvalidResponse(format!("unexpected status {s}: {body}")),
        }
    }

    /// Consumes a response, passing it through on success
    ///
    /// # Errors
    /// The [`GraphError`] matching a non-success status
    pub async fn check(response: Response) -> Result<Response, GraphError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();

        Err(Self::from_status(status, body, retry_after.as_deref()))
    }
}

/// Parses a `Retry-After` header value
///
/// Accepts delay-seconds or an HTTP-date (capped at one hour); anything
/// else yields `default`.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Duration::from_secs(seconds);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value) {
        let remaining = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
        if let Ok(secs) = u64::try_from(remaining.num_seconds()) {
            if secs <= 3600 {
                return Duration::from_secs(secs);
            }
        }
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}
