//! Session ports: OAuth consent, token exchange and credential storage
//!
//! The access controller drives authentication through three collaborators:
//! - [`ISessionProvider`] builds consent requests, exchanges or refreshes
//!   tokens and opens a remote directory for a set of tokens
//! - [`ISignInPrompt`] shows the consent step to the user
//! - [`ICredentialStore`] keeps tokens between runs
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at these boundaries are
//!   adapter-specific (HTTP, keyring, browser).
//! - A user declining consent is not an error: it is an
//!   [`AuthorizationResponse`] without a code.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::remote_directory::IRemoteDirectory;

// ============================================================================
// Tokens
// ============================================================================

/// OAuth tokens received from the identity provider
///
/// Contains the access token for API requests, an optional refresh token
/// for obtaining new access tokens, and the expiration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    /// Bearer token for authenticating API requests
    pub access_token: String,
    /// Token for refreshing the access token without user interaction
    /// (requires the `offline_access` scope)
    pub refresh_token: Option<String>,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Returns true if the access token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Returns true if the access token will expire within the given duration
    pub fn expires_within(&self, duration: chrono::Duration) -> bool {
        Utc::now() + duration >= self.expires_at
    }
}

// ============================================================================
// Consent request / response
// ============================================================================

/// What the sign-in UI needs to show the consent step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentRequest {
    /// URL the user must visit to grant consent
    pub url: String,
    /// The provider redirects to a URL starting with this prefix when done
    pub redirect_prefix: String,
    /// Anti-forgery value the redirect must echo back
    pub csrf_state: String,
}

/// A consent request plus the secret needed to redeem its code
#[derive(Debug, Clone)]
pub struct PendingConsent {
    /// The request shown to the user
    pub request: ConsentRequest,
    /// PKCE code verifier matching the challenge embedded in `request.url`
    pub pkce_verifier: String,
}

/// Outcome of the consent step, parsed from the redirect
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationResponse {
    /// Authorization code; `None` when the user cancelled or the provider refused
    pub code: Option<String>,
    /// Provider error code (e.g. `access_denied`)
    pub error: Option<String>,
    /// Human-readable error description
    pub error_description: Option<String>,
}

impl AuthorizationResponse {
    /// A response carrying an authorization code
    pub fn authorized(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::default()
        }
    }

    /// A response carrying an error and no code
    pub fn denied(error: impl Into<String>, description: Option<String>) -> Self {
        Self {
            code: None,
            error: Some(error.into()),
            error_description: description,
        }
    }

    /// Short description of why no code was granted
    pub fn denial_reason(&self) -> String {
        match (&self.error, &self.error_description) {
            (Some(e), Some(d)) => format!("{e}: {d}"),
            (Some(e), None) => e.clone(),
            (None, Some(d)) => d.clone(),
            (None, None) => "consent step closed without an authorization code".to_string(),
        }
    }
}

// ============================================================================
// Ports
// ============================================================================

/// Port trait for the user-facing consent step
#[async_trait::async_trait]
pub trait ISignInPrompt: Send + Sync {
    /// Presents the consent URL and waits for the single redirect
    ///
    /// # Returns
    /// The parsed redirect, or `Err` if the prompt could not be shown at all
    async fn prompt(&self, request: &ConsentRequest) -> anyhow::Result<AuthorizationResponse>;
}

/// Port trait for the identity provider and session construction
#[async_trait::async_trait]
pub trait ISessionProvider: Send + Sync {
    /// Builds a fresh consent request (new PKCE challenge and CSRF state)
    fn consent_request(&self) -> anyhow::Result<PendingConsent>;

    /// Redeems an authorization code obtained for `pending`
    async fn exchange_code(&self, pending: PendingConsent, code: &str) -> anyhow::Result<Tokens>;

    /// Obtains new tokens from a refresh token
    async fn refresh(&self, refresh_token: &str) -> anyhow::Result<Tokens>;

    /// Opens a remote directory client authenticated with `tokens`
    fn open(&self, tokens: &Tokens) -> anyhow::Result<Arc<dyn IRemoteDirectory>>;
}

/// Port trait for token persistence
#[async_trait::async_trait]
pub trait ICredentialStore: Send + Sync {
    /// Stores tokens, replacing any previous value
    async fn save(&self, tokens: &Tokens) -> anyhow::Result<()>;

    /// Returns the stored tokens, if any
    async fn retrieve(&self) -> anyhow::Result<Option<Tokens>>;

    /// Removes the stored tokens; succeeds if none were stored
    async fn clear(&self) -> anyhow::Result<()>;
}

// ============================================================================
// InMemoryCredentialStore
// ============================================================================

/// Credential store that keeps tokens for the lifetime of the process
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    tokens: Mutex<Option<Tokens>>,
}

impl InMemoryCredentialStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `tokens`
    pub fn with_tokens(tokens: Tokens) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }
}

#[async_trait::async_trait]
impl ICredentialStore for InMemoryCredentialStore {
    async fn save(&self, tokens: &Tokens) -> anyhow::Result<()> {
        *self.tokens.lock().unwrap_or_else(PoisonError::into_inner) = Some(tokens.clone());
        Ok(())
    }

    async fn retrieve(&self) -> anyhow::Result<Option<Tokens>> {
        Ok(self
            .tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}
