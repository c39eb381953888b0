//! Port adapters over Microsoft Graph
//!
//! - [`GraphDirectory`] implements [`IRemoteDirectory`] by delegating to a
//!   [`GraphClient`] bound to one access token.
//! - [`GraphSessionProvider`] implements [`ISessionProvider`] with the
//!   [`PKCEFlow`] and opens a [`GraphDirectory`] per session.
//!
//! ## Design Notes
//!
//! - A new [`GraphClient`] is created whenever the controller opens a
//!   session, so refreshed tokens never need to be pushed into a live client.

use std::sync::Arc;

use anyhow::Result;
use oauth2::PkceCodeVerifier;
use tracing::debug;

use skywatch_core::config::{Config, DEFAULT_GRAPH_BASE_URL};
use skywatch_core::ports::{
    ConsentRequest, DirectoryEntry, IRemoteDirectory, ISessionProvider, PendingConsent, Tokens,
};

use crate::auth::{OAuth2Config, PKCEFlow};
use crate::client::GraphClient;

// ============================================================================
// GraphDirectory
// ============================================================================

/// [`IRemoteDirectory`] backed by the Graph drive endpoints
#[derive(Debug, Clone)]
pub struct GraphDirectory {
    client: GraphClient,
}

impl GraphDirectory {
    /// Wraps an authenticated client
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    /// Returns a reference to the underlying client
    pub fn client(&self) -> &GraphClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl IRemoteDirectory for GraphDirectory {
    async fn list(&self, endpoint: &str) -> Result<Vec<DirectoryEntry>> {
        self.client.list_children(endpoint).await
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<String> {
        self.client.create_folder(parent_id, name).await
    }

    async fn download(&self, download_ref: &str) -> Result<Vec<u8>> {
        self.client.download(download_ref).await
    }

    async fn upload(&self, parent_id: &str, name: &str, data: &[u8]) -> Result<()> {
        self.client.upload(parent_id, name, data).await
    }
}

// ============================================================================
// GraphSessionProvider
// ============================================================================

/// [`ISessionProvider`] for the Microsoft identity platform and Graph
pub struct GraphSessionProvider {
    flow: PKCEFlow,
    base_url: String,
}

impl GraphSessionProvider {
    /// Creates a provider talking to the public Graph endpoint
    pub fn new(config: &OAuth2Config) -> Result<Self> {
        Self::with_base_url(config, DEFAULT_GRAPH_BASE_URL)
    }

    /// Creates a provider with a custom Graph base URL (useful for testing)
    pub fn with_base_url(config: &OAuth2Config, base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            flow: PKCEFlow::new(config)?,
            base_url: base_url.into(),
        })
    }

    /// Builds the provider from the loaded configuration
    ///
    /// # Errors
    /// Fails if `auth.app_id` is missing or an endpoint URL is invalid
    pub fn from_config(config: &Config) -> Result<Self> {
        let oauth = OAuth2Config::from_auth_config(&config.auth)?;
        Self::with_base_url(&oauth, config.remote.base_url.clone())
    }

    /// Base URL sessions are opened against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait::async_trait]
impl ISessionProvider for GraphSessionProvider {
    fn consent_request(&self) -> Result<PendingConsent> {
        let (url, csrf_token, pkce_verifier) = self.flow.generate_auth_url();
        Ok(PendingConsent {
            request: ConsentRequest {
                url,
                redirect_prefix: self.flow.redirect_uri().to_string(),
                csrf_state: csrf_token.secret().clone(),
            },
            pkce_verifier: pkce_verifier.secret().clone(),
        })
    }

    async fn exchange_code(&self, pending: PendingConsent, code: &str) -> Result<Tokens> {
        self.flow
            .exchange_code(code.to_string(), PkceCodeVerifier::new(pending.pkce_verifier))
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Tokens> {
        self.flow.refresh_token(refresh_token).await
    }

    fn open(&self, tokens: &Tokens) -> Result<Arc<dyn IRemoteDirectory>> {
        debug!(base_url = %self.base_url, "Opening Graph session");
        Ok(Arc::new(GraphDirectory::new(GraphClient::with_base_url(
            tokens.access_token.clone(),
            self.base_url.clone(),
        ))))
    }
}
