//! OAuth2 PKCE authentication flow for Microsoft Graph API
//!
//! Implements the Authorization Code flow with PKCE (RFC 7636) for
//! authenticating native desktop applications with Microsoft identity platform.
//!
//! ## Components
//!
//! - [`OAuth2Config`] - Configuration for the OAuth2 flow
//! - [`KeyringTokenStorage`] - [`ICredentialStore`] backed by the system keyring
//! - [`PKCEFlow`] - OAuth2 PKCE challenge/exchange/refresh logic
//! - [`LocalCallbackServer`] - Minimal HTTP server for the OAuth redirect
//! - [`BrowserSignIn`] - [`ISignInPrompt`] that opens the browser and waits
//!   for the redirect
//! - [`GraphAuthAdapter`] - One-shot interactive login for the CLI

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use oauth2::{
    basic::{BasicClient, BasicTokenResponse},
    AuthUrl, AuthorizationCode, ClientId, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, TokenResponse,
    TokenUrl,
};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

use skywatch_core::config::{AuthConfig, DEFAULT_AUTHORITY, DEFAULT_REDIRECT_URI, DEFAULT_SCOPES};
use skywatch_core::ports::{
    AuthorizationResponse, ConsentRequest, ICredentialStore, ISignInPrompt, Tokens,
};

/// Keyring service name for storing tokens
const KEYRING_SERVICE: &str = "skywatch";

/// How long the browser sign-in waits for the redirect
const DEFAULT_SIGN_IN_TIMEOUT: StdDuration = StdDuration::from_secs(300);

// ============================================================================
// OAuth2Config
// ============================================================================

/// Configuration for the OAuth2 PKCE authentication flow
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    /// Application (client) ID from Azure AD app registration
    pub app_id: String,
    /// Redirect URI for receiving the authorization code
    pub redirect_uri: String,
    /// OAuth scopes to request
    pub scopes: Vec<String>,
    /// Identity platform authority, e.g. `https://login.microsoftonline.com/consumers`
    pub authority: String,
}

impl OAuth2Config {
    /// Creates a new OAuth2Config with the given app_id and default settings
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            authority: DEFAULT_AUTHORITY.to_string(),
        }
    }

    /// Builds the flow configuration from the `auth` config section
    ///
    /// # Errors
    /// Fails if no application id is configured
    pub fn from_auth_config(auth: &AuthConfig) -> Result<Self> {
        let app_id = auth
            .app_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .context("auth.app_id is not configured")?;

        Ok(Self {
            app_id: app_id.to_string(),
            redirect_uri: auth.redirect_uri.clone(),
            scopes: auth.scopes.clone(),
            authority: auth.authority.clone(),
        })
    }

    /// Creates a config with custom scopes
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Creates a config with a custom redirect URI
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = uri.into();
        self
    }

    /// Creates a config with a custom authority
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    /// Authorization endpoint derived from the authority
    pub fn auth_url(&self) -> String {
        format!("{}/oauth2/v2.0/authorize", self.authority.trim_end_matches('/'))
    }

    /// Token endpoint derived from the authority
    pub fn token_url(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.authority.trim_end_matches('/'))
    }
}

// ============================================================================
// KeyringTokenStorage
// ============================================================================

/// Stores and retrieves OAuth tokens from the system keyring
///
/// Uses the `keyring` crate to store tokens securely in the OS credential
/// store (e.g., GNOME Keyring, KDE Wallet, macOS Keychain).
/// Tokens are serialized as JSON under the service name "skywatch".
#[derive(Debug, Clone)]
pub struct KeyringTokenStorage {
    username: String,
}

impl KeyringTokenStorage {
    /// Creates a storage handle for one keyring username
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    /// The keyring username tokens are stored under
    pub fn username(&self) -> &str {
        &self.username
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(KEYRING_SERVICE, &self.username)
            .context("Failed to create keyring entry")
    }

    /// Stores tokens in the system keyring
    pub fn store(&self, tokens: &Tokens) -> Result<()> {
        let json = serde_json::to_string(tokens).context("Failed to serialize tokens")?;

        self.entry()?
            .set_password(&json)
            .context("Failed to store tokens in keyring")?;

        debug!(user = %self.username, "Stored tokens in keyring");
        Ok(())
    }

    /// Loads tokens from the system keyring
    ///
    /// # Returns
    /// `Some(Tokens)` if found and valid, `None` if not found
    pub fn load(&self) -> Result<Option<Tokens>> {
        match self.entry()?.get_password() {
            Ok(json) => {
                let tokens: Tokens = serde_json::from_str(&json)
                    .context("Failed to deserialize tokens from keyring")?;
                debug!(user = %self.username, "Loaded tokens from keyring");
                Ok(Some(tokens))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(user = %self.username, "No tokens found in keyring");
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }

    /// Removes tokens from the system keyring; succeeds if none were stored
    pub fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) => {
                info!(user = %self.username, "Cleared tokens from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => {
                debug!(user = %self.username, "No tokens to clear");
                Ok(())
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete from keyring")),
        }
    }
}

#[async_trait::async_trait]
impl ICredentialStore for KeyringTokenStorage {
    async fn save(&self, tokens: &Tokens) -> Result<()> {
        self.store(tokens)
    }

    async fn retrieve(&self) -> Result<Option<Tokens>> {
        self.load()
    }

    async fn clear(&self) -> Result<()> {
        KeyringTokenStorage::clear(self)
    }
}

// ============================================================================
// PKCEFlow
// ============================================================================

/// OAuth2 PKCE flow implementation using the `oauth2` crate
///
/// Handles generating authorization URLs with PKCE challenges,
/// exchanging authorization codes for tokens, and refreshing tokens.
pub struct PKCEFlow {
    client: BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>,
    http: reqwest::Client,
    scopes: Vec<String>,
    redirect_uri: String,
}

impl PKCEFlow {
    /// Creates a new PKCEFlow with the given configuration
    pub fn new(config: &OAuth2Config) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(config.app_id.clone()))
            .set_auth_uri(AuthUrl::new(config.auth_url()).context("Invalid authorization URL")?)
            .set_token_uri(TokenUrl::new(config.token_url()).context("Invalid token URL")?)
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_uri.clone()).context("Invalid redirect URI")?,
            );

        // Token endpoints must not be allowed to redirect
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build OAuth HTTP client")?;

        Ok(Self {
            client,
            http,
            scopes: config.scopes.clone(),
            redirect_uri: config.redirect_uri.clone(),
        })
    }

    /// The redirect URI the provider sends the user back to
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Generates an authorization URL with a PKCE challenge
    ///
    /// # Returns
    /// A tuple of `(authorization_url, csrf_token, pkce_verifier)`.
    /// The `pkce_verifier` must be kept until the code exchange step.
    pub fn generate_auth_url(&self) -> (String, CsrfToken, PkceCodeVerifier) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut auth_request = self.client.authorize_url(CsrfToken::new_random);
        for scope in &self.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }

        let (auth_url, csrf_token) = auth_request.set_pkce_challenge(pkce_challenge).url();

        debug!("Generated authorization URL");
        (auth_url.to_string(), csrf_token, pkce_verifier)
    }

    /// Exchanges an authorization code for OAuth tokens
    ///
    /// # Arguments
    /// * `code` - The authorization code received from the callback
    /// * `pkce_verifier` - The PKCE verifier generated alongside the auth URL
    pub async fn exchange_code(
        &self,
        code: String,
        pkce_verifier: PkceCodeVerifier,
    ) -> Result<Tokens> {
        info!("Exchanging authorization code for tokens");

        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http)
            .await
            .context("Failed to exchange authorization code")?;

        info!("Successfully obtained OAuth tokens");
        Ok(tokens_from_response(&token_result, None))
    }

    /// Refreshes an access token using a refresh token
    ///
    /// The previous refresh token is kept when the response omits one.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<Tokens> {
        info!("Refreshing access token");

        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await
            .context("Failed to refresh token")?;

        info!("Successfully refreshed access token");
        Ok(tokens_from_response(&token_result, Some(refresh_token)))
    }
}

fn tokens_from_response(response: &BasicTokenResponse, previous_refresh: Option<&str>) -> Tokens {
    let expires_at = response
        .expires_in()
        .map(|d| Utc::now() + Duration::seconds(d.as_secs() as i64))
        .unwrap_or_else(|| Utc::now() + Duration::hours(1));

    Tokens {
        access_token: response.access_token().secret().to_string(),
        refresh_token: response
            .refresh_token()
            .map(|t| t.secret().to_string())
            .or_else(|| previous_refresh.map(str::to_string)),
        expires_at,
    }
}

// ============================================================================
// LocalCallbackServer
// ============================================================================

/// Parameters extracted from the OAuth2 callback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    /// The authorization code
    pub code: Option<String>,
    /// The CSRF state parameter
    pub state: Option<String>,
    /// Provider error code, e.g. `access_denied`
    pub error: Option<String>,
    /// Provider error description
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Converts the redirect into the port-level response
    ///
    /// A state that does not match `expected_state` is reported as the
    /// error `state_mismatch` without a code.
    pub fn into_response(self, expected_state: &str) -> AuthorizationResponse {
        if self.code.is_some() && self.state.as_deref() != Some(expected_state) {
            warn!("OAuth callback state does not match the request");
            return AuthorizationResponse::denied(
                "state_mismatch",
                Some("The sign-in response did not match this request".to_string()),
            );
        }

        AuthorizationResponse {
            code: self.code,
            error: self.error,
            error_description: self.error_description,
        }
    }
}

/// Minimal HTTP server that listens for the OAuth2 redirect callback
///
/// Binds the host and port of the redirect URI, waits for the provider to
/// redirect the browser back with either a code or an error, answers with
/// an HTML page and shuts down.
pub struct LocalCallbackServer {
    listener: TcpListener,
}

impl LocalCallbackServer {
    /// Binds the host and port of `redirect_uri`
    ///
    /// Port 0 binds an ephemeral port (see [`local_addr`](Self::local_addr)).
    pub async fn bind(redirect_uri: &str) -> Result<Self> {
        let url = url::Url::parse(redirect_uri).context("Invalid redirect URI")?;
        let host = url.host_str().context("Redirect URI has no host")?;
        let port = url
            .port_or_known_default()
            .context("Redirect URI has no port")?;
        let addr = format!("{host}:{port}");

        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind callback server to {addr}"))?;

        info!(%addr, "OAuth callback server listening");
        Ok(Self { listener })
    }

    /// Address the server is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read callback server address")
    }

    /// Serves connections until one request carries a code or an error
    ///
    /// Requests without either (e.g. `/favicon.ico`) get a 400 page and
    /// the server keeps waiting.
    pub async fn wait(self) -> Result<CallbackParams> {
        use http_body_util::Full;
        use hyper::body::Bytes;
        use hyper::header::{HeaderValue, CONTENT_TYPE};
        use hyper::server::conn::http1;
        use hyper::service::service_fn;
        use hyper::{Request, Response, StatusCode};
        use hyper_util::rt::TokioIo;

        let (tx, mut rx) = oneshot::channel::<CallbackParams>();
        let tx = Arc::new(Mutex::new(Some(tx)));

        loop {
            let (stream, _addr) = tokio::select! {
                params = &mut rx => {
                    let params = params
                        .context("Callback server channel closed without receiving parameters")?;
                    info!("Received OAuth callback");
                    return Ok(params);
                }
                accepted = self.listener.accept() => {
                    accepted.context("Failed to accept connection on callback server")?
                }
            };

            let io = TokioIo::new(stream);
            let tx = tx.clone();
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let tx = tx.clone();
                async move {
                    let uri = req.uri().to_string();
                    debug!(%uri, "Callback server received request");

                    let (status, html) = match parse_callback_params(&uri) {
                        Some(params) => {
                            let page = match &params.error {
                                Some(error) => error_html(
                                    params.error_description.as_deref().unwrap_or(error),
                                ),
                                None => success_html(),
                            };
                            if let Some(sender) = tx.lock().await.take() {
                                let _ = sender.send(params);
                            }
                            (StatusCode::OK, page)
                        }
                        None => (
                            StatusCode::BAD_REQUEST,
                            error_html("Missing authorization code in callback"),
                        ),
                    };

                    let mut response = Response::new(Full::new(Bytes::from(html)));
                    *response.status_mut() = status;
                    response.headers_mut().insert(
                        CONTENT_TYPE,
                        HeaderValue::from_static("text/html; charset=utf-8"),
                    );
                    Ok::<_, hyper::Error>(response)
                }
            });

            tokio::spawn(async move {
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(error = %e, "Callback server connection error");
                }
            });
        }
    }
}

/// Parses code, state and error fields from a callback URI
///
/// Returns `None` unless the query carries a `code` or an `error`.
fn parse_callback_params(uri: &str) -> Option<CallbackParams> {
    let url = url::Url::parse(&format!("http://localhost{uri}")).ok()?;
    let mut params = CallbackParams::default();

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => params.code = Some(value.to_string()),
            "state" => params.state = Some(value.to_string()),
            "error" => params.error = Some(value.to_string()),
            "error_description" => params.error_description = Some(value.to_string()),
            _ => {}
        }
    }

    (params.code.is_some() || params.error.is_some()).then_some(params)
}

/// Returns the HTML for a successful authentication page
fn success_html() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>SkyWatch - Signed In</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Signed In</h1>
    <p>SkyWatch can now read and write the watched file.</p>
    <p>You can close this window.</p>
    <script>setTimeout(function() { window.close(); }, 3000);</script>
</body>
</html>"#
        .to_string()
}

/// Returns the HTML for an authentication error page
fn error_html(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>SkyWatch - Sign-In Failed</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Sign-In Failed</h1>
    <p>{message}</p>
    <p>You can close this window.</p>
</body>
</html>"#
    )
}

// ============================================================================
// BrowserSignIn
// ============================================================================

/// Sign-in prompt that opens the system browser and waits on the loopback
/// callback server
#[derive(Debug, Clone)]
pub struct BrowserSignIn {
    timeout: StdDuration,
    open_browser: bool,
}

impl BrowserSignIn {
    /// Creates a prompt with the default five minute timeout
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_SIGN_IN_TIMEOUT,
            open_browser: true,
        }
    }

    /// Sets how long to wait for the redirect
    pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Only print the URL instead of launching a browser
    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }
}

impl Default for BrowserSignIn {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ISignInPrompt for BrowserSignIn {
    async fn prompt(&self, request: &ConsentRequest) -> Result<AuthorizationResponse> {
        let server = LocalCallbackServer::bind(&request.redirect_prefix).await?;

        eprintln!("To sign in, open this URL in a browser:\n\n  {}\n", request.url);
        if self.open_browser {
            info!("Opening browser for authentication");
            if let Err(e) = webbrowser::open(&request.url) {
                warn!(error = %e, "Failed to open browser, use the printed URL");
            }
        }

        match tokio::time::timeout(self.timeout, server.wait()).await {
            Ok(params) => Ok(params?.into_response(&request.csrf_state)),
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Sign-in timed out");
                Ok(AuthorizationResponse::denied(
                    "timeout",
                    Some("No sign-in response was received in time".to_string()),
                ))
            }
        }
    }
}

// ============================================================================
// GraphAuthAdapter
// ============================================================================

/// Runs the full interactive OAuth2 PKCE login once
///
/// Combines [`PKCEFlow`] and an [`ISignInPrompt`]:
///
/// 1. Generates PKCE authorization URL
/// 2. Presents it through the prompt and waits for the redirect
/// 3. Exchanges the authorization code for tokens
pub struct GraphAuthAdapter {
    flow: PKCEFlow,
    prompt: Arc<dyn ISignInPrompt>,
}

impl GraphAuthAdapter {
    /// Creates an adapter that signs in through the system browser
    pub fn new(config: &OAuth2Config) -> Result<Self> {
        Self::with_prompt(config, Arc::new(BrowserSignIn::new()))
    }

    /// Creates an adapter with a custom prompt
    pub fn with_prompt(config: &OAuth2Config, prompt: Arc<dyn ISignInPrompt>) -> Result<Self> {
        Ok(Self {
            flow: PKCEFlow::new(config)?,
            prompt,
        })
    }

    /// Performs the interactive login
    ///
    /// # Errors
    /// Fails if the prompt cannot run, consent is not granted or the code
    /// exchange fails
    pub async fn login(&self) -> Result<Tokens> {
        info!("Starting OAuth2 PKCE login flow");

        let (auth_url, csrf_token, pkce_verifier) = self.flow.generate_auth_url();
        let request = ConsentRequest {
            url: auth_url,
            redirect_prefix: self.flow.redirect_uri().to_string(),
            csrf_state: csrf_token.secret().clone(),
        };

        let response = self.prompt.prompt(&request).await?;
        let Some(code) = response.code.clone() else {
            anyhow::bail!("Sign-in was not completed: {}", response.denial_reason());
        };

        let tokens = self.flow.exchange_code(code, pkce_verifier).await?;
        info!("OAuth2 PKCE login completed successfully");
        Ok(tokens)
    }

    /// Refreshes an access token
    pub async fn refresh(&self, refresh_token: &str) -> Result<Tokens> {
        self.flow.refresh_token(refresh_token).await
    }
}
