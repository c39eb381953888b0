//! Access controller: authentication lifecycle and path resolution
//!
//! [`AccessController`] implements [`IRemoteFileAccess`]. Every operation:
//!
//! 1. waits for the [`AccessGate`] (one remote operation at a time, FIFO)
//! 2. returns quietly if access was permanently revoked
//! 3. parses the delimited path
//! 4. makes sure a session exists: reuse, refresh, restore from the
//!    credential store, or run the interactive sign-in
//! 5. walks the container hierarchy segment by segment, creating missing
//!    folders when the policy allows it
//! 6. lists the final container and downloads or uploads the file
//!
//! ## Revocation
//!
//! When the consent step yields no authorization code the controller moves
//! to [`AuthState::PermanentlyDenied`], rejects the gate (waking every queued
//! caller with a quiet no-op) and notifies each subscribed
//! [`IAccessObserver`] exactly once.
//!
//! ## Locking
//!
//! The session is kept in a `std::sync::Mutex` that is never held across an
//! `.await`; the gate is what serializes remote traffic.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use skywatch_core::domain::{AuthState, RemotePath};
use skywatch_core::ports::{
    AccessError, AuthorizationResponse, IAccessObserver, ICredentialStore, IRemoteDirectory,
    IRemoteFileAccess, ISessionProvider, ISignInPrompt, Tokens,
};

use crate::gate::AccessGate;

/// Tokens closer than this to expiry are refreshed before use
const REFRESH_MARGIN_MINUTES: i64 = 5;

/// Mutable authentication state
struct Session {
    state: AuthState,
    tokens: Option<Tokens>,
    directory: Option<Arc<dyn IRemoteDirectory>>,
}

/// Result of one run of the consent step
enum SignInOutcome {
    Granted(Tokens, Arc<dyn IRemoteDirectory>),
    Declined(AuthorizationResponse),
}

// ============================================================================
// AccessController
// ============================================================================

/// Serialized, authenticated access to remote files by delimited path
pub struct AccessController {
    gate: AccessGate,
    session: Mutex<Session>,
    provider: Arc<dyn ISessionProvider>,
    prompt: Arc<dyn ISignInPrompt>,
    credentials: Arc<dyn ICredentialStore>,
    create_missing_folders: bool,
    observers: Mutex<Vec<Weak<dyn IAccessObserver>>>,
}

impl AccessController {
    /// Creates a controller with no session; folder creation is enabled
    ///
    /// # Arguments
    /// * `provider` - Token exchange, refresh and directory construction
    /// * `prompt` - The user-facing consent step
    /// * `credentials` - Where tokens are restored from and saved to
    pub fn new(
        provider: Arc<dyn ISessionProvider>,
        prompt: Arc<dyn ISignInPrompt>,
        credentials: Arc<dyn ICredentialStore>,
    ) -> Self {
        Self {
            gate: AccessGate::new(),
            session: Mutex::new(Session {
                state: AuthState::Unauthenticated,
                tokens: None,
                directory: None,
            }),
            provider,
            prompt,
            credentials,
            create_missing_folders: true,
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Sets whether missing folders on a path are created or reported
    pub fn with_create_missing_folders(mut self, enabled: bool) -> Self {
        self.create_missing_folders = enabled;
        self
    }

    /// Current authentication state
    pub fn auth_state(&self) -> AuthState {
        self.lock_session().state
    }

    /// Returns true once access has been permanently revoked
    pub fn is_revoked(&self) -> bool {
        self.auth_state().is_terminal()
    }

    /// Saves in the background; the outcome is only logged
    ///
    /// The save is still serialized behind every operation queued before it.
    pub fn save_detached(self: &Arc<Self>, path: String, content: String) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            match this.save_file(&path, &content).await {
                Ok(()) => debug!(path = %path, "Detached save finished"),
                Err(e) => warn!(path = %path, error = %e, "Detached save failed"),
            }
        })
    }

    // ------------------------------------------------------------------------
    // Session management
    // ------------------------------------------------------------------------

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, target: AuthState) -> Result<(), AccessError> {
        let mut session = self.lock_session();
        let from = session.state;
        session
            .state
            .transition_to(target)
            .map_err(|e| AccessError::Authentication(e.to_string()))?;
        debug!(from = %from, to = %target, "Auth state changed");
        Ok(())
    }

    /// Installs a session; moves to `Authenticated` unless already there
    fn adopt(&self, tokens: Tokens, directory: Arc<dyn IRemoteDirectory>) {
        let mut session = self.lock_session();
        if session.state != AuthState::Authenticated {
            if let Err(e) = session.state.transition_to(AuthState::Authenticated) {
                warn!(error = %e, "Discarding session");
                return;
            }
        }
        session.tokens = Some(tokens);
        session.directory = Some(directory);
    }

    /// Returns the directory to use, or `None` when access is revoked
    async fn ensure_session(&self) -> Result<Option<Arc<dyn IRemoteDirectory>>, AccessError> {
        let (state, tokens, directory) = {
            let session = self.lock_session();
            (
                session.state,
                session.tokens.clone(),
                session.directory.clone(),
            )
        };

        match state {
            AuthState::PermanentlyDenied => Ok(None),
            AuthState::Authenticated => {
                if let (Some(tokens), Some(directory)) = (tokens, directory) {
                    if !tokens.expires_within(Duration::minutes(REFRESH_MARGIN_MINUTES)) {
                        return Ok(Some(directory));
                    }
                    if let Some(directory) = self.refresh_session(&tokens).await {
                        return Ok(Some(directory));
                    }
                }
                {
                    let mut session = self.lock_session();
                    session.tokens = None;
                    session.directory = None;
                }
                self.transition(AuthState::Unauthenticated)?;
                self.sign_in().await
            }
            AuthState::SigningIn => {
                // A previous sign-in was cancelled mid-flight
                self.transition(AuthState::Unauthenticated)?;
                self.restore_or_sign_in().await
            }
            AuthState::Unauthenticated => self.restore_or_sign_in().await,
        }
    }

    async fn restore_or_sign_in(&self) -> Result<Option<Arc<dyn IRemoteDirectory>>, AccessError> {
        if let Some(directory) = self.restore_session().await {
            return Ok(Some(directory));
        }
        self.sign_in().await
    }

    /// Tries the credential store; any failure falls back to sign-in
    async fn restore_session(&self) -> Option<Arc<dyn IRemoteDirectory>> {
        let tokens = match self.credentials.retrieve().await {
            Ok(Some(tokens)) => tokens,
            Ok(None) => {
                debug!("No stored credentials");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored credentials");
                return None;
            }
        };

        if tokens.expires_within(Duration::minutes(REFRESH_MARGIN_MINUTES)) {
            return self.refresh_session(&tokens).await;
        }

        match self.provider.open(&tokens) {
            Ok(directory) => {
                info!("Restored session from stored credentials");
                self.adopt(tokens, directory.clone());
                Some(directory)
            }
            Err(e) => {
                warn!(error = %e, "Failed to open session from stored credentials");
                None
            }
        }
    }

    async fn refresh_session(&self, tokens: &Tokens) -> Option<Arc<dyn IRemoteDirectory>> {
        let refresh_token = tokens.refresh_token.as_deref()?;
        let refreshed = match self.provider.refresh(refresh_token).await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                return None;
            }
        };
        self.persist(&refreshed).await;

        match self.provider.open(&refreshed) {
            Ok(directory) => {
                info!("Refreshed session tokens");
                self.adopt(refreshed, directory.clone());
                Some(directory)
            }
            Err(e) => {
                warn!(error = %e, "Failed to open session with refreshed tokens");
                None
            }
        }
    }

    async fn persist(&self, tokens: &Tokens) {
        if let Err(e) = self.credentials.save(tokens).await {
            warn!(error = %e, "Failed to save credentials");
        }
    }

    /// Runs the interactive consent step while the gate is held
    async fn sign_in(&self) -> Result<Option<Arc<dyn IRemoteDirectory>>, AccessError> {
        self.transition(AuthState::SigningIn)?;
        info!("Starting interactive sign-in");

        match self.run_consent().await {
            Ok(SignInOutcome::Granted(tokens, directory)) => {
                self.persist(&tokens).await;
                self.adopt(tokens, directory.clone());
                info!("Sign-in completed");
                Ok(Some(directory))
            }
            Ok(SignInOutcome::Declined(response)) => {
                warn!(
                    reason = %response.denial_reason(),
                    "Sign-in returned no authorization code"
                );
                self.revoke();
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "Sign-in failed");
                self.transition(AuthState::Unauthenticated)?;
                Err(AccessError::Authentication(format!("{e:#}")))
            }
        }
    }

    async fn run_consent(&self) -> anyhow::Result<SignInOutcome> {
        let pending = self.provider.consent_request()?;
        let response = self.prompt.prompt(&pending.request).await?;

        let Some(code) = response.code.clone() else {
            return Ok(SignInOutcome::Declined(response));
        };

        let tokens = self.provider.exchange_code(pending, &code).await?;
        let directory = self.provider.open(&tokens)?;
        Ok(SignInOutcome::Granted(tokens, directory))
    }

    /// Enters the terminal state, rejects the gate and notifies observers
    ///
    /// The transition and the drain happen under the observers lock, so a
    /// concurrent [`subscribe`](IRemoteFileAccess::subscribe) either lands in
    /// the drained list or sees the terminal state.
    fn revoke(&self) {
        let observers = {
            let mut observers = self.lock_observers();
            let mut session = self.lock_session();
            if let Err(e) = session.state.transition_to(AuthState::PermanentlyDenied) {
                debug!(error = %e, "Revocation skipped");
                return;
            }
            session.tokens = None;
            session.directory = None;
            std::mem::take(&mut *observers)
        };

        info!("Access permanently revoked");
        self.gate.reject();

        for observer in observers.iter().filter_map(Weak::upgrade) {
            observer.access_revoked();
        }
    }

    /// Lock order is observers, then session
    fn lock_observers(&self) -> MutexGuard<'_, Vec<Weak<dyn IAccessObserver>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------------
    // Path resolution
    // ------------------------------------------------------------------------

    /// Walks `path` from the root container and returns the id of the
    /// container holding the file
    ///
    /// # Errors
    /// - [`AccessError::RemoteNotFound`] naming the first missing segment
    ///   when folder creation is disabled
    /// - [`AccessError::Remote`] for any failed list or create call
    async fn resolve_container(
        &self,
        directory: &dyn IRemoteDirectory,
        path: &RemotePath,
    ) -> Result<String, AccessError> {
        let mut container_id = path.root_container_id().to_string();
        let mut endpoint = path.root_listing_endpoint().to_string();

        for segment in path.segments() {
            let entries = directory.list(&endpoint).await.map_err(AccessError::Remote)?;

            container_id = match entries.into_iter().find(|e| &e.name == segment) {
                Some(entry) => entry.id,
                None if self.create_missing_folders => {
                    info!(segment = %segment, parent = %container_id, "Creating missing remote folder");
                    directory
                        .create_folder(&container_id, segment)
                        .await
                        .map_err(AccessError::Remote)?
                }
                None => {
                    return Err(AccessError::RemoteNotFound {
                        segment: segment.clone(),
                        path: path.raw_file_path().to_string(),
                    });
                }
            };
            endpoint = RemotePath::container_listing_endpoint(&container_id);
            debug!(segment = %segment, container_id = %container_id, "Resolved path segment");
        }

        Ok(container_id)
    }

    fn listing_endpoint(path: &RemotePath, container_id: &str) -> String {
        if container_id == path.root_container_id() {
            path.root_listing_endpoint().to_string()
        } else {
            RemotePath::container_listing_endpoint(container_id)
        }
    }
}

#[async_trait::async_trait]
impl IRemoteFileAccess for AccessController {
    async fn get_file(&self, path: &str) -> Result<Option<String>, AccessError> {
        let Ok(_guard) = self.gate.acquire().await else {
            debug!(path, "get_file rejected by gate");
            return Ok(None);
        };
        if self.is_revoked() {
            return Ok(None);
        }

        let remote_path = RemotePath::parse(path)?;
        let Some(directory) = self.ensure_session().await? else {
            return Ok(None);
        };

        let container_id = self
            .resolve_container(directory.as_ref(), &remote_path)
            .await?;
        let entries = directory
            .list(&Self::listing_endpoint(&remote_path, &container_id))
            .await
            .map_err(AccessError::Remote)?;

        let Some(entry) = entries
            .into_iter()
            .find(|e| e.name == remote_path.file_name())
        else {
            debug!(path, container_id = %container_id, "Remote file not found");
            return Ok(None);
        };

        let bytes = directory
            .download(&entry.download_ref)
            .await
            .map_err(AccessError::Remote)?;
        debug!(path, size = bytes.len(), "Downloaded remote file");

        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    async fn save_file(&self, path: &str, content: &str) -> Result<(), AccessError> {
        let Ok(_guard) = self.gate.acquire().await else {
            debug!(path, "save_file rejected by gate");
            return Ok(());
        };
        if self.is_revoked() {
            return Ok(());
        }

        let remote_path = RemotePath::parse(path)?;
        let Some(directory) = self.ensure_session().await? else {
            return Ok(());
        };

        let container_id = self
            .resolve_container(directory.as_ref(), &remote_path)
            .await?;
        directory
            .upload(&container_id, remote_path.file_name(), content.as_bytes())
            .await
            .map_err(AccessError::Remote)?;
        info!(path, size = content.len(), "Uploaded remote file");

        Ok(())
    }

    fn subscribe(&self, observer: Weak<dyn IAccessObserver>) {
        {
            let mut observers = self.lock_observers();
            if !self.is_revoked() {
                observers.retain(|o| o.strong_count() > 0);
                observers.push(observer);
                return;
            }
        }
        // Late subscribers still hear about the revocation once
        if let Some(observer) = observer.upgrade() {
            observer.access_revoked();
        }
    }
}
