//! Integration test: ChangeWatcher → AccessController → remote directory
//!
//! Wires the real controller and watcher together over in-memory port
//! implementations and drives ticks by hand.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use skywatch_core::domain::{AuthState, Fingerprint, WatcherState};
use skywatch_core::ports::{
    AuthorizationResponse, ConsentRequest, DirectoryEntry, IRemoteDirectory, IRemoteFileAccess,
    IScheduler, ISessionProvider, ISignInPrompt, InMemoryCredentialStore, PendingConsent,
    TickHandler, Tokens,
};
use skywatch_sync::{AccessController, ChangeWatcher, WatchEvent};

/// Root-level drive holding a single mutable file
struct SingleFileDirectory {
    content: Mutex<Option<Vec<u8>>>,
    calls: AtomicUsize,
}

impl SingleFileDirectory {
    fn new(initial: &str) -> Arc<Self> {
        Arc::new(Self {
            content: Mutex::new(Some(initial.as_bytes().to_vec())),
            calls: AtomicUsize::new(0),
        })
    }

    fn set(&self, content: &str) {
        *self.content.lock().unwrap() = Some(content.as_bytes().to_vec());
    }
}

#[async_trait::async_trait]
impl IRemoteDirectory for SingleFileDirectory {
    async fn list(&self, _endpoint: &str) -> anyhow::Result<Vec<DirectoryEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .content
            .lock()
            .unwrap()
            .iter()
            .map(|_| DirectoryEntry {
                name: "watched.txt".to_string(),
                id: "FILE".to_string(),
                download_ref: "FILE".to_string(),
            })
            .collect())
    }

    async fn create_folder(&self, _parent_id: &str, _name: &str) -> anyhow::Result<String> {
        anyhow::bail!("unexpected create")
    }

    async fn download(&self, _download_ref: &str) -> anyhow::Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.content
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow::anyhow!("gone"))
    }

    async fn upload(&self, _parent_id: &str, _name: &str, data: &[u8]) -> anyhow::Result<()> {
        *self.content.lock().unwrap() = Some(data.to_vec());
        Ok(())
    }
}

struct Provider(Arc<SingleFileDirectory>);

#[async_trait::async_trait]
impl ISessionProvider for Provider {
    fn consent_request(&self) -> anyhow::Result<PendingConsent> {
        Ok(PendingConsent {
            request: ConsentRequest {
                url: "https://login.example/authorize".to_string(),
                redirect_prefix: "http://127.0.0.1:8400/callback".to_string(),
                csrf_state: "csrf".to_string(),
            },
            pkce_verifier: "verifier".to_string(),
        })
    }

    async fn exchange_code(&self, _pending: PendingConsent, _code: &str) -> anyhow::Result<Tokens> {
        Ok(Tokens {
            access_token: "access".to_string(),
            refresh_token: None,
            expires_at: Utc::now() + Duration::hours(1),
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> anyhow::Result<Tokens> {
        anyhow::bail!("no refresh in this test")
    }

    fn open(&self, _tokens: &Tokens) -> anyhow::Result<Arc<dyn IRemoteDirectory>> {
        Ok(self.0.clone())
    }
}

struct Prompt {
    response: AuthorizationResponse,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl ISignInPrompt for Prompt {
    async fn prompt(&self, _request: &ConsentRequest) -> anyhow::Result<AuthorizationResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

#[derive(Default)]
struct ManualScheduler {
    handler: Mutex<Option<TickHandler>>,
    stops: AtomicUsize,
}

impl ManualScheduler {
    async fn fire(&self) {
        let handler = self.handler.lock().unwrap().clone();
        if let Some(handler) = handler {
            handler().await;
        }
    }
}

impl IScheduler for ManualScheduler {
    fn start(&self, handler: TickHandler) {
        *self.handler.lock().unwrap() = Some(handler);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.handler.lock().unwrap().take();
    }

    fn is_running(&self) -> bool {
        self.handler.lock().unwrap().is_some()
    }
}

fn stack(
    directory: Arc<SingleFileDirectory>,
    response: AuthorizationResponse,
) -> (Arc<AccessController>, Arc<Prompt>) {
    let prompt = Arc::new(Prompt {
        response,
        calls: AtomicUsize::new(0),
    });
    let controller = Arc::new(AccessController::new(
        Arc::new(Provider(directory)),
        prompt.clone(),
        Arc::new(InMemoryCredentialStore::new()),
    ));
    (controller, prompt)
}

#[tokio::test]
async fn test_seeded_watch_reports_only_real_change() {
    let directory = SingleFileDirectory::new("someValueSomething");
    let (controller, prompt) = stack(directory.clone(), AuthorizationResponse::authorized("code"));
    let scheduler = Arc::new(ManualScheduler::default());

    let (watcher, mut events) = ChangeWatcher::new(
        "watched.txt",
        controller.clone(),
        scheduler.clone(),
        Some(Fingerprint::of("someValueSomething")),
    )
    .unwrap();
    watcher.start();

    scheduler.fire().await;
    assert!(events.try_recv().is_err());

    directory.set("blabla");
    scheduler.fire().await;
    scheduler.fire().await;

    let WatchEvent::Changed { content, .. } = events.try_recv().unwrap();
    assert_eq!(content, "blabla");
    assert!(events.try_recv().is_err());
    assert_eq!(prompt.calls.load(Ordering::SeqCst), 1);
    assert_eq!(controller.auth_state(), AuthState::Authenticated);
}

#[tokio::test]
async fn test_denied_sign_in_locks_watcher() {
    let directory = SingleFileDirectory::new("content");
    let (controller, prompt) = stack(
        directory.clone(),
        AuthorizationResponse::denied("access_denied", None),
    );
    let scheduler = Arc::new(ManualScheduler::default());

    let (watcher, mut events) =
        ChangeWatcher::new("watched.txt", controller.clone(), scheduler.clone(), None).unwrap();
    watcher.start();

    scheduler.fire().await;

    assert_eq!(controller.auth_state(), AuthState::PermanentlyDenied);
    assert_eq!(watcher.state(), WatcherState::Locked);
    assert_eq!(scheduler.stops.load(Ordering::SeqCst), 1);
    assert!(events.try_recv().is_err());

    // Restarting a locked watcher does not arm the scheduler again
    watcher.start();
    assert!(!scheduler.is_running());

    // Direct calls are quiet no-ops with no remote traffic
    assert_eq!(controller.get_file("watched.txt").await.unwrap(), None);
    controller.save_file("watched.txt", "x").await.unwrap();
    assert_eq!(directory.calls.load(Ordering::SeqCst), 0);
    assert_eq!(prompt.calls.load(Ordering::SeqCst), 1);
}
