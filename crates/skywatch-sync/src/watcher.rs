//! Change-detection watcher for one remote file
//!
//! A [`ChangeWatcher`] polls a single remote path through an
//! [`IRemoteFileAccess`] on every scheduler tick, fingerprints the content
//! and emits a [`WatchEvent::Changed`] when the fingerprint differs from the
//! last one seen.
//!
//! ## Flow
//!
//! ```text
//! IScheduler tick ──→ get_file(path) ──→ Fingerprint::of ──→ differs? ──→ mpsc::UnboundedSender
//!                                                                │
//!                                                      last_fingerprint updated
//! ```
//!
//! Polls are single-flight. A tick that fires while the previous one is
//! still fetching (after a `stop()`/`start()` cycle, or through
//! [`ChangeWatcher::check_now`]) waits for it, then compares against the
//! fingerprint it stored.
//!
//! The watcher subscribes to access revocation. Once revoked it moves to
//! [`WatcherState::Locked`], stops the scheduler and ignores any later
//! `start()`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use skywatch_core::domain::{DomainError, Fingerprint, RemotePath, WatcherState};
use skywatch_core::ports::{
    IAccessObserver, IRemoteFileAccess, IScheduler, TickFuture, TickHandler,
};

// ============================================================================
// WatchEvent
// ============================================================================

/// Notification emitted by a [`ChangeWatcher`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The watched file's content changed
    Changed {
        /// The new content
        content: String,
        /// Fingerprint of `content`
        fingerprint: Fingerprint,
    },
}

// ============================================================================
// ChangeWatcher
// ============================================================================

struct WatcherInner {
    path: String,
    access: Arc<dyn IRemoteFileAccess>,
    scheduler: Arc<dyn IScheduler>,
    state: Mutex<WatcherState>,
    last_fingerprint: Mutex<Option<Fingerprint>>,
    /// Held for the whole of one poll
    polling: AsyncMutex<()>,
    events: mpsc::UnboundedSender<WatchEvent>,
}

/// Polls one remote file and reports content changes
///
/// ## Usage
///
/// ```ignore
/// let (watcher, mut events) = ChangeWatcher::new(r"notes\todo.txt", access, scheduler, None)?;
/// watcher.start();
/// while let Some(WatchEvent::Changed { content, .. }) = events.recv().await {
///     println!("{content}");
/// }
/// ```
pub struct ChangeWatcher {
    inner: Arc<WatcherInner>,
}

impl ChangeWatcher {
    /// Creates an idle watcher and subscribes it to access revocation
    ///
    /// # Arguments
    /// * `path` - Delimited remote path of the watched file
    /// * `access` - Serialized remote access (usually the access controller)
    /// * `scheduler` - Tick source driving the polls
    /// * `seed` - Fingerprint of content already known; a first fetch that
    ///   matches it does not produce an event
    ///
    /// # Returns
    /// The watcher and the single receiver of its change events
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidArgument`] if `path` is not a valid
    /// remote path
    pub fn new(
        path: impl Into<String>,
        access: Arc<dyn IRemoteFileAccess>,
        scheduler: Arc<dyn IScheduler>,
        seed: Option<Fingerprint>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<WatchEvent>), DomainError> {
        let path = path.into();
        RemotePath::parse(&path)?;

        let (events, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(WatcherInner {
            path,
            access,
            scheduler,
            state: Mutex::new(WatcherState::Idle),
            last_fingerprint: Mutex::new(seed),
            polling: AsyncMutex::new(()),
            events,
        });

        let observer: Weak<dyn IAccessObserver> = Arc::downgrade(&inner) as Weak<dyn IAccessObserver>;
        inner.access.subscribe(observer);

        Ok((Self { inner }, rx))
    }

    /// Arms the scheduler; a no-op when locked or already scheduled
    pub fn start(&self) {
        let mut state = self.inner.lock_state();
        match *state {
            WatcherState::Locked => {
                debug!(path = %self.inner.path, "Watcher is locked, not starting");
                return;
            }
            WatcherState::Scheduled => return,
            WatcherState::Idle => {}
        }

        let weak = Arc::downgrade(&self.inner);
        let handler: TickHandler = Arc::new(move || {
            let weak = weak.clone();
            Box::pin(async move {
                if let Some(inner) = weak.upgrade() {
                    inner.tick().await;
                }
            }) as TickFuture
        });

        if let Err(e) = state.transition_to(WatcherState::Scheduled) {
            warn!(error = %e, "Watcher could not be scheduled");
            return;
        }
        self.inner.scheduler.start(handler);
        info!(path = %self.inner.path, "Watcher started");
    }

    /// Disarms the scheduler; returns to idle unless locked
    pub fn stop(&self) {
        self.inner.scheduler.stop();
        let mut state = self.inner.lock_state();
        if *state == WatcherState::Scheduled {
            *state = WatcherState::Idle;
            info!(path = %self.inner.path, "Watcher stopped");
        }
    }

    /// Runs one poll immediately, outside the scheduler
    ///
    /// Waits for a scheduled poll that is already in flight.
    pub async fn check_now(&self) {
        self.inner.tick().await;
    }

    /// Current polling state
    pub fn state(&self) -> WatcherState {
        *self.inner.lock_state()
    }

    /// Fingerprint of the last content reported (or the seed)
    pub fn last_fingerprint(&self) -> Option<Fingerprint> {
        self.inner
            .last_fingerprint
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The watched remote path
    pub fn path(&self) -> &str {
        &self.inner.path
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.inner.scheduler.stop();
    }
}

impl WatcherInner {
    fn lock_state(&self) -> MutexGuard<'_, WatcherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn tick(&self) {
        let _polling = self.polling.lock().await;
        if *self.lock_state() == WatcherState::Locked {
            return;
        }

        let content = match self.access.get_file(&self.path).await {
            Ok(Some(content)) => content,
            Ok(None) => {
                debug!(path = %self.path, "Nothing to compare this tick");
                return;
            }
            Err(e) => {
                warn!(path = %self.path, error = %e, "Poll failed");
                return;
            }
        };

        let fingerprint = Fingerprint::of(content.as_bytes());
        let unchanged = self
            .last_fingerprint
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            == Some(&fingerprint);
        if unchanged {
            debug!(path = %self.path, fingerprint = %fingerprint, "Content unchanged");
            return;
        }

        info!(path = %self.path, fingerprint = %fingerprint, "Change detected");
        let event = WatchEvent::Changed {
            content,
            fingerprint: fingerprint.clone(),
        };
        if self.events.send(event).is_err() {
            debug!(path = %self.path, "No receiver for change event");
        }

        *self
            .last_fingerprint
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(fingerprint);
    }
}

impl IAccessObserver for WatcherInner {
    fn access_revoked(&self) {
        {
            let mut state = self.lock_state();
            if let Err(e) = state.transition_to(WatcherState::Locked) {
                debug!(error = %e, "Watcher already locked");
                return;
            }
        }
        self.scheduler.stop();
        info!(path = %self.path, "Access revoked, watcher locked");
    }
}
