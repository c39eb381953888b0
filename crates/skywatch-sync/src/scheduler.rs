//! Interval scheduler - non-overlapping periodic ticks on the tokio runtime
//!
//! [`IntervalScheduler`] implements [`IScheduler`] with a spawned loop:
//!
//! ```text
//! start() ──→ spawn ──→ tick ──→ handler().await ──→ tick ──→ ...
//!                         │
//! stop()  ──→ cancel ─────┘ (loop exits before the next tick)
//! ```
//!
//! The handler is awaited inline, so the next tick is only armed after the
//! previous handler has finished. A tick that would have fired while the
//! handler was running is delayed rather than bursted.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use skywatch_core::ports::{IScheduler, TickHandler};

/// Default polling period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Periodic scheduler whose ticks never overlap
pub struct IntervalScheduler {
    period: Duration,
    /// Cancellation handle of the running loop, if any
    running: Mutex<Option<CancellationToken>>,
}

impl IntervalScheduler {
    /// Creates a stopped scheduler
    ///
    /// # Arguments
    /// * `period` - Time between the start of consecutive ticks; clamped to
    ///   at least one millisecond
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            running: Mutex::new(None),
        }
    }

    /// The configured tick period
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Default for IntervalScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl IScheduler for IntervalScheduler {
    fn start(&self, handler: TickHandler) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.as_ref().is_some_and(|t| !t.is_cancelled()) {
            debug!("Scheduler already running");
            return;
        }

        let token = CancellationToken::new();
        *running = Some(token.clone());
        let period = self.period;

        info!(period_ms = period.as_millis() as u64, "Scheduler started");

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                handler().await;
                if token.is_cancelled() {
                    break;
                }
            }

            debug!("Scheduler loop exited");
        });
    }

    fn stop(&self) {
        let token = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(token) = token {
            token.cancel();
            info!("Scheduler stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.is_cancelled())
    }
}

impl Drop for IntervalScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use skywatch_core::ports::TickFuture;

    use super::*;

    fn counting_handler(count: Arc<AtomicUsize>) -> TickHandler {
        Arc::new(move || {
            let count = count.clone();
            Box::pin(async move {
                count.fetch_add(1, Ordering::SeqCst);
            }) as TickFuture
        })
    }

    /// Lets the spawned loop run until it blocks on the timer
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_immediate() {
        let scheduler = IntervalScheduler::new(Duration::from_secs(10));
        let count = Arc::new(AtomicUsize::new(0));

        scheduler.start(counting_handler(count.clone()));
        settle().await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_repeat_every_period() {
        let scheduler = IntervalScheduler::new(Duration::from_secs(10));
        let count = Arc::new(AtomicUsize::new(0));
        scheduler.start(counting_handler(count.clone()));
        settle().await;

        for expected in 2..=4 {
            tokio::time::advance(Duration::from_secs(10)).await;
            settle().await;
            assert_eq!(count.load(Ordering::SeqCst), expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_ticks() {
        let scheduler = IntervalScheduler::new(Duration::from_secs(10));
        let count = Arc::new(AtomicUsize::new(0));
        scheduler.start(counting_handler(count.clone()));
        settle().await;

        scheduler.stop();
        assert!(!scheduler.is_running());

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Stopping twice is harmless
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_running_is_noop() {
        let scheduler = IntervalScheduler::new(Duration::from_secs(10));
        let count = Arc::new(AtomicUsize::new(0));
        scheduler.start(counting_handler(count.clone()));
        scheduler.start(counting_handler(count.clone()));
        settle().await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let scheduler = IntervalScheduler::new(Duration::from_secs(10));
        let count = Arc::new(AtomicUsize::new(0));
        scheduler.start(counting_handler(count.clone()));
        settle().await;
        scheduler.stop();

        scheduler.start(counting_handler(count.clone()));
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_never_overlaps() {
        let scheduler = IntervalScheduler::new(Duration::from_secs(1));
        let active = Arc::new(AtomicBool::new(false));
        let overlapped = Arc::new(AtomicBool::new(false));
        let runs = Arc::new(AtomicUsize::new(0));

        let handler: TickHandler = {
            let (active, overlapped, runs) = (active.clone(), overlapped.clone(), runs.clone());
            Arc::new(move || {
                let (active, overlapped, runs) =
                    (active.clone(), overlapped.clone(), runs.clone());
                Box::pin(async move {
                    if active.swap(true, Ordering::SeqCst) {
                        overlapped.store(true, Ordering::SeqCst);
                    }
                    // Each run takes longer than the period
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    runs.fetch_add(1, Ordering::SeqCst);
                    active.store(false, Ordering::SeqCst);
                }) as TickFuture
            })
        };

        scheduler.start(handler);
        for _ in 0..20 {
            tokio::time::advance(Duration::from_secs(1)).await;
            settle().await;
        }

        assert!(!overlapped.load(Ordering::SeqCst));
        assert!(runs.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn test_period_clamped() {
        let scheduler = IntervalScheduler::new(Duration::ZERO);
        assert_eq!(scheduler.period(), Duration::from_millis(1));
        assert_eq!(IntervalScheduler::default().period(), DEFAULT_POLL_INTERVAL);
    }
}
