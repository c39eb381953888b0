//! Periodic scheduler port
//!
//! A scheduler drives a single tick handler. The contract that callers
//! rely on:
//! - the first tick happens promptly after [`IScheduler::start`]
//! - the next tick is armed only after the previous handler future has
//!   completed, so a handler never runs concurrently with itself
//! - [`IScheduler::stop`] prevents further ticks; a tick already in
//!   flight is allowed to finish

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by one tick of the handler
pub type TickFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// The periodic callback
pub type TickHandler = Arc<dyn Fn() -> TickFuture + Send + Sync>;

/// Port trait for a non-overlapping periodic tick source
pub trait IScheduler: Send + Sync {
    /// Arms the scheduler with `handler`; a no-op if already running
    fn start(&self, handler: TickHandler);

    /// Disarms the scheduler; a no-op if not running
    fn stop(&self);

    /// Returns true while armed
    fn is_running(&self) -> bool;
}
