//! Single-slot access gate with permanent rejection
//!
//! [`AccessGate`] admits one caller at a time, in arrival order, and can be
//! switched into a rejecting mode in which every queued and every future
//! caller is turned away. The controller uses it to serialize all remote
//! traffic and to shut the door for good once access has been revoked.
//!
//! Built on a one-permit fair [`Semaphore`]: closing the semaphore wakes all
//! pending `acquire_owned` calls with an error and makes later calls fail
//! immediately, which is exactly the rejection broadcast.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

/// Outcome of an acquisition attempt on a rejecting gate
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    /// The gate has been switched to rejecting mode
    #[error("access gate is rejecting all callers")]
    Rejected,
}

/// Proof of admission; the slot is released when this guard is dropped
///
/// Holding the slot in a guard means every exit path of the critical
/// section, including `?` and panics, releases it exactly once.
#[derive(Debug)]
pub struct GateGuard {
    _permit: OwnedSemaphorePermit,
}

/// Single-slot FIFO gate with a one-way rejecting mode
#[derive(Debug, Clone)]
pub struct AccessGate {
    slot: Arc<Semaphore>,
    rejected: Arc<AtomicBool>,
}

impl AccessGate {
    /// Creates an open gate with one free slot
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Semaphore::new(1)),
            rejected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Waits until the caller is the sole holder
    ///
    /// # Errors
    /// Returns [`GateError::Rejected`] if the gate is rejecting, either
    /// already or at any point while the caller is queued
    pub async fn acquire(&self) -> Result<GateGuard, GateError> {
        let permit = self
            .slot
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GateError::Rejected)?;
        debug!("Access gate admitted caller");
        Ok(GateGuard { _permit: permit })
    }

    /// Switches the gate to rejecting mode for the rest of its lifetime
    ///
    /// Queued callers are woken with [`GateError::Rejected`]. A current
    /// holder keeps its guard until it drops it.
    ///
    /// # Returns
    /// `true` if this call performed the switch, `false` if the gate was
    /// already rejecting
    pub fn reject(&self) -> bool {
        if self.rejected.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.slot.close();
        info!("Access gate switched to rejecting mode");
        true
    }

    /// Returns true once [`reject`](Self::reject) has been called
    pub fn is_rejecting(&self) -> bool {
        self.rejected.load(Ordering::Acquire)
    }
}

impl Default for AccessGate {
    fn default() -> Self {
        Self::new()
    }
}
