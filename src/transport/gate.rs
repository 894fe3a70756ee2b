//! NSTART congestion gate.
//!
//! Caps the number of Confirmable exchanges a connection may have
//! unacknowledged at once. Built on a tokio [`Semaphore`], which queues
//! waiters in FIFO order.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::core::GateError;

/// Per-connection limit on in-flight exchanges.
pub struct CongestionGate {
    semaphore: Arc<Semaphore>,
    n_start: usize,
}

impl CongestionGate {
    /// Create a gate with `n_start` slots.
    pub fn new(n_start: u32) -> Self {
        let n_start = n_start.max(1) as usize;
        Self {
            semaphore: Arc::new(Semaphore::new(n_start)),
            n_start,
        }
    }

    /// Wait for a free slot and take it.
    ///
    /// Fails once the gate is closed, including for callers already waiting.
    pub async fn acquire(&self) -> Result<SlotPermit, GateError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| GateError::Closed)?;
        Ok(SlotPermit::new(permit))
    }

    /// Take a free slot without waiting.
    pub fn try_acquire(&self) -> Result<SlotPermit, GateError> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Ok(SlotPermit::new(permit)),
            Err(TryAcquireError::NoPermits) => Err(GateError::NoCapacity),
            Err(TryAcquireError::Closed) => Err(GateError::Closed),
        }
    }

    /// Return a slot to this gate, waking at most one waiter.
    ///
    /// The permit is consumed, so it cannot be released twice. A permit from
    /// another gate is rejected; it still frees its own slot when dropped.
    pub fn release(&self, permit: SlotPermit) -> Result<(), GateError> {
        if !permit.belongs_to(&self.semaphore) {
            return Err(GateError::ForeignPermit);
        }
        drop(permit);
        Ok(())
    }

    /// Number of slots currently taken.
    pub fn in_flight(&self) -> usize {
        self.n_start.saturating_sub(self.semaphore.available_permits())
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.n_start
    }

    /// Refuse all current and future waiters.
    ///
    /// Outstanding permits stay valid and are still returned on release.
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Check if the gate has been closed.
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}

impl fmt::Debug for CongestionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CongestionGate")
            .field("n_start", &self.n_start)
            .field("in_flight", &self.in_flight())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// One occupied gate slot.
///
/// Released exactly once: by [`CongestionGate::release`] or on drop.
#[derive(Debug)]
#[must_use = "dropping the permit frees the slot immediately"]
pub struct SlotPermit {
    permit: OwnedSemaphorePermit,
}

impl SlotPermit {
    fn new(permit: OwnedSemaphorePermit) -> Self {
        Self { permit }
    }

    fn belongs_to(&self, semaphore: &Arc<Semaphore>) -> bool {
        Arc::ptr_eq(self.permit.semaphore(), semaphore)
    }
}
