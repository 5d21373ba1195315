//! `WorkerPool`: bounds concurrent device sessions

use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

use crate::error::CoreError;

/// Snapshot of pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPoolState {
    pub capacity: usize,
    pub in_flight: usize,
    pub available: usize,
    /// Highest `in_flight` seen so far
    pub peak: usize,
}

/// Fixed number of session slots plus the set of targets holding one
#[derive(Debug, Clone)]
pub struct WorkerPool {
    capacity: usize,
    permits: Arc<Semaphore>,
    in_flight: Arc<Mutex<Vec<IpAddr>>>,
    peak: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Pool with `capacity` slots; zero is rejected
    pub fn new(capacity: usize) -> Result<Self, CoreError> {
        if capacity == 0 || capacity > Semaphore::MAX_PERMITS {
            return Err(CoreError::InvalidPoolSize(capacity));
        }
        Ok(Self {
            capacity,
            permits: Arc::new(Semaphore::new(capacity)),
            in_flight: Arc::new(Mutex::new(Vec::with_capacity(capacity))),
            peak: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Wait for a free slot and claim it for `addr`
    pub async fn acquire(&self, addr: IpAddr) -> Result<Slot, CoreError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| CoreError::ActorError("worker pool closed".into()))?;

        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.push(addr);
        self.peak.fetch_max(in_flight.len(), Ordering::Relaxed);
        trace!(%addr, in_flight = in_flight.len(), "slot acquired");
        drop(in_flight);

        Ok(Slot {
            addr,
            in_flight: Arc::clone(&self.in_flight),
            _permit: permit,
        })
    }

    #[must_use]
    pub fn state(&self) -> WorkerPoolState {
        let in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        WorkerPoolState {
            capacity: self.capacity,
            in_flight,
            available: self.permits.available_permits(),
            peak: self.peak.load(Ordering::Relaxed),
        }
    }

    /// Targets currently holding a slot
    #[must_use]
    pub fn in_flight(&self) -> Vec<IpAddr> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// A claimed session slot, released on drop
#[derive(Debug)]
pub struct Slot {
    addr: IpAddr,
    in_flight: Arc<Mutex<Vec<IpAddr>>>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for Slot {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = in_flight.iter().position(|addr| *addr == self.addr) {
            in_flight.swap_remove(pos);
        }
    }
}
