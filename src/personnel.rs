//! Fixed pool of typed kitchen workers with exclusive acquire/release.
//!
//! Each worker kind is gated by its own counting semaphore sized to the number
//! of workers of that kind. Holding a permit guarantees that a free worker of
//! the kind exists; the worker itself is then claimed from the arena under the
//! state mutex without any suspension point between the scan and the claim.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::config::KitchenConfig;
use crate::error::{KitchenError, Result};
use crate::types::{WorkerId, WorkerKind};

struct Worker {
    kind: WorkerKind,
    available: bool,
}

/// Per-kind usage counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Occupancy {
    pub capacity: usize,
    pub in_use: usize,
    pub peak: usize,
    /// Set if more workers of the kind were ever busy than exist.
    pub violation: bool,
}

impl Occupancy {
    fn enter(&mut self) {
        self.in_use += 1;
        self.peak = self.peak.max(self.in_use);
        if self.in_use > self.capacity {
            self.violation = true;
        }
    }

    fn leave(&mut self) {
        debug_assert!(self.in_use > 0, "occupancy counter underflow");
        self.in_use = self.in_use.saturating_sub(1);
    }
}

struct PoolState {
    workers: Vec<Worker>,
    occupancy: [Occupancy; WorkerKind::COUNT],
}

/// Proof of exclusive use of one worker. Hand it back with [`WorkerPool::release`].
#[derive(Debug)]
pub struct WorkerHandle {
    id: WorkerId,
    kind: WorkerKind,
    _permit: OwnedSemaphorePermit,
}

impl WorkerHandle {
    pub fn id(&self) -> WorkerId {
        self.id
    }
}

pub struct WorkerPool {
    state: Mutex<PoolState>,
    permits: [Arc<Semaphore>; WorkerKind::COUNT],
    retry_backoff: Duration,
}

impl WorkerPool {
    /// Build the pool from the configured head count per kind.
    ///
    /// Worker ids follow construction order: all dough workers first, then
    /// topping, oven and waiter workers.
    pub fn new(config: &KitchenConfig) -> Self {
        let mut workers = Vec::new();
        let mut occupancy = [Occupancy::default(); WorkerKind::COUNT];
        for kind in WorkerKind::ALL {
            let count = config.station(kind).workers;
            occupancy[kind.index()].capacity = count;
            workers.extend((0..count).map(|_| Worker {
                kind,
                available: true,
            }));
        }
        let permits = WorkerKind::ALL
            .map(|kind| Arc::new(Semaphore::new(config.station(kind).workers)));
        Self {
            state: Mutex::new(PoolState { workers, occupancy }),
            permits,
            retry_backoff: config.retry_backoff(),
        }
    }

    /// Wait until a worker of `kind` is free and claim it.
    ///
    /// Never gives up: every backoff period spent waiting is logged as a
    /// failed attempt. Waiters are served in arrival order.
    pub async fn acquire(&self, kind: WorkerKind) -> Result<WorkerHandle> {
        let acquire = Arc::clone(&self.permits[kind.index()]).acquire_owned();
        tokio::pin!(acquire);
        let mut attempt: u64 = 0;
        let permit = loop {
            match tokio::time::timeout(self.retry_backoff, &mut acquire).await {
                Ok(permit) => {
                    break permit.map_err(|_| KitchenError::Pool {
                        kind,
                        reason: "semaphore closed".to_string(),
                    })?;
                }
                Err(_elapsed) => {
                    attempt += 1;
                    warn!(%kind, attempt, "checking availability for process \"{kind}\" - attempt #{attempt}");
                }
            }
        };

        // The permit guarantees a free worker; scan and claim without yielding.
        let mut guard = self.state.lock().expect("worker pool mutex poisoned");
        let id = guard
            .workers
            .iter()
            .position(|worker| worker.kind == kind && worker.available)
            .ok_or_else(|| KitchenError::Pool {
                kind,
                reason: "permit granted but no worker is free".to_string(),
            })?;
        guard.workers[id].available = false;
        guard.occupancy[kind.index()].enter();
        drop(guard);

        debug!(%kind, worker = id, attempts = attempt, "worker acquired");
        Ok(WorkerHandle {
            id,
            kind,
            _permit: permit,
        })
    }

    /// Return a worker to the pool.
    ///
    /// Returns false if the worker was already marked available. The handle's
    /// permit goes back either way, so the usage counter follows it.
    pub fn release(&self, handle: WorkerHandle) -> bool {
        let mut guard = self.state.lock().expect("worker pool mutex poisoned");
        let Some(worker) = guard.workers.get_mut(handle.id) else {
            warn!(worker = handle.id, kind = %handle.kind, "release of unknown worker");
            return false;
        };
        let released = !worker.available;
        if released {
            worker.available = true;
        } else {
            warn!(worker = handle.id, kind = %handle.kind, "release of a worker that is already available");
        }
        guard.occupancy[handle.kind.index()].leave();
        drop(guard);
        // Dropping the handle returns the permit and wakes the next waiter.
        drop(handle);
        released
    }

    /// Snapshot of the usage counters of one kind.
    pub fn occupancy(&self, kind: WorkerKind) -> Occupancy {
        let guard = self.state.lock().expect("worker pool mutex poisoned");
        guard.occupancy[kind.index()]
    }

    /// Number of currently free workers of `kind`.
    #[cfg(test)]
    pub fn available(&self, kind: WorkerKind) -> usize {
        let guard = self.state.lock().expect("worker pool mutex poisoned");
        guard
            .workers
            .iter()
            .filter(|worker| worker.kind == kind && worker.available)
            .count()
    }

    /// Test-only hook to flip a flag behind the pool's back.
    #[cfg(test)]
    fn force_available_for_test(&self, id: WorkerId) {
        let mut guard = self.state.lock().expect("worker pool mutex poisoned");
        guard.workers[id].available = true;
    }

    /// Test-only hook: fail every pending and future acquire of `kind`.
    #[cfg(test)]
    pub fn close_for_test(&self, kind: WorkerKind) {
        self.permits[kind.index()].close();
    }
}
