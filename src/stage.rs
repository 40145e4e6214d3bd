//! A single station step: acquire a worker, hold it, release it.

use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::Result;
use crate::personnel::WorkerPool;
use crate::types::{WorkerId, WorkerKind};

/// Timeline of one completed stage execution.
#[derive(Clone, Debug)]
pub struct StageRecord {
    pub kind: WorkerKind,
    pub worker: WorkerId,
    pub label: String,
    pub started_at: Instant,
    pub finished_at: Instant,
}

impl StageRecord {
    pub fn elapsed(&self) -> Duration {
        self.finished_at.saturating_duration_since(self.started_at)
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }
}

/// Fixed-duration step that needs one worker of a given kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stage {
    kind: WorkerKind,
    duration: Duration,
}

impl Stage {
    pub fn new(kind: WorkerKind, duration: Duration) -> Self {
        Self { kind, duration }
    }

    /// Run the stage once for `label`, waiting for a worker if none is free.
    ///
    /// The recorded interval starts once the worker is claimed, so time spent
    /// queueing for a worker is not part of the stage's elapsed time.
    pub async fn execute(&self, pool: &WorkerPool, label: &str) -> Result<StageRecord> {
        let worker = pool.acquire(self.kind).await?;
        let worker_id = worker.id();
        let started_at = Instant::now();
        let started_wall = Utc::now();

        tokio::time::sleep(self.duration).await;

        if !pool.release(worker) {
            warn!(kind = %self.kind, worker = worker_id, "stage \"{label}\" returned a worker that was already free");
        }
        let finished_at = Instant::now();
        let finished_wall = Utc::now();
        info!(
            kind = %self.kind,
            worker = worker_id,
            "Process {} for \"{}\" completed START TIME: {} END TIME: {}",
            self.kind,
            label,
            started_wall.to_rfc2822(),
            finished_wall.to_rfc2822()
        );

        Ok(StageRecord {
            kind: self.kind,
            worker: worker_id,
            label: label.to_string(),
            started_at,
            finished_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KitchenConfig;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn elapsed_is_never_shorter_than_duration() {
        let pool = WorkerPool::new(&KitchenConfig::default());
        let stage = Stage::new(WorkerKind::Dough, Duration::from_secs(7));
        let record = stage.execute(&pool, "Margherita").await.expect("dough stage");

        assert_eq!(record.kind, WorkerKind::Dough);
        assert_eq!(record.label, "Margherita");
        assert!(record.elapsed_secs() >= 7.0);
        assert!(record.elapsed() < Duration::from_millis(7050));
        // Worker is back in the pool once the stage returns.
        assert_eq!(pool.available(WorkerKind::Dough), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn queueing_time_is_excluded_from_elapsed() {
        let pool = Arc::new(WorkerPool::new(&KitchenConfig::default()));
        let stage = Stage::new(WorkerKind::Oven, Duration::from_secs(10));

        let first = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { stage.execute(&pool, "first").await })
        };
        let second = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { stage.execute(&pool, "second").await })
        };
        let first = first.await.expect("join").expect("first oven");
        let second = second.await.expect("join").expect("second oven");

        // Single oven: the second bake starts after the first one ends.
        assert!(second.started_at >= first.finished_at);
        assert_eq!(first.worker, second.worker);
        assert!(second.elapsed() < Duration::from_millis(10_050));
        assert_eq!(pool.occupancy(WorkerKind::Oven).peak, 1);
    }
}
