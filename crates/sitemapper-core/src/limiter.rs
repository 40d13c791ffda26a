//! Load-shedding concurrency limit for recurring jobs.
//!
//! A [`JobLimiter`] admits at most N concurrent runs of a job. A trigger that
//! arrives while all N slots are busy is dropped on the spot: it is not queued,
//! not retried and not reported as an error. The skip shows up only as a warning
//! and in [`JobLimiter::skipped`].

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Caps concurrent executions of one recurring job.
#[derive(Clone)]
pub struct JobLimiter {
    name: Arc<str>,
    capacity: usize,
    slots: Arc<Semaphore>,
    started: Arc<AtomicU64>,
    skipped: Arc<AtomicU64>,
}

impl JobLimiter {
    /// Create a limiter with `capacity` slots (at least one).
    #[must_use]
    pub fn new(name: &str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            name: Arc::from(name),
            capacity,
            slots: Arc::new(Semaphore::new(capacity)),
            started: Arc::new(AtomicU64::new(0)),
            skipped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run `job` if a slot is free.
    ///
    /// Never waits for a slot. Returns `None` when the run was skipped.
    pub async fn admit<F, Fut, T>(&self, job: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let Ok(permit) = Arc::clone(&self.slots).try_acquire_owned() else {
            let skipped = self.skipped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                job = %self.name,
                capacity = self.capacity,
                skipped,
                "All job slots busy, skipping run"
            );
            return None;
        };

        self.started.fetch_add(1, Ordering::Relaxed);
        debug!(job = %self.name, running = self.running(), "Job admitted");
        let output = job().await;
        drop(permit);
        Some(output)
    }

    /// Number of runs currently executing.
    #[must_use]
    pub fn running(&self) -> usize {
        self.capacity - self.slots.available_permits()
    }

    /// Wait until no run is executing.
    pub async fn wait_idle(&self) {
        let all = u32::try_from(self.capacity).unwrap_or(u32::MAX);
        // Holding every slot at once proves nothing else holds one
        let _ = self.slots.acquire_many(all).await;
    }

    /// Slot count.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Runs admitted so far.
    #[must_use]
    pub fn started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    /// Triggers dropped so far.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}
