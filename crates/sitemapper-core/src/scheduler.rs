//! Fixed-interval trigger for the rebuild job.
//!
//! Every tick spawns one run through the [`JobLimiter`], bounded by a per-run
//! timeout. Failed or timed-out runs are logged and the next tick starts from
//! scratch; nothing is retried in between.

use crate::{Error, Result};
use crate::limiter::JobLimiter;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Handle to a running tick loop.
pub struct Scheduler {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
    limiter: JobLimiter,
}

impl Scheduler {
    /// Start ticking. The first tick fires immediately.
    pub fn spawn<F, Fut>(interval: Duration, timeout: Duration, limiter: JobLimiter, job: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let job = Arc::new(job);
        let tick_limiter = limiter.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut runs = JoinSet::new();

            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    Some(_) = runs.join_next(), if !runs.is_empty() => continue,
                    _ = ticker.tick() => {},
                }

                let limiter = tick_limiter.clone();
                let job = Arc::clone(&job);
                runs.spawn(async move {
                    limiter.admit(|| run_once(job.as_ref(), timeout)).await;
                });
            }

            debug!(in_flight = runs.len(), "Scheduler stopping, waiting for runs");
            while runs.join_next().await.is_some() {}
        });

        info!(
            interval_secs = interval.as_secs(),
            timeout_secs = timeout.as_secs(),
            max_concurrent = limiter.capacity(),
            "Scheduler started"
        );

        Self {
            stop_tx,
            handle,
            limiter,
        }
    }

    /// Whether the tick loop or any run is still active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished() || self.limiter.running() > 0
    }

    /// Stop ticking and wait until no run is executing.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            error!(error = %e, "Scheduler task panicked");
        }
        self.limiter.wait_idle().await;
        info!("Scheduler stopped");
    }
}

async fn run_once<F, Fut>(job: &F, timeout: Duration) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let result = tokio::time::timeout(timeout, job())
        .await
        .map_err(Error::from)
        .and_then(|outcome| outcome);

    match &result {
        Ok(()) => debug!("Scheduled run finished"),
        Err(e) => error!(
            error = %e,
            category = e.category(),
            recoverable = e.is_recoverable(),
            timeout_secs = timeout.as_secs(),
            "Scheduled run failed"
        ),
    }
    result
}
