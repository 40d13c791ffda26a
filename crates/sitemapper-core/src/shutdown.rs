//! Process lifecycle and ordered shutdown.
//!
//! The service moves through `Starting → Running → ShuttingDown → Stopped`.
//! Shutdown runs a fixed list of steps in order, dependents before their
//! dependencies. Every step runs even if an earlier one failed; failures are
//! logged per step and folded into one [`Error::Shutdown`] at the end.

use crate::{Error, Result};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Process lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Components are being constructed.
    Starting,
    /// Serving traffic and running scheduled jobs.
    Running,
    /// Shutdown sequence in progress.
    ShuttingDown,
    /// Shutdown sequence finished.
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Observable lifecycle state machine. Transitions only move forward.
pub struct Lifecycle {
    state: watch::Sender<LifecycleState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Start in [`LifecycleState::Starting`].
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Starting);
        Self { state }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Receiver notified on every transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// `Starting → Running`.
    pub fn mark_running(&self) -> Result<()> {
        self.transition(&[LifecycleState::Starting], LifecycleState::Running)
    }

    /// `Starting | Running → ShuttingDown`.
    ///
    /// Returns `false` if shutdown had already begun, so a second signal is a no-op.
    pub fn begin_shutdown(&self) -> bool {
        self.transition(
            &[LifecycleState::Starting, LifecycleState::Running],
            LifecycleState::ShuttingDown,
        )
        .is_ok()
    }

    /// `ShuttingDown → Stopped`.
    pub fn mark_stopped(&self) -> Result<()> {
        self.transition(&[LifecycleState::ShuttingDown], LifecycleState::Stopped)
    }

    fn transition(&self, from: &[LifecycleState], to: LifecycleState) -> Result<()> {
        let mut outcome = Ok(());
        self.state.send_if_modified(|state| {
            if from.contains(state) {
                info!(from = %state, to = %to, "Lifecycle transition");
                *state = to;
                true
            } else {
                outcome = Err(Error::Other(format!(
                    "invalid lifecycle transition from {state} to {to}"
                )));
                false
            }
        });
        outcome
    }
}

/// Ordered shutdown actions.
#[derive(Default)]
pub struct ShutdownSequence {
    steps: Vec<(String, BoxFuture<'static, Result<()>>)>,
}

/// What happened to each step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Steps that completed successfully, in order.
    pub completed: Vec<String>,
    /// Steps that failed, in order.
    pub failed: Vec<String>,
    /// Steps that never finished because the deadline passed.
    pub unfinished: Vec<String>,
}

impl ShutdownReport {
    /// Whether every step completed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.unfinished.is_empty()
    }
}

impl ShutdownSequence {
    /// Empty sequence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step. The future does not start until the sequence runs.
    #[must_use]
    pub fn step<F>(mut self, name: &str, action: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.steps.push((name.to_string(), action.boxed()));
        self
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the sequence has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order within `timeout`, without stopping at failures.
    ///
    /// The deadline is shared. Steps reached after it has passed are still
    /// polled once, so actions that complete immediately always take effect;
    /// only steps still pending at the deadline are reported as unfinished.
    pub async fn run_report(self, timeout: Duration) -> ShutdownReport {
        let mut report = ShutdownReport {
            completed: Vec::new(),
            failed: Vec::new(),
            unfinished: Vec::new(),
        };
        let deadline = tokio::time::Instant::now() + timeout;

        for (name, action) in self.steps {
            match tokio::time::timeout_at(deadline, action).await {
                Ok(Ok(())) => {
                    info!(step = %name, "Shutdown step completed");
                    report.completed.push(name);
                },
                Ok(Err(e)) => {
                    error!(step = %name, error = %e, "Shutdown step failed");
                    report.failed.push(name);
                },
                Err(_) => {
                    warn!(
                        step = %name,
                        timeout_secs = timeout.as_secs(),
                        "Shutdown step did not finish before the deadline"
                    );
                    report.unfinished.push(name);
                },
            }
        }
        report
    }

    /// Run the sequence and fold the outcome into a single result.
    pub async fn run(self, timeout: Duration) -> Result<()> {
        let report = self.run_report(timeout).await;
        if report.is_clean() {
            return Ok(());
        }

        let mut problems = Vec::new();
        if !report.failed.is_empty() {
            problems.push(format!("failed steps: {}", report.failed.join(", ")));
        }
        if !report.unfinished.is_empty() {
            problems.push(format!(
                "unfinished at deadline: {}",
                report.unfinished.join(", ")
            ));
        }
        Err(Error::Shutdown(problems.join("; ")))
    }
}
