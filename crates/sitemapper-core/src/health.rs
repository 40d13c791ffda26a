//! Health reporting for the long-running service.
//!
//! Components record named checks into a shared [`HealthMonitor`]; the HTTP
//! listener serves the aggregated [`HealthReport`]. Stopping the monitor is the
//! first shutdown step, after which late reports from winding-down components
//! are ignored.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Aggregated health report.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Overall status derived from all checks.
    pub overall_status: HealthStatus,
    /// Individual check results, sorted by name.
    pub checks: Vec<HealthCheck>,
    /// Whether the monitor has stopped accepting reports.
    pub stopped: bool,
}

/// Individual health check result.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    /// Check name, e.g. `rebuild`.
    pub name: String,
    /// Status of the check.
    pub status: HealthStatus,
    /// Message describing the result.
    pub message: String,
    /// When the check was last reported.
    pub checked_at: DateTime<Utc>,
}

/// Health status for checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Check passed with no issues.
    Healthy,
    /// Check passed with warnings.
    Warning,
    /// Check failed with an error.
    Error,
}

/// Collects the latest result of every named check.
#[derive(Debug, Default)]
pub struct HealthMonitor {
    checks: RwLock<BTreeMap<String, HealthCheck>>,
    stopped: AtomicBool,
}

impl HealthMonitor {
    /// Create a monitor with no checks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest result of `name`.
    ///
    /// Returns `false` if the monitor is stopped and the report was dropped.
    pub fn record(&self, name: &str, status: HealthStatus, message: impl Into<String>) -> bool {
        if self.is_stopped() {
            debug!(check = name, "Health monitor stopped, ignoring report");
            return false;
        }
        let check = HealthCheck {
            name: name.to_string(),
            status,
            message: message.into(),
            checked_at: Utc::now(),
        };
        match self.checks.write() {
            Ok(mut checks) => {
                checks.insert(name.to_string(), check);
                true
            },
            Err(_) => false,
        }
    }

    /// Record the outcome of an operation: `Healthy` on success, `Error` otherwise.
    pub fn record_result<T>(&self, name: &str, result: &crate::Result<T>) -> bool {
        match result {
            Ok(_) => self.record(name, HealthStatus::Healthy, "ok"),
            Err(e) => self.record(name, HealthStatus::Error, e.to_string()),
        }
    }

    /// Current report. With no checks recorded the service counts as healthy.
    #[must_use]
    pub fn report(&self) -> HealthReport {
        let checks: Vec<HealthCheck> = self
            .checks
            .read()
            .map(|checks| checks.values().cloned().collect())
            .unwrap_or_default();
        let overall_status = checks
            .iter()
            .map(|c| c.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);
        HealthReport {
            overall_status,
            checks,
            stopped: self.is_stopped(),
        }
    }

    /// Stop accepting reports.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Whether [`HealthMonitor::stop`] was called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_empty_monitor_is_healthy() {
        let report = HealthMonitor::new().report();
        assert_eq!(report.overall_status, HealthStatus::Healthy);
        assert!(report.checks.is_empty());
    }

    #[test]
    fn test_worst_check_wins() {
        let monitor = HealthMonitor::new();
        monitor.record("store", HealthStatus::Healthy, "ok");
        monitor.record("translation", HealthStatus::Warning, "CMS slow");
        assert_eq!(monitor.report().overall_status, HealthStatus::Warning);

        monitor.record("rebuild", HealthStatus::Error, "failed to start scroll");
        assert_eq!(monitor.report().overall_status, HealthStatus::Error);
    }

    #[test]
    fn test_latest_report_replaces_previous() {
        let monitor = HealthMonitor::new();
        monitor.record_result::<()>("rebuild", &Err(Error::Query("boom".into())));
        monitor.record_result("rebuild", &Ok(()));

        let report = monitor.report();
        assert_eq!(report.checks.len(), 1);
        assert_eq!(report.overall_status, HealthStatus::Healthy);
    }

    #[test]
    fn test_stopped_monitor_ignores_reports() {
        let monitor = HealthMonitor::new();
        monitor.stop();

        assert!(!monitor.record("rebuild", HealthStatus::Error, "late"));
        let report = monitor.report();
        assert!(report.stopped);
        assert!(report.checks.is_empty());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&HealthStatus::Warning).unwrap_or_default();
        assert_eq!(json, "\"warning\"");
    }
}
