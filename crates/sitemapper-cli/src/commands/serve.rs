//! Long-running service: scheduled rebuilds, content events and health.

use anyhow::{Context, Result};
use sitemapper_core::{
    Config, ContentConsumer, ContentHandler, Generator, HealthMonitor, HealthStatus, JobLimiter,
    Lifecycle, Scheduler, ShutdownSequence,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::server::{self, AppState};

/// Pending content events held before `/events` starts refusing.
const EVENT_QUEUE_CAPACITY: usize = 256;

/// Run until SIGINT/SIGTERM, then shut down in order.
pub async fn execute(config: Config, bind: Option<SocketAddr>) -> Result<()> {
    let lifecycle = Lifecycle::new();
    let health = Arc::new(HealthMonitor::new());
    let generator =
        Arc::new(Generator::from_config(&config).context("failed to set up generator")?);

    let consumer = Arc::new(ContentConsumer::spawn(
        Arc::clone(&generator) as Arc<dyn ContentHandler>,
        EVENT_QUEUE_CAPACITY,
    ));

    let limiter = JobLimiter::new("rebuild", config.schedule.max_concurrent);
    let scheduler = {
        let generator = Arc::clone(&generator);
        let health = Arc::clone(&health);
        Scheduler::spawn(
            Duration::from_secs(config.schedule.interval),
            Duration::from_secs(config.schedule.timeout),
            limiter,
            move || {
                let generator = Arc::clone(&generator);
                let health = Arc::clone(&health);
                async move {
                    let result = generator.generate_full().await;
                    health.record_result("rebuild", &result);
                    result.map(|_| ())
                }
            },
        )
    };

    let addr = bind.unwrap_or(config.server.bind);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let state = AppState {
        health: Arc::clone(&health),
        consumer: Arc::clone(&consumer),
        lifecycle: lifecycle.subscribe(),
    };
    let (http_stop, http_stop_rx) = oneshot::channel();
    let http = tokio::spawn(server::serve(listener, state, http_stop_rx));

    lifecycle.mark_running()?;
    health.record("service", HealthStatus::Healthy, "running");
    info!(address = %addr, "sitemapper service running");

    wait_for_signal().await;
    if !lifecycle.begin_shutdown() {
        warn!("Shutdown already in progress");
    }

    let sequence = ShutdownSequence::new()
        .step("health", {
            let health = Arc::clone(&health);
            async move {
                health.stop();
                Ok(())
            }
        })
        .step("scheduler", async move {
            scheduler.stop().await;
            Ok(())
        })
        .step("consumer-listen", {
            let consumer = Arc::clone(&consumer);
            async move {
                consumer.stop_listening();
                Ok(())
            }
        })
        .step("http", async move {
            let _ = http_stop.send(());
            match http.await {
                Ok(result) => result.map_err(sitemapper_core::Error::from),
                Err(e) => Err(sitemapper_core::Error::Other(format!(
                    "HTTP listener task failed: {e}"
                ))),
            }
        })
        .step("consumer", {
            let consumer = Arc::clone(&consumer);
            async move { consumer.close().await }
        });

    let outcome = sequence
        .run(Duration::from_secs(config.server.shutdown_timeout))
        .await;
    lifecycle.mark_stopped()?;

    let stats = consumer.stats();
    info!(
        received = stats.received.load(Ordering::Relaxed),
        processed = stats.processed.load(Ordering::Relaxed),
        failed = stats.failed.load(Ordering::Relaxed),
        "sitemapper service stopped"
    );
    outcome.context("shutdown did not complete cleanly")
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                    _ = term.recv() => info!("Received SIGTERM"),
                }
            },
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            },
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl-C");
    }
}
