//! Inbound content-published events.
//!
//! Events are queued in process and handled one at a time by a worker task.
//! Shutdown is two-phase: [`ContentConsumer::stop_listening`] refuses new events
//! while queued ones still run, and [`ContentConsumer::close`] drains the queue
//! and joins the worker.

use crate::generator::Generator;
use crate::{Document, Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handles one published document.
#[async_trait]
pub trait ContentHandler: Send + Sync {
    /// Apply the event.
    async fn handle(&self, doc: Document) -> Result<()>;
}

#[async_trait]
impl ContentHandler for Generator {
    async fn handle(&self, doc: Document) -> Result<()> {
        self.update_content(&doc).await.map(|_| ())
    }
}

#[async_trait]
impl<T: ContentHandler + ?Sized> ContentHandler for Arc<T> {
    async fn handle(&self, doc: Document) -> Result<()> {
        (**self).handle(doc).await
    }
}

/// Counters since start.
#[derive(Debug, Default)]
pub struct ConsumerStats {
    /// Events accepted into the queue.
    pub received: AtomicU64,
    /// Events handled successfully.
    pub processed: AtomicU64,
    /// Events whose handler failed.
    pub failed: AtomicU64,
}

/// Queue plus worker for content events.
pub struct ContentConsumer {
    sender: Mutex<Option<mpsc::Sender<Document>>>,
    listening: AtomicBool,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    stats: Arc<ConsumerStats>,
}

impl ContentConsumer {
    /// Start the worker with a queue of `capacity` events.
    pub fn spawn(handler: Arc<dyn ContentHandler>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Document>(capacity.max(1));
        let stats = Arc::new(ConsumerStats::default());
        let worker_stats = Arc::clone(&stats);

        let worker = tokio::spawn(async move {
            while let Some(doc) = rx.recv().await {
                let uri = doc.uri.clone();
                match handler.handle(doc).await {
                    Ok(()) => {
                        worker_stats.processed.fetch_add(1, Ordering::Relaxed);
                    },
                    Err(e) => {
                        worker_stats.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(uri = %uri, error = %e, category = e.category(), "Content event failed");
                    },
                }
            }
            debug!("Content queue drained");
        });

        Self {
            sender: Mutex::new(Some(tx)),
            listening: AtomicBool::new(true),
            worker: tokio::sync::Mutex::new(Some(worker)),
            stats,
        }
    }

    /// Queue an event without waiting.
    ///
    /// Fails when the consumer has stopped listening or the queue is full.
    pub fn submit(&self, doc: Document) -> Result<()> {
        if !self.is_listening() {
            return Err(Error::Other("content consumer is not listening".into()));
        }
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| Error::Other("content consumer is closed".into()))?;

        sender.try_send(doc).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::Other("content queue is full".into()),
            mpsc::error::TrySendError::Closed(_) => {
                Error::Other("content consumer is closed".into())
            },
        })?;
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Refuse new events. Queued events still run.
    pub fn stop_listening(&self) {
        if self.listening.swap(false, Ordering::SeqCst) {
            info!("Content consumer stopped listening");
        }
    }

    /// Whether new events are accepted.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Close the queue, wait for queued events to finish and join the worker.
    pub async fn close(&self) -> Result<()> {
        self.stop_listening();
        drop(
            self.sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );

        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker {
            worker
                .await
                .map_err(|e| Error::Other(format!("content worker panicked: {e}")))?;
        }
        info!(
            processed = self.stats.processed.load(Ordering::Relaxed),
            failed = self.stats.failed.load(Ordering::Relaxed),
            "Content consumer closed"
        );
        Ok(())
    }

    /// Counters since start.
    #[must_use]
    pub fn stats(&self) -> &ConsumerStats {
        &self.stats
    }
}
