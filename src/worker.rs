//! Background dispatch worker
//!
//! Drained batches are handed to a bounded channel and posted by one
//! dedicated tokio task, so request threads never wait on the network.
//! Dropping every [`DispatchQueue`] closes the channel; the worker then
//! delivers what is already queued and exits.

use crate::dispatcher::Dispatcher;
use crate::error::{AnalyticsError, Result};
use crate::payload::DispatchPayload;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

/// Sending half of the dispatch channel
#[derive(Clone)]
pub struct DispatchQueue {
    sender: mpsc::Sender<DispatchPayload>,
}

impl DispatchQueue {
    /// Enqueue a batch without blocking (callable from any thread)
    pub fn enqueue(&self, payload: DispatchPayload) -> Result<()> {
        self.sender.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => AnalyticsError::QueueFull,
            TrySendError::Closed(_) => AnalyticsError::QueueClosed,
        })
    }

    /// Enqueue a batch, waiting for room if the queue is full
    pub async fn enqueue_wait(&self, payload: DispatchPayload) -> Result<()> {
        self.sender
            .send(payload)
            .await
            .map_err(|_| AnalyticsError::QueueClosed)
    }

    /// Number of batches waiting for the worker
    pub fn pending_count(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }
}

/// Spawn the worker task on the current tokio runtime
///
/// # Example
///
/// ```ignore
/// let (queue, worker) = spawn_dispatch_worker(dispatcher, 64);
/// queue.enqueue(payload)?;  // Non-blocking
/// drop(queue);
/// worker.await?;            // Everything queued has been sent
/// ```
pub fn spawn_dispatch_worker(
    dispatcher: Dispatcher,
    capacity: usize,
) -> (DispatchQueue, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity);

    let handle = tokio::spawn(async move {
        worker_task(dispatcher, rx).await;
    });

    (DispatchQueue { sender: tx }, handle)
}

async fn worker_task(dispatcher: Dispatcher, mut rx: mpsc::Receiver<DispatchPayload>) {
    tracing::debug!(endpoint = dispatcher.endpoint(), "Analytics dispatch worker started");

    while let Some(payload) = rx.recv().await {
        // Failures stay inside the worker: no retry, nothing propagates back
        match dispatcher.dispatch(&payload).await {
            Ok(status) => {
                tracing::debug!(
                    status = status.as_u16(),
                    records = payload.len(),
                    "Batch dispatched"
                );
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    kind = e.kind(),
                    records = payload.len(),
                    "Failed to dispatch analytics batch"
                );
            }
        }
    }

    tracing::info!("Analytics dispatch worker shutting down");
}
