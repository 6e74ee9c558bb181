//! The request logger handed to framework adapters.

use crate::buffer::RequestBuffer;
use crate::config::AnalyticsConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{AnalyticsError, Result};
use crate::payload::DispatchPayload;
use crate::record::RequestRecord;
use crate::worker::{spawn_dispatch_worker, DispatchQueue};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tokio::task::JoinHandle;

struct WorkerHandle {
    queue: DispatchQueue,
    task: JoinHandle<()>,
}

/// Buffers request records and ships them in time-windowed batches
///
/// Construct one per application (inside a tokio runtime) and share it with
/// handlers through an `Arc`.
///
/// # Example
///
/// ```ignore
/// let logger = Arc::new(RequestLogger::new(&load_config()?)?);
/// logger.log_request(Some("api-key"), record, "Axum", 0);
/// // ...
/// logger.shutdown().await;
/// ```
pub struct RequestLogger {
    buffer: RequestBuffer,
    worker: Mutex<Option<WorkerHandle>>,
}

impl RequestLogger {
    /// Create a logger and spawn its dispatch worker
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: &AnalyticsConfig) -> Result<Self> {
        crate::config::validate_config(config)?;
        let dispatcher = Dispatcher::new(config)?;
        Ok(Self::with_dispatcher(dispatcher, config))
    }

    pub fn with_dispatcher(dispatcher: Dispatcher, config: &AnalyticsConfig) -> Self {
        crate::metrics::describe_metrics();

        // mpsc::channel panics on zero capacity
        let (queue, task) = spawn_dispatch_worker(dispatcher, config.queue_capacity.max(1));

        Self {
            buffer: RequestBuffer::new(config.dispatch_interval()),
            worker: Mutex::new(Some(WorkerHandle { queue, task })),
        }
    }

    /// Record one completed request
    ///
    /// A missing or empty `api_key` makes this a no-op. Otherwise the record
    /// is buffered; once the dispatch interval has elapsed the whole buffer
    /// is handed to the background worker under this call's key, framework
    /// and privacy level. Never blocks on I/O and never fails.
    pub fn log_request(
        &self,
        api_key: Option<&str>,
        request_data: RequestRecord,
        framework: &str,
        privacy_level: i32,
    ) {
        let api_key = match api_key {
            Some(key) if !key.is_empty() => key,
            _ => {
                crate::metrics::record_skipped();
                return;
            }
        };

        crate::metrics::record_logged();

        if let Some(payload) =
            self.buffer
                .push(api_key, framework, privacy_level, request_data, Instant::now())
        {
            self.submit(payload);
        }
    }

    /// Hand the current buffer to the worker now, regardless of the window
    pub fn flush(&self) {
        if let Some(payload) = self.buffer.drain(Instant::now()) {
            self.submit(payload);
        }
    }

    /// Records waiting for the next dispatch
    pub fn pending_records(&self) -> usize {
        self.buffer.len()
    }

    /// Flush the buffer, close the queue and wait until the worker has sent
    /// everything it was given
    ///
    /// Records logged afterwards are buffered but never sent.
    pub async fn shutdown(&self) {
        let Some(handle) = self.lock_worker().take() else {
            return;
        };

        if let Some(payload) = self.buffer.drain(Instant::now()) {
            let records = payload.len();
            if let Err(e) = handle.queue.enqueue_wait(payload).await {
                tracing::warn!(error = %e, records, "Dropping final analytics batch");
                crate::metrics::record_batch_dropped(e.kind(), records);
            }
        }

        drop(handle.queue);
        if let Err(e) = handle.task.await {
            tracing::error!(error = %e, "Analytics dispatch worker panicked");
        }
    }

    fn submit(&self, payload: DispatchPayload) {
        let records = payload.len();

        let result = match self.lock_worker().as_ref() {
            Some(handle) => handle.queue.enqueue(payload),
            None => Err(AnalyticsError::QueueClosed),
        };

        match result {
            Ok(()) => {
                tracing::debug!(records, "Analytics batch queued for dispatch");
            }
            Err(AnalyticsError::QueueClosed) => {
                tracing::debug!(records, "Analytics logger shut down, dropping batch");
                crate::metrics::record_batch_dropped("queue_closed", records);
            }
            Err(e) => {
                tracing::warn!(error = %e, records, "Dropping analytics batch");
                crate::metrics::record_batch_dropped(e.kind(), records);
            }
        }
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<WorkerHandle>> {
        self.worker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
