//! Client-side metrics
//!
//! Recorded through the `metrics` facade. The host application decides
//! whether and where they are exported; without an installed recorder every
//! call is a no-op.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

/// Register metric descriptions (can be called multiple times safely)
pub fn describe_metrics() {
    describe_counter!(
        "analytics_records_logged_total",
        "Request records accepted into the buffer"
    );
    describe_counter!(
        "analytics_records_skipped_total",
        "Request records ignored because no API key was supplied"
    );
    describe_counter!(
        "analytics_dispatches_total",
        "Dispatches to the collection server, by outcome"
    );
    describe_counter!(
        "analytics_batches_dropped_total",
        "Drained batches that never reached the worker, by reason"
    );
    describe_histogram!(
        "analytics_dispatch_duration_seconds",
        "Duration of POST /api/log-request in seconds"
    );
}

pub fn record_logged() {
    counter!("analytics_records_logged_total").increment(1);
}

pub fn record_skipped() {
    counter!("analytics_records_skipped_total").increment(1);
}

/// Record a finished dispatch; `outcome` is `success`, `rejected` or an
/// error kind
pub fn record_dispatch(outcome: &'static str, records: usize, duration: Duration) {
    counter!("analytics_dispatches_total", "outcome" => outcome).increment(1);
    histogram!("analytics_dispatch_duration_seconds", "outcome" => outcome)
        .record(duration.as_secs_f64());
    tracing::trace!(outcome, records, "Dispatch metrics recorded");
}

pub fn record_batch_dropped(reason: &'static str, records: usize) {
    counter!("analytics_batches_dropped_total", "reason" => reason).increment(1);
    tracing::trace!(reason, records, "Batch drop recorded");
}
