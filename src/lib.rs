//! Request analytics for web services
//!
//! Framework adapters call [`RequestLogger::log_request`] once per completed
//! request. Records are buffered in memory and, once the dispatch interval
//! (60 seconds by default) has passed, shipped as a single JSON batch to
//! `POST {server_url}/api/log-request` by a background worker.
//!
//! ## Architecture
//!
//! ```text
//! adapter (axum middleware, ...)
//!     ↓ log_request
//! RequestBuffer (mutex, time window)
//!     ↓ drained batch
//! DispatchQueue (bounded channel)
//!     ↓
//! dispatch worker → Dispatcher (reqwest POST)
//! ```
//!
//! Telemetry never fails the host request: missing keys are skipped silently
//! and network errors only show up in logs.

pub mod buffer;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logger;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod payload;
pub mod record;
pub mod worker;

pub use config::{load_config, load_config_from, AnalyticsConfig};
pub use dispatcher::Dispatcher;
pub use error::AnalyticsError;
pub use logger::RequestLogger;
pub use middleware::{analytics_middleware, AnalyticsState};
pub use payload::DispatchPayload;
pub use record::RequestRecord;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing/logging
///
/// Convenience for applications without their own subscriber. Does nothing
/// if a global subscriber is already installed.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Same as [`init_tracing`] with JSON-formatted output
pub fn init_json_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_target(true))
        .try_init();

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
