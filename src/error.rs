use thiserror::Error;

/// Errors produced inside the analytics client.
///
/// None of these reach the host application's request path: `log_request`
/// swallows everything and the dispatch worker only logs what it sees.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Configuration could not be loaded or failed validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP request to the collection server failed
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Dispatch queue is at capacity
    #[error("Dispatch queue is full")]
    QueueFull,

    /// Dispatch worker has stopped
    #[error("Dispatch queue is closed")]
    QueueClosed,
}

impl From<config::ConfigError> for AnalyticsError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl AnalyticsError {
    /// Short label used for log fields and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Http(e) if e.is_timeout() => "timeout",
            Self::Http(e) if e.is_connect() => "connect_error",
            Self::Http(_) => "http_error",
            Self::QueueFull => "queue_full",
            Self::QueueClosed => "queue_closed",
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
