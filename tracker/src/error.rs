//! Error types for the JALKI tracker

use thiserror::Error;

// Re-export SinkError from jalki-core
pub use jalki_core::SinkError;

/// Result type alias for tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Main error type for tracker setup and runtime plumbing
///
/// Handler-side failures use [`HandlerError`](crate::HandlerError); this
/// type covers everything around them: configuration, IO, sink wiring.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Sink error surfaced outside the dispatch path (init, shutdown)
    #[error("sink '{sink}' error: {message}")]
    Sink {
        /// Name of the failing sink
        sink: String,
        /// What went wrong
        message: String,
    },

    /// Metrics registration error
    #[error("metrics error: {0}")]
    Metrics(String),

    /// Shutdown requested
    #[error("shutdown requested")]
    Shutdown,
}

impl From<SinkError> for TrackerError {
    fn from(err: SinkError) -> Self {
        TrackerError::Sink {
            sink: "unknown".to_string(),
            message: err.to_string(),
        }
    }
}
