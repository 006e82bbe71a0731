//! Error types for JALKI sinks

use thiserror::Error;

/// Error type for sink operations
///
/// The standard error type returned by [`AuditSink`](crate::AuditSink)
/// implementations. The tracker never propagates these to the request path;
/// they surface only on the diagnostic channel and in metrics.
///
/// # Example
///
/// ```
/// use jalki_core::SinkError;
///
/// fn connect_to_store() -> Result<(), SinkError> {
///     Err(SinkError::Connection("refused".to_string()))
/// }
///
/// match connect_to_store() {
///     Ok(_) => println!("connected"),
///     Err(SinkError::Connection(msg)) => println!("connection failed: {}", msg),
///     Err(e) => println!("other error: {}", e),
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Initialization failed
    ///
    /// Invalid configuration, missing credentials, failed to open the store.
    #[error("initialization failed: {0}")]
    Init(String),

    /// Serialization failed
    ///
    /// The descriptor could not be encoded for the destination.
    #[error("serialization failed: {0}")]
    Serialize(String),

    /// Write failed
    ///
    /// The destination rejected or lost the record: disk full, quota
    /// exceeded, table missing.
    #[error("write failed: {0}")]
    Write(String),

    /// Connection error
    ///
    /// DNS failure, connection refused, TLS handshake error.
    #[error("connection error: {0}")]
    Connection(String),

    /// Not ready
    ///
    /// The sink was asked to record before it finished starting up.
    /// Typically transient.
    #[error("sink not ready")]
    NotReady,

    /// Shutdown error
    #[error("shutdown error: {0}")]
    Shutdown(String),
}
