//! AuditSink trait for JALKI sink plugins
//!
//! The [`AuditSink`] trait defines the interface for durably recording
//! descriptors. Sinks are the output side of the tracking pipeline and live
//! in their own failure domain: a sink error never reaches the caller of a
//! wrapped handler.

use crate::descriptor::Descriptor;
use crate::error::SinkError;
use async_trait::async_trait;

/// AuditSink trait - records descriptors at a destination
///
/// One sink receives every descriptor the tracker produces. Retry policy,
/// if any, belongs inside the sink implementation (see the tracker's
/// `RetrySink` wrapper); the tracker itself submits each record exactly
/// once and treats any error as final.
///
/// # Implementation Requirements
///
/// - Sinks must be `Send + Sync` for use across async tasks
/// - `record` should not block for unbounded time; slow destinations should
///   buffer internally or be wrapped in a timeout
/// - Health checks should be lightweight
/// - Shutdown should flush pending records and release resources
///
/// # Example
///
/// ```ignore
/// use jalki_core::{AuditSink, Descriptor, SinkError};
/// use async_trait::async_trait;
///
/// struct HttpSink {
///     client: reqwest::Client,
///     endpoint: String,
/// }
///
/// #[async_trait]
/// impl AuditSink for HttpSink {
///     fn name(&self) -> &'static str {
///         "http"
///     }
///
///     async fn record(&self, record: &Descriptor) -> Result<(), SinkError> {
///         let body = serde_json::to_vec(record)
///             .map_err(|e| SinkError::Serialize(e.to_string()))?;
///
///         self.client.post(&self.endpoint)
///             .body(body)
///             .send()
///             .await
///             .map_err(|e| SinkError::Write(e.to_string()))?;
///
///         Ok(())
///     }
///
///     async fn health(&self) -> bool {
///         true
///     }
/// }
/// ```
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Returns the sink's name for identification and logging
    ///
    /// A short, descriptive name that uniquely identifies the sink type.
    /// Examples: "stdout", "memory", "postgres".
    fn name(&self) -> &'static str;

    /// Record a single descriptor at the destination
    ///
    /// # Returns
    ///
    /// * `Ok(())` - the record was accepted
    /// * `Err(SinkError)` - the record was lost; the tracker logs the error
    ///   once and moves on
    async fn record(&self, record: &Descriptor) -> Result<(), SinkError>;

    /// Check whether the destination is accepting records
    ///
    /// Polled for metrics and health endpoints. Must not block for long.
    async fn health(&self) -> bool;

    /// Graceful shutdown
    ///
    /// Flush buffered records, close connections, release resources.
    /// The default implementation returns `Ok(())` for sinks that don't
    /// need cleanup.
    async fn shutdown(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
