//! jalki-core - Core types for the JALKI audit trail pipeline
//!
//! This crate provides the foundational types shared between the JALKI
//! tracker and external sink plugins:
//!
//! - [`Descriptor`] - the structured record describing one intercepted action
//! - [`AuditSink`] trait - async interface for persisting descriptors
//! - [`SinkError`] - error type for sink operations
//! - [`InternedStr`] - zero-cost interning for entity/action labels
//! - [`keys`] - reserved descriptor metadata key constants
//!
//! # Why this crate exists
//!
//! External sink plugins (a database writer, a webhook forwarder) need to
//! implement the `AuditSink` trait and consume the `Descriptor` type. Without
//! `jalki-core` they would depend on `jalki-tracker`, but the tracker might
//! also want to optionally depend on those sinks, creating a cyclic
//! dependency.
//!
//! By extracting core types here, the cycle is broken:
//!
//! ```text
//! jalki-core ◄── jalki-tracker
//!     ▲
//!     └────────── your-sink-crate
//! ```

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]
#![warn(missing_docs)]

mod descriptor;
mod error;
mod sink;

/// String interning for zero-cost cloning of repeated labels
pub mod intern;
/// Reserved descriptor metadata key constants
pub mod keys;

pub use descriptor::{Descriptor, DescriptorId, Metadata, Outcome};
pub use error::SinkError;
pub use intern::InternedStr;
pub use sink::AuditSink;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ==========================================================================
    // SinkError Tests
    // ==========================================================================

    #[test]
    fn test_sink_error_init_display() {
        let err = SinkError::Init("missing credentials".to_string());
        assert_eq!(err.to_string(), "initialization failed: missing credentials");
    }

    #[test]
    fn test_sink_error_serialize_display() {
        let err = SinkError::Serialize("non-utf8 label".to_string());
        assert_eq!(err.to_string(), "serialization failed: non-utf8 label");
    }

    #[test]
    fn test_sink_error_write_display() {
        let err = SinkError::Write("disk full".to_string());
        assert_eq!(err.to_string(), "write failed: disk full");
    }

    #[test]
    fn test_sink_error_connection_display() {
        let err = SinkError::Connection("DNS lookup failed".to_string());
        assert_eq!(err.to_string(), "connection error: DNS lookup failed");
    }

    #[test]
    fn test_sink_error_not_ready_display() {
        assert_eq!(SinkError::NotReady.to_string(), "sink not ready");
    }

    #[test]
    fn test_sink_error_shutdown_display() {
        let err = SinkError::Shutdown("flush failed".to_string());
        assert_eq!(err.to_string(), "shutdown error: flush failed");
    }

    #[test]
    fn test_sink_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SinkError>();
    }

    // ==========================================================================
    // AuditSink Trait Tests
    // ==========================================================================

    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Arc;

    /// Test sink that tracks calls for verification
    struct TestSink {
        name: &'static str,
        record_count: AtomicU64,
        healthy: AtomicBool,
        shutdown_called: AtomicBool,
    }

    impl TestSink {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                record_count: AtomicU64::new(0),
                healthy: AtomicBool::new(true),
                shutdown_called: AtomicBool::new(false),
            }
        }
    }

    #[async_trait::async_trait]
    impl AuditSink for TestSink {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn record(&self, _record: &Descriptor) -> Result<(), SinkError> {
            self.record_count.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn health(&self) -> bool {
            self.healthy.load(Ordering::Relaxed)
        }

        async fn shutdown(&self) -> Result<(), SinkError> {
            self.shutdown_called.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_sink_name() {
        let sink = TestSink::new("test-sink");
        assert_eq!(sink.name(), "test-sink");
    }

    #[tokio::test]
    async fn test_sink_record() {
        let sink = TestSink::new("test");
        let record = Descriptor::new("Blog", "read");

        sink.record(&record).await.unwrap();
        sink.record(&record).await.unwrap();

        assert_eq!(sink.record_count.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_sink_health_toggles() {
        let sink = TestSink::new("test");
        assert!(sink.health().await);

        sink.healthy.store(false, Ordering::Relaxed);
        assert!(!sink.health().await);
    }

    #[tokio::test]
    async fn test_sink_shutdown() {
        let sink = TestSink::new("test");
        assert!(!sink.shutdown_called.load(Ordering::Relaxed));

        sink.shutdown().await.unwrap();
        assert!(sink.shutdown_called.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_sink_is_object_safe() {
        // Verify the trait can be used behind Arc<dyn AuditSink>
        let sink: Arc<dyn AuditSink> = Arc::new(TestSink::new("boxed"));

        assert_eq!(sink.name(), "boxed");
        assert!(sink.health().await);
        assert!(sink.record(&Descriptor::new("Blog", "read")).await.is_ok());
    }

    /// Sink that always fails - for testing error handling
    struct FailingSink;

    #[async_trait::async_trait]
    impl AuditSink for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn record(&self, _record: &Descriptor) -> Result<(), SinkError> {
            Err(SinkError::Write("always fails".to_string()))
        }

        async fn health(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_sink_returns_error() {
        let sink = FailingSink;
        let result = sink.record(&Descriptor::new("Blog", "create")).await;

        match result {
            Err(SinkError::Write(msg)) => assert_eq!(msg, "always fails"),
            other => panic!("Expected SinkError::Write, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sink_default_shutdown_succeeds() {
        struct MinimalSink;

        #[async_trait::async_trait]
        impl AuditSink for MinimalSink {
            fn name(&self) -> &'static str {
                "minimal"
            }
            async fn record(&self, _record: &Descriptor) -> Result<(), SinkError> {
                Ok(())
            }
            async fn health(&self) -> bool {
                true
            }
            // Not overriding shutdown - uses default
        }

        assert!(MinimalSink.shutdown().await.is_ok());
    }
}
