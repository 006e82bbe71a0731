//! Stdout sink for debugging
//!
//! Prints descriptors to stdout in a human-readable format. Useful for
//! development; production deployments point at a durable sink instead.

use jalki_core::{AuditSink, Descriptor, SinkError};
use std::sync::atomic::{AtomicU64, Ordering};

/// Sink that prints descriptors for debugging
pub struct StdoutSink {
    /// Multi-line box output instead of one line per record
    pretty: bool,
    /// Count of records written
    recorded_count: AtomicU64,
}

impl StdoutSink {
    /// Create a compact single-line sink
    pub fn new() -> Self {
        Self {
            pretty: false,
            recorded_count: AtomicU64::new(0),
        }
    }

    /// Create a pretty-printing sink
    pub fn pretty() -> Self {
        Self {
            pretty: true,
            recorded_count: AtomicU64::new(0),
        }
    }

    /// Total records written
    pub fn recorded_count(&self) -> u64 {
        self.recorded_count.load(Ordering::Relaxed)
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AuditSink for StdoutSink {
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn record(&self, record: &Descriptor) -> Result<(), SinkError> {
        use std::io::Write;

        let mut stdout = std::io::stdout().lock();

        let result = if self.pretty {
            writeln!(
                stdout,
                "┌─ Audit ─────────────────────────────────────────────"
            )
            .and_then(|_| writeln!(stdout, "│ ID:      {}", record.id))
            .and_then(|_| writeln!(stdout, "│ Entity:  {}", record.entity))
            .and_then(|_| writeln!(stdout, "│ Action:  {}", record.action))
            .and_then(|_| writeln!(stdout, "│ Outcome: {}", record.outcome))
            .and_then(|_| {
                if !record.metadata().is_empty() {
                    writeln!(stdout, "│ Meta:    {:?}", record.metadata())
                } else {
                    Ok(())
                }
            })
            .and_then(|_| {
                writeln!(
                    stdout,
                    "└─────────────────────────────────────────────────────"
                )
            })
        } else {
            writeln!(
                stdout,
                "[{}] {} {} ({})",
                record.entity, record.action, record.outcome, record.id
            )
        };

        result.map_err(|e| SinkError::Write(format!("stdout write failed: {}", e)))?;

        self.recorded_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn health(&self) -> bool {
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use jalki_core::Outcome;

    #[tokio::test]
    async fn test_record_increments_count() {
        let sink = StdoutSink::new();
        let record = Descriptor::new("Blog", "read");

        sink.record(&record).await.unwrap();
        sink.record(&record).await.unwrap();

        assert_eq!(sink.recorded_count(), 2);
    }

    #[tokio::test]
    async fn test_pretty_record() {
        let sink = StdoutSink::pretty();
        let record = Descriptor::new("Blog", "delete")
            .with_outcome(Outcome::Error)
            .with_metadata("jalki.error", "not found");

        sink.record(&record).await.unwrap();
        assert_eq!(sink.recorded_count(), 1);
    }

    #[tokio::test]
    async fn test_health() {
        assert!(StdoutSink::new().health().await);
    }
}
