//! In-memory sink
//!
//! Captures descriptors in a vector for later inspection. The standard
//! sink for tests and demos; also usable as a staging buffer behind a
//! custom flusher.

use jalki_core::{AuditSink, Descriptor, SinkError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Sink that keeps every record in memory
pub struct MemorySink {
    records: Mutex<Vec<Descriptor>>,
    healthy: AtomicBool,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            healthy: AtomicBool::new(true),
        }
    }

    /// Number of captured records
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// True when nothing was captured yet
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Remove and return all captured records, in submission order
    pub fn take_all(&self) -> Vec<Descriptor> {
        std::mem::take(&mut *self.records.lock())
    }

    /// Clone of the captured records without draining them
    pub fn snapshot(&self) -> Vec<Descriptor> {
        self.records.lock().clone()
    }

    /// Flip the reported health (for tests exercising health plumbing)
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AuditSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn record(&self, record: &Descriptor) -> Result<(), SinkError> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    async fn health(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }
}
