//! Audit dispatch - the sink's failure domain boundary
//!
//! The dispatcher is the only component that talks to the sink on the
//! request path, and its contract is simple: [`submit`](AuditDispatcher::submit)
//! never fails, never blocks on sink latency, and attempts delivery of each
//! record exactly once.
//!
//! Two strategies:
//!
//! - **Background** (default): a bounded mpsc channel feeds a worker task
//!   that drains records into the sink. `try_send` only - a full channel
//!   drops the record with a warning instead of applying backpressure to
//!   the response path.
//! - **Inline**: await the sink directly under a short timeout, swallowing
//!   both timeout and sink errors. For callers that want the record durably
//!   attempted before the response goes out.

use crate::metrics::Metrics;
use jalki_core::{AuditSink, Descriptor};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How audit records travel from the wrapper to the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Bounded channel + worker task; full channel drops the record
    Background {
        /// Channel capacity before records are dropped
        capacity: usize,
    },
    /// Await the sink with a bound; timeout and errors are swallowed
    Inline {
        /// Upper bound on how long a submission may hold the caller
        timeout: Duration,
    },
}

impl Default for DispatchMode {
    fn default() -> Self {
        DispatchMode::Background { capacity: 1024 }
    }
}

#[derive(Clone)]
enum Inner {
    Background { tx: mpsc::Sender<Descriptor> },
    Inline { sink: Arc<dyn AuditSink>, timeout: Duration },
}

/// Hands records to the sink without exposing the caller to sink behavior
///
/// Cheap to clone; every wrapped handler holds one.
#[derive(Clone)]
pub struct AuditDispatcher {
    inner: Inner,
}

impl AuditDispatcher {
    /// Start a dispatcher for the given sink
    ///
    /// In background mode this spawns the worker task and returns its
    /// handle; await it after dropping all dispatcher clones to drain
    /// queued records through [`AuditSink::shutdown`]. Must be called
    /// within a tokio runtime.
    pub fn start(sink: Arc<dyn AuditSink>, mode: DispatchMode) -> (Self, Option<JoinHandle<()>>) {
        match mode {
            DispatchMode::Background { capacity } => {
                let (tx, rx) = mpsc::channel(capacity);
                let handle = tokio::spawn(drain(rx, sink));
                (
                    Self {
                        inner: Inner::Background { tx },
                    },
                    Some(handle),
                )
            }
            DispatchMode::Inline { timeout } => (
                Self {
                    inner: Inner::Inline { sink, timeout },
                },
                None,
            ),
        }
    }

    /// Best-effort synchronous submission for cancelled calls
    ///
    /// Runs from a `Drop` impl, so it can neither await nor fail loudly.
    /// Background mode: `try_send`, dropping silently when full or closed.
    /// Inline mode: detach a task when a runtime is available.
    pub(crate) fn submit_abandoned(&self, record: Descriptor) {
        match &self.inner {
            Inner::Background { tx } => {
                let _ = tx.try_send(record);
            }
            Inner::Inline { sink, timeout } => {
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    let sink = Arc::clone(sink);
                    let timeout = *timeout;
                    handle.spawn(async move {
                        let _ = tokio::time::timeout(timeout, sink.record(&record)).await;
                    });
                }
            }
        }
    }

    /// Submit one record - exactly one delivery attempt, never an error
    pub async fn submit(&self, record: Descriptor) {
        match &self.inner {
            Inner::Background { tx } => match tx.try_send(record) {
                Ok(()) => {}
                Err(TrySendError::Full(record)) => {
                    warn!(
                        id = %record.id,
                        entity = %record.entity,
                        "Audit channel full, record dropped"
                    );
                    if let Some(metrics) = Metrics::get() {
                        metrics.record_dropped("channel_full");
                    }
                }
                Err(TrySendError::Closed(record)) => {
                    warn!(
                        id = %record.id,
                        "Audit worker stopped, record dropped"
                    );
                    if let Some(metrics) = Metrics::get() {
                        metrics.record_dropped("worker_stopped");
                    }
                }
            },
            Inner::Inline { sink, timeout } => {
                match tokio::time::timeout(*timeout, sink.record(&record)).await {
                    Ok(Ok(())) => {
                        if let Some(metrics) = Metrics::get() {
                            metrics.record_submitted(
                                &record.entity,
                                &record.action,
                                record.outcome,
                            );
                        }
                    }
                    Ok(Err(e)) => {
                        warn!(
                            sink = sink.name(),
                            id = %record.id,
                            error = %e,
                            "Sink failed, record lost"
                        );
                        if let Some(metrics) = Metrics::get() {
                            metrics.record_sink_failure(sink.name());
                        }
                    }
                    Err(_) => {
                        warn!(
                            sink = sink.name(),
                            id = %record.id,
                            timeout_ms = timeout.as_millis() as u64,
                            "Sink timed out, record lost"
                        );
                        if let Some(metrics) = Metrics::get() {
                            metrics.record_dropped("timeout");
                        }
                    }
                }
            }
        }
    }
}

/// Background worker: drain the channel into the sink until all senders drop
async fn drain(mut rx: mpsc::Receiver<Descriptor>, sink: Arc<dyn AuditSink>) {
    info!(sink = sink.name(), "Audit dispatch worker started");

    while let Some(record) = rx.recv().await {
        match sink.record(&record).await {
            Ok(()) => {
                debug!(id = %record.id, entity = %record.entity, "Record persisted");
                if let Some(metrics) = Metrics::get() {
                    metrics.record_submitted(&record.entity, &record.action, record.outcome);
                }
            }
            Err(e) => {
                warn!(
                    sink = sink.name(),
                    id = %record.id,
                    error = %e,
                    "Sink failed, record lost"
                );
                if let Some(metrics) = Metrics::get() {
                    metrics.record_sink_failure(sink.name());
                }
            }
        }
    }

    // All senders gone - flush the sink before exiting
    if let Err(e) = sink.shutdown().await {
        warn!(sink = sink.name(), error = %e, "Sink shutdown failed");
    }
    info!(sink = sink.name(), "Audit dispatch worker stopped");
}
