//! Retry sink with exponential backoff
//!
//! The tracker core submits each record exactly once and never retries;
//! retry policy belongs inside the sink. `RetrySink` is that policy as a
//! wrapper: it decorates any sink and re-attempts failed records with
//! exponential backoff and jitter.

use jalki_core::{AuditSink, Descriptor, SinkError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Configuration for exponential backoff with jitter
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Cap on the delay between retries
    pub max_delay: Duration,
    /// Growth factor per retry
    pub multiplier: f64,
    /// Retries after the initial attempt (0 = no retries)
    pub max_attempts: u32,
    /// Jitter factor (0.0-1.0): delay is randomized by +/- this fraction
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            max_attempts: 3,
            jitter_factor: 0.2,
        }
    }
}

impl BackoffConfig {
    /// Delay before attempt `n` (0-indexed; attempt 0 is the initial try)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.delay_for_attempt_with_jitter(attempt, next_jitter())
    }

    /// Delay with an explicit jitter value in `[0.0, 1.0)` (for testing)
    ///
    /// `jitter = 0.5` lands exactly on the un-jittered delay.
    pub fn delay_for_attempt_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_us = self.initial_delay.as_micros() as f64
            * self.multiplier.powi(attempt as i32 - 1);
        let base_us = base_us.min(self.max_delay.as_micros() as f64);

        // Map jitter from [0, 1) to [-1, 1) and scale by the jitter factor
        let offset = (jitter * 2.0 - 1.0) * base_us * self.jitter_factor;
        Duration::from_micros((base_us + offset).max(1.0) as u64)
    }
}

/// Process-wide xorshift64 state for jitter
///
/// Deliberately not a full PRNG dependency: jitter only needs to spread
/// concurrent retries apart, not pass statistical tests.
static JITTER_STATE: AtomicU64 = AtomicU64::new(0);

fn next_jitter() -> f64 {
    let mut x = JITTER_STATE.load(Ordering::Relaxed);
    if x == 0 {
        x = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9e3779b97f4a7c15)
            | 1;
    }
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    JITTER_STATE.store(x, Ordering::Relaxed);
    (x >> 11) as f64 / (1u64 << 53) as f64
}

/// Sink wrapper that retries failed records with exponential backoff
pub struct RetrySink {
    inner: Arc<dyn AuditSink>,
    config: BackoffConfig,
    /// Total retry attempts made
    retry_count: AtomicU64,
    /// Records that succeeded after at least one failure
    recovered_count: AtomicU64,
}

impl RetrySink {
    /// Wrap a sink with the given backoff configuration
    pub fn new(inner: Arc<dyn AuditSink>, config: BackoffConfig) -> Self {
        Self {
            inner,
            config,
            retry_count: AtomicU64::new(0),
            recovered_count: AtomicU64::new(0),
        }
    }

    /// Wrap a sink with default backoff
    pub fn with_defaults(inner: Arc<dyn AuditSink>) -> Self {
        Self::new(inner, BackoffConfig::default())
    }

    /// Total retry attempts made
    pub fn retry_count(&self) -> u64 {
        self.retry_count.load(Ordering::Relaxed)
    }

    /// Records recovered after at least one failure
    pub fn recovered_count(&self) -> u64 {
        self.recovered_count.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl AuditSink for RetrySink {
    fn name(&self) -> &'static str {
        "retry"
    }

    async fn record(&self, record: &Descriptor) -> Result<(), SinkError> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_attempts {
            let delay = self.config.delay_for_attempt(attempt);
            if !delay.is_zero() {
                self.retry_count.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    sink = self.inner.name(),
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying record"
                );
                tokio::time::sleep(delay).await;
            }

            match self.inner.record(record).await {
                Ok(()) => {
                    if attempt > 0 {
                        self.recovered_count.fetch_add(1, Ordering::Relaxed);
                        tracing::info!(
                            sink = self.inner.name(),
                            attempt = attempt,
                            "record recovered after retry"
                        );
                    }
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        sink = self.inner.name(),
                        attempt = attempt,
                        max_attempts = self.config.max_attempts,
                        error = %e,
                        "record failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| SinkError::Write("all retries exhausted".into())))
    }

    async fn health(&self) -> bool {
        self.inner.health().await
    }

    async fn shutdown(&self) -> Result<(), SinkError> {
        self.inner.shutdown().await
    }
}
