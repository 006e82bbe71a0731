//! Configuration for JALKI
//!
//! Two layers: [`TrackingConfig`] is per-wrap (which entity, which preset,
//! optional extractor override); [`Config`] is process-wide and loaded from
//! `JALKI_*` environment variables by the runtime.

use crate::dispatch::DispatchMode;
use crate::error::TrackerError;
use crate::extract::ActionExtractor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Per-wrap tracking configuration
///
/// # Example
///
/// ```ignore
/// // Preset-driven (the common case)
/// let config = TrackingConfig::entity("Blog");
///
/// // Custom preset name
/// let config = TrackingConfig::entity("Blog").preset("read-only");
///
/// // Explicit extractor - wins over the preset when both are set
/// let config = TrackingConfig::entity("Blog").extractor(my_extractor);
/// ```
#[derive(Clone)]
pub struct TrackingConfig {
    /// Resource label stamped into descriptors ("Blog", "Program")
    pub entity: String,
    /// Preset-table key; defaults to `"crud"`
    pub preset: String,
    /// Explicit extraction override; authoritative when present
    pub extractor: Option<Arc<dyn ActionExtractor>>,
}

impl TrackingConfig {
    /// Configuration for an entity, tracking with the `"crud"` preset
    pub fn entity(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            preset: "crud".to_string(),
            extractor: None,
        }
    }

    /// Use a different preset
    pub fn preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Set an explicit extractor override
    pub fn extractor<E: ActionExtractor + 'static>(mut self, extractor: E) -> Self {
        self.extractor = Some(Arc::new(extractor));
        self
    }
}

impl std::fmt::Debug for TrackingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingConfig")
            .field("entity", &self.entity)
            .field("preset", &self.preset)
            .field("extractor", &self.extractor.as_ref().map(|_| "<custom>"))
            .finish()
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for development
    Pretty,
    /// Structured JSON lines, for log collectors
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(TrackerError::Config(format!(
                "JALKI_LOG_FORMAT must be 'pretty' or 'json', got '{other}'"
            ))),
        }
    }
}

/// Process-wide configuration, loaded from environment variables
///
/// | Variable                   | Default        |
/// |----------------------------|----------------|
/// | `JALKI_HTTP_ADDR`          | `0.0.0.0:8080` |
/// | `JALKI_LOG_LEVEL`          | `info`         |
/// | `JALKI_LOG_FORMAT`         | `pretty`       |
/// | `JALKI_CHANNEL_CAPACITY`   | `1024`         |
/// | `JALKI_DISPATCH_TIMEOUT_MS`| unset          |
///
/// When `JALKI_DISPATCH_TIMEOUT_MS` is set, audit submission awaits the
/// sink inline with that bound; otherwise records flow through the
/// background channel.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen address for the runtime server
    pub http_addr: SocketAddr,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
    /// Capacity of the background dispatch channel
    pub channel_capacity: usize,
    /// Inline dispatch timeout; `None` selects background dispatch
    pub dispatch_timeout_ms: Option<u64>,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, TrackerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary lookup (unit-testable)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, TrackerError> {
        let http_addr = match lookup("JALKI_HTTP_ADDR") {
            Some(raw) => raw.parse().map_err(|e| {
                TrackerError::Config(format!("JALKI_HTTP_ADDR '{raw}' unparseable: {e}"))
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let log_level = lookup("JALKI_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let log_format = match lookup("JALKI_LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => LogFormat::Pretty,
        };

        let channel_capacity = match lookup("JALKI_CHANNEL_CAPACITY") {
            Some(raw) => raw.parse().map_err(|e| {
                TrackerError::Config(format!("JALKI_CHANNEL_CAPACITY '{raw}' unparseable: {e}"))
            })?,
            None => 1024,
        };

        let dispatch_timeout_ms = match lookup("JALKI_DISPATCH_TIMEOUT_MS") {
            Some(raw) => Some(raw.parse().map_err(|e| {
                TrackerError::Config(format!("JALKI_DISPATCH_TIMEOUT_MS '{raw}' unparseable: {e}"))
            })?),
            None => None,
        };

        Ok(Self {
            http_addr,
            log_level,
            log_format,
            channel_capacity,
            dispatch_timeout_ms,
        })
    }

    /// The dispatch mode this configuration selects
    pub fn dispatch_mode(&self) -> DispatchMode {
        match self.dispatch_timeout_ms {
            Some(ms) => DispatchMode::Inline {
                timeout: Duration::from_millis(ms),
            },
            None => DispatchMode::Background {
                capacity: self.channel_capacity,
            },
        }
    }
}
