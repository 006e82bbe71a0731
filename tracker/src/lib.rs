//! JALKI - Action Tracking Middleware
//!
//! Wrap a set of per-method handlers once; every call through the wrapped
//! set produces a structured audit descriptor on a failure-isolated side
//! channel. The caller observes exactly the behavior of the unwrapped
//! handler - same value, same error - whether the sink is healthy, slow,
//! or on fire.
//!
//! # Pipeline
//!
//! ```text
//! Request ──► wrapped Handler ──► inner Handler ──► Response / error
//!                  │                                      ▲
//!                  ├─ extract (override | preset | fallback)
//!                  └─ dispatch ──► AuditSink    (own failure domain)
//! ```
//!
//! # Example
//!
//! ```ignore
//! let tracker = Tracker::new(
//!     Arc::new(PresetTable::builtin()),
//!     AuditDispatcher::start(Arc::new(StdoutSink::new()), DispatchMode::default()).0,
//! );
//!
//! let routes = HandlerSet::new()
//!     .get(handler_fn(list_blogs))
//!     .post(handler_fn(create_blog));
//!
//! let tracked = tracker.wrap(routes, TrackingConfig::entity("Blog"));
//! ```

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod handler;
pub mod metrics;
pub mod preset;
pub mod sinks;
pub mod tracker;

// Re-export core types - this crate is the usual entry point
pub use jalki_core::{AuditSink, Descriptor, DescriptorId, InternedStr, Outcome, SinkError};

pub use config::{Config, LogFormat, TrackingConfig};
pub use dispatch::{AuditDispatcher, DispatchMode};
pub use error::{Result, TrackerError};
pub use extract::{extractor_fn, ActionExtractor, ExtractError, ExtractionInput};
pub use handler::{
    handler_fn, FnHandler, Handler, HandlerError, HandlerResult, HandlerSet, Request,
    RequestContext, Response, RouteParams,
};
pub use preset::{ActionTemplate, PresetTable};
pub use sinks::{BackoffConfig, MemorySink, RetrySink, StdoutSink};
pub use tracker::Tracker;
