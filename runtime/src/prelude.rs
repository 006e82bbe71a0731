//! Convenience re-exports for JALKI applications
//!
//! ```ignore
//! use jalki_runtime::prelude::*;
//! ```

pub use crate::{run, AppRouter, RuntimeBuilder};

pub use jalki_tracker::{
    extractor_fn, handler_fn, ActionExtractor, AuditDispatcher, AuditSink, BackoffConfig, Config,
    Descriptor, DispatchMode, ExtractionInput, Handler, HandlerError, HandlerResult, HandlerSet,
    MemorySink, Outcome, PresetTable, Request, RequestContext, Response, RetrySink, RouteParams,
    SinkError, StdoutSink, Tracker, TrackingConfig,
};

pub use http::{Method, StatusCode};
