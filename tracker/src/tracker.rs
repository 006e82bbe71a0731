//! The handler wrapper - JALKI's core
//!
//! [`Tracker::wrap`] takes a [`HandlerSet`] and returns a new set with the
//! same method keys, where every handler is decorated with audit tracking:
//!
//! 1. record a start instant (latency metadata only, never flow control)
//! 2. await the original handler with unchanged arguments
//! 3. success or failure, build a descriptor (override | preset | fallback)
//!    and augment it with method, route params, elapsed time and outcome
//! 4. submit the descriptor through the dispatcher - the caller never waits
//!    on the sink and never observes sink failure
//! 5. forward the original result unchanged
//!
//! The wrapper holds no shared mutable state across requests; concurrent
//! calls through the same wrapped set are fully independent.

use crate::config::TrackingConfig;
use crate::dispatch::AuditDispatcher;
use crate::extract::{resolve_base, ExtractionInput};
use crate::handler::{Handler, HandlerResult, HandlerSet, Request, RequestContext};
use crate::metrics::Metrics;
use crate::preset::{ActionTemplate, PresetTable};
use jalki_core::{keys, Descriptor, InternedStr, Outcome};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Wraps handler sets with audit tracking
///
/// Constructed once at startup with a preset table and a dispatcher, then
/// used for every route registration.
#[derive(Clone)]
pub struct Tracker {
    presets: Arc<PresetTable>,
    dispatcher: AuditDispatcher,
}

impl Tracker {
    /// Create a tracker
    pub fn new(presets: Arc<PresetTable>, dispatcher: AuditDispatcher) -> Self {
        Self {
            presets,
            dispatcher,
        }
    }

    /// The dispatcher this tracker submits through
    pub fn dispatcher(&self) -> &AuditDispatcher {
        &self.dispatcher
    }

    /// Wrap every handler in the set with audit tracking
    ///
    /// The returned set has exactly the same method keys. Preset templates
    /// are resolved here, once per method; methods the preset doesn't cover
    /// fall back to the generic descriptor at call time instead of failing.
    pub fn wrap(&self, handlers: HandlerSet, config: TrackingConfig) -> HandlerSet {
        let config = Arc::new(config);
        let mut wrapped = HandlerSet::new();

        for (method, inner) in handlers {
            let template = self
                .presets
                .resolve(&config.preset, &config.entity, &method);

            if template.is_none() && config.extractor.is_none() {
                debug!(
                    entity = %config.entity,
                    preset = %config.preset,
                    method = %method,
                    "No preset entry for method, calls will use the generic descriptor"
                );
            }

            wrapped.insert(
                method,
                Arc::new(TrackedHandler {
                    inner,
                    template,
                    config: Arc::clone(&config),
                    dispatcher: self.dispatcher.clone(),
                }),
            );
        }

        wrapped
    }
}

/// One wrapped handler - the per-method decorator
struct TrackedHandler {
    inner: Arc<dyn Handler>,
    /// Preset entry pre-resolved at wrap time for this method
    template: Option<ActionTemplate>,
    config: Arc<TrackingConfig>,
    dispatcher: AuditDispatcher,
}

#[async_trait::async_trait]
impl Handler for TrackedHandler {
    async fn call(&self, req: Request, ctx: RequestContext) -> HandlerResult {
        let started = Instant::now();

        // Snapshot what extraction needs before handing the request over.
        // Bodies are Bytes, so this is a refcount bump, not a copy.
        let snapshot = req.clone();
        let params = ctx.params.clone();

        // Best-effort record if the request future is dropped mid-flight
        // (client disconnect). Disarmed on the normal path below.
        let mut abort_guard = AbortGuard::armed(
            self.dispatcher.clone(),
            self.config.entity.as_str().into(),
            snapshot.method.as_str().into(),
        );

        let result = self.inner.call(req, ctx).await;
        abort_guard.disarm();

        let elapsed = started.elapsed();
        let outcome = if result.is_ok() {
            Outcome::Success
        } else {
            Outcome::Error
        };

        let input = ExtractionInput {
            request: &snapshot,
            params: &params,
            outcome,
        };
        let mut record = resolve_base(
            self.config.extractor.as_deref(),
            self.template.as_ref(),
            &self.config.entity,
            &input,
        );
        record.outcome = outcome;

        let meta = record.metadata_mut();
        meta.insert(keys::METHOD.to_string(), snapshot.method.as_str().to_string());
        meta.insert(keys::ELAPSED_US.to_string(), elapsed.as_micros().to_string());
        for (name, value) in params.iter() {
            meta.insert(keys::param(name), value.to_string());
        }
        if let Some(id) = params.record_id() {
            meta.insert(keys::RECORD_ID.to_string(), id.to_string());
        }
        if let Err(e) = &result {
            meta.insert(keys::ERROR.to_string(), e.to_string());
        }

        if let Some(metrics) = Metrics::get() {
            metrics.observe_latency(
                record.entity.as_str(),
                snapshot.method.as_str(),
                elapsed.as_secs_f64(),
            );
        }

        // Exactly one submission per intercepted call; the dispatcher owns
        // sink latency and sink failure.
        self.dispatcher.submit(record).await;

        result
    }
}

/// Submits an "aborted" record when a tracked call is cancelled
struct AbortGuard {
    dispatcher: AuditDispatcher,
    entity: InternedStr,
    method: InternedStr,
    armed: bool,
}

impl AbortGuard {
    fn armed(dispatcher: AuditDispatcher, entity: InternedStr, method: InternedStr) -> Self {
        Self {
            dispatcher,
            entity,
            method,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let record = Descriptor::new(self.entity, self.method)
            .with_outcome(Outcome::Error)
            .with_metadata(keys::ERROR.to_string(), "aborted");
        self.dispatcher.submit_abandoned(record);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dispatch::DispatchMode;
    use crate::handler::{handler_fn, HandlerError, Response};
    use crate::sinks::MemorySink;
    use http::Method;
    use std::time::Duration;

    fn tracker_with_memory_sink() -> (Tracker, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        // Inline mode keeps tests deterministic: the record is in the sink
        // by the time the wrapped call returns.
        let (dispatcher, _) = AuditDispatcher::start(
            sink.clone(),
            DispatchMode::Inline {
                timeout: Duration::from_secs(1),
            },
        );
        (
            Tracker::new(Arc::new(PresetTable::builtin()), dispatcher),
            sink,
        )
    }

    fn blog_routes() -> HandlerSet {
        HandlerSet::new()
            .get(handler_fn(|_req, _ctx| async { Ok(Response::ok("list")) }))
            .post(handler_fn(|_req, _ctx| async {
                Ok(Response::created("made"))
            }))
            .delete(handler_fn(|_req, _ctx| async {
                Err(HandlerError::NotFound {
                    entity: "Blog".into(),
                    id: "9".into(),
                })
            }))
    }

    #[tokio::test]
    async fn test_wrap_preserves_method_keys() {
        let (tracker, _sink) = tracker_with_memory_sink();
        let routes = blog_routes();
        let mut before = routes.methods();

        let wrapped = tracker.wrap(routes, TrackingConfig::entity("Blog"));
        let mut after = wrapped.methods();

        before.sort_by_key(|m| m.to_string());
        after.sort_by_key(|m| m.to_string());
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_success_value_forwarded_unchanged() {
        let (tracker, _sink) = tracker_with_memory_sink();
        let wrapped = tracker.wrap(blog_routes(), TrackingConfig::entity("Blog"));

        let resp = wrapped
            .dispatch(Request::new(Method::GET, "/blogs"), RequestContext::default())
            .await
            .unwrap();

        assert_eq!(resp, Response::ok("list"));
    }

    #[tokio::test]
    async fn test_error_forwarded_unchanged() {
        let (tracker, _sink) = tracker_with_memory_sink();
        let wrapped = tracker.wrap(blog_routes(), TrackingConfig::entity("Blog"));

        let err = wrapped
            .dispatch(
                Request::new(Method::DELETE, "/blogs/9"),
                RequestContext::default(),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            HandlerError::NotFound {
                entity: "Blog".into(),
                id: "9".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_crud_preset_descriptors() {
        let (tracker, sink) = tracker_with_memory_sink();
        let wrapped = tracker.wrap(blog_routes(), TrackingConfig::entity("Blog"));

        wrapped
            .dispatch(Request::new(Method::GET, "/blogs"), RequestContext::default())
            .await
            .unwrap();
        let _ = wrapped
            .dispatch(
                Request::new(Method::DELETE, "/blogs/9"),
                RequestContext::default(),
            )
            .await;

        let records = sink.take_all();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].entity, "Blog");
        assert_eq!(records[0].action, "read");
        assert_eq!(records[0].outcome, Outcome::Success);

        assert_eq!(records[1].action, "delete");
        assert_eq!(records[1].outcome, Outcome::Error);
        assert_eq!(
            records[1].metadata().get(keys::ERROR),
            Some(&"Blog '9' not found".to_string())
        );
    }

    #[tokio::test]
    async fn test_method_missing_from_preset_falls_back() {
        let (tracker, sink) = tracker_with_memory_sink();
        let routes = HandlerSet::new().method(
            Method::OPTIONS,
            handler_fn(|_req, _ctx| async { Ok(Response::no_content()) }),
        );
        let wrapped = tracker.wrap(routes, TrackingConfig::entity("Blog"));

        wrapped
            .dispatch(
                Request::new(Method::OPTIONS, "/blogs"),
                RequestContext::default(),
            )
            .await
            .unwrap();

        let records = sink.take_all();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entity, "Blog");
        assert_eq!(records[0].action, "OPTIONS");
    }

    #[tokio::test]
    async fn test_metadata_augmentation() {
        let (tracker, sink) = tracker_with_memory_sink();
        let wrapped = tracker.wrap(blog_routes(), TrackingConfig::entity("Blog"));

        let params = [("id", "42")].into_iter().collect();
        wrapped
            .dispatch(
                Request::new(Method::GET, "/blogs/42"),
                RequestContext::with_params(params),
            )
            .await
            .unwrap();

        let records = sink.take_all();
        let meta = records[0].metadata().clone();
        assert_eq!(meta.get(keys::METHOD), Some(&"GET".to_string()));
        assert_eq!(meta.get(keys::RECORD_ID), Some(&"42".to_string()));
        assert_eq!(meta.get(&keys::param("id")), Some(&"42".to_string()));
        assert!(meta.contains_key(keys::ELAPSED_US));
    }

    #[tokio::test]
    async fn test_exactly_one_submission_per_call() {
        let (tracker, sink) = tracker_with_memory_sink();
        let wrapped = tracker.wrap(blog_routes(), TrackingConfig::entity("Blog"));

        for _ in 0..3 {
            let _ = wrapped
                .dispatch(Request::new(Method::GET, "/blogs"), RequestContext::default())
                .await;
        }
        let _ = wrapped
            .dispatch(
                Request::new(Method::DELETE, "/blogs/1"),
                RequestContext::default(),
            )
            .await;

        assert_eq!(sink.len(), 4);
    }

    #[tokio::test]
    async fn test_extractor_override_wins() {
        let sink = Arc::new(MemorySink::new());
        let (dispatcher, _) = AuditDispatcher::start(
            sink.clone(),
            DispatchMode::Inline {
                timeout: Duration::from_secs(1),
            },
        );
        let tracker = Tracker::new(Arc::new(PresetTable::builtin()), dispatcher);

        let config = TrackingConfig::entity("Blog").extractor(crate::extract::extractor_fn(
            |_input: &ExtractionInput<'_>| Ok(Descriptor::new("Blog", "browse")),
        ));
        let wrapped = tracker.wrap(blog_routes(), config);

        wrapped
            .dispatch(Request::new(Method::GET, "/blogs"), RequestContext::default())
            .await
            .unwrap();

        let records = sink.take_all();
        assert_eq!(records[0].action, "browse");
    }
}
