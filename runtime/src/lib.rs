//! JALKI Runtime — injectable tracking-pipeline startup
//!
//! Provides [`run()`] for zero-boilerplate startup, and [`RuntimeBuilder`]
//! for users who need control over the listen address, the sink, or the
//! preset table.
//!
//! # Quick start
//!
//! ```ignore
//! use jalki_runtime::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     jalki_runtime::run(|app| async move {
//!         Ok(app.route(
//!             "/blogs",
//!             HandlerSet::new().get(handler_fn(list_blogs)),
//!             TrackingConfig::entity("Blog"),
//!         ))
//!     })
//!     .await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod prelude;

use axum::extract::RawPathParams;
use axum::response::IntoResponse;
use axum::routing::{any, get, MethodRouter};
use axum::Json;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};
use jalki_core::AuditSink;
use jalki_tracker::metrics::Metrics;
use jalki_tracker::{
    AuditDispatcher, Config, HandlerResult, HandlerSet, LogFormat, PresetTable, Request,
    RequestContext, RouteParams, StdoutSink, Tracker, TrackingConfig,
};
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Run a JALKI-tracked application with default settings.
///
/// Loads configuration from environment variables, initialises tracing and
/// metrics, calls your closure to register routes, then runs the HTTP
/// server with graceful shutdown and drains queued audit records on exit.
///
/// # Example
///
/// ```ignore
/// jalki_runtime::run(|app| async move {
///     Ok(app
///         .route("/blogs", blog_routes(), TrackingConfig::entity("Blog"))
///         .route("/blogs/{id}", blog_item_routes(), TrackingConfig::entity("Blog")))
/// }).await
/// ```
pub async fn run<F, Fut>(configure: F) -> anyhow::Result<()>
where
    F: FnOnce(AppRouter) -> Fut,
    Fut: Future<Output = anyhow::Result<AppRouter>>,
{
    RuntimeBuilder::new().configure(configure).await
}

/// Power-user builder for controlling runtime behaviour.
///
/// # Example
///
/// ```ignore
/// RuntimeBuilder::new()
///     .http_addr("0.0.0.0:9000".parse()?)
///     .sink(RetrySink::with_defaults(Arc::new(my_sink)))
///     .configure(|app| async move {
///         Ok(app.route("/blogs", blog_routes(), TrackingConfig::entity("Blog")))
///     })
///     .await
/// ```
pub struct RuntimeBuilder {
    http_addr: Option<SocketAddr>,
    sink: Option<Arc<dyn AuditSink>>,
    presets: Option<PresetTable>,
    server_enabled: bool,
}

impl RuntimeBuilder {
    /// Create a new builder with defaults from environment variables.
    pub fn new() -> Self {
        Self {
            http_addr: None,
            sink: None,
            presets: None,
            server_enabled: true,
        }
    }

    /// Override the HTTP listen address.
    ///
    /// Default: loaded from `JALKI_HTTP_ADDR`, or `0.0.0.0:8080`.
    pub fn http_addr(mut self, addr: SocketAddr) -> Self {
        self.http_addr = Some(addr);
        self
    }

    /// Set the audit sink. Default: [`StdoutSink`].
    pub fn sink<S: AuditSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Set the audit sink (Arc version).
    pub fn sink_arc(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replace the preset table. Default: [`PresetTable::builtin`].
    pub fn presets(mut self, presets: PresetTable) -> Self {
        self.presets = Some(presets);
        self
    }

    /// Disable the HTTP server.
    ///
    /// Useful when the wrapped handler sets are driven by another transport
    /// and only the tracking pipeline is wanted.
    pub fn disable_server(mut self) -> Self {
        self.server_enabled = false;
        self
    }

    /// Register routes and run to completion.
    ///
    /// This is the terminal method — it blocks until shutdown.
    pub async fn configure<F, Fut>(self, configure: F) -> anyhow::Result<()>
    where
        F: FnOnce(AppRouter) -> Fut,
        Fut: Future<Output = anyhow::Result<AppRouter>>,
    {
        // ── 1. Load config from env ──────────────────────────────
        let config = Config::from_env()?;

        // ── 2. Init tracing ──────────────────────────────────────
        init_tracing(&config);

        info!(
            http_addr = %self.http_addr.unwrap_or(config.http_addr),
            dispatch = ?config.dispatch_mode(),
            "Starting JALKI"
        );

        // ── 3. Init metrics ──────────────────────────────────────
        Metrics::init()?;

        // ── 4. Wire sink → dispatcher → tracker ──────────────────
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(StdoutSink::new()) as Arc<dyn AuditSink>);
        let (dispatcher, worker) =
            AuditDispatcher::start(Arc::clone(&sink), config.dispatch_mode());
        let presets = Arc::new(self.presets.unwrap_or_else(PresetTable::builtin));
        let tracker = Tracker::new(presets, dispatcher);

        // ── 5. User registers routes ─────────────────────────────
        let app = configure(AppRouter::new(tracker.clone())).await?;
        let router = app.into_router(Arc::clone(&sink));

        // ── 6. Serve (or idle) until shutdown ────────────────────
        if self.server_enabled {
            let addr = self.http_addr.unwrap_or(config.http_addr);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!(%addr, "HTTP server listening");

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        } else {
            drop(router);
            info!("HTTP server disabled, waiting for shutdown signal");
            shutdown_signal().await;
        }

        // ── 7. Drain queued audit records ────────────────────────
        drop(tracker);
        if let Some(worker) = worker {
            if tokio::time::timeout(Duration::from_secs(5), worker)
                .await
                .is_err()
            {
                warn!("Audit drain timed out, queued records may be lost");
            }
        }

        info!("JALKI shutdown complete");
        Ok(())
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Route registrar handed to the configure closure
///
/// Wraps each registered [`HandlerSet`] through the tracker and mounts it
/// on an axum router. Paths use axum syntax: `/blogs/{id}`.
pub struct AppRouter {
    tracker: Tracker,
    router: axum::Router,
}

impl AppRouter {
    fn new(tracker: Tracker) -> Self {
        Self {
            tracker,
            router: axum::Router::new(),
        }
    }

    /// The tracker this router wraps with
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Register a tracked handler set under a path
    pub fn route(mut self, path: &str, handlers: HandlerSet, config: TrackingConfig) -> Self {
        info!(
            path = path,
            entity = %config.entity,
            methods = handlers.len(),
            "Registered tracked route"
        );
        let wrapped = Arc::new(self.tracker.wrap(handlers, config));
        self.router = self.router.route(path, mount(wrapped));
        self
    }

    /// Register a handler set without tracking
    pub fn route_untracked(mut self, path: &str, handlers: HandlerSet) -> Self {
        info!(path = path, methods = handlers.len(), "Registered untracked route");
        self.router = self.router.route(path, mount(Arc::new(handlers)));
        self
    }

    /// Finish: attach the operational endpoints and yield the axum router
    fn into_router(self, sink: Arc<dyn AuditSink>) -> axum::Router {
        self.router
            .route("/metrics", get(metrics_handler))
            .route(
                "/healthz",
                get(move || health_handler(Arc::clone(&sink))),
            )
    }
}

/// Adapt a [`HandlerSet`] to an axum method router
///
/// All methods land on the same handler; method dispatch happens inside
/// the set so wrapped and unwrapped sets behave identically.
fn mount(set: Arc<HandlerSet>) -> MethodRouter {
    any(
        move |method: Method, uri: Uri, raw_params: RawPathParams, headers: HeaderMap, body: Bytes| {
            let set = Arc::clone(&set);
            async move {
                let mut params = RouteParams::new();
                for (name, value) in raw_params.iter() {
                    params.insert(name, value);
                }

                let mut header_map = HashMap::new();
                for (name, value) in headers.iter() {
                    if let Ok(value) = value.to_str() {
                        header_map.insert(name.as_str().to_string(), value.to_string());
                    }
                }

                let req = Request {
                    method,
                    path: uri.path().to_string(),
                    headers: header_map,
                    body,
                };

                to_response(set.dispatch(req, RequestContext::with_params(params)).await)
            }
        },
    )
}

/// Translate a handler result to an axum response
///
/// Errors map to their status code once, here at the edge.
fn to_response(result: HandlerResult) -> axum::response::Response {
    match result {
        Ok(resp) => (resp.status, resp.body).into_response(),
        Err(err) => (err.status(), err.to_string()).into_response(),
    }
}

/// Handler for `/metrics` - Prometheus text exposition
async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        jalki_tracker::metrics::gather(),
    )
}

/// Handler for `/healthz` - JSON summary including sink health
async fn health_handler(sink: Arc<dyn AuditSink>) -> axum::response::Response {
    let healthy = sink.health().await;
    if let Some(metrics) = Metrics::get() {
        metrics.set_sink_health(sink.name(), healthy);
    }

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if healthy { "healthy" } else { "unhealthy" },
            "sink": sink.name(),
        })),
    )
        .into_response()
}

/// Initialise the tracing subscriber based on config.
fn init_tracing(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.log_format {
        LogFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Pretty => {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
    }
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = ?e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use jalki_tracker::{handler_fn, DispatchMode, HandlerError, MemorySink, Response};
    use tower::util::ServiceExt;

    fn test_app() -> (axum::Router, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let (dispatcher, _) = AuditDispatcher::start(
            sink.clone(),
            DispatchMode::Inline {
                timeout: Duration::from_secs(1),
            },
        );
        let tracker = Tracker::new(Arc::new(PresetTable::builtin()), dispatcher);

        let list = handler_fn(|_req, _ctx| async { Ok(Response::ok(r#"["a","b"]"#)) });
        let fetch = handler_fn(|_req, ctx: RequestContext| async move {
            match ctx.params.record_id() {
                Some("1") => Ok(Response::ok(r#"{"id":1}"#)),
                Some(id) => Err(HandlerError::NotFound {
                    entity: "Blog".into(),
                    id: id.to_string(),
                }),
                None => Err(HandlerError::Invalid("missing id".into())),
            }
        });

        let app = AppRouter::new(tracker)
            .route(
                "/blogs",
                HandlerSet::new().get(list),
                TrackingConfig::entity("Blog"),
            )
            .route(
                "/blogs/{id}",
                HandlerSet::new().get(fetch),
                TrackingConfig::entity("Blog"),
            )
            .into_router(sink.clone() as Arc<dyn AuditSink>);

        (app, sink)
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 100_000)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_tracked_route_serves_and_records() {
        let (app, sink) = test_app();

        let response = app
            .oneshot(
                http::Request::builder()
                    .method("GET")
                    .uri("/blogs")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, r#"["a","b"]"#);

        let records = sink.take_all();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entity, "Blog");
        assert_eq!(records[0].action, "read");
    }

    #[tokio::test]
    async fn test_path_params_reach_handler_and_descriptor() {
        let (app, sink) = test_app();

        let response = app
            .oneshot(
                http::Request::builder()
                    .method("GET")
                    .uri("/blogs/7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, "Blog '7' not found");

        let records = sink.take_all();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].metadata().get(jalki_core::keys::RECORD_ID),
            Some(&"7".to_string())
        );
    }

    #[tokio::test]
    async fn test_unregistered_method_is_405() {
        let (app, sink) = test_app();

        let response = app
            .oneshot(
                http::Request::builder()
                    .method("DELETE")
                    .uri("/blogs")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        // No handler was intercepted, so nothing is audited
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let _ = Metrics::init();
        let (app, _sink) = test_app();

        let response = app
            .oneshot(
                http::Request::builder()
                    .method("GET")
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.contains("text/plain"));
    }

    #[tokio::test]
    async fn test_healthz_reports_sink() {
        let (app, sink) = test_app();

        let response = app
            .clone()
            .oneshot(
                http::Request::builder()
                    .method("GET")
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["sink"], "memory");

        sink.set_healthy(false);
        let response = app
            .oneshot(
                http::Request::builder()
                    .method("GET")
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
