//! Handler contract for JALKI
//!
//! The tracker is framework-neutral: it wraps [`Handler`]s grouped into a
//! [`HandlerSet`] keyed by HTTP method, and adapters (see `jalki-runtime`)
//! translate the surrounding framework's request type into [`Request`].
//!
//! # Zero-Copy Bodies
//!
//! Request and response bodies are `Bytes`. Cloning a [`Request`] - which
//! the tracker does once per call to keep a snapshot for extraction -
//! increments a refcount instead of copying the payload.

use bytes::Bytes;
use http::{Method, StatusCode};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Resolved route parameters (`/blogs/{id}` → `{"id": "42"}`)
#[derive(Debug, Clone, Default)]
pub struct RouteParams {
    params: HashMap<String, String>,
}

impl RouteParams {
    /// Create an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a parameter by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// The affected record id, when the route carried an `id` parameter
    ///
    /// Absence is not an error; the descriptor simply omits the field.
    pub fn record_id(&self) -> Option<&str> {
        self.get("id")
    }

    /// Insert a parameter
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.insert(name.into(), value.into());
    }

    /// Iterate over all (name, value) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of resolved parameters
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// True when no parameters were resolved
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RouteParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Per-call context handed to handlers alongside the request
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Route parameters resolved by the surrounding router
    pub params: RouteParams,
}

impl RequestContext {
    /// Context with the given route parameters
    pub fn with_params(params: RouteParams) -> Self {
        Self { params }
    }
}

/// A framework-neutral request envelope
///
/// Carries exactly what handlers and extraction need: method, path,
/// headers, and a zero-copy body.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Request path as matched by the router
    pub path: String,
    /// Header map (lowercased names)
    pub headers: HashMap<String, String>,
    /// Opaque body - zero-copy via Bytes
    pub body: Bytes,
}

impl Request {
    /// Create a request with an empty body
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    /// Attach a body
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// Attach a header (name is lowercased)
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_lowercase(), value.into());
        self
    }

    /// Look up a header by (case-insensitive) name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Body as a string slice, if valid UTF-8
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// A framework-neutral response envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code
    pub status: StatusCode,
    /// Opaque body - zero-copy via Bytes
    pub body: Bytes,
}

impl Response {
    /// Empty response with the given status
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            body: Bytes::new(),
        }
    }

    /// `200 OK` with a body
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
        }
    }

    /// `201 Created` with a body
    pub fn created(body: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::CREATED,
            body: body.into(),
        }
    }

    /// `204 No Content`
    pub fn no_content() -> Self {
        Self::empty(StatusCode::NO_CONTENT)
    }

    /// `200 OK` with a JSON-encoded body
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self, HandlerError> {
        let body = serde_json::to_vec(value)
            .map_err(|e| HandlerError::Internal(format!("response encoding: {e}")))?;
        Ok(Self::ok(body))
    }

    /// Body as a string slice, if valid UTF-8
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// Typed handler errors, translated to a status code once at the edge
///
/// Collaborator-specific failure codes (a store's "row missing", a unique
/// constraint violation) are mapped into these variants at the boundary,
/// so route logic never inspects provider error codes. Conflicts are
/// always surfaced as `409`, never a generic `500`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The addressed record does not exist
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Resource kind
        entity: String,
        /// Identifier that missed
        id: String,
    },

    /// The record already exists or the change collides with current state
    #[error("{entity} conflict: {reason}")]
    Conflict {
        /// Resource kind
        entity: String,
        /// What collided
        reason: String,
    },

    /// The request payload or parameters were malformed
    #[error("invalid request: {0}")]
    Invalid(String),

    /// No handler is registered for this method
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),

    /// Anything else - storage down, bug, poisoned state
    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// The status code this error maps to at the HTTP edge
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::NotFound { .. } => StatusCode::NOT_FOUND,
            HandlerError::Conflict { .. } => StatusCode::CONFLICT,
            HandlerError::Invalid(_) => StatusCode::BAD_REQUEST,
            HandlerError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            HandlerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// What a handler invocation produces
pub type HandlerResult = Result<Response, HandlerError>;

/// A single request handler
///
/// Implementations are `Send + Sync` and invoked behind `Arc<dyn Handler>`.
/// For plain async functions, use [`handler_fn`] instead of implementing
/// the trait by hand.
#[async_trait::async_trait]
pub trait Handler: Send + Sync {
    /// Handle one request
    async fn call(&self, req: Request, ctx: RequestContext) -> HandlerResult;
}

/// Adapter that turns an async function into a [`Handler`]
///
/// # Example
///
/// ```ignore
/// let h = handler_fn(|req: Request, _ctx: RequestContext| async move {
///     Ok(Response::ok(req.body))
/// });
/// ```
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async function as a [`Handler`]
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Request, RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    FnHandler { f }
}

#[async_trait::async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Request, RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn call(&self, req: Request, ctx: RequestContext) -> HandlerResult {
        (self.f)(req, ctx).await
    }
}

/// A set of per-method handlers for one route
///
/// At most one handler per method: re-registering a method replaces the
/// previous handler and logs a warning. Built once at route-registration
/// time and immutable afterwards.
#[derive(Default)]
pub struct HandlerSet {
    handlers: HashMap<Method, Arc<dyn Handler>>,
}

impl HandlerSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an arbitrary method
    pub fn method<H: Handler + 'static>(mut self, method: Method, handler: H) -> Self {
        self.insert(method, Arc::new(handler));
        self
    }

    /// Register a GET handler
    pub fn get<H: Handler + 'static>(self, handler: H) -> Self {
        self.method(Method::GET, handler)
    }

    /// Register a POST handler
    pub fn post<H: Handler + 'static>(self, handler: H) -> Self {
        self.method(Method::POST, handler)
    }

    /// Register a PUT handler
    pub fn put<H: Handler + 'static>(self, handler: H) -> Self {
        self.method(Method::PUT, handler)
    }

    /// Register a PATCH handler
    pub fn patch<H: Handler + 'static>(self, handler: H) -> Self {
        self.method(Method::PATCH, handler)
    }

    /// Register a DELETE handler
    pub fn delete<H: Handler + 'static>(self, handler: H) -> Self {
        self.method(Method::DELETE, handler)
    }

    /// Insert an already-shared handler
    pub fn insert(&mut self, method: Method, handler: Arc<dyn Handler>) {
        if self.handlers.insert(method.clone(), handler).is_some() {
            warn!(method = %method, "Replacing existing handler for method");
        }
    }

    /// The methods this set declares, in no particular order
    pub fn methods(&self) -> Vec<Method> {
        self.handlers.keys().cloned().collect()
    }

    /// Whether a handler is registered for the method
    pub fn contains(&self, method: &Method) -> bool {
        self.handlers.contains_key(method)
    }

    /// Look up the handler for a method
    pub fn handler_for(&self, method: &Method) -> Option<Arc<dyn Handler>> {
        self.handlers.get(method).cloned()
    }

    /// Number of registered methods
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True when no handlers are registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Route a request to the handler registered for its method
    ///
    /// Returns `MethodNotAllowed` when the set has no handler for it.
    pub async fn dispatch(&self, req: Request, ctx: RequestContext) -> HandlerResult {
        let method = req.method.clone();
        match self.handlers.get(&method) {
            Some(handler) => handler.call(req, ctx).await,
            None => Err(HandlerError::MethodNotAllowed(method)),
        }
    }
}

impl IntoIterator for HandlerSet {
    type Item = (Method, Arc<dyn Handler>);
    type IntoIter = std::collections::hash_map::IntoIter<Method, Arc<dyn Handler>>;

    fn into_iter(self) -> Self::IntoIter {
        self.handlers.into_iter()
    }
}

impl fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSet")
            .field("methods", &self.methods())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handler_fn_adapts_async_fn() {
        let h = handler_fn(|_req: Request, ctx: RequestContext| async move {
            let id = ctx.params.record_id().unwrap_or("none").to_string();
            Ok(Response::ok(id))
        });

        let mut params = RouteParams::new();
        params.insert("id", "42");

        let resp = h
            .call(
                Request::new(Method::GET, "/blogs/42"),
                RequestContext::with_params(params),
            )
            .await
            .unwrap();

        assert_eq!(resp.body_str(), Some("42"));
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_method() {
        let set = HandlerSet::new()
            .get(handler_fn(|_req, _ctx| async { Ok(Response::ok("list")) }))
            .post(handler_fn(|_req, _ctx| async {
                Ok(Response::created("made"))
            }));

        let resp = set
            .dispatch(Request::new(Method::GET, "/x"), RequestContext::default())
            .await
            .unwrap();
        assert_eq!(resp.body_str(), Some("list"));

        let resp = set
            .dispatch(Request::new(Method::POST, "/x"), RequestContext::default())
            .await
            .unwrap();
        assert_eq!(resp.status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_method() {
        let set = HandlerSet::new().get(handler_fn(|req: Request, _ctx| async move {
            Ok(Response::ok(req.body))
        }));

        let err = set
            .dispatch(Request::new(Method::DELETE, "/x"), RequestContext::default())
            .await
            .unwrap_err();

        assert_eq!(err, HandlerError::MethodNotAllowed(Method::DELETE));
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_handler_error_status_mapping() {
        let not_found = HandlerError::NotFound {
            entity: "Blog".into(),
            id: "9".into(),
        };
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.to_string(), "Blog '9' not found");

        let conflict = HandlerError::Conflict {
            entity: "Blog".into(),
            reason: "slug taken".into(),
        };
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        assert_eq!(
            HandlerError::Invalid("bad json".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            HandlerError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_request_headers_case_insensitive() {
        let req = Request::new(Method::GET, "/").with_header("X-Actor", "admin");
        assert_eq!(req.header("x-actor"), Some("admin"));
        assert_eq!(req.header("X-ACTOR"), Some("admin"));
    }

    #[test]
    fn test_request_clone_shares_body() {
        let body = Bytes::from(vec![7u8; 4096]);
        let req = Request::new(Method::POST, "/blogs").with_body(body.clone());
        let cloned = req.clone();

        // Bytes clone bumps a refcount; both views point at the same data
        assert_eq!(req.body.as_ptr(), cloned.body.as_ptr());
    }

    #[test]
    fn test_route_params() {
        let params: RouteParams = [("id", "3"), ("slug", "intro")].into_iter().collect();
        assert_eq!(params.get("slug"), Some("intro"));
        assert_eq!(params.record_id(), Some("3"));
        assert_eq!(params.len(), 2);

        let empty = RouteParams::new();
        assert!(empty.record_id().is_none());
    }
}
