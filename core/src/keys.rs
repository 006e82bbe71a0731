//! Reserved descriptor metadata key constants
//!
//! These keys are filled in by the tracker just before a descriptor is
//! submitted. Sinks can rely on them without coupling to the tracker crate.

/// HTTP method of the intercepted call ("GET", "POST", ...)
pub const METHOD: &str = "jalki.method";

/// Wall-clock time the wrapped handler took, in microseconds
pub const ELAPSED_US: &str = "jalki.elapsed_us";

/// Affected record id, when the route carried an `id` parameter
pub const RECORD_ID: &str = "jalki.record_id";

/// One-line summary of the handler error, present only when outcome=error
pub const ERROR: &str = "jalki.error";

/// Prefix for resolved route parameters ("jalki.param.slug", ...)
pub const PARAM_PREFIX: &str = "jalki.param.";

/// Build the metadata key for a named route parameter
pub fn param(name: &str) -> String {
    format!("{PARAM_PREFIX}{name}")
}
