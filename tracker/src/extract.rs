//! Action extraction for JALKI
//!
//! Turns an intercepted call into the base [`Descriptor`]. Resolution
//! order, first match wins:
//!
//! 1. an explicit per-config [`ActionExtractor`] override - caller intent
//!    is authoritative, even when a preset is also configured
//! 2. the preset-table template for `(preset, method)`
//! 3. the generic fallback: entity = configured label, action = method name
//!
//! A failing override never fails the request: it degrades to the generic
//! fallback and is reported once on the diagnostic channel.

use crate::handler::{Request, RouteParams};
use crate::metrics::Metrics;
use crate::preset::ActionTemplate;
use http::Method;
use jalki_core::{Descriptor, Outcome};
use thiserror::Error;
use tracing::warn;

/// Everything a custom extractor may inspect
///
/// The request snapshot and params are borrowed; the outcome is known
/// because extraction always runs after the wrapped handler resolves.
pub struct ExtractionInput<'a> {
    /// Snapshot of the intercepted request
    pub request: &'a Request,
    /// Route parameters resolved by the router
    pub params: &'a RouteParams,
    /// How the wrapped handler ended
    pub outcome: Outcome,
}

/// Error from a custom extractor
///
/// Never reaches the caller of a wrapped handler; recovery is the generic
/// fallback descriptor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("extraction failed: {0}")]
pub struct ExtractError(pub String);

/// Custom descriptor extraction
///
/// Implement this (or use [`extractor_fn`]) when a route needs richer
/// descriptors than a preset can express - e.g. deriving the action from
/// the request body.
pub trait ActionExtractor: Send + Sync {
    /// Build the base descriptor for one intercepted call
    fn extract(&self, input: &ExtractionInput<'_>) -> Result<Descriptor, ExtractError>;
}

/// Adapter that turns a plain function into an [`ActionExtractor`]
pub struct FnExtractor<F> {
    f: F,
}

/// Wrap a function as an [`ActionExtractor`]
///
/// # Example
///
/// ```ignore
/// let custom = extractor_fn(|input| {
///     let action = if input.request.path.ends_with("/publish") { "publish" } else { "update" };
///     Ok(Descriptor::new("Blog", action))
/// });
/// ```
pub fn extractor_fn<F>(f: F) -> FnExtractor<F>
where
    F: Fn(&ExtractionInput<'_>) -> Result<Descriptor, ExtractError> + Send + Sync,
{
    FnExtractor { f }
}

impl<F> ActionExtractor for FnExtractor<F>
where
    F: Fn(&ExtractionInput<'_>) -> Result<Descriptor, ExtractError> + Send + Sync,
{
    fn extract(&self, input: &ExtractionInput<'_>) -> Result<Descriptor, ExtractError> {
        (self.f)(input)
    }
}

/// The generic fallback: action is the raw method name, no extra metadata
pub fn fallback_descriptor(entity: &str, method: &Method) -> Descriptor {
    Descriptor::new(entity, method.as_str())
}

/// Resolve the base descriptor for one call
///
/// `template` is the preset entry pre-resolved at wrap time for this
/// method, if the preset had one.
pub(crate) fn resolve_base(
    extractor: Option<&dyn ActionExtractor>,
    template: Option<&ActionTemplate>,
    entity: &str,
    input: &ExtractionInput<'_>,
) -> Descriptor {
    if let Some(extractor) = extractor {
        match extractor.extract(input) {
            Ok(descriptor) => return descriptor,
            Err(e) => {
                warn!(
                    entity = entity,
                    method = %input.request.method,
                    error = %e,
                    "Extractor failed, substituting fallback descriptor"
                );
                if let Some(metrics) = Metrics::get() {
                    metrics.record_extractor_failure(entity);
                }
                return fallback_descriptor(entity, &input.request.method);
            }
        }
    }

    match template {
        Some(template) => template.descriptor(),
        None => fallback_descriptor(entity, &input.request.method),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::handler::RequestContext;

    fn input_for(method: Method) -> (Request, RequestContext) {
        (Request::new(method, "/blogs"), RequestContext::default())
    }

    #[test]
    fn test_override_wins_over_preset() {
        let (req, ctx) = input_for(Method::GET);
        let input = ExtractionInput {
            request: &req,
            params: &ctx.params,
            outcome: Outcome::Success,
        };

        let custom =
            extractor_fn(|_input: &ExtractionInput<'_>| Ok(Descriptor::new("Blog", "browse")));
        let template = ActionTemplate::new("Blog", "read");

        let descriptor = resolve_base(Some(&custom), Some(&template), "Blog", &input);
        assert_eq!(descriptor.action, "browse");
    }

    #[test]
    fn test_failing_override_degrades_to_generic_fallback() {
        let (req, ctx) = input_for(Method::GET);
        let input = ExtractionInput {
            request: &req,
            params: &ctx.params,
            outcome: Outcome::Success,
        };

        let broken =
            extractor_fn(|_input: &ExtractionInput<'_>| Err(ExtractError("no body".into())));
        // Preset template is NOT used for recovery; the fallback is generic
        let template = ActionTemplate::new("Blog", "read");

        let descriptor = resolve_base(Some(&broken), Some(&template), "Blog", &input);
        assert_eq!(descriptor.entity, "Blog");
        assert_eq!(descriptor.action, "GET");
        assert!(descriptor.metadata().is_empty());
    }

    #[test]
    fn test_preset_template_used_without_override() {
        let (req, ctx) = input_for(Method::DELETE);
        let input = ExtractionInput {
            request: &req,
            params: &ctx.params,
            outcome: Outcome::Success,
        };

        let template = ActionTemplate::new("Blog", "delete");
        let descriptor = resolve_base(None, Some(&template), "Blog", &input);
        assert_eq!(descriptor.action, "delete");
    }

    #[test]
    fn test_fallback_when_nothing_matches() {
        let (req, ctx) = input_for(Method::OPTIONS);
        let input = ExtractionInput {
            request: &req,
            params: &ctx.params,
            outcome: Outcome::Success,
        };

        let descriptor = resolve_base(None, None, "Blog", &input);
        assert_eq!(descriptor.entity, "Blog");
        assert_eq!(descriptor.action, "OPTIONS");
        assert!(descriptor.metadata().is_empty());
    }

    #[test]
    fn test_extractor_sees_outcome() {
        let (req, ctx) = input_for(Method::POST);
        let input = ExtractionInput {
            request: &req,
            params: &ctx.params,
            outcome: Outcome::Error,
        };

        let outcome_aware = extractor_fn(|input: &ExtractionInput<'_>| {
            let action = match input.outcome {
                Outcome::Success => "create",
                Outcome::Error => "create-failed",
            };
            Ok(Descriptor::new("Blog", action))
        });

        let descriptor = resolve_base(Some(&outcome_aware), None, "Blog", &input);
        assert_eq!(descriptor.action, "create-failed");
    }
}
