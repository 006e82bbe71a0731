//! Preset tables for JALKI
//!
//! A preset is a reusable, named mapping from HTTP method to action
//! template, so routes don't repeat tracking configuration. The table is
//! built once at startup and passed explicitly to the tracker - no mutable
//! global, no setup/teardown ordering concerns in tests.

use http::Method;
use jalki_core::{Descriptor, InternedStr};
use std::collections::HashMap;
use tracing::{info, warn};

/// A descriptor template: what entity/action pair a matched call produces
///
/// Templates are resolved per route-registration (the entity label is baked
/// in) and stamped into a fresh [`Descriptor`] per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionTemplate {
    /// Resource kind the route serves
    pub entity: InternedStr,
    /// Action name recorded for the matched method
    pub action: InternedStr,
}

impl ActionTemplate {
    /// Create a template
    pub fn new(entity: impl Into<InternedStr>, action: impl Into<InternedStr>) -> Self {
        Self {
            entity: entity.into(),
            action: action.into(),
        }
    }

    /// Stamp a fresh descriptor from this template
    pub fn descriptor(&self) -> Descriptor {
        Descriptor::new(self.entity, self.action)
    }
}

/// A preset: given an entity label, produce the method → template map
pub type PresetFn = fn(&str) -> HashMap<Method, ActionTemplate>;

/// The `"crud"` preset: GET→read, POST→create, PUT/PATCH→update, DELETE→delete
fn crud(entity: &str) -> HashMap<Method, ActionTemplate> {
    let entity: InternedStr = entity.into();
    HashMap::from([
        (Method::GET, ActionTemplate::new(entity, "read")),
        (Method::POST, ActionTemplate::new(entity, "create")),
        (Method::PUT, ActionTemplate::new(entity, "update")),
        (Method::PATCH, ActionTemplate::new(entity, "update")),
        (Method::DELETE, ActionTemplate::new(entity, "delete")),
    ])
}

/// Named, read-only table of presets
///
/// Typically constructed once with [`PresetTable::builtin`] and shared via
/// `Arc` across every wrap call.
pub struct PresetTable {
    presets: HashMap<String, PresetFn>,
}

impl PresetTable {
    /// An empty table (no presets, every lookup falls back)
    pub fn empty() -> Self {
        Self {
            presets: HashMap::new(),
        }
    }

    /// The built-in table: ships the `"crud"` preset
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        table.register("crud", crud);
        table
    }

    /// Register a preset under a name
    ///
    /// Re-registering a name replaces the previous preset and logs a warning.
    pub fn register(&mut self, name: impl Into<String>, preset: PresetFn) {
        let name = name.into();
        if self.presets.insert(name.clone(), preset).is_some() {
            warn!(preset = %name, "Replacing existing preset");
        } else {
            info!(preset = %name, "Registered preset");
        }
    }

    /// Whether a preset is registered under the name
    pub fn contains(&self, name: &str) -> bool {
        self.presets.contains_key(name)
    }

    /// Number of registered presets
    pub fn len(&self) -> usize {
        self.presets.len()
    }

    /// True when the table holds no presets
    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// Resolve the template for `(preset, entity, method)`
    ///
    /// Returns `None` when the preset is unknown or has no entry for the
    /// method; the caller falls back to a generic descriptor rather than
    /// failing the request.
    pub fn resolve(&self, preset: &str, entity: &str, method: &Method) -> Option<ActionTemplate> {
        let preset = self.presets.get(preset)?;
        preset(entity).remove(method)
    }
}

impl Default for PresetTable {
    fn default() -> Self {
        Self::builtin()
    }
}
