//! The audit descriptor - one structured record per intercepted action
//!
//! A [`Descriptor`] is produced by the tracker for every invocation of a
//! wrapped handler, success or failure, and handed to the configured
//! [`AuditSink`](crate::AuditSink). It is immutable once submitted and is
//! never persisted by the core itself.
//!
//! # Label Interning
//!
//! `entity` and `action` use interned strings. A route handling "Blog"
//! requests produces the same two labels for every request it ever serves,
//! so each unique label is stored once and cloning a descriptor copies two
//! small integer keys instead of heap strings.

use crate::intern::InternedStr;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Type alias for descriptor metadata - lazily allocated
///
/// Most descriptors built from a preset start with no metadata at all; the
/// tracker fills in method/latency/params just before submission. `None`
/// until the first insert to keep the empty case allocation-free.
pub type Metadata = Option<Box<HashMap<String, String>>>;

/// Helper to get metadata or the shared empty map
#[inline]
fn metadata_ref(m: &Metadata) -> &HashMap<String, String> {
    static EMPTY: std::sync::OnceLock<HashMap<String, String>> = std::sync::OnceLock::new();
    m.as_ref()
        .map(|b| b.as_ref())
        .unwrap_or_else(|| EMPTY.get_or_init(HashMap::new))
}

/// Unique descriptor identifier (binary ULID, 16 bytes, Copy)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorId(ulid::Ulid);

impl DescriptorId {
    /// Generate a new unique ID
    #[inline]
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Get the underlying ULID
    #[inline]
    pub fn as_ulid(&self) -> ulid::Ulid {
        self.0
    }
}

impl Default for DescriptorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DescriptorId({})", self.0)
    }
}

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for DescriptorId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

/// How the intercepted call ended
///
/// Tracked for every call: a handler that returns an error still produces a
/// descriptor, with `Outcome::Error`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The wrapped handler returned a value
    Success,
    /// The wrapped handler returned an error
    Error,
}

impl Outcome {
    /// Stable string form, used in metrics labels and sink output
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Error => "error",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The structured record describing one intercepted action
///
/// # Example
///
/// ```
/// use jalki_core::{Descriptor, Outcome};
///
/// let record = Descriptor::new("Blog", "create")
///     .with_outcome(Outcome::Success)
///     .with_metadata("jalki.record_id", "42");
///
/// assert_eq!(record.entity, "Blog");
/// assert_eq!(record.action, "create");
/// assert_eq!(record.metadata().get("jalki.record_id"), Some(&"42".to_string()));
/// ```
#[derive(Debug, Clone)]
pub struct Descriptor {
    /// Unique identifier (binary ULID)
    pub id: DescriptorId,

    /// Unix timestamp in nanoseconds, taken at construction
    pub timestamp: i64,

    /// The resource the action applied to (e.g. "Blog", "Program")
    ///
    /// Interned - cloning is O(1) regardless of label length.
    pub entity: InternedStr,

    /// What was done to it (e.g. "read", "create", or a raw method name
    /// when no preset entry matched)
    ///
    /// Interned - cloning is O(1) regardless of label length.
    pub action: InternedStr,

    /// How the intercepted call ended
    pub outcome: Outcome,

    /// Context carried alongside the record (method, latency, route params)
    ///
    /// Lazily allocated - `None` while empty. Reserved keys live in
    /// [`crate::keys`].
    pub metadata: Metadata,
}

impl Descriptor {
    /// Create a new descriptor with a fresh ID and the current timestamp
    ///
    /// Outcome defaults to `Success`; the tracker overwrites it after the
    /// wrapped handler resolves.
    pub fn new(entity: impl Into<InternedStr>, action: impl Into<InternedStr>) -> Self {
        Self {
            id: DescriptorId::new(),
            timestamp: chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0),
            entity: entity.into(),
            action: action.into(),
            outcome: Outcome::Success,
            metadata: None,
        }
    }

    /// Set the outcome
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata_mut().insert(key.into(), value.into());
        self
    }

    /// Get metadata reference (returns the empty map if none was allocated)
    #[inline]
    pub fn metadata(&self) -> &HashMap<String, String> {
        metadata_ref(&self.metadata)
    }

    /// Get mutable metadata, allocating on first use
    #[inline]
    pub fn metadata_mut(&mut self) -> &mut HashMap<String, String> {
        self.metadata.get_or_insert_with(Default::default)
    }
}

impl Serialize for Descriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Descriptor", 6)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("timestamp", &self.timestamp)?;
        state.serialize_field("entity", self.entity.as_str())?;
        state.serialize_field("action", self.action.as_str())?;
        state.serialize_field("outcome", &self.outcome)?;
        state.serialize_field("metadata", self.metadata())?;
        state.end()
    }
}
