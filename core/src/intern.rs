//! String interning for zero-cost cloning of repeated labels
//!
//! Every request a wrapped route serves produces a descriptor carrying the
//! same entity label ("Blog") and one of a handful of action names
//! ("read", "create", ...). Interning stores each unique label once and
//! hands out small integer keys, so cloning a descriptor copies 8 bytes of
//! keys instead of allocating two strings.
//!
//! # Usage
//!
//! ```
//! use jalki_core::InternedStr;
//!
//! let entity = InternedStr::new("Blog");
//! let copied = entity; // Copy - just a u32 key
//! assert_eq!(copied.as_str(), "Blog");
//! ```

use lasso::{Spur, ThreadedRodeo};
use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::OnceLock;

/// Global label interner, lazily initialized, thread-safe via lasso
static INTERNER: OnceLock<ThreadedRodeo> = OnceLock::new();

fn interner() -> &'static ThreadedRodeo {
    INTERNER.get_or_init(ThreadedRodeo::new)
}

/// An interned string reference
///
/// Stores a 4-byte key instead of an owned String. Cloning copies the key;
/// no allocation. `Send + Sync`; the underlying interner is never dropped,
/// so resolved slices are `'static`.
#[derive(Clone, Copy)]
pub struct InternedStr {
    key: Spur,
}

impl InternedStr {
    /// Intern a string, returning the existing key if it was seen before
    #[inline]
    pub fn new(s: &str) -> Self {
        Self {
            key: interner().get_or_intern(s),
        }
    }

    /// Intern an owned String without an intermediate borrow
    #[inline]
    pub fn from_string(s: String) -> Self {
        Self {
            key: interner().get_or_intern(s),
        }
    }

    /// Resolve back to the string slice
    #[inline]
    pub fn as_str(&self) -> &'static str {
        // The interner lives for 'static and keys are never removed
        interner().resolve(&self.key)
    }

    /// Number of unique labels interned so far (for diagnostics)
    pub fn interned_count() -> usize {
        interner().len()
    }
}

impl Deref for InternedStr {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl AsRef<str> for InternedStr {
    #[inline]
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Debug for InternedStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for InternedStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq for InternedStr {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        // Same key = same string, no comparison of contents
        self.key == other.key
    }
}

impl Eq for InternedStr {}

impl PartialEq<str> for InternedStr {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for InternedStr {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl PartialEq<String> for InternedStr {
    #[inline]
    fn eq(&self, other: &String) -> bool {
        self.as_str() == other
    }
}

impl Hash for InternedStr {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Hash the key, not the string
        self.key.hash(state);
    }
}

impl From<&str> for InternedStr {
    #[inline]
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for InternedStr {
    #[inline]
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

impl From<InternedStr> for String {
    #[inline]
    fn from(s: InternedStr) -> Self {
        s.as_str().to_owned()
    }
}

impl Serialize for InternedStr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
