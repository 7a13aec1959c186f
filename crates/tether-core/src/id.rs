#![forbid(unsafe_code)]

//! Opaque object identifiers.

use std::borrow::Borrow;
use std::fmt;
use std::rc::Rc;

/// Opaque id of a proxy object, unique among live objects of a session.
///
/// Cloning is cheap (shared string).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(Rc<str>);

impl ObjectId {
    /// Wrap a raw id string.
    #[must_use]
    pub fn new(raw: impl Into<Rc<str>>) -> Self {
        Self(raw.into())
    }

    /// The id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ObjectId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObjectId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for ObjectId {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl PartialEq<str> for ObjectId {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for ObjectId {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}
