#![forbid(unsafe_code)]

//! Error taxonomy.
//!
//! | Kind | Raised by | Handling |
//! |------|-----------|----------|
//! | [`ConfigError`] | class and type registration | fatal at definition time |
//! | [`UsageError`] | `get`/`call`/`on` on disposed objects, duplicate ids | returned to the caller |
//! | [`ValueError`] | property conversion and encoding | reported, the single write is skipped |
//! | listener failures ([`BoxError`]) | event callbacks | logged, dispatch continues |

use thiserror::Error;

use crate::id::ObjectId;

/// Failure returned by a listener callback or one of its pending results.
pub type BoxError = Box<dyn std::error::Error + 'static>;

/// Invalid descriptor or type registration. Never recoverable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown property type '{0}'")]
    UnknownType(String),
    #[error("property type '{0}' is already registered")]
    DuplicateType(&'static str),
    #[error("property '{0}' is declared twice")]
    DuplicateProperty(String),
    #[error("event '{0}' is declared twice")]
    DuplicateEvent(String),
    #[error("property '{property}': {reason}")]
    InvalidModifiers {
        property: String,
        reason: &'static str,
    },
    #[error("default of property '{property}' is invalid: {source}")]
    InvalidDefault {
        property: String,
        #[source]
        source: ValueError,
    },
    #[error("choice of property '{property}' is invalid: {source}")]
    InvalidChoice {
        property: String,
        #[source]
        source: ValueError,
    },
    #[error("event '{event}' changes undeclared property '{property}'")]
    UnknownChangeTarget { event: String, property: String },
    #[error("set order names undeclared property '{0}'")]
    UnknownOrderedProperty(String),
}

/// A value that a property type cannot convert or encode.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("expected {expected}, got {found}")]
    Unexpected {
        expected: &'static str,
        found: String,
    },
    #[error("{0}")]
    Invalid(String),
    #[error("{value} is not one of {choices}")]
    NotInChoice { value: String, choices: String },
    #[error("reference to disposed object {0}")]
    DisposedReference(ObjectId),
}

impl ValueError {
    pub(crate) fn unexpected(expected: &'static str, found: &crate::Value) -> Self {
        Self::Unexpected {
            expected,
            found: found.to_string(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// A caller mistake at the current call site.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UsageError {
    #[error("cannot {operation} on disposed object {id}")]
    Disposed {
        id: ObjectId,
        operation: &'static str,
    },
    #[error("object id {0} is already registered")]
    DuplicateId(ObjectId),
    #[error("session has been shut down")]
    SessionClosed,
}

/// Any error surfaced by the core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error(transparent)]
    Usage(#[from] UsageError),
}
