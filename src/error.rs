use crate::config::ConfigError;
use thiserror::Error;

/// Top-level error type for the dragon-extract library.
///
/// Data errors (`Type`, `Value`) carry the readable path of the node that
/// failed. The remaining variants are programmer or configuration errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{path}: expected {expected}, got {got}")]
    Type {
        path: String,
        expected: String,
        got: String,
    },

    #[error("{path}: {message}")]
    Value { path: String, message: String },

    #[error("no type handler available for {0}")]
    Unresolved(String),

    #[error("{0} is already registered")]
    DuplicateHandler(&'static str),

    #[error("{0} has multiple wildcard fields")]
    MultipleWildcards(String),

    #[error("can not mutate context key while there are children alive")]
    ContextBusy,

    #[error("handler collection must be set for a root context")]
    MissingHandlers,

    #[error("context belongs to a different handler collection")]
    ForeignContext,

    #[error("expected at most {max} arguments, got {got}")]
    TooManyArguments { max: usize, got: usize },

    #[error("duplicate argument {0} provided")]
    DuplicateArgument(String),

    #[error("missing required argument {0}")]
    MissingArgument(String),

    #[error("unexpected keyword argument {0}")]
    UnexpectedArgument(String),

    #[error("{0} has no default value")]
    NoDefault(String),

    /// Raised by synthetic handlers to drop a field from the output.
    /// Never returned from the public entry points.
    #[doc(hidden)]
    #[error("field ignored")]
    IgnoreField,
}

impl Error {
    /// Returns the readable path of a data error, if it carries one.
    pub fn path(&self) -> Option<&str> {
        match self {
            Error::Type { path, .. } | Error::Value { path, .. } => Some(path),
            _ => None,
        }
    }
}
