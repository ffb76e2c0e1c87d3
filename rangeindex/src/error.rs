//! Errors surfaced by index reads and filter evaluation.

use common::EncodingError;

use crate::model::{Operator, STRATEGY_ROARING_SET_RANGE};

/// Result type for index operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while evaluating a filter against the index.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A predicate requires an index configuration that is not enabled.
    /// The message carries the exact remediation for the operator.
    Config(String),
    /// The operator cannot be served by the bit-sliced range strategy.
    UnsupportedOperator(Operator),
    /// A malformed filter tree (wrong combinator, no children).
    InvalidQuery(String),
    /// The caller's cancellation token fired.
    Cancelled,
    /// Corrupt segment bytes or bitmap payloads.
    Encoding(String),
    /// An error from evaluating the child at `index` of a boolean node.
    NestedChild { index: usize, source: Box<Error> },
}

impl Error {
    /// Wrap a child error with its index in the parent's children.
    /// Cancellation passes through unwrapped so callers can match on it.
    pub fn wrap_nested(index: usize, source: Error) -> Error {
        if source.is_cancelled() {
            return source;
        }
        Error::NestedChild {
            index,
            source: Box::new(source),
        }
    }

    /// Whether this error (possibly nested) is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "{}", msg),
            Error::UnsupportedOperator(op) => write!(
                f,
                "operator {} not supported for strategy {:?}",
                op.name(),
                STRATEGY_ROARING_SET_RANGE
            ),
            Error::InvalidQuery(msg) => write!(f, "{}", msg),
            Error::Cancelled => write!(f, "operation cancelled"),
            Error::Encoding(msg) => write!(f, "encoding error: {}", msg),
            Error::NestedChild { index, source } => {
                write!(f, "nested child {}: {}", index, source)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::NestedChild { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<EncodingError> for Error {
    fn from(err: EncodingError) -> Self {
        Error::Encoding(err.message)
    }
}
