//! Lock evaluation errors
//!
//! None of these escape [`LockEngine::evaluate`](crate::LockEngine::evaluate):
//! the engine logs them and treats the clause as a denial. They are public so
//! that builders and admin tooling can validate lock strings up front.

use thiserror::Error;

/// Errors raised while parsing or evaluating a lock string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// Malformed lock syntax
    #[error("malformed lock '{source_text}' at offset {offset}: {message}")]
    Parse {
        source_text: String,
        offset: usize,
        message: String,
    },

    /// A lock refers to a predicate nobody registered
    #[error("unknown lock predicate '{0}'")]
    UnknownPredicate(String),

    /// A predicate was called with arguments it cannot use
    #[error("invalid arguments to {predicate}(): {message}")]
    InvalidArgument { predicate: String, message: String },
}

impl LockError {
    pub(crate) fn parse(source_text: &str, offset: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            source_text: source_text.to_string(),
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_argument(predicate: &str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            predicate: predicate.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for lock operations
pub type LockResult<T> = Result<T, LockError>;
