//! Command set, command and stack errors

use mudcore_types::EntityId;
use thiserror::Error;

/// Errors from command set values themselves
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CmdSetError {
    #[error("unknown merge type '{0}' (expected Union, Intersect, Replace or Remove)")]
    UnknownMergeType(String),
}

/// Why a command stopped before finishing
///
/// Returned from [`CommandHandler::parse`](crate::CommandHandler::parse) to
/// stop a command before it runs; the message goes to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AbortReason {
    pub message: String,
}

impl AbortReason {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors a command handler returns from `execute`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Deliberate early exit; staged changes are discarded quietly
    #[error("aborted: {0}")]
    Aborted(#[from] AbortReason),

    /// Unexpected failure; logged and reported generically
    #[error("command failed: {0}")]
    Failed(String),
}

impl CommandError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Errors from command set stacks and their persistence
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    /// A stack invariant was found broken
    #[error("command set stack integrity violation: {0}")]
    IntegrityViolation(String),

    /// Persistent push of a set that was not built from a factory path
    #[error("command set '{0}' has no factory path and cannot be persisted")]
    NotPersistable(String),

    #[error("no command set factory registered for '{0}'")]
    UnknownFactory(String),

    #[error("command set storage failed for {actor}: {message}")]
    Storage { actor: EntityId, message: String },
}

/// Result type for stack operations
pub type StackResult<T> = Result<T, StackError>;
