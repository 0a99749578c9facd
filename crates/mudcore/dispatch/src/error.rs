//! Dispatcher errors
//!
//! Only conditions a caller can act on surface here. Lock failures, missing
//! commands and failing command handlers are all ordinary
//! [`DispatchOutcome`](crate::DispatchOutcome)s.

use mudcore_cmdset::StackError;
use mudcore_types::{EntityId, SessionId};
use thiserror::Error;

/// Errors raised by the dispatcher and the world context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    /// The session is neither logged in nor puppeting anything
    #[error("{0} has no account or puppet to act as")]
    NoActor(SessionId),

    /// A command set stack refused an operation
    #[error(transparent)]
    Stack(#[from] StackError),

    /// The actor's input queue has shut down
    #[error("input queue for {0} is closed")]
    InboxClosed(SessionId),
}

/// Result type for dispatcher operations
pub type DispatchResult<T> = Result<T, DispatchError>;
