//! # mudcore cmdset
//!
//! Commands, command sets and the merge algebra that decides which commands
//! an actor can use at any moment.
//!
//! ## Key Components
//!
//! - [`Command`]: key, aliases, lock and help metadata around a
//!   [`CommandHandler`]
//! - [`CommandSet`]: deduplicated, prioritized collection of commands
//! - [`merge`] / [`merge_all`]: Union, Intersect, Replace and Remove with
//!   priority and duplicate rules
//! - [`CommandSetStack`]: per-entity stack with a protected default set
//! - [`CommandSetFactory`] / [`CmdSetStore`]: rebuilding persistent sets
//!   after a restart
//! - [`CommandContext`]: what a running command sees, with staged changes
//!
//! ## Example
//!
//! ```rust,ignore
//! use mudcore_cmdset::{merge_all, CommandSet, MergeType};
//!
//! let character = CommandSet::new("character").with_commands([look, get]);
//! let menu = CommandSet::new("menu")
//!     .with_priority(10)
//!     .with_merge_type(MergeType::Replace)
//!     .with_commands([quit]);
//!
//! // only `quit` is left
//! let available = merge_all([character, menu]);
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod cmdset;
pub mod command;
pub mod context;
pub mod error;
pub mod merge;
pub mod persistence;
pub mod stack;

pub use cmdset::{normalize_name, CommandSet, MergeType};
pub use command::{Command, CommandHandler, ParsedArgs, DEFAULT_COMMAND_LOCK};
pub use context::{CommandAction, CommandContext, WorldView};
pub use error::{AbortReason, CmdSetError, CommandError, StackError, StackResult};
pub use merge::{merge, merge_all};
pub use persistence::{
    CmdSetBuilder, CmdSetDefinition, CmdSetStore, CommandSetFactory, InMemoryCmdSetStore,
};
pub use stack::{CommandSetStack, StackEntry};
