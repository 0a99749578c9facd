//! # mudcore dispatch
//!
//! Turns a line of player input into at most one command execution.
//!
//! ## Key Components
//!
//! - [`World`]: the injected, process-scoped registry of entities and
//!   sessions; every entity owns its command set stack
//! - [`CommandDispatcher`]: gather, merge, match and execute
//! - [`CommandMatcher`] / [`ExactMatcher`]: replaceable input matching
//! - [`ActorInbox`]: per-session queue keeping each session's lines in order
//! - [`MessageSink`]: where output for a session is sent
//!
//! ## Example
//!
//! ```rust,ignore
//! use mudcore_dispatch::{BufferedSink, CommandDispatcher, World};
//!
//! let mut world = World::from_config(&config);
//! let session = world.connect(Some(account));
//! world.set_puppet(session, Some(character))?;
//!
//! let dispatcher = CommandDispatcher::from_config(&config, Arc::new(BufferedSink::new()));
//! let outcome = dispatcher.dispatch(&mut world, session, "look").await?;
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod inbox;
pub mod matcher;
pub mod sink;
pub mod world;

pub use dispatcher::{
    CommandDispatcher, DispatchOutcome, ExecutionReport, ExecutionStatus, Gathered,
    MatchCandidate, CALL_ACCESS, CMD_ACCESS, LISTEN_ACCESS,
};
pub use error::{DispatchError, DispatchResult};
pub use handlers::{ChannelPost, TraverseExit};
pub use inbox::ActorInbox;
pub use matcher::{CommandMatch, CommandMatcher, ExactMatcher};
pub use sink::{BufferedSink, MessageSink, NullSink};
pub use world::{
    EntityKind, EntityRef, GameObject, Session, Tag, World, CHANNEL_CMDSET_PRIORITY,
    CHARACTER_LOCKS, EXIT_CMDSET_PRIORITY,
};
