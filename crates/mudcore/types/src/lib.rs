//! # mudcore types
//!
//! Identifiers, permission sets and configuration shared by every mudcore
//! crate. Nothing in here evaluates anything; the lock engine, the command
//! set algebra and the dispatcher all build on these.
//!
//! - [`EntityId`]: numeric handle for accounts, characters, rooms, exits,
//!   things and channels, rendered as `#12`
//! - [`SessionId`]: one connected client
//! - [`Permissions`]: case-insensitive set of permission strings
//! - [`CoreConfig`]: hierarchy, default-set priority, superuser identity,
//!   dispatch and logging options

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod config;
pub mod ids;
pub mod permissions;

pub use config::{CoreConfig, DispatchConfig, LoggingConfig, MalformedLockPolicy};
pub use ids::{EntityId, IdParseError, SessionId};
pub use permissions::Permissions;
