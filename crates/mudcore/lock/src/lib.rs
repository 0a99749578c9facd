//! # mudcore lock
//!
//! Lock strings gate access to almost everything in a world: commands,
//! objects, exits, channels and accounts.
//!
//! ```text
//! cmd: perm(Builder); get: not attr(cursed) and holds(gloves)
//! ```
//!
//! ## Key Components
//!
//! - [`LockEngine`]: parses, caches and evaluates lock strings
//! - [`LockString`] / [`LockExpr`]: parsed form, editable and printable
//! - [`PredicateRegistry`]: named predicate functions, built-ins included
//! - [`PermissionResolver`]: hierarchical and exact permission checks,
//!   account precedence and quelling
//! - [`Entity`], [`Permissible`], [`Lockable`]: what any checked thing must
//!   expose
//!
//! Evaluation never fails. Malformed clauses, unknown predicates and bad
//! arguments are logged and deny the clause they appear in. The superuser
//! skips evaluation entirely unless the caller asks otherwise.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod engine;
pub mod error;
pub mod lexer;
pub mod lockstring;
pub mod permission;
mod predicates;
pub mod registry;
pub mod subject;

pub use engine::{
    CheckOptions, LockDecision, LockEngine, ADHOC_ACCESS_TYPE, DEFAULT_CACHE_LIMIT,
};
pub use error::{LockError, LockResult};
pub use lockstring::{ClauseBody, LockClause, LockExpr, LockString, PredicateCall};
pub use permission::{PermissionHierarchy, PermissionResolver};
pub use registry::{PredicateContext, PredicateFn, PredicateRegistry};
pub use subject::{Entity, Lockable, Permissible};
