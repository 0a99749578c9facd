//! Command set persistence contract
//!
//! Command behaviour is code, so a persistent command set is stored as the
//! factory path that builds it. After a restart the stack asks the
//! [`CommandSetFactory`] to rebuild each recorded path.

use crate::cmdset::CommandSet;
use crate::error::{StackError, StackResult};
use async_trait::async_trait;
use mudcore_types::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One persisted stack entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmdSetDefinition {
    /// Factory path the set is rebuilt from
    pub path: String,
    /// Whether this entry is the stack's default set
    #[serde(default)]
    pub default: bool,
}

impl CmdSetDefinition {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            default: false,
        }
    }

    pub fn default_set(path: &str) -> Self {
        Self {
            path: path.to_string(),
            default: true,
        }
    }
}

/// Builds a fresh command set
pub type CmdSetBuilder = Arc<dyn Fn() -> CommandSet + Send + Sync>;

/// Path -> builder table
#[derive(Clone, Default)]
pub struct CommandSetFactory {
    builders: HashMap<String, CmdSetBuilder>,
}

impl CommandSetFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a builder; the last registration for a path wins
    pub fn register<F>(&mut self, path: &str, builder: F) -> Option<CmdSetBuilder>
    where
        F: Fn() -> CommandSet + Send + Sync + 'static,
    {
        self.builders.insert(path.to_string(), Arc::new(builder))
    }

    /// Build the set registered under `path`, stamped with that path
    pub fn build(&self, path: &str) -> StackResult<CommandSet> {
        let builder = self
            .builders
            .get(path)
            .ok_or_else(|| StackError::UnknownFactory(path.to_string()))?;
        let mut set = builder();
        set.set_path(path);
        Ok(set)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.builders.contains_key(path)
    }

    /// Registered paths, sorted
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<_> = self.builders.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}

impl fmt::Debug for CommandSetFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSetFactory")
            .field("paths", &self.paths())
            .finish()
    }
}

/// Where persistent stack entries live between restarts
#[async_trait]
pub trait CmdSetStore: Send + Sync {
    /// Replace everything recorded for `actor`
    async fn save(&self, actor: EntityId, definitions: Vec<CmdSetDefinition>) -> StackResult<()>;

    /// Entries recorded for `actor`, default first; empty if none
    async fn load(&self, actor: EntityId) -> StackResult<Vec<CmdSetDefinition>>;
}

/// In-memory store for development and testing
#[derive(Debug, Default, Clone)]
pub struct InMemoryCmdSetStore {
    records: Arc<RwLock<HashMap<EntityId, Vec<CmdSetDefinition>>>>,
}

impl InMemoryCmdSetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of actors with saved entries
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl CmdSetStore for InMemoryCmdSetStore {
    async fn save(&self, actor: EntityId, definitions: Vec<CmdSetDefinition>) -> StackResult<()> {
        let mut records = self.records.write().await;
        if definitions.is_empty() {
            records.remove(&actor);
        } else {
            records.insert(actor, definitions);
        }
        Ok(())
    }

    async fn load(&self, actor: EntityId) -> StackResult<Vec<CmdSetDefinition>> {
        let records = self.records.read().await;
        Ok(records.get(&actor).cloned().unwrap_or_default())
    }
}
