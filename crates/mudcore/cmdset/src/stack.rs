//! Per-entity command set stack
//!
//! The bottom of the stack is the protected default set. [`pop`] never
//! removes it; only [`pop_default`] does. The effective set is the ascending
//! priority fold of every set on the stack and is cached until the next
//! mutation.
//!
//! [`pop`]: CommandSetStack::pop
//! [`pop_default`]: CommandSetStack::pop_default

use crate::cmdset::CommandSet;
use crate::error::{StackError, StackResult};
use crate::merge::merge_all;
use crate::persistence::{CmdSetDefinition, CmdSetStore, CommandSetFactory};
use mudcore_types::EntityId;
use parking_lot::Mutex;
use std::fmt;
use tracing::{debug, info, warn};

/// A set on the stack and whether it survives restarts
#[derive(Debug, Clone)]
pub struct StackEntry {
    pub set: CommandSet,
    pub persistent: bool,
}

/// Ordered command sets owned by one entity
#[derive(Default)]
pub struct CommandSetStack {
    default: Option<StackEntry>,
    entries: Vec<StackEntry>,
    generation: u64,
    cache: Mutex<Option<(u64, CommandSet)>>,
}

impl CommandSetStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stack holding only `set` as its default
    pub fn with_default(set: CommandSet) -> Self {
        let mut stack = Self::new();
        stack.push_default(set);
        stack
    }

    /// Push a set on top
    ///
    /// A persistent push needs a set built by a [`CommandSetFactory`].
    pub fn push(&mut self, set: CommandSet, persistent: bool) -> StackResult<()> {
        if persistent && set.path().is_none() {
            return Err(StackError::NotPersistable(set.key().to_string()));
        }
        debug!(key = %set.key(), priority = set.priority(), persistent, "Pushed command set");
        self.entries.push(StackEntry { set, persistent });
        self.touch();
        Ok(())
    }

    /// Install `set` as the default, returning the one it replaces
    ///
    /// The default is persistent when the set has a factory path.
    pub fn push_default(&mut self, set: CommandSet) -> Option<CommandSet> {
        info!(key = %set.key(), path = ?set.path(), "Default command set installed");
        let persistent = set.path().is_some();
        let previous = self.default.replace(StackEntry { set, persistent });
        self.touch();
        previous.map(|entry| entry.set)
    }

    /// Pop the most recent set keyed `selector`, or the most recent of all
    ///
    /// Never touches the default set.
    pub fn pop(&mut self, selector: Option<&str>) -> Option<CommandSet> {
        let index = match selector {
            Some(key) => self.entries.iter().rposition(|e| e.set.key() == key),
            None => self.entries.len().checked_sub(1),
        };
        let Some(index) = index else {
            debug!(selector, "Nothing to pop");
            return None;
        };
        let entry = self.entries.remove(index);
        debug!(key = %entry.set.key(), "Popped command set");
        self.touch();
        Some(entry.set)
    }

    /// Remove the default set
    pub fn pop_default(&mut self) -> Option<CommandSet> {
        let entry = self.default.take()?;
        info!(key = %entry.set.key(), "Default command set removed");
        self.touch();
        Some(entry.set)
    }

    /// Remove everything except the default
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.touch();
        }
    }

    pub fn default_set(&self) -> Option<&CommandSet> {
        self.default.as_ref().map(|e| &e.set)
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Pushed entries above the default, oldest first
    pub fn entries(&self) -> &[StackEntry] {
        &self.entries
    }

    /// Every set on the stack, default first, then in push order
    pub fn sets(&self) -> impl Iterator<Item = &CommandSet> {
        self.default
            .iter()
            .chain(self.entries.iter())
            .map(|e| &e.set)
    }

    /// Whether any set on the stack (default included) has `key`
    pub fn contains(&self, key: &str) -> bool {
        self.sets().any(|s| s.key() == key)
    }

    /// Number of sets, default included
    pub fn len(&self) -> usize {
        self.entries.len() + usize::from(self.default.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bumped on every mutation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The merged result of every set on the stack
    pub fn effective_set(&self) -> CommandSet {
        let mut cache = self.cache.lock();
        if let Some((generation, merged)) = cache.as_ref() {
            if *generation == self.generation {
                return merged.clone();
            }
        }
        let merged = merge_all(self.sets().cloned());
        *cache = Some((self.generation, merged.clone()));
        merged
    }

    /// Check the stack's invariants
    pub fn verify(&self) -> StackResult<()> {
        for entry in self.default.iter().chain(self.entries.iter()) {
            if entry.persistent && entry.set.path().is_none() {
                return Err(StackError::IntegrityViolation(format!(
                    "persistent set '{}' has no factory path",
                    entry.set.key()
                )));
            }
        }
        if let Some((generation, _)) = self.cache.lock().as_ref() {
            if *generation > self.generation {
                return Err(StackError::IntegrityViolation(
                    "merge cache is ahead of the stack".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// What a restart needs to rebuild this stack, default first
    pub fn definitions(&self) -> Vec<CmdSetDefinition> {
        let default = self
            .default
            .iter()
            .filter(|e| e.persistent)
            .filter_map(|e| e.set.path())
            .map(CmdSetDefinition::default_set);
        let pushed = self
            .entries
            .iter()
            .filter(|e| e.persistent)
            .filter_map(|e| e.set.path())
            .map(CmdSetDefinition::new);
        default.chain(pushed).collect()
    }

    /// Save the persistent entries for `actor`
    pub async fn persist(&self, actor: EntityId, store: &dyn CmdSetStore) -> StackResult<()> {
        let definitions = self.definitions();
        debug!(%actor, entries = definitions.len(), "Persisting command set stack");
        store.save(actor, definitions).await
    }

    /// Rebuild `actor`'s stack from `store`
    ///
    /// Paths with no registered factory are skipped with a warning; a record
    /// naming more than one default is rejected.
    pub async fn restore(
        actor: EntityId,
        store: &dyn CmdSetStore,
        factories: &CommandSetFactory,
    ) -> StackResult<Self> {
        let definitions = store.load(actor).await?;
        if definitions.iter().filter(|d| d.default).count() > 1 {
            return Err(StackError::IntegrityViolation(format!(
                "stored stack for {} has more than one default set",
                actor
            )));
        }

        let mut stack = Self::new();
        for definition in &definitions {
            let set = match factories.build(&definition.path) {
                Ok(set) => set,
                Err(err) => {
                    warn!(
                        %actor,
                        path = %definition.path,
                        error = %err,
                        "Skipping stored command set"
                    );
                    continue;
                }
            };
            if definition.default {
                stack.push_default(set);
            } else {
                stack.push(set, true)?;
            }
        }
        info!(%actor, sets = stack.len(), "Command set stack restored");
        Ok(stack)
    }

    fn touch(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

impl fmt::Debug for CommandSetStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSetStack")
            .field("default", &self.default_set().map(CommandSet::key))
            .field(
                "entries",
                &self.entries.iter().map(|e| e.set.key()).collect::<Vec<_>>(),
            )
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmdset::MergeType;
    use crate::command::{Command, CommandHandler, ParsedArgs};
    use crate::context::CommandContext;
    use crate::error::CommandError;
    use crate::persistence::InMemoryCmdSetStore;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl CommandHandler for Noop {
        async fn execute(
            &self,
            _ctx: &mut CommandContext<'_>,
            _args: &ParsedArgs,
        ) -> Result<(), CommandError> {
            Ok(())
        }
    }

    fn set(key: &str, priority: i32, commands: &[&str]) -> CommandSet {
        CommandSet::new(key)
            .with_priority(priority)
            .with_commands(commands.iter().map(|c| Command::new(c, Noop)))
    }

    fn factories() -> CommandSetFactory {
        let mut factories = CommandSetFactory::new();
        factories.register("sets.character", || set("character", 0, &["look", "get"]));
        factories.register("sets.menu", || {
            set("menu", 10, &["1", "2", "quit"]).with_merge_type(MergeType::Replace)
        });
        factories
    }

    #[test]
    fn test_pop_never_removes_default() {
        let mut stack = CommandSetStack::with_default(set("character", 0, &["look"]));
        stack.push(set("menu", 10, &["quit"]), false).unwrap();
        assert!(stack.pop(None).is_some());
        assert!(stack.pop(None).is_none());
        assert!(stack.pop(Some("character")).is_none());
        assert!(stack.has_default());
        assert_eq!(stack.pop_default().map(|s| s.key().to_string()), Some("character".into()));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_pop_by_selector_takes_most_recent() {
        let mut stack = CommandSetStack::new();
        stack.push(set("a", 1, &["x"]), false).unwrap();
        stack.push(set("b", 1, &["y"]), false).unwrap();
        stack.push(set("a", 2, &["z"]), false).unwrap();
        let popped = stack.pop(Some("a")).unwrap();
        assert_eq!(popped.priority(), 2);
        assert_eq!(stack.len(), 2);
        assert!(stack.contains("a"));
        assert!(stack.pop(Some("missing")).is_none());
    }

    #[test]
    fn test_effective_set_tracks_mutations() {
        let mut stack = CommandSetStack::with_default(set("character", 0, &["look", "get"]));
        assert_eq!(stack.effective_set().len(), 2);
        let g = stack.generation();

        stack
            .push(set("menu", 10, &["quit"]).with_merge_type(MergeType::Replace), false)
            .unwrap();
        assert!(stack.generation() > g);
        let merged = stack.effective_set();
        assert_eq!(merged.len(), 1);
        assert!(merged.contains("quit"));

        stack.pop(None);
        assert_eq!(stack.effective_set().len(), 2);
        assert!(stack.verify().is_ok());
    }

    #[test]
    fn test_clear_keeps_default() {
        let mut stack = CommandSetStack::with_default(set("character", 0, &["look"]));
        stack.push(set("a", 1, &["x"]), false).unwrap();
        stack.push(set("b", 2, &["y"]), false).unwrap();
        stack.clear();
        assert_eq!(stack.len(), 1);
        assert!(stack.has_default());
    }

    #[test]
    fn test_persistent_push_needs_path() {
        let mut stack = CommandSetStack::new();
        let err = stack.push(set("adhoc", 0, &[]), true).unwrap_err();
        assert_eq!(err, StackError::NotPersistable("adhoc".into()));

        let built = factories().build("sets.menu").unwrap();
        assert!(stack.push(built, true).is_ok());
    }

    #[tokio::test]
    async fn test_persist_and_restore() {
        let factories = factories();
        let store = InMemoryCmdSetStore::new();
        let actor = EntityId::new(12);

        let mut stack = CommandSetStack::with_default(factories.build("sets.character").unwrap());
        stack.push(factories.build("sets.menu").unwrap(), true).unwrap();
        stack.push(set("temporary", 5, &["dance"]), false).unwrap();
        stack.persist(actor, &store).await.unwrap();

        let restored = CommandSetStack::restore(actor, &store, &factories)
            .await
            .unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.default_set().map(CommandSet::key), Some("character"));
        assert!(restored.contains("menu"));
        assert!(!restored.contains("temporary"));
    }

    #[tokio::test]
    async fn test_restore_skips_unknown_and_rejects_two_defaults() {
        let factories = factories();
        let store = InMemoryCmdSetStore::new();
        let actor = EntityId::new(3);

        store
            .save(
                actor,
                vec![
                    CmdSetDefinition::default_set("sets.character"),
                    CmdSetDefinition::new("sets.gone"),
                ],
            )
            .await
            .unwrap();
        let restored = CommandSetStack::restore(actor, &store, &factories)
            .await
            .unwrap();
        assert_eq!(restored.len(), 1);

        store
            .save(
                actor,
                vec![
                    CmdSetDefinition::default_set("sets.character"),
                    CmdSetDefinition::default_set("sets.menu"),
                ],
            )
            .await
            .unwrap();
        let err = CommandSetStack::restore(actor, &store, &factories)
            .await
            .unwrap_err();
        assert!(matches!(err, StackError::IntegrityViolation(_)));
    }
}
