//! Command sets
//!
//! A command set is a prioritized, deduplicated collection of commands plus
//! the options that steer how it merges with other sets. Adding a command
//! that is equivalent to one already held replaces the old one in place.

use crate::command::{normalize, Command};
use crate::error::CmdSetError;
use mudcore_types::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How an incoming set combines with the set below it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MergeType {
    /// Everything from both sides, dominant side winning collisions
    #[default]
    Union,
    /// Only commands present on both sides
    Intersect,
    /// Only the dominant side
    Replace,
    /// The recessive side minus anything the dominant side names
    Remove,
}

impl MergeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Union => "Union",
            Self::Intersect => "Intersect",
            Self::Replace => "Replace",
            Self::Remove => "Remove",
        }
    }
}

impl fmt::Display for MergeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeType {
    type Err = CmdSetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "union" => Ok(Self::Union),
            "intersect" => Ok(Self::Intersect),
            "replace" => Ok(Self::Replace),
            "remove" => Ok(Self::Remove),
            _ => Err(CmdSetError::UnknownMergeType(s.to_string())),
        }
    }
}

/// A prioritized collection of commands
#[derive(Clone, Default)]
pub struct CommandSet {
    pub(crate) key: String,
    pub(crate) path: Option<String>,
    pub(crate) priority: i32,
    pub(crate) merge_type: MergeType,
    pub(crate) key_mergetypes: BTreeMap<String, MergeType>,
    pub(crate) duplicates: Option<bool>,
    pub(crate) no_exits: Option<bool>,
    pub(crate) no_objs: Option<bool>,
    pub(crate) no_channels: Option<bool>,
    pub(crate) object_attached: bool,
    pub(crate) actual_merge_type: Option<MergeType>,
    pub(crate) merged_from: Vec<String>,
    pub(crate) commands: Vec<Command>,
}

impl CommandSet {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.trim().to_string(),
            ..Default::default()
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_merge_type(mut self, merge_type: MergeType) -> Self {
        self.merge_type = merge_type;
        self
    }

    /// Use `merge_type` instead when merging onto the set keyed `key`
    pub fn with_key_mergetype(mut self, key: &str, merge_type: MergeType) -> Self {
        self.key_mergetypes.insert(key.trim().to_string(), merge_type);
        self
    }

    pub fn with_duplicates(mut self, duplicates: bool) -> Self {
        self.duplicates = Some(duplicates);
        self
    }

    pub fn with_no_exits(mut self, no_exits: bool) -> Self {
        self.no_exits = Some(no_exits);
        self
    }

    pub fn with_no_objs(mut self, no_objs: bool) -> Self {
        self.no_objs = Some(no_objs);
        self
    }

    pub fn with_no_channels(mut self, no_channels: bool) -> Self {
        self.no_channels = Some(no_channels);
        self
    }

    pub fn with_command(mut self, command: Command) -> Self {
        self.add(command);
        self
    }

    pub fn with_commands<I>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = Command>,
    {
        self.extend(commands);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Factory path this set was built from, if any
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub(crate) fn set_path(&mut self, path: &str) {
        self.path = Some(path.to_string());
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn merge_type(&self) -> MergeType {
        self.merge_type
    }

    pub fn key_mergetypes(&self) -> &BTreeMap<String, MergeType> {
        &self.key_mergetypes
    }

    /// The explicit duplicates flag
    pub fn duplicates(&self) -> Option<bool> {
        self.duplicates
    }

    /// Duplicates flag with the unset default applied
    ///
    /// Unset means true for sets attached to in-world objects and false
    /// otherwise.
    pub fn allows_duplicates(&self) -> bool {
        self.duplicates.unwrap_or(self.object_attached)
    }

    pub fn no_exits(&self) -> Option<bool> {
        self.no_exits
    }

    pub fn no_objs(&self) -> Option<bool> {
        self.no_objs
    }

    pub fn no_channels(&self) -> Option<bool> {
        self.no_channels
    }

    pub fn is_object_attached(&self) -> bool {
        self.object_attached
    }

    pub fn set_object_attached(&mut self, attached: bool) {
        self.object_attached = attached;
    }

    /// Merge type actually applied when this set was produced by a merge
    pub fn actual_merge_type(&self) -> Option<MergeType> {
        self.actual_merge_type
    }

    /// Keys of the sets folded into this one, lowest priority first
    pub fn merged_from(&self) -> &[String] {
        &self.merged_from
    }

    /// Add a command, replacing any equivalent one in place
    pub fn add(&mut self, command: Command) {
        match self.commands.iter().position(|c| c.same_as(&command)) {
            Some(index) => {
                self.commands[index] = command;
                // the newcomer may bridge several old commands; keep only one
                let mut i = index + 1;
                while i < self.commands.len() {
                    if self.commands[i].same_as(&self.commands[index]) {
                        self.commands.remove(i);
                    } else {
                        i += 1;
                    }
                }
            }
            None => self.commands.push(command),
        }
    }

    /// Add every command of `other`, in order, with the same replace rule
    pub fn add_set(&mut self, other: &CommandSet) {
        for command in &other.commands {
            self.add(command.clone());
        }
    }

    pub fn extend<I>(&mut self, commands: I)
    where
        I: IntoIterator<Item = Command>,
    {
        for command in commands {
            self.add(command);
        }
    }

    /// Remove every command answering to `name`
    pub fn remove(&mut self, name: &str) -> Vec<Command> {
        let (removed, kept): (Vec<Command>, Vec<Command>) = std::mem::take(&mut self.commands)
            .into_iter()
            .partition(|c| c.matches(name));
        self.commands = kept;
        removed
    }

    /// Remove every command equivalent to `command`
    pub fn remove_command(&mut self, command: &Command) -> Vec<Command> {
        let (removed, kept): (Vec<Command>, Vec<Command>) = std::mem::take(&mut self.commands)
            .into_iter()
            .partition(|c| c.same_as(command));
        self.commands = kept;
        removed
    }

    /// First command answering to `name`
    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.matches(name))
    }

    /// Every command answering to `name` (several after a duplicates merge)
    pub fn get_all(&self, name: &str) -> Vec<&Command> {
        self.commands.iter().filter(|c| c.matches(name)).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.commands.iter()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Keep only commands for which `keep` returns true
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&Command) -> bool,
    {
        self.commands.retain(keep);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Every key and alias, sorted and deduplicated
    pub fn keys_and_aliases(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .commands
            .iter()
            .flat_map(|c| c.names().map(str::to_string))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Stamp `owner` on every command (the entity providing this set)
    pub fn set_owner(&mut self, owner: Option<EntityId>) {
        for command in &mut self.commands {
            command.set_owner(owner);
        }
    }

    fn keys(&self) -> Vec<&str> {
        self.commands.iter().map(Command::key).collect()
    }

    /// Copy of this set's options with no commands
    pub(crate) fn empty_like(&self) -> Self {
        Self {
            key: self.key.clone(),
            path: self.path.clone(),
            priority: self.priority,
            merge_type: self.merge_type,
            key_mergetypes: self.key_mergetypes.clone(),
            duplicates: self.duplicates,
            no_exits: self.no_exits,
            no_objs: self.no_objs,
            no_channels: self.no_channels,
            object_attached: self.object_attached,
            actual_merge_type: None,
            merged_from: Vec::new(),
            commands: Vec::new(),
        }
    }
}

impl<'a> IntoIterator for &'a CommandSet {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

impl fmt::Debug for CommandSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSet")
            .field("key", &self.key)
            .field("priority", &self.priority)
            .field("merge_type", &self.merge_type)
            .field("commands", &self.keys())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for CommandSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.key.is_empty() { "<unnamed>" } else { &self.key };
        write!(
            f,
            "{} ({}, prio {}): {}",
            name,
            self.actual_merge_type.unwrap_or(self.merge_type),
            self.priority,
            self.keys().join(", ")
        )
    }
}

/// Normalized form of a lookup name, as commands store theirs
pub fn normalize_name(name: &str) -> String {
    normalize(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandHandler, ParsedArgs};
    use crate::context::CommandContext;
    use crate::error::CommandError;
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

    fn cmd(key: &str, aliases: &[&str]) -> Command {
        Command::new(key, Noop).with_aliases(aliases.iter())
    }

    #[test]
    fn test_add_replaces_in_place() {
        let mut set = CommandSet::new("basic");
        set.add(cmd("look", &["l"]));
        set.add(cmd("get", &[]));
        set.add(cmd("glance", &["l"]));
        assert_eq!(set.len(), 2);
        assert_eq!(set.commands()[0].key(), "glance");
        assert!(set.contains("l"));
        assert!(!set.contains("look"));
    }

    #[test]
    fn test_bridging_command_collapses_both() {
        let mut set = CommandSet::new("basic");
        set.add(cmd("north", &[]));
        set.add(cmd("n", &[]));
        set.add(cmd("north", &["n"]));
        assert_eq!(set.len(), 1);
        assert_eq!(set.keys_and_aliases(), vec!["n", "north"]);
    }

    #[test]
    fn test_add_set_and_remove() {
        let mut base =
            CommandSet::new("base").with_commands([cmd("look", &[]), cmd("say", &["'"])]);
        let extra =
            CommandSet::new("extra").with_commands([cmd("say", &[]), cmd("pose", &[":"])]);
        base.add_set(&extra);
        assert_eq!(base.len(), 3);

        let removed = base.remove("SAY");
        assert_eq!(removed.len(), 1);
        assert!(!base.contains("say"));
        assert!(base.remove("nothing").is_empty());
    }

    #[test]
    fn test_merge_type_parse_display() {
        assert_eq!("intersect".parse::<MergeType>().unwrap(), MergeType::Intersect);
        assert_eq!(" REMOVE ".parse::<MergeType>().unwrap(), MergeType::Remove);
        assert_eq!(MergeType::Replace.to_string(), "Replace");
        assert!(matches!(
            "merge".parse::<MergeType>(),
            Err(CmdSetError::UnknownMergeType(_))
        ));
    }

    #[test]
    fn test_duplicates_default_follows_attachment() {
        let mut set = CommandSet::new("button");
        assert!(!set.allows_duplicates());
        set.set_object_attached(true);
        assert!(set.allows_duplicates());
        assert!(!set.with_duplicates(false).allows_duplicates());
    }
}
