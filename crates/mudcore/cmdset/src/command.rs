//! Command descriptors and the handler seam
//!
//! A [`Command`] is data: a key, aliases, a lock string and help metadata,
//! plus a shared [`CommandHandler`] holding the behaviour. Two commands are
//! equivalent when any of their names collide; command sets rely on that
//! relation for insertion and merging.

use crate::context::CommandContext;
use crate::error::{AbortReason, CommandError};
use async_trait::async_trait;
use mudcore_lock::{Entity, Lockable, Permissible};
use mudcore_types::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Lock given to commands that do not set one
pub const DEFAULT_COMMAND_LOCK: &str = "cmd: all()";

/// Arguments after the command name, split the usual ways
///
/// `look/brief sword = shiny` gives switches `["brief"]`, words
/// `["sword", "=", "shiny"]`, lhs `sword` and rhs `shiny`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedArgs {
    /// Everything after the command name, trimmed
    pub raw: String,
    pub switches: Vec<String>,
    pub words: Vec<String>,
    pub lhs: Option<String>,
    pub rhs: Option<String>,
}

impl ParsedArgs {
    pub fn parse(raw: &str) -> Self {
        let mut rest = raw.trim();
        let mut switches = Vec::new();
        while let Some(stripped) = rest.strip_prefix('/') {
            let end = stripped
                .find(|c: char| c == '/' || c.is_whitespace())
                .unwrap_or(stripped.len());
            let switch = &stripped[..end];
            if !switch.is_empty() {
                switches.push(switch.to_lowercase());
            }
            rest = stripped[end..].trim_start_matches(char::is_whitespace);
            if end == 0 {
                break;
            }
        }

        let (lhs, rhs) = match rest.split_once('=') {
            Some((l, r)) => (Some(l.trim().to_string()), Some(r.trim().to_string())),
            None if rest.is_empty() => (None, None),
            None => (Some(rest.to_string()), None),
        };

        Self {
            raw: raw.trim().to_string(),
            switches,
            words: rest.split_whitespace().map(str::to_string).collect(),
            lhs,
            rhs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// Behaviour behind a command
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Turn the argument text into [`ParsedArgs`], or stop the command
    fn parse(&self, args: &str) -> Result<ParsedArgs, AbortReason> {
        Ok(ParsedArgs::parse(args))
    }

    /// Run the command
    ///
    /// World changes are requested through `ctx` and only applied once this
    /// returns `Ok`.
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        args: &ParsedArgs,
    ) -> Result<(), CommandError>;
}

/// An invocable command descriptor
#[derive(Clone)]
pub struct Command {
    key: String,
    aliases: Vec<String>,
    locks: String,
    help_category: String,
    help_text: String,
    auto_help: bool,
    is_exit: bool,
    is_channel: bool,
    owner: Option<EntityId>,
    handler: Arc<dyn CommandHandler>,
}

impl Command {
    pub fn new<H>(key: &str, handler: H) -> Self
    where
        H: CommandHandler + 'static,
    {
        Self::with_handler(key, Arc::new(handler))
    }

    /// Build around an already shared handler
    pub fn with_handler(key: &str, handler: Arc<dyn CommandHandler>) -> Self {
        Self {
            key: normalize(key),
            aliases: Vec::new(),
            locks: DEFAULT_COMMAND_LOCK.to_string(),
            help_category: "general".to_string(),
            help_text: String::new(),
            auto_help: true,
            is_exit: false,
            is_channel: false,
            owner: None,
            handler,
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for alias in aliases {
            self.add_alias(alias.as_ref());
        }
        self
    }

    pub fn with_locks(mut self, locks: impl Into<String>) -> Self {
        self.locks = locks.into();
        self
    }

    pub fn with_help_category(mut self, category: &str) -> Self {
        self.help_category = category.trim().to_lowercase();
        self
    }

    pub fn with_help(mut self, text: impl Into<String>) -> Self {
        self.help_text = text.into();
        self
    }

    /// Keep this command out of generated help listings
    pub fn without_auto_help(mut self) -> Self {
        self.auto_help = false;
        self
    }

    pub fn as_exit(mut self) -> Self {
        self.is_exit = true;
        self
    }

    pub fn as_channel(mut self) -> Self {
        self.is_channel = true;
        self
    }

    pub fn with_owner(mut self, owner: EntityId) -> Self {
        self.owner = Some(owner);
        self
    }

    fn add_alias(&mut self, alias: &str) {
        let alias = normalize(alias);
        if !alias.is_empty() && alias != self.key && !self.aliases.contains(&alias) {
            self.aliases.push(alias);
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Key followed by aliases
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.key.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    pub fn locks(&self) -> &str {
        &self.locks
    }

    pub fn help_category(&self) -> &str {
        &self.help_category
    }

    pub fn help_text(&self) -> &str {
        &self.help_text
    }

    pub fn auto_help(&self) -> bool {
        self.auto_help
    }

    pub fn is_exit(&self) -> bool {
        self.is_exit
    }

    pub fn is_channel(&self) -> bool {
        self.is_channel
    }

    /// Entity whose command set provided this command (a handle, not a link)
    pub fn owner(&self) -> Option<EntityId> {
        self.owner
    }

    pub fn set_owner(&mut self, owner: Option<EntityId>) {
        self.owner = owner;
    }

    pub fn handler(&self) -> &Arc<dyn CommandHandler> {
        &self.handler
    }

    /// Whether `name` is this command's key or one of its aliases
    pub fn matches(&self, name: &str) -> bool {
        let name = normalize(name);
        self.names().any(|n| n == name)
    }

    /// Key/alias equivalence: any shared name makes two commands the same
    pub fn same_as(&self, other: &Command) -> bool {
        self.names().any(|mine| other.names().any(|theirs| mine == theirs))
    }
}

impl Permissible for Command {}

impl Entity for Command {
    fn entity_id(&self) -> Option<EntityId> {
        None
    }

    fn key(&self) -> &str {
        &self.key
    }
}

impl Lockable for Command {
    fn lock_string(&self) -> &str {
        &self.locks
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("key", &self.key)
            .field("aliases", &self.aliases)
            .field("locks", &self.locks)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// Names compare case-insensitively with collapsed whitespace
pub(crate) fn normalize(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_names_are_normalized() {
        let cmd =
            Command::new("Press  Button", Noop).with_aliases(["PUSH", "press button", "push"]);
        assert_eq!(cmd.key(), "press button");
        assert_eq!(cmd.aliases(), ["push".to_string()]);
        assert!(cmd.matches("PRESS button"));
        assert!(cmd.matches("push"));
        assert!(!cmd.matches("press"));
    }

    #[test]
    fn test_equivalence() {
        let look = Command::new("look", Noop).with_aliases(["l"]);
        let glance = Command::new("glance", Noop).with_aliases(["l"]);
        let l = Command::new("l", Noop);
        let get = Command::new("get", Noop);
        assert!(look.same_as(&glance));
        assert!(look.same_as(&l));
        assert!(l.same_as(&look));
        assert!(!look.same_as(&get));
    }

    #[test]
    fn test_default_lock_and_help() {
        let cmd = Command::new("look", Noop);
        assert_eq!(cmd.lock_string(), DEFAULT_COMMAND_LOCK);
        assert_eq!(cmd.help_category(), "general");
        assert!(cmd.auto_help());
        assert!(cmd.entity_id().is_none());
    }

    #[test]
    fn test_parsed_args() {
        let args = ParsedArgs::parse("/brief/Full sword = shiny");
        assert_eq!(args.switches, vec!["brief", "full"]);
        assert_eq!(args.lhs.as_deref(), Some("sword"));
        assert_eq!(args.rhs.as_deref(), Some("shiny"));
        assert_eq!(args.words, vec!["sword", "=", "shiny"]);

        let plain = ParsedArgs::parse("  red apple ");
        assert_eq!(plain.raw, "red apple");
        assert!(plain.switches.is_empty());
        assert_eq!(plain.lhs.as_deref(), Some("red apple"));
        assert!(plain.rhs.is_none());

        assert!(ParsedArgs::parse("").is_empty());
        assert_eq!(ParsedArgs::parse("/").switches, Vec::<String>::new());
    }
}
