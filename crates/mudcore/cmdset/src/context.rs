//! Execution context handed to command handlers
//!
//! Handlers see the world read-only. Everything they want to change is
//! recorded as a [`CommandAction`] and applied by the dispatcher after the
//! handler returns successfully; an abort, error, panic or timeout drops the
//! recorded actions, so a failed command never leaves half its changes behind.

use crate::cmdset::CommandSet;
use mudcore_types::{EntityId, SessionId};

/// Read-only world queries available while a command runs
pub trait WorldView: Send + Sync {
    fn key_of(&self, id: EntityId) -> Option<&str>;

    fn description_of(&self, id: EntityId) -> Option<&str>;

    fn location_of(&self, id: EntityId) -> Option<EntityId>;

    /// Entities located in `id`, in insertion order
    fn contents_of(&self, id: EntityId) -> Vec<EntityId>;

    /// Where an exit leads
    fn destination_of(&self, exit: EntityId) -> Option<EntityId>;
}

/// A change requested by a command, applied only on success
#[derive(Debug, Clone)]
pub enum CommandAction {
    PushCmdSet {
        target: EntityId,
        set: CommandSet,
        persistent: bool,
    },
    PopCmdSet {
        target: EntityId,
        key: Option<String>,
    },
    Move {
        entity: EntityId,
        destination: EntityId,
    },
    Message {
        recipient: EntityId,
        text: String,
    },
}

/// Everything a running command can see and request
pub struct CommandContext<'a> {
    /// The acting entity (usually the puppeted character)
    pub caller: EntityId,
    pub session: Option<SessionId>,
    pub account: Option<EntityId>,
    /// Entity whose command set supplied the command
    pub owner: Option<EntityId>,
    /// Name the caller typed to reach this command
    pub cmdname: String,
    pub raw_input: String,
    pub world: &'a dyn WorldView,
    /// The merged command set the command was matched from
    pub available: &'a CommandSet,
    output: Vec<String>,
    actions: Vec<CommandAction>,
}

impl<'a> CommandContext<'a> {
    pub fn new(caller: EntityId, world: &'a dyn WorldView, available: &'a CommandSet) -> Self {
        Self {
            caller,
            session: None,
            account: None,
            owner: None,
            cmdname: String::new(),
            raw_input: String::new(),
            world,
            available,
            output: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_session(mut self, session: Option<SessionId>) -> Self {
        self.session = session;
        self
    }

    pub fn with_account(mut self, account: Option<EntityId>) -> Self {
        self.account = account;
        self
    }

    pub fn with_owner(mut self, owner: Option<EntityId>) -> Self {
        self.owner = owner;
        self
    }

    pub fn with_input(mut self, cmdname: &str, raw_input: &str) -> Self {
        self.cmdname = cmdname.to_string();
        self.raw_input = raw_input.to_string();
        self
    }

    /// Text for the caller's session
    ///
    /// Output is delivered whatever the outcome, unlike staged actions.
    pub fn msg(&mut self, text: impl Into<String>) {
        self.output.push(text.into());
    }

    /// Message another entity once the command succeeds
    pub fn message(&mut self, recipient: EntityId, text: impl Into<String>) {
        self.actions.push(CommandAction::Message {
            recipient,
            text: text.into(),
        });
    }

    pub fn push_cmdset(&mut self, target: EntityId, set: CommandSet, persistent: bool) {
        self.actions.push(CommandAction::PushCmdSet {
            target,
            set,
            persistent,
        });
    }

    /// Pop the most recent set with `key` (or the most recent of all)
    pub fn pop_cmdset(&mut self, target: EntityId, key: Option<&str>) {
        self.actions.push(CommandAction::PopCmdSet {
            target,
            key: key.map(str::to_string),
        });
    }

    pub fn move_to(&mut self, entity: EntityId, destination: EntityId) {
        self.actions.push(CommandAction::Move {
            entity,
            destination,
        });
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn actions(&self) -> &[CommandAction] {
        &self.actions
    }

    /// Split into caller output and staged actions
    pub fn into_parts(self) -> (Vec<String>, Vec<CommandAction>) {
        (self.output, self.actions)
    }
}
