//! The command dispatcher
//!
//! [`CommandDispatcher::dispatch`] runs one input line through four phases:
//!
//! 1. **Gather**: command sets from the session, the account, the puppet,
//!    everything the puppet carries, its location, the location's other
//!    contents and exits, and the channels the actor listens to. Suppression
//!    flags come from the merged session, account and puppet sets. Object
//!    sets are dropped when their `call` lock denies, and commands whose
//!    `cmd` lock denies are removed before anything is merged.
//! 2. **Merge**: one ascending-priority fold over everything gathered.
//! 3. **Match**: the [`CommandMatcher`] turns the line into candidates.
//! 4. **Execute**: the handler runs under a supervising timeout with panics
//!    caught. Changes it staged are applied only if it completed.
//!
//! Nothing is kept between calls.

use crate::error::{DispatchError, DispatchResult};
use crate::matcher::{CommandMatch, CommandMatcher, ExactMatcher};
use crate::sink::MessageSink;
use crate::world::{EntityKind, World};
use futures::FutureExt;
use mudcore_cmdset::{
    merge_all, CmdSetStore, Command, CommandAction, CommandContext, CommandError, CommandSet,
    StackError,
};
use mudcore_lock::{CheckOptions, LockDecision, LockEngine};
use mudcore_types::{CoreConfig, DispatchConfig, EntityId, MalformedLockPolicy, SessionId};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Access type gating a single command
pub const CMD_ACCESS: &str = "cmd";
/// Access type gating an object's command sets
pub const CALL_ACCESS: &str = "call";
/// Access type gating a channel's command set
pub const LISTEN_ACCESS: &str = "listen";

const GENERIC_FAILURE: &str = "An error occurred while running that command. It has been logged.";
const TIMED_OUT: &str = "That command took too long and was stopped.";

/// One of several commands an ambiguous input could mean
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub key: String,
    pub owner: Option<EntityId>,
    pub owner_key: Option<String>,
}

/// How an executed command ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Completed,
    /// Stopped deliberately, with the reason shown to the caller
    Aborted(String),
    /// Returned an error, panicked or staged changes that could not apply
    Failed,
    TimedOut,
}

impl ExecutionStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Key of the command that ran
    pub command: String,
    /// Name the caller typed
    pub cmdname: String,
    pub owner: Option<EntityId>,
    pub status: ExecutionStatus,
}

/// Result of dispatching one input line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchOutcome {
    Executed(ExecutionReport),
    NoMatch,
    MultiMatch(Vec<MatchCandidate>),
    /// The input named a command whose lock could not be evaluated
    AccessDenied { command: String },
}

impl DispatchOutcome {
    pub fn is_executed(&self) -> bool {
        matches!(self, Self::Executed(_))
    }

    pub fn report(&self) -> Option<&ExecutionReport> {
        match self {
            Self::Executed(report) => Some(report),
            _ => None,
        }
    }
}

/// Output of the gather phase
#[derive(Debug, Default)]
pub struct Gathered {
    /// Sets to merge, already lock-filtered
    pub sets: Vec<CommandSet>,
    /// Commands hidden because their lock is malformed
    pub withheld: Vec<Command>,
}

#[derive(Debug, Clone, Copy)]
struct Actor {
    session: SessionId,
    caller: EntityId,
    account: Option<EntityId>,
    puppet: Option<EntityId>,
}

/// Resolves input lines into command executions
pub struct CommandDispatcher {
    locks: Arc<LockEngine>,
    matcher: Arc<dyn CommandMatcher>,
    config: DispatchConfig,
    sink: Arc<dyn MessageSink>,
    store: Option<Arc<dyn CmdSetStore>>,
}

impl CommandDispatcher {
    pub fn new(locks: Arc<LockEngine>, sink: Arc<dyn MessageSink>) -> Self {
        Self {
            locks,
            matcher: Arc::new(ExactMatcher),
            config: DispatchConfig::default(),
            sink,
            store: None,
        }
    }

    pub fn from_config(config: &CoreConfig, sink: Arc<dyn MessageSink>) -> Self {
        Self::new(Arc::new(LockEngine::from_config(config)), sink)
            .with_config(config.dispatch.clone())
    }

    pub fn with_matcher(mut self, matcher: impl CommandMatcher + 'static) -> Self {
        self.matcher = Arc::new(matcher);
        self
    }

    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Persist stacks touched by persistent pushes and pops
    pub fn with_store(mut self, store: Arc<dyn CmdSetStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn locks(&self) -> &Arc<LockEngine> {
        &self.locks
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Run one input line for `session`
    #[instrument(skip(self, world))]
    pub async fn dispatch(
        &self,
        world: &mut World,
        session: SessionId,
        raw: &str,
    ) -> DispatchResult<DispatchOutcome> {
        let actor = self.actor(world, session)?;
        let Gathered { sets, withheld } = self.gather(world, session)?;
        let available = merge_all(sets);
        let input = raw.trim();

        let matched = match self.find(input, &available) {
            Found::One(matched) => matched,
            Found::None => return Ok(self.no_match(session, input, withheld)),
            Found::Many(matches) => return Ok(self.multi_match(world, session, input, &matches)),
        };

        let report = self
            .execute(world, &actor, &available, matched, input)
            .await?;
        Ok(DispatchOutcome::Executed(report))
    }

    /// Every command currently available to `session`, merged
    pub fn available(&self, world: &World, session: SessionId) -> DispatchResult<CommandSet> {
        Ok(merge_all(self.gather(world, session)?.sets))
    }

    /// Collect and lock-filter the command sets `session` can reach
    pub fn gather(&self, world: &World, session: SessionId) -> DispatchResult<Gathered> {
        let actor = self.actor(world, session)?;
        let caller = world
            .entity(actor.caller)
            .ok_or(DispatchError::UnknownEntity(actor.caller))?;
        let deny_malformed = self.config.malformed_lock_policy == MalformedLockPolicy::Deny;
        let mut gathered = Gathered::default();

        let mut sources: Vec<(CommandSet, Option<EntityId>)> = Vec::new();
        let state = world.session(session)?;
        if !state.cmdsets.is_empty() {
            sources.push((state.cmdsets.effective_set(), None));
        }
        for id in [actor.account, actor.puppet].into_iter().flatten() {
            let obj = world.object(id)?;
            if !obj.cmdsets.is_empty() {
                sources.push((obj.cmdsets.effective_set(), Some(id)));
            }
        }

        // the dominant actor-side set's explicit flag wins, as in any merge
        let own = merge_all(sources.iter().map(|(set, _)| set.clone()));
        let no_objs = own.no_objs() == Some(true);
        let no_exits = own.no_exits() == Some(true);
        let no_channels = own.no_channels() == Some(true);

        let mut local = Vec::new();
        if let (Some(puppet), false) = (actor.puppet, no_objs) {
            local.extend(world.contents(puppet));
            if let Some(location) = world.get(puppet).and_then(|p| p.location) {
                local.push(location);
                local.extend(world.contents(location).into_iter().filter(|&id| id != puppet));
            }
        }
        for id in local {
            let (Some(obj), Some(accessed)) = (world.get(id), world.entity(id)) else {
                continue;
            };
            if obj.cmdsets.is_empty() || (no_exits && obj.kind == EntityKind::Exit) {
                continue;
            }
            let options = CheckOptions::default().without_superuser_bypass();
            let decision =
                self.locks
                    .evaluate_detailed(&obj.locks, CALL_ACCESS, &caller, &accessed, options);
            let mut set = obj.cmdsets.effective_set();
            set.set_object_attached(true);
            match decision {
                LockDecision::Granted | LockDecision::Bypassed => sources.push((set, Some(id))),
                LockDecision::Malformed(_) if deny_malformed => {
                    gathered.withheld.extend(set.iter().cloned());
                }
                _ => debug!(object = %id, "Call lock hides object command sets"),
            }
        }

        if !no_channels {
            for id in world.channels() {
                let (Some(obj), Some(accessed)) = (world.get(id), world.entity(id)) else {
                    continue;
                };
                if obj.cmdsets.is_empty() {
                    continue;
                }
                let decision = self.locks.evaluate_detailed(
                    &obj.locks,
                    LISTEN_ACCESS,
                    &caller,
                    &accessed,
                    CheckOptions::default(),
                );
                if decision.is_allowed() {
                    sources.push((obj.cmdsets.effective_set(), Some(id)));
                }
            }
        }

        for (mut set, owner) in sources {
            if owner.is_some() {
                set.set_owner(owner);
            }
            let mut hidden = Vec::new();
            set.retain(|command| {
                match self.locks.evaluate_detailed(
                    command.locks(),
                    CMD_ACCESS,
                    &caller,
                    command,
                    CheckOptions::default(),
                ) {
                    LockDecision::Granted | LockDecision::Bypassed => true,
                    LockDecision::Denied => false,
                    LockDecision::Malformed(_) => {
                        if deny_malformed {
                            hidden.push(command.clone());
                        }
                        false
                    }
                }
            });
            debug!(
                set = %set.key(),
                owner = ?owner,
                priority = set.priority(),
                commands = set.len(),
                "Gathered command set"
            );
            gathered.withheld.extend(hidden);
            gathered.sets.push(set);
        }
        Ok(gathered)
    }

    fn actor(&self, world: &World, session: SessionId) -> DispatchResult<Actor> {
        let state = world.session(session)?;
        let caller = state
            .puppet
            .or(state.account)
            .ok_or(DispatchError::NoActor(session))?;
        let account = state
            .account
            .or_else(|| world.get(caller).and_then(|c| c.account));
        Ok(Actor {
            session,
            caller,
            account,
            puppet: state.puppet,
        })
    }

    /// Match `input`, honouring an `N-` prefix that picks among duplicates
    fn find(&self, input: &str, available: &CommandSet) -> Found {
        if let Some((index, rest)) = split_index(input) {
            let mut matches = self.matcher.find(rest, available);
            if index <= matches.len() {
                return Found::One(matches.swap_remove(index - 1));
            }
        }
        let mut matches = self.matcher.find(input, available);
        match matches.len() {
            0 => Found::None,
            1 => Found::One(matches.remove(0)),
            _ => Found::Many(matches),
        }
    }

    fn no_match(&self, session: SessionId, input: &str, withheld: Vec<Command>) -> DispatchOutcome {
        if input.is_empty() {
            return DispatchOutcome::NoMatch;
        }
        if !withheld.is_empty() {
            let hidden = CommandSet::new("withheld").with_commands(withheld);
            if let Some(found) = self.matcher.find(input, &hidden).into_iter().next() {
                warn!(
                    %session,
                    command = %found.command.key(),
                    "Command withheld by a malformed lock"
                );
                self.sink.send(
                    session,
                    &format!("You are not permitted to use '{}'.", found.cmdname),
                );
                return DispatchOutcome::AccessDenied {
                    command: found.command.key().to_string(),
                };
            }
        }
        let name = input.split_whitespace().next().unwrap_or(input);
        self.sink.send(
            session,
            &format!("Command '{}' is not available. Type \"help\" for help.", name),
        );
        DispatchOutcome::NoMatch
    }

    fn multi_match(
        &self,
        world: &World,
        session: SessionId,
        input: &str,
        matches: &[CommandMatch],
    ) -> DispatchOutcome {
        let candidates: Vec<MatchCandidate> = matches
            .iter()
            .map(|m| MatchCandidate {
                key: m.command.key().to_string(),
                owner: m.command.owner(),
                owner_key: m
                    .command
                    .owner()
                    .and_then(|o| world.get(o))
                    .map(|o| o.key.clone()),
            })
            .collect();
        warn!(%session, input, candidates = candidates.len(), "Ambiguous command");

        let mut text = format!(
            "More than one match for '{}' (please narrow target):",
            matches.first().map(|m| m.cmdname.as_str()).unwrap_or(input)
        );
        for (i, candidate) in candidates.iter().enumerate() {
            text.push_str(&format!("\n {}-{}", i + 1, candidate.key));
            if let Some(owner) = &candidate.owner_key {
                text.push_str(&format!(" [{}]", owner));
            }
        }
        self.sink.send(session, &text);
        DispatchOutcome::MultiMatch(candidates)
    }

    async fn execute(
        &self,
        world: &mut World,
        actor: &Actor,
        available: &CommandSet,
        matched: CommandMatch,
        input: &str,
    ) -> DispatchResult<ExecutionReport> {
        let CommandMatch {
            command,
            cmdname,
            args,
        } = matched;
        let mut report = ExecutionReport {
            command: command.key().to_string(),
            cmdname: cmdname.clone(),
            owner: command.owner(),
            status: ExecutionStatus::Completed,
        };
        let handler = Arc::clone(command.handler());

        let parsed = match handler.parse(&args) {
            Ok(parsed) => parsed,
            Err(reason) => {
                debug!(command = %report.command, %reason, "Command aborted while parsing");
                if !reason.message.is_empty() {
                    self.sink.send(actor.session, &reason.message);
                }
                report.status = ExecutionStatus::Aborted(reason.message);
                return Ok(report);
            }
        };

        let timeout = Duration::from_millis(self.config.command_timeout_ms);
        let (status, output, actions) = {
            let mut ctx = CommandContext::new(actor.caller, &*world, available)
                .with_session(Some(actor.session))
                .with_account(actor.account)
                .with_owner(command.owner())
                .with_input(&cmdname, input);
            let run = AssertUnwindSafe(handler.execute(&mut ctx, &parsed)).catch_unwind();
            let status = match tokio::time::timeout(timeout, run).await {
                Ok(Ok(Ok(()))) => ExecutionStatus::Completed,
                Ok(Ok(Err(CommandError::Aborted(reason)))) => {
                    debug!(command = %report.command, %reason, "Command aborted");
                    ExecutionStatus::Aborted(reason.message)
                }
                Ok(Ok(Err(CommandError::Failed(message)))) => {
                    error!(
                        actor = %actor.caller,
                        input,
                        command = %report.command,
                        error = %message,
                        "Command failed"
                    );
                    ExecutionStatus::Failed
                }
                Ok(Err(panic)) => {
                    error!(
                        actor = %actor.caller,
                        input,
                        command = %report.command,
                        panic = panic_message(panic.as_ref()),
                        "Command panicked"
                    );
                    ExecutionStatus::Failed
                }
                Err(_) => {
                    error!(
                        actor = %actor.caller,
                        input,
                        command = %report.command,
                        timeout_ms = self.config.command_timeout_ms,
                        "Command timed out"
                    );
                    ExecutionStatus::TimedOut
                }
            };
            let (output, actions) = ctx.into_parts();
            (status, output, actions)
        };

        for line in &output {
            self.sink.send(actor.session, line);
        }

        let status = if status.is_completed() {
            match self.apply(world, actions).await {
                Ok(()) => status,
                Err(err @ DispatchError::Stack(StackError::IntegrityViolation(_))) => {
                    return Err(err)
                }
                Err(err) => {
                    error!(
                        actor = %actor.caller,
                        input,
                        command = %report.command,
                        error = %err,
                        "Staged changes rejected"
                    );
                    ExecutionStatus::Failed
                }
            }
        } else {
            if !actions.is_empty() {
                debug!(discarded = actions.len(), "Dropped staged changes");
            }
            status
        };

        match &status {
            ExecutionStatus::Failed => self.sink.send(actor.session, GENERIC_FAILURE),
            ExecutionStatus::TimedOut => self.sink.send(actor.session, TIMED_OUT),
            ExecutionStatus::Aborted(message) if !message.is_empty() => {
                self.sink.send(actor.session, message)
            }
            _ => {}
        }
        report.status = status;
        Ok(report)
    }

    /// Apply staged changes, all or nothing
    async fn apply(&self, world: &mut World, actions: Vec<CommandAction>) -> DispatchResult<()> {
        validate(world, &actions)?;

        let mut touched = BTreeSet::new();
        for action in actions {
            match action {
                CommandAction::PushCmdSet {
                    target,
                    set,
                    persistent,
                } => {
                    world.object_mut(target)?.cmdsets.push(set, persistent)?;
                    touched.insert(target);
                }
                CommandAction::PopCmdSet { target, key } => {
                    let stack = &mut world.object_mut(target)?.cmdsets;
                    if stack.pop(key.as_deref()).is_some() {
                        touched.insert(target);
                    }
                }
                CommandAction::Move {
                    entity,
                    destination,
                } => world.move_to(entity, destination)?,
                CommandAction::Message { recipient, text } => {
                    for session in world.sessions_for(recipient) {
                        self.sink.send(session, &text);
                    }
                }
            }
        }

        for target in touched {
            let stack = &world.object(target)?.cmdsets;
            stack.verify()?;
            if let Some(store) = &self.store {
                if let Err(err) = stack.persist(target, store.as_ref()).await {
                    error!(actor = %target, error = %err, "Failed to persist command sets");
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("locks", &self.locks)
            .field("config", &self.config)
            .field("store", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

enum Found {
    None,
    One(CommandMatch),
    Many(Vec<CommandMatch>),
}

fn validate(world: &World, actions: &[CommandAction]) -> DispatchResult<()> {
    for action in actions {
        match action {
            CommandAction::PushCmdSet {
                target,
                set,
                persistent,
            } => {
                world.object(*target)?;
                if *persistent && set.path().is_none() {
                    return Err(StackError::NotPersistable(set.key().to_string()).into());
                }
            }
            CommandAction::PopCmdSet { target, .. } => {
                world.object(*target)?;
            }
            CommandAction::Move {
                entity,
                destination,
            } => {
                world.object(*entity)?;
                world.object(*destination)?;
            }
            CommandAction::Message { recipient, .. } => {
                world.object(*recipient)?;
            }
        }
    }
    Ok(())
}

/// `2-press button` picks the second of several `press button` matches
fn split_index(input: &str) -> Option<(usize, &str)> {
    let (index, rest) = input.split_once('-')?;
    let index: usize = index.parse().ok()?;
    let rest = rest.trim_start();
    (index > 0 && !rest.is_empty()).then_some((index, rest))
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
