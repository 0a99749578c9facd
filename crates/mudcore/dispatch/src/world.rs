//! World context
//!
//! The [`World`] is the process-scoped registry of entities and connected
//! sessions that the dispatcher works against. It is passed in explicitly;
//! nothing here is global. Every entity and every session owns its own
//! [`CommandSetStack`].

use crate::error::{DispatchError, DispatchResult};
use crate::handlers::{ChannelPost, TraverseExit};
use mudcore_cmdset::{
    CmdSetStore, Command, CommandSet, CommandSetFactory, CommandSetStack, WorldView,
};
use mudcore_lock::{Entity, Lockable, Permissible};
use mudcore_types::{CoreConfig, EntityId, Permissions, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Priority of the command sets exits and channels carry
pub const EXIT_CMDSET_PRIORITY: i32 = 101;
pub const CHANNEL_CMDSET_PRIORITY: i32 = 101;
/// Lock every new character starts with; other characters' sets stay private
pub const CHARACTER_LOCKS: &str = "call: false()";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Account,
    Character,
    Room,
    Exit,
    Thing,
    Channel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub category: Option<String>,
}

/// Anything that lives in the world
#[derive(Debug)]
pub struct GameObject {
    pub id: EntityId,
    pub kind: EntityKind,
    pub key: String,
    pub aliases: Vec<String>,
    pub description: String,
    pub location: Option<EntityId>,
    /// Where an exit leads
    pub destination: Option<EntityId>,
    /// Controlling account of a puppeted character
    pub account: Option<EntityId>,
    pub permissions: Permissions,
    pub attributes: HashMap<String, Value>,
    pub tags: Vec<Tag>,
    pub locks: String,
    /// Only meaningful on accounts
    pub superuser: bool,
    /// Only meaningful on accounts
    pub quelled: bool,
    pub cmdsets: CommandSetStack,
}

impl GameObject {
    pub fn new(id: EntityId, kind: EntityKind, key: &str) -> Self {
        Self {
            id,
            kind,
            key: key.to_string(),
            aliases: Vec::new(),
            description: String::new(),
            location: None,
            destination: None,
            account: None,
            permissions: Permissions::new(),
            attributes: HashMap::new(),
            tags: Vec::new(),
            locks: String::new(),
            superuser: false,
            quelled: false,
            cmdsets: CommandSetStack::new(),
        }
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<Value>) {
        self.attributes.insert(name.to_string(), value.into());
    }

    pub fn add_tag(&mut self, key: &str, category: Option<&str>) {
        let tag = Tag {
            key: key.to_lowercase(),
            category: category.map(str::to_lowercase),
        };
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    pub fn has_tag(&self, key: &str, category: Option<&str>) -> bool {
        let key = key.to_lowercase();
        let category = category.map(str::to_lowercase);
        self.tags
            .iter()
            .any(|t| t.key == key && (category.is_none() || t.category == category))
    }

    /// Key, alias or `#id`, case-insensitively
    pub fn matches_name(&self, query: &str) -> bool {
        let query = query.trim();
        if let Ok(id) = query.parse::<EntityId>() {
            if query.starts_with('#') {
                return id == self.id;
            }
        }
        self.key.eq_ignore_ascii_case(query)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(query))
    }
}

/// One connected client
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub account: Option<EntityId>,
    pub puppet: Option<EntityId>,
    pub cmdsets: CommandSetStack,
}

/// Entities and sessions
#[derive(Debug, Default)]
pub struct World {
    objects: BTreeMap<EntityId, GameObject>,
    sessions: BTreeMap<SessionId, Session>,
    next_entity: u64,
    next_session: u64,
    default_set_priority: i32,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            default_set_priority: config.default_set_priority,
            ..Self::default()
        }
    }

    /// Install `set` as `id`'s default set at the configured default priority
    pub fn set_default_cmdset(
        &mut self,
        id: EntityId,
        set: CommandSet,
    ) -> DispatchResult<Option<CommandSet>> {
        let priority = self.default_set_priority;
        let obj = self.object_mut(id)?;
        Ok(obj.cmdsets.push_default(set.with_priority(priority)))
    }

    /// Rebuild persistent command sets for every entity after a restart
    ///
    /// Entities with nothing stored keep their current stack. A stored stack
    /// without a default keeps the entity's current default.
    pub async fn restore_cmdsets(
        &mut self,
        store: &dyn CmdSetStore,
        factories: &CommandSetFactory,
    ) -> DispatchResult<usize> {
        let mut restored = 0;
        for (id, obj) in self.objects.iter_mut() {
            let mut stack = CommandSetStack::restore(*id, store, factories).await?;
            if stack.is_empty() {
                continue;
            }
            if !stack.has_default() {
                if let Some(default) = obj.cmdsets.default_set() {
                    stack.push_default(default.clone());
                }
            }
            obj.cmdsets = stack;
            restored += 1;
        }
        info!(restored, "Restored persistent command sets");
        Ok(restored)
    }

    /// Create a bare entity and return its id
    pub fn spawn(&mut self, kind: EntityKind, key: &str) -> EntityId {
        self.next_entity += 1;
        let id = EntityId::new(self.next_entity);
        self.objects.insert(id, GameObject::new(id, kind, key));
        debug!(%id, ?kind, key, "Spawned entity");
        id
    }

    pub fn create_account(&mut self, key: &str) -> EntityId {
        self.spawn(EntityKind::Account, key)
    }

    pub fn create_room(&mut self, key: &str) -> EntityId {
        self.spawn(EntityKind::Room, key)
    }

    pub fn create_character(&mut self, key: &str, location: Option<EntityId>) -> EntityId {
        let id = self.spawn(EntityKind::Character, key);
        if let Some(character) = self.objects.get_mut(&id) {
            character.locks = CHARACTER_LOCKS.to_string();
        }
        self.place(id, location);
        id
    }

    pub fn create_thing(&mut self, key: &str, location: Option<EntityId>) -> EntityId {
        let id = self.spawn(EntityKind::Thing, key);
        self.place(id, location);
        id
    }

    /// Create an exit in `location` leading to `destination`
    ///
    /// The exit carries a one-command set named after itself. The command
    /// inherits the exit's lock string, so a `cmd:` clause there hides it.
    pub fn create_exit(
        &mut self,
        key: &str,
        aliases: &[&str],
        location: EntityId,
        destination: EntityId,
    ) -> EntityId {
        let id = self.spawn(EntityKind::Exit, key);
        self.place(id, Some(location));
        if let Some(exit) = self.objects.get_mut(&id) {
            exit.destination = Some(destination);
            exit.aliases = aliases.iter().map(|a| a.to_string()).collect();
        }
        self.refresh_exit_cmdset(id);
        id
    }

    /// Rebuild an exit's command set after its key, aliases or locks change
    pub fn refresh_exit_cmdset(&mut self, exit: EntityId) {
        let Some(obj) = self.objects.get_mut(&exit) else {
            return;
        };
        let Some(destination) = obj.destination else {
            return;
        };
        let command = Command::new(&obj.key, TraverseExit { destination })
            .with_aliases(&obj.aliases)
            .with_locks(obj.locks.clone())
            .without_auto_help()
            .as_exit();
        let set = CommandSet::new("exit")
            .with_priority(EXIT_CMDSET_PRIORITY)
            .with_duplicates(true)
            .with_command(command);
        obj.cmdsets.push_default(set);
    }

    /// Create a channel whose command set posts to it
    pub fn create_channel(&mut self, key: &str) -> EntityId {
        let id = self.spawn(EntityKind::Channel, key);
        let command = Command::new(
            key,
            ChannelPost {
                channel: key.to_string(),
            },
        )
        .without_auto_help()
        .as_channel();
        let set = CommandSet::new("channel")
            .with_priority(CHANNEL_CMDSET_PRIORITY)
            .with_command(command);
        if let Some(channel) = self.objects.get_mut(&id) {
            channel.cmdsets.push_default(set);
        }
        id
    }

    fn place(&mut self, id: EntityId, location: Option<EntityId>) {
        if let Some(obj) = self.objects.get_mut(&id) {
            obj.location = location;
        }
    }

    pub fn get(&self, id: EntityId) -> Option<&GameObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut GameObject> {
        self.objects.get_mut(&id)
    }

    pub fn object(&self, id: EntityId) -> DispatchResult<&GameObject> {
        self.objects.get(&id).ok_or(DispatchError::UnknownEntity(id))
    }

    pub fn object_mut(&mut self, id: EntityId) -> DispatchResult<&mut GameObject> {
        self.objects
            .get_mut(&id)
            .ok_or(DispatchError::UnknownEntity(id))
    }

    /// Remove an entity; whatever it contained is left without a location
    pub fn remove(&mut self, id: EntityId) -> Option<GameObject> {
        let removed = self.objects.remove(&id)?;
        for obj in self.objects.values_mut() {
            if obj.location == Some(id) {
                obj.location = None;
            }
        }
        Some(removed)
    }

    pub fn objects(&self) -> impl Iterator<Item = &GameObject> {
        self.objects.values()
    }

    /// Entities located in `id`, oldest first
    pub fn contents(&self, id: EntityId) -> Vec<EntityId> {
        self.objects
            .values()
            .filter(|o| o.location == Some(id))
            .map(|o| o.id)
            .collect()
    }

    pub fn channels(&self) -> Vec<EntityId> {
        self.objects
            .values()
            .filter(|o| o.kind == EntityKind::Channel)
            .map(|o| o.id)
            .collect()
    }

    /// Move `entity` into `destination`
    pub fn move_to(&mut self, entity: EntityId, destination: EntityId) -> DispatchResult<()> {
        self.object(destination)?;
        let obj = self.object_mut(entity)?;
        debug!(%entity, from = ?obj.location, to = %destination, "Moved entity");
        obj.location = Some(destination);
        Ok(())
    }

    /// Put `account` in control of `character`
    pub fn puppet(&mut self, account: EntityId, character: EntityId) -> DispatchResult<()> {
        self.object(account)?;
        self.object_mut(character)?.account = Some(account);
        Ok(())
    }

    /// Open a session, optionally logged in to `account`
    pub fn connect(&mut self, account: Option<EntityId>) -> SessionId {
        self.next_session += 1;
        let id = SessionId::new(self.next_session);
        self.sessions.insert(
            id,
            Session {
                id,
                account,
                puppet: None,
                cmdsets: CommandSetStack::new(),
            },
        );
        debug!(session = %id, ?account, "Session connected");
        id
    }

    pub fn disconnect(&mut self, session: SessionId) -> Option<Session> {
        self.sessions.remove(&session)
    }

    /// Have `session` control `character` (or nothing)
    pub fn set_puppet(
        &mut self,
        session: SessionId,
        character: Option<EntityId>,
    ) -> DispatchResult<()> {
        let account = self.session(session)?.account;
        if let Some(character) = character {
            if let Some(account) = account {
                self.puppet(account, character)?;
            } else {
                self.object(character)?;
            }
        }
        self.session_mut(session)?.puppet = character;
        Ok(())
    }

    pub fn session(&self, id: SessionId) -> DispatchResult<&Session> {
        self.sessions.get(&id).ok_or(DispatchError::UnknownSession(id))
    }

    pub fn session_mut(&mut self, id: SessionId) -> DispatchResult<&mut Session> {
        self.sessions
            .get_mut(&id)
            .ok_or(DispatchError::UnknownSession(id))
    }

    /// Sessions that should see output addressed to `entity`
    pub fn sessions_for(&self, entity: EntityId) -> Vec<SessionId> {
        self.sessions
            .values()
            .filter(|s| {
                s.puppet == Some(entity) || (s.puppet.is_none() && s.account == Some(entity))
            })
            .map(|s| s.id)
            .collect()
    }

    /// Lock-checkable view of an entity
    pub fn entity(&self, id: EntityId) -> Option<EntityRef<'_>> {
        let object = self.objects.get(&id)?;
        let account = match object.kind {
            EntityKind::Account => Some(object),
            _ => object.account.and_then(|a| self.objects.get(&a)),
        };
        Some(EntityRef {
            world: self,
            object,
            account,
        })
    }
}

impl WorldView for World {
    fn key_of(&self, id: EntityId) -> Option<&str> {
        self.objects.get(&id).map(|o| o.key.as_str())
    }

    fn description_of(&self, id: EntityId) -> Option<&str> {
        self.objects.get(&id).map(|o| o.description.as_str())
    }

    fn location_of(&self, id: EntityId) -> Option<EntityId> {
        self.objects.get(&id).and_then(|o| o.location)
    }

    fn contents_of(&self, id: EntityId) -> Vec<EntityId> {
        self.contents(id)
    }

    fn destination_of(&self, exit: EntityId) -> Option<EntityId> {
        self.objects.get(&exit).and_then(|o| o.destination)
    }
}

/// An entity as locks see it, with its controlling account resolved
#[derive(Clone, Copy)]
pub struct EntityRef<'a> {
    world: &'a World,
    object: &'a GameObject,
    account: Option<&'a GameObject>,
}

impl<'a> EntityRef<'a> {
    pub fn object(&self) -> &'a GameObject {
        self.object
    }

    pub fn account(&self) -> Option<&'a GameObject> {
        self.account
    }
}

impl Permissible for EntityRef<'_> {
    fn permissions(&self) -> &Permissions {
        &self.object.permissions
    }

    fn account_permissions(&self) -> Option<&Permissions> {
        self.account.map(|a| &a.permissions)
    }

    fn is_superuser(&self) -> bool {
        self.object.superuser || self.account.is_some_and(|a| a.superuser)
    }

    fn is_quelled(&self) -> bool {
        self.account.is_some_and(|a| a.quelled)
    }
}

impl Entity for EntityRef<'_> {
    fn entity_id(&self) -> Option<EntityId> {
        Some(self.object.id)
    }

    fn key(&self) -> &str {
        &self.object.key
    }

    fn account_id(&self) -> Option<EntityId> {
        self.account.map(|a| a.id)
    }

    fn attribute(&self, name: &str) -> Option<&Value> {
        self.object.attributes.get(name)
    }

    fn has_tag(&self, tag: &str, category: Option<&str>) -> bool {
        self.object.has_tag(tag, category)
    }

    fn location(&self) -> Option<EntityId> {
        self.object.location
    }

    fn holds(&self, query: &str) -> bool {
        self.world
            .objects
            .values()
            .any(|o| o.location == Some(self.object.id) && o.matches_name(query))
    }
}

impl Lockable for EntityRef<'_> {
    fn lock_string(&self) -> &str {
        &self.object.locks
    }
}
