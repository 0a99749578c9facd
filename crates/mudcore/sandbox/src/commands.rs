//! Commands available in the demo world

use async_trait::async_trait;
use mudcore_cmdset::{
    AbortReason, Command, CommandContext, CommandError, CommandHandler, CommandSet, MergeType,
    ParsedArgs, WorldView,
};
use mudcore_types::EntityId;

pub const CHARACTER_SET_PATH: &str = "sandbox.character";
pub const LEVER_SET_PATH: &str = "sandbox.lever";

/// Default set for every character
pub fn character_set() -> CommandSet {
    CommandSet::new("character").with_commands([
        Command::new("look", Look)
            .with_aliases(["l"])
            .with_help("Describe your surroundings."),
        Command::new("say", Say)
            .with_aliases(["'"])
            .with_help("Speak to everyone in the room."),
        Command::new("get", Get).with_help("Pick something up."),
        Command::new("drop", DropItem).with_help("Put something down."),
        Command::new("inventory", Inventory)
            .with_aliases(["inv", "i"])
            .with_help("List what you carry."),
        Command::new("help", Help)
            .with_aliases(["?"])
            .with_help("List the commands you can use."),
        Command::new("meditate", Meditate).with_help("Close your eyes for a while."),
    ])
}

/// Set carried by the lever in the hall
pub fn lever_set() -> CommandSet {
    CommandSet::new("lever").with_command(
        Command::new("pull lever", PullLever).with_help("Something clanks somewhere."),
    )
}

/// Pushed while meditating; hides everything else
fn meditation_set() -> CommandSet {
    CommandSet::new("meditation")
        .with_priority(20)
        .with_merge_type(MergeType::Replace)
        .with_no_exits(true)
        .with_no_channels(true)
        .with_command(Command::new("wake", Wake).with_aliases(["open eyes"]))
}

fn here(ctx: &CommandContext<'_>) -> Result<EntityId, CommandError> {
    ctx.world
        .location_of(ctx.caller)
        .ok_or_else(|| AbortReason::new("You are nowhere.").into())
}

fn find_in(ctx: &CommandContext<'_>, container: EntityId, name: &str) -> Option<EntityId> {
    ctx.world.contents_of(container).into_iter().find(|&id| {
        id != ctx.caller
            && ctx.world.destination_of(id).is_none()
            && ctx
                .world
                .key_of(id)
                .is_some_and(|key| key.eq_ignore_ascii_case(name))
    })
}

fn name_of(world: &dyn WorldView, id: EntityId) -> String {
    world.key_of(id).unwrap_or("something").to_string()
}

struct Look;

#[async_trait]
impl CommandHandler for Look {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        _args: &ParsedArgs,
    ) -> Result<(), CommandError> {
        let room = here(ctx)?;
        let mut text = format!(
            "{}\n{}",
            name_of(ctx.world, room),
            ctx.world.description_of(room).unwrap_or_default()
        );

        let (exits, things): (Vec<_>, Vec<_>) = ctx
            .world
            .contents_of(room)
            .into_iter()
            .filter(|&id| id != ctx.caller)
            .partition(|&id| ctx.world.destination_of(id).is_some());
        if !exits.is_empty() {
            let names: Vec<_> = exits.iter().map(|&id| name_of(ctx.world, id)).collect();
            text.push_str(&format!("\nExits: {}", names.join(", ")));
        }
        if !things.is_empty() {
            let names: Vec<_> = things.iter().map(|&id| name_of(ctx.world, id)).collect();
            text.push_str(&format!("\nYou see: {}", names.join(", ")));
        }
        ctx.msg(text);
        Ok(())
    }
}

struct Say;

#[async_trait]
impl CommandHandler for Say {
    fn parse(&self, args: &str) -> Result<ParsedArgs, AbortReason> {
        let parsed = ParsedArgs::parse(args);
        if parsed.is_empty() {
            return Err(AbortReason::new("Say what?"));
        }
        Ok(parsed)
    }

    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        args: &ParsedArgs,
    ) -> Result<(), CommandError> {
        let room = here(ctx)?;
        let speaker = name_of(ctx.world, ctx.caller);
        for id in ctx.world.contents_of(room) {
            if id != ctx.caller {
                ctx.message(id, format!("{} says, \"{}\"", speaker, args.raw));
            }
        }
        ctx.msg(format!("You say, \"{}\"", args.raw));
        Ok(())
    }
}

struct Get;

#[async_trait]
impl CommandHandler for Get {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        args: &ParsedArgs,
    ) -> Result<(), CommandError> {
        let room = here(ctx)?;
        let Some(thing) = find_in(ctx, room, &args.raw) else {
            return Err(AbortReason::new(format!("You don't see '{}' here.", args.raw)).into());
        };
        let caller = ctx.caller;
        ctx.move_to(thing, caller);
        ctx.msg(format!("You pick up {}.", name_of(ctx.world, thing)));
        Ok(())
    }
}

struct DropItem;

#[async_trait]
impl CommandHandler for DropItem {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        args: &ParsedArgs,
    ) -> Result<(), CommandError> {
        let room = here(ctx)?;
        let Some(thing) = find_in(ctx, ctx.caller, &args.raw) else {
            return Err(AbortReason::new(format!("You aren't carrying '{}'.", args.raw)).into());
        };
        ctx.move_to(thing, room);
        ctx.msg(format!("You drop {}.", name_of(ctx.world, thing)));
        Ok(())
    }
}

struct Inventory;

#[async_trait]
impl CommandHandler for Inventory {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        _args: &ParsedArgs,
    ) -> Result<(), CommandError> {
        let carried: Vec<_> = ctx
            .world
            .contents_of(ctx.caller)
            .into_iter()
            .map(|id| name_of(ctx.world, id))
            .collect();
        if carried.is_empty() {
            ctx.msg("You are not carrying anything.");
        } else {
            ctx.msg(format!("You are carrying: {}", carried.join(", ")));
        }
        Ok(())
    }
}

struct Help;

#[async_trait]
impl CommandHandler for Help {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        _args: &ParsedArgs,
    ) -> Result<(), CommandError> {
        let mut lines = vec!["Available commands:".to_string()];
        for command in ctx.available.iter().filter(|c| c.auto_help()) {
            lines.push(format!("  {:<12} {}", command.key(), command.help_text()));
        }
        ctx.msg(lines.join("\n"));
        Ok(())
    }
}

struct Meditate;

#[async_trait]
impl CommandHandler for Meditate {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        _args: &ParsedArgs,
    ) -> Result<(), CommandError> {
        let caller = ctx.caller;
        ctx.push_cmdset(caller, meditation_set(), false);
        ctx.msg("You close your eyes. The world falls away. (type 'wake' to return)");
        Ok(())
    }
}

struct Wake;

#[async_trait]
impl CommandHandler for Wake {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        _args: &ParsedArgs,
    ) -> Result<(), CommandError> {
        let caller = ctx.caller;
        ctx.pop_cmdset(caller, Some("meditation"));
        ctx.msg("You open your eyes.");
        Ok(())
    }
}

struct PullLever;

#[async_trait]
impl CommandHandler for PullLever {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        _args: &ParsedArgs,
    ) -> Result<(), CommandError> {
        let lever = ctx.owner.map(|id| name_of(ctx.world, id));
        ctx.msg(format!(
            "You pull the {}. Somewhere a gate grinds open.",
            lever.as_deref().unwrap_or("lever")
        ));
        Ok(())
    }
}
