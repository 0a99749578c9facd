//! The demo world

use crate::commands::{CHARACTER_SET_PATH, LEVER_SET_PATH};
use mudcore_cmdset::CommandSetFactory;
use mudcore_dispatch::{DispatchResult, World};
use mudcore_types::{EntityId, SessionId};

pub struct Demo {
    pub session: SessionId,
    pub character: EntityId,
}

pub fn build(world: &mut World, factories: &CommandSetFactory) -> anyhow::Result<Demo> {
    let hall = world.create_room("Great Hall");
    let garden = world.create_room("Garden");
    describe(
        world,
        hall,
        "Banners hang from the rafters. A rusty lever juts from the wall.",
    )?;
    describe(world, garden, "Roses, mostly. A gate leads back inside.")?;

    world.create_exit("north", &["n"], hall, garden);
    let south = world.create_exit("south", &["s"], garden, hall);
    // a cmd clause on the exit hides it from anyone below Player
    world.object_mut(south)?.locks = "cmd: perm(Player)".to_string();
    world.refresh_exit_cmdset(south);

    let lever = world.create_thing("lever", Some(hall));
    world.object_mut(lever)?.locks = "call: not attr(blindfolded)".to_string();
    world.set_default_cmdset(lever, factories.build(LEVER_SET_PATH)?)?;
    world.create_thing("pebble", Some(garden));

    let public = world.create_channel("public");
    world.object_mut(public)?.locks = "listen: perm(Player)".to_string();

    let account = world.create_account("guest");
    world.object_mut(account)?.permissions.grant("Player");
    let character = world.create_character("Wanderer", Some(hall));
    world.set_default_cmdset(character, factories.build(CHARACTER_SET_PATH)?)?;

    let session = world.connect(Some(account));
    world.set_puppet(session, Some(character))?;

    Ok(Demo { session, character })
}

fn describe(world: &mut World, room: EntityId, text: &str) -> DispatchResult<()> {
    world.object_mut(room)?.description = text.to_string();
    Ok(())
}
