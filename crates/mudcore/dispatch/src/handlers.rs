//! Handlers for the commands the world itself attaches to exits and channels

use async_trait::async_trait;
use mudcore_cmdset::{AbortReason, CommandContext, CommandError, CommandHandler, ParsedArgs};
use mudcore_types::EntityId;

/// Walks the caller through an exit
#[derive(Debug, Clone)]
pub struct TraverseExit {
    pub destination: EntityId,
}

#[async_trait]
impl CommandHandler for TraverseExit {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        _args: &ParsedArgs,
    ) -> Result<(), CommandError> {
        let Some(name) = ctx.world.key_of(self.destination) else {
            return Err(CommandError::failed(format!(
                "exit destination {} no longer exists",
                self.destination
            )));
        };
        let name = name.to_string();
        let caller = ctx.caller;
        ctx.move_to(caller, self.destination);
        ctx.msg(format!("You go {} and arrive at {}.", ctx.cmdname, name));
        Ok(())
    }
}

/// Posts the argument text to a channel
#[derive(Debug, Clone)]
pub struct ChannelPost {
    pub channel: String,
}

#[async_trait]
impl CommandHandler for ChannelPost {
    fn parse(&self, args: &str) -> Result<ParsedArgs, AbortReason> {
        let parsed = ParsedArgs::parse(args);
        if parsed.is_empty() {
            return Err(AbortReason::new(format!("Usage: {} <message>", self.channel)));
        }
        Ok(parsed)
    }

    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        args: &ParsedArgs,
    ) -> Result<(), CommandError> {
        let speaker = ctx.world.key_of(ctx.caller).unwrap_or("Someone").to_string();
        ctx.msg(format!("[{}] {}: {}", self.channel, speaker, args.raw));
        Ok(())
    }
}
