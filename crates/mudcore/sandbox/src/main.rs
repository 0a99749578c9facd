//! mudcore sandbox - drive a small demo world from stdin
//!
//! Builds a two-room world with one account, one character, an exit each way,
//! a lever with its own command set and a public channel, then feeds every
//! stdin line through the dispatcher as that character's session.

use clap::Parser;
use mudcore_cmdset::{CommandSetFactory, InMemoryCmdSetStore};
use mudcore_dispatch::{ActorInbox, CommandDispatcher, DispatchOutcome, MessageSink, World};
use mudcore_types::{CoreConfig, SessionId};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod demo;

/// mudcore sandbox CLI
#[derive(Parser)]
#[command(name = "mudcore-sandbox")]
#[command(about = "Interactive sandbox for the mudcore command engine", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "MUDCORE_CONFIG")]
    config: Option<String>,

    /// Log level (overrides the configured one)
    #[arg(long, env = "MUDCORE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "MUDCORE_LOG_JSON")]
    json: bool,
}

/// Prints whatever the dispatcher sends
struct StdoutSink;

impl MessageSink for StdoutSink {
    fn send(&self, _session: SessionId, text: &str) {
        println!("{}", text);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = CoreConfig::load(cli.config.as_deref())?;

    // Initialize tracing
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    if cli.json || config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let mut factories = CommandSetFactory::new();
    factories.register(commands::CHARACTER_SET_PATH, commands::character_set);
    factories.register(commands::LEVER_SET_PATH, commands::lever_set);

    let store = Arc::new(InMemoryCmdSetStore::new());
    let mut world = World::from_config(&config);
    let demo = demo::build(&mut world, &factories)?;
    world.restore_cmdsets(store.as_ref(), &factories).await?;

    let dispatcher =
        CommandDispatcher::from_config(&config, Arc::new(StdoutSink)).with_store(store);
    info!(
        entities = world.objects().count(),
        session = %demo.session,
        character = %demo.character,
        timeout_ms = config.dispatch.command_timeout_ms,
        "Sandbox world ready"
    );

    let world = Arc::new(Mutex::new(world));
    let inbox = ActorInbox::spawn(demo.session, Arc::new(dispatcher), world, 32);

    println!(
        "mudcore sandbox {} - type 'help' for commands, Ctrl-D to quit",
        env!("CARGO_PKG_VERSION")
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match inbox.dispatch(line).await? {
            DispatchOutcome::Executed(report) => {
                debug!(command = %report.command, status = ?report.status, "Executed");
            }
            outcome => debug!(?outcome, "Not executed"),
        }
    }

    inbox.shutdown().await;
    Ok(())
}
