//! Bot layer - Discord-specific adapters and command handlers
//!
//! This module wires the framework-agnostic core to Discord: the channel
//! [`surface::DiscordSurface`], the gateway event handler feeding reactions
//! into the event bus, and the owner-only inspection commands.

/// Discord command implementations (repl, shell, sql, source, tasks, general)
pub mod commands;
/// Discord gateway event handlers
pub mod handlers;
/// Discord channel implementation of the message surface
pub mod surface;

use crate::config::AppConfig;
use crate::core::repl::ReplSession;
use crate::core::surface::EventBus;
use crate::core::tasks::TaskRegistry;
use crate::errors::{Error, Result};
use poise::serenity_prelude as serenity;
use sea_orm::DatabaseConnection;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument};

/// Shared data available to all bot commands.
pub struct BotData {
    pub config: Arc<AppConfig>,
    /// Connection for the `sql` command, if one could be opened.
    pub database: Option<DatabaseConnection>,
    /// Reaction events from the gateway.
    pub events: EventBus,
    pub repl: Arc<Mutex<ReplSession>>,
    pub tasks: TaskRegistry,
    /// Kept so command output can be scrubbed of it.
    pub token: String,
}

impl BotData {
    #[must_use]
    pub fn new(config: Arc<AppConfig>, database: Option<DatabaseConnection>, token: String) -> Self {
        Self {
            config,
            database,
            events: EventBus::default(),
            repl: Arc::new(Mutex::new(ReplSession::new())),
            tasks: TaskRegistry::new(),
            token,
        }
    }
}

pub type Context<'a> = poise::Context<'a, BotData, Error>;

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to start bot: {:?}", error);
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command `{}`: {:?}", ctx.command().name, error);
            if let Err(e) = ctx.say(format!("An error occurred: {error}")).await {
                error!("Failed to send error message: {}", e);
            }
        }
        poise::FrameworkError::NotAnOwner { ctx, .. } => {
            info!(
                "{} tried to run owner-only command `{}`",
                ctx.author().name,
                ctx.command().name
            );
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

/// Builds the framework and runs the client until shutdown.
#[instrument(skip(token, config, database))]
pub async fn run_bot(
    token: String,
    config: Arc<AppConfig>,
    database: Option<DatabaseConnection>,
) -> Result<()> {
    let owners: HashSet<serenity::UserId> = config
        .owners
        .iter()
        .copied()
        .filter(|id| *id != 0)
        .map(serenity::UserId::new)
        .collect();
    let prefix = config.prefix.clone();
    let data_token = token.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, framework, data| {
                Box::pin(handlers::event_handler(ctx, event, framework, data))
            },
            owners,
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(prefix),
                ..Default::default()
            },
            ..Default::default()
        })
        .setup(move |_ctx, ready, _framework| {
            Box::pin(async move {
                info!("Bot {} is ready in {} guilds", ready.user.name, ready.guilds.len());
                Ok(BotData::new(config, database, data_token))
            })
        })
        .build();

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::DIRECT_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MESSAGE_REACTIONS
        | serenity::GatewayIntents::DIRECT_MESSAGE_REACTIONS;

    info!("Setting up Serenity client for Poise framework...");
    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .inspect_err(|e| error!("Error creating client: {:?}", e))?;

    info!("Starting bot client...");
    client
        .start()
        .await
        .inspect_err(|e| error!("Client error: {:?}", e))?;
    Ok(())
}
