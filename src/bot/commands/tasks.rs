//! Task commands - list and cancel running commands, leave servers and shut
//! the bot down.

use crate::core::paginator::Paginator;
use crate::core::tasks::RunningTask;
use crate::errors::Result;

/// One listing line per running task.
pub fn task_listing(tasks: &[RunningTask], max_size: usize) -> Result<Paginator> {
    let mut paginator = Paginator::new("", "", max_size);
    for task in tasks {
        paginator.add_line(&task.describe())?;
    }
    Ok(paginator)
}

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use super::task_listing;
    use crate::bot::Context;
    use crate::bot::commands::Responder;
    use crate::errors::{Error, Result};
    use poise::serenity_prelude as serenity;
    use tracing::info;

    /// Shows the currently running tasks.
    #[poise::command(prefix_command, owners_only)]
    pub async fn tasks(ctx: Context<'_>) -> Result<()> {
        let running = ctx.data().tasks.list();
        if running.is_empty() {
            ctx.say("No currently running tasks.").await?;
            return Ok(());
        }

        let paginator = task_listing(&running, ctx.data().config.pager.max_size)?;
        Responder::from_context(ctx).paginate(paginator).await?;
        Ok(())
    }

    /// Cancels a task with the given index.
    ///
    /// If the index passed is -1, cancels the most recent task instead.
    #[poise::command(prefix_command, owners_only)]
    pub async fn cancel(ctx: Context<'_>, index: i64) -> Result<()> {
        let registry = &ctx.data().tasks;
        if registry.list().is_empty() {
            ctx.say("No tasks to cancel.").await?;
            return Ok(());
        }

        match registry.cancel(index) {
            Some(task) => ctx.say(format!("Cancelled task {}", task.describe())).await?,
            None => ctx.say("Unknown task.").await?,
        };
        Ok(())
    }

    /// Logs this bot out.
    #[poise::command(prefix_command, owners_only, aliases("logout"))]
    pub async fn shutdown(ctx: Context<'_>) -> Result<()> {
        ctx.say("Logging out now...").await?;
        info!("Shutdown requested by {}", ctx.author().name);
        ctx.framework().shard_manager().shutdown_all().await;
        Ok(())
    }

    /// Leaves a server.
    ///
    /// Defaults to the server the command is invoked in.
    #[poise::command(prefix_command, owners_only)]
    pub async fn leave(ctx: Context<'_>, server: Option<serenity::GuildId>) -> Result<()> {
        let Some(server) = server.or_else(|| ctx.guild_id()) else {
            return Err(Error::Command("No server given to leave".to_string()));
        };

        ctx.say("My owner doesn't want me to stay here any longer. Bye bye.")
            .await?;
        info!("Leaving server {server} at the request of {}", ctx.author().name);
        server.leave(ctx.http()).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
