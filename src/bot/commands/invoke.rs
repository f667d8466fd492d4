//! Invocation commands - run another command as someone else, past its checks,
//! or under a timer.

use std::time::Duration;

/// Reply sent by `debug` once the wrapped command returns.
#[must_use]
pub fn timing_report(command: &str, elapsed: Duration) -> String {
    format!("Command `{command}` finished in {:.3}s.", elapsed.as_secs_f64())
}

/// The command name a redirected invocation asks for.
#[must_use]
pub fn invoked_name(command: &str) -> &str {
    command.split_whitespace().next().unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Checks {
    Run,
    Skip,
}

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use super::{Checks, invoked_name, timing_report};
    use crate::bot::Context;
    use crate::bot::surface::DiscordSurface;
    use crate::core::reactor::ResponseReactor;
    use crate::errors::{Error, Result};
    use poise::serenity_prelude as serenity;
    use std::any::Any;
    use tokio::sync::Mutex;
    use tokio::time::Instant;
    use tracing::debug;

    /// Dispatches `command` as if it had been sent in the invoking message.
    ///
    /// Returns the qualified name of the command that ran, or `None` when
    /// nothing did.
    async fn redirect(
        ctx: Context<'_>,
        author: Option<serenity::User>,
        command: &str,
        checks: Checks,
    ) -> Result<Option<String>> {
        let poise::Context::Prefix(invoking) = ctx else {
            return Err(Error::Command("Only prefix invocations can be redirected".to_string()));
        };

        let mut message = invoking.msg.clone();
        message.content = format!("{}{command}", invoking.prefix);
        if let Some(author) = author {
            message.author = author;
        }

        let framework = ctx.framework();
        let invocation_data: Mutex<Box<dyn Any + Send + Sync>> = Mutex::new(Box::new(()));
        let mut parent_commands = Vec::new();
        let parsed = poise::parse_invocation(
            framework,
            ctx.serenity_context(),
            &message,
            poise::MessageDispatchTrigger::MessageCreate,
            &invocation_data,
            &mut parent_commands,
        )
        .await;

        let redirected = match parsed {
            Ok(Some(redirected)) => redirected,
            Ok(None) | Err(poise::FrameworkError::UnknownCommand { .. }) => {
                ctx.say(format!("Command \"{}\" is not found.", invoked_name(command)))
                    .await?;
                return Ok(None);
            }
            Err(error) => {
                (framework.options.on_error)(error).await;
                return Ok(None);
            }
        };

        let name = redirected.command.qualified_name.clone();
        debug!("Redirecting to `{name}` ({checks:?} checks)");
        let outcome = match checks {
            Checks::Run => poise::run_invocation(redirected).await,
            Checks::Skip => (redirected.action)(redirected).await,
        };
        match outcome {
            Ok(()) => Ok(Some(name)),
            Err(poise::FrameworkError::Command { error, .. }) => Err(error),
            Err(error) => {
                (framework.options.on_error)(error).await;
                Ok(Some(name))
            }
        }
    }

    /// Runs a command as someone else.
    #[poise::command(prefix_command, owners_only)]
    pub async fn su(ctx: Context<'_>, user: serenity::User, #[rest] command: String) -> Result<()> {
        redirect(ctx, Some(user), &command, Checks::Run).await?;
        Ok(())
    }

    /// Runs a command bypassing all checks and cooldowns.
    #[poise::command(prefix_command, owners_only)]
    pub async fn sudo(ctx: Context<'_>, #[rest] command: String) -> Result<()> {
        redirect(ctx, None, &command, Checks::Skip).await?;
        Ok(())
    }

    /// Runs a command, timing it and reporting any failure.
    #[poise::command(prefix_command, owners_only)]
    pub async fn debug(ctx: Context<'_>, #[rest] command: String) -> Result<()> {
        let reactor = ResponseReactor::start(DiscordSurface::from_context(ctx), ctx.id());
        let started = Instant::now();
        let (ran, outcome) = match redirect(ctx, None, &command, Checks::Run).await {
            Ok(ran) => (ran, Ok(())),
            Err(e) => (None, Err(e)),
        };
        let elapsed = started.elapsed();

        reactor.finish(&outcome).await;
        if let Some(name) = ran {
            ctx.say(timing_report(&name, elapsed)).await?;
        }
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
