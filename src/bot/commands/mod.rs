//! Discord command implementations organized by category.
//!
//! Every command that runs user-supplied work goes through [`supervise`], which
//! registers it as a cancellable task and reports the outcome on the invoking
//! message. Output goes through a [`Responder`] bound to the invoking channel.

#![allow(clippy::too_long_first_doc_paragraph)]

/// Ping and help
pub mod general;
/// Redirected invocations: su, sudo and debug
pub mod invoke;
/// Code evaluation and variable retention
pub mod repl;
/// System shell and git
pub mod shell;
/// Raw SQL queries
pub mod sql;
/// Source file reading
pub mod source;
/// Task listing, cancellation, leaving servers and shutdown
pub mod tasks;

use crate::bot::surface::DiscordSurface;
use crate::bot::{BotData, Context};
use crate::config::PagerConfig;
use crate::core::interface::PaginatorInterface;
use crate::core::paginator::Paginator;
use crate::core::reactor::ResponseReactor;
use crate::core::surface::{MessageSurface, Rendered, UserId};
use crate::errors::{Error, Result};
use std::future::Future;
use tracing::debug;

pub use crate::core::paginator::add_with_fallback;

const TOKEN_REPLACEMENT: &str = "[token omitted]";

/// Every command the bot registers.
#[must_use]
pub fn all() -> Vec<poise::Command<BotData, Error>> {
    vec![
        general::ping(),
        general::help(),
        repl::repl(),
        repl::repl_inspect(),
        repl::retain(),
        shell::shell(),
        shell::git(),
        sql::sql(),
        source::cat(),
        tasks::tasks(),
        tasks::cancel(),
        tasks::shutdown(),
        tasks::leave(),
        invoke::su(),
        invoke::sudo(),
        invoke::debug(),
    ]
}

/// Runs `work` as a registered task with outcome reactions on the invoking message.
///
/// Failures are reported to the channel by the reactor, so they never reach
/// the framework error hook.
pub async fn supervise<F>(ctx: Context<'_>, work: F) -> Result<()>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    let reactor = ResponseReactor::start(DiscordSurface::from_context(ctx), ctx.id());
    let name = ctx.command().qualified_name.clone();
    let outcome = ctx.data().tasks.run(&name, work).await;

    if reactor.finish(&outcome).await {
        debug!("Command `{name}` failed: {:?}", outcome.err());
    }
    Ok(())
}

/// Replaces every occurrence of the bot token.
#[must_use]
pub fn redact(text: &str, token: &str) -> String {
    if token.is_empty() {
        text.to_string()
    } else {
        text.replace(token, TOKEN_REPLACEMENT)
    }
}

/// Output handle for one command invocation, detached from its [`Context`].
#[derive(Clone)]
pub struct Responder {
    surface: DiscordSurface,
    owner: UserId,
    pager: PagerConfig,
    token: String,
}

impl Responder {
    #[must_use]
    pub fn from_context(ctx: Context<'_>) -> Self {
        let data = ctx.data();
        Self {
            surface: DiscordSurface::from_context(ctx),
            owner: ctx.author().id.get(),
            pager: data.config.pager.clone(),
            token: data.token.clone(),
        }
    }

    #[must_use]
    pub fn redact(&self, text: &str) -> String {
        redact(text, &self.token)
    }

    /// Sends `text` as a plain message.
    pub async fn say(&self, text: &str) -> Result<()> {
        self.surface
            .send(&Rendered::Content(self.redact(text)))
            .await?;
        Ok(())
    }

    /// A wrapped paginator sized for this bot's pages.
    #[must_use]
    pub fn wrapped(&self, prefix: impl Into<String>, suffix: impl Into<String>) -> Paginator {
        Paginator::wrapped(prefix, suffix, self.pager.max_size)
    }

    /// A pager over `paginator` navigable by the invoking user.
    pub fn interface(&self, paginator: Paginator) -> Result<PaginatorInterface<DiscordSurface>> {
        PaginatorInterface::builder(self.surface.clone(), paginator)
            .owner(Some(self.owner))
            .idle_timeout(self.pager.idle_timeout())
            .build()
    }

    /// Sends `paginator` as a live pager.
    pub async fn paginate(&self, paginator: Paginator) -> Result<PaginatorInterface<DiscordSurface>> {
        let interface = self.interface(paginator)?;
        interface.send_to().await?;
        Ok(interface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_replaces_every_occurrence() {
        assert_eq!(
            redact("a SECRET b SECRET", "SECRET"),
            "a [token omitted] b [token omitted]"
        );
        assert_eq!(redact("nothing here", ""), "nothing here");
    }

    #[test]
    fn test_every_command_is_registered_once() {
        let commands = all();
        let mut names: Vec<&str> = commands.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), commands.len());
        assert!(names.contains(&"repl"));
        assert!(names.contains(&"cat"));
    }
}
