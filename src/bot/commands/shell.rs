//! Shell commands - stream a system shell command into a live pager.

use crate::bot::commands::{Responder, add_with_fallback};
use crate::config::ShellConfig;
use crate::core::shell::{ShellReader, default_shell};
use crate::errors::Result;
use tracing::{debug, warn};

/// Closing line of a shell pager.
#[must_use]
pub fn status_line(close_code: Option<i32>) -> String {
    let code = close_code.map_or_else(|| "None".to_string(), |code| code.to_string());
    format!("\n[Status] Return code {code}")
}

async fn stream(responder: Responder, shell: ShellConfig, code: String) -> Result<()> {
    let mut paginator = responder.wrapped("```sh", "```");
    add_with_fallback(&format!("$ {code}\n"), |line| paginator.add_line(line))?;

    let interface = responder.interface(paginator)?;
    {
        let interface = interface.clone();
        tokio::spawn(async move {
            if let Err(e) = interface.send_to().await {
                warn!("Could not send shell pager: {e}");
            }
        });
    }

    let program = shell.program.clone().unwrap_or_else(default_shell);
    let mut reader = ShellReader::spawn(&program, &code, shell.timeout())?;

    while let Some(line) = reader.next_line().await {
        let line = line?;
        if interface.closed() {
            debug!("Shell pager closed, abandoning {code:?}");
            return Ok(());
        }
        add_with_fallback(&responder.redact(&line), |line| interface.add_line(line))?;
    }

    let close_code = reader.close().await;
    add_with_fallback(&status_line(close_code), |line| interface.add_line(line))
}

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use super::stream;
    use crate::bot::Context;
    use crate::bot::commands::{Responder, supervise};
    use crate::core::codeblock::Codeblock;
    use crate::errors::Result;

    async fn run(ctx: Context<'_>, script: Codeblock) -> Result<()> {
        let work = stream(
            Responder::from_context(ctx),
            ctx.data().config.shell.clone(),
            script.content,
        );
        supervise(ctx, work).await
    }

    /// Executes statements in the system shell.
    ///
    /// Execution stops when the output pager is closed.
    #[poise::command(prefix_command, owners_only, aliases("sh"))]
    pub async fn shell(ctx: Context<'_>, #[rest] script: String) -> Result<()> {
        run(ctx, Codeblock::parse(&script)).await
    }

    /// Shortcut for `shell git ...`.
    #[poise::command(prefix_command, owners_only)]
    pub async fn git(ctx: Context<'_>, #[rest] arguments: String) -> Result<()> {
        run(ctx, Codeblock::parse(&arguments).prefixed("git ")).await
    }
}

// Re-export all commands
pub use inner::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_line() {
        assert_eq!(status_line(Some(0)), "\n[Status] Return code 0");
        assert_eq!(status_line(None), "\n[Status] Return code None");
    }
}
