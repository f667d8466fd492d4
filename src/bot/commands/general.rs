//! General Discord commands - ping and help.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::bot::Context;
    use crate::errors::Result;

    /// Responds with "Pong!" to test bot connectivity.
    #[poise::command(prefix_command)]
    pub async fn ping(ctx: Context<'_>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(prefix_command)]
    pub async fn help(ctx: Context<'_>) -> Result<()> {
        let prefix = &ctx.data().config.prefix;
        let help_text = format!(
            "**Inspector Help**\n\
            Owner-only tools for looking inside the running bot.\n\n\
            **Evaluation**\n\
            • `{prefix}repl <code>` - Evaluates code, replying with each result (`py`, `eval`).\n\
            • `{prefix}repl_inspect <code>` - Evaluates code and inspects each result (`pyi`).\n\
            • `{prefix}retain <on|off>` - Keeps REPL variables between runs.\n\n\
            **System**\n\
            • `{prefix}shell <command>` - Runs a shell command, streaming its output (`sh`).\n\
            • `{prefix}git <args>` - Shortcut for `{prefix}shell git <args>`.\n\
            • `{prefix}sql <query>` - Runs SQL and shows the rows as a table.\n\
            • `{prefix}cat <path[#L1-5]>` - Reads out a file with highlighting.\n\n\
            **Tasks**\n\
            • `{prefix}tasks` - Lists running commands.\n\
            • `{prefix}cancel <index|-1>` - Cancels a running command.\n\
            • `{prefix}shutdown` - Logs the bot out.\n\
            • `{prefix}leave [server]` - Leaves a server, by default this one.\n\n\
            **Invocation**\n\
            • `{prefix}su <user> <command>` - Runs a command as someone else.\n\
            • `{prefix}sudo <command>` - Runs a command bypassing its checks.\n\
            • `{prefix}debug <command>` - Runs a command and times it.\n\n\
            Close any pager with \u{23f9}."
        );

        ctx.say(help_text).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
