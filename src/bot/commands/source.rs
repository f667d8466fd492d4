//! Source command - read out files with syntax highlighting.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::bot::Context;
    use crate::bot::commands::Responder;
    use crate::core::source::{FileTarget, file_paginator};
    use crate::errors::{Error, Result};

    /// Reads out a file, using syntax highlighting if detected.
    ///
    /// Lines and line spans are supported by adding `#L12` or `#L12-14` etc
    /// to the end of the file name.
    #[poise::command(prefix_command, owners_only)]
    pub async fn cat(ctx: Context<'_>, #[rest] argument: String) -> Result<()> {
        let responder = Responder::from_context(ctx);
        let paginator = match FileTarget::parse(&argument) {
            Ok(target) => file_paginator(&target, ctx.data().config.pager.max_size).await,
            Err(e) => Err(e),
        };

        match paginator {
            Ok(paginator) => {
                responder.paginate(paginator).await?;
            }
            Err(Error::Command(message)) => {
                ctx.say(message).await?;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
