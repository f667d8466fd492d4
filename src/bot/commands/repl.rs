//! REPL commands - evaluate code, inspect results and toggle variable retention.

use crate::bot::commands::{Responder, add_with_fallback};
use crate::core::interface::TEXT_PAGE_LIMIT;
use crate::core::repl::{AsyncCodeExecutor, ReplSession, Value, all_inspections};
use crate::errors::Result;
use std::sync::Arc;
use tokio::sync::Mutex;

const MAX_HEADER_LEN: usize = 485;

/// How produced values are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    /// Each non-None value as a message.
    Plain,
    /// Each value as an inspection table.
    Inspect,
}

/// Message text for a produced value: strings as-is, anything else as its repr.
#[must_use]
pub fn result_text(value: &Value) -> String {
    let text = match value {
        Value::Str(text) => text.clone(),
        other => other.repr(),
    };
    if text.trim().is_empty() {
        "\u{200b}".to_string()
    } else {
        text
    }
}

/// Title line of an inspection table, cut down to a readable size.
#[must_use]
pub fn inspection_header(value: &Value) -> String {
    let header = value.repr().replace("``", "`\u{200b}`");
    if header.chars().count() > MAX_HEADER_LEN {
        let cut: String = header.chars().take(MAX_HEADER_LEN - 3).collect();
        format!("{cut}...")
    } else {
        header
    }
}

/// `Name             :: result` rows of an inspection table.
#[must_use]
pub fn inspection_lines(value: &Value) -> Vec<String> {
    all_inspections(value)
        .into_iter()
        .map(|(name, result)| format!("{name:16.16} :: {result}"))
        .collect()
}

async fn deliver(responder: &Responder, value: &Value, delivery: Delivery) -> Result<()> {
    match delivery {
        Delivery::Plain => {
            let text = responder.redact(&result_text(value));
            if text.chars().count() > TEXT_PAGE_LIMIT {
                let mut paginator = responder.wrapped("```py", "```");
                add_with_fallback(&text, |line| paginator.add_line(line))?;
                responder.paginate(paginator).await?;
            } else {
                responder.say(&text).await?;
            }
        }
        Delivery::Inspect => {
            let header = responder.redact(&inspection_header(value));
            let mut paginator = responder.wrapped(format!("```prolog\n=== {header} ==="), "```");
            for line in inspection_lines(value) {
                add_with_fallback(&line, |line| paginator.add_line(line))?;
            }
            responder.paginate(paginator).await?;
        }
    }
    Ok(())
}

async fn drain(
    responder: &Responder,
    session: &Mutex<ReplSession>,
    executor: &mut AsyncCodeExecutor,
    delivery: Delivery,
) -> Result<()> {
    while let Some(value) = executor.next_value().await {
        let value = value?;
        if delivery == Delivery::Plain && value.is_none() {
            continue;
        }
        session.lock().await.last_result = value.clone();
        deliver(responder, &value, delivery).await?;
    }
    Ok(())
}

async fn evaluate(
    responder: Responder,
    session: Arc<Mutex<ReplSession>>,
    source: String,
    mut arguments: Vec<(String, Value)>,
    delivery: Delivery,
) -> Result<()> {
    let (scope, last_result) = {
        let session = session.lock().await;
        (session.scope_for_run(), session.last_result.clone())
    };
    arguments.push(("_".to_string(), last_result));

    let mut executor = AsyncCodeExecutor::new(&source, scope)?.with_arguments(arguments);
    let outcome = drain(&responder, &session, &mut executor, delivery).await;
    session.lock().await.finish_run(executor.into_scope());
    outcome
}

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use super::{Delivery, evaluate};
    use crate::bot::Context;
    use crate::bot::commands::{Responder, supervise};
    use crate::core::codeblock::Codeblock;
    use crate::core::repl::Value;
    use crate::errors::Result;
    use std::sync::Arc;

    fn id_value(raw: u64) -> Value {
        i64::try_from(raw).map_or(Value::None, Value::Int)
    }

    /// Invocation details bound as globals for the fragment.
    fn context_arguments(ctx: Context<'_>) -> Vec<(String, Value)> {
        vec![
            ("_author".to_string(), id_value(ctx.author().id.get())),
            ("_channel".to_string(), id_value(ctx.channel_id().get())),
            (
                "_guild".to_string(),
                ctx.guild_id().map_or(Value::None, |guild| id_value(guild.get())),
            ),
            ("_message".to_string(), id_value(ctx.id())),
            ("_msg".to_string(), id_value(ctx.id())),
        ]
    }

    async fn run(ctx: Context<'_>, argument: &str, delivery: Delivery) -> Result<()> {
        let code = Codeblock::parse(argument);
        let work = evaluate(
            Responder::from_context(ctx),
            Arc::clone(&ctx.data().repl),
            code.content,
            context_arguments(ctx),
            delivery,
        );
        supervise(ctx, work).await
    }

    /// Evaluates code and replies with every value it produces.
    #[poise::command(prefix_command, owners_only, aliases("py", "python", "eval"))]
    pub async fn repl(ctx: Context<'_>, #[rest] code: String) -> Result<()> {
        run(ctx, &code, Delivery::Plain).await
    }

    /// Evaluates code and shows an inspection table for each produced value.
    #[poise::command(
        prefix_command,
        owners_only,
        aliases("pyi", "py_inspect", "python_inspect")
    )]
    pub async fn repl_inspect(ctx: Context<'_>, #[rest] code: String) -> Result<()> {
        run(ctx, &code, Delivery::Inspect).await
    }

    /// Turns REPL variable retention on or off.
    #[poise::command(prefix_command, owners_only)]
    pub async fn retain(ctx: Context<'_>, toggle: bool) -> Result<()> {
        let changed = ctx.data().repl.lock().await.set_retain(toggle);
        let reply = match (toggle, changed) {
            (true, true) => "Variable retention is on. Future REPL sessions will retain their scope.",
            (true, false) => "Variable retention is already set to on.",
            (false, true) => {
                "Variable retention is off. Future REPL sessions will dispose their scope when done."
            }
            (false, false) => "Variable retention is already set to off.",
        };
        ctx.say(reply).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
