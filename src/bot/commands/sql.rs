//! SQL command - run raw queries against the configured database.

use crate::bot::commands::{Responder, add_with_fallback};
use crate::core::paginator::{LineOptions, Paginator};
use crate::core::sql::{QueryOutcome, SqlExecutor};
use crate::errors::Result;
use sea_orm::DatabaseConnection;

/// Lays one statement's report out on a fenced paginator.
pub fn outcome_paginator(outcome: &QueryOutcome, mut paginator: Paginator) -> Result<Paginator> {
    let options = LineOptions {
        empty: true,
        ..LineOptions::default()
    };
    add_with_fallback(&outcome.render(), |line| paginator.add_line_with(line, options))?;
    Ok(paginator)
}

async fn run_queries(responder: Responder, database: DatabaseConnection, query: String) -> Result<()> {
    let mut executor = SqlExecutor::new(&query);
    while let Some(outcome) = executor.next_outcome(&database).await {
        let paginator = outcome_paginator(&outcome?, responder.wrapped("```", "```"))?;
        responder.paginate(paginator).await?;
    }
    Ok(())
}

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use super::run_queries;
    use crate::bot::Context;
    use crate::bot::commands::{Responder, supervise};
    use crate::core::codeblock::Codeblock;
    use crate::errors::Result;

    /// Executes SQL queries and displays their results in a rST table.
    #[poise::command(prefix_command, owners_only)]
    pub async fn sql(ctx: Context<'_>, #[rest] query: String) -> Result<()> {
        let Some(database) = ctx.data().database.clone() else {
            ctx.say("No database is configured.").await?;
            return Ok(());
        };
        let query = Codeblock::parse(&query).content;
        supervise(ctx, run_queries(Responder::from_context(ctx), database, query)).await
    }
}

// Re-export all commands
pub use inner::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::database::create_connection;

    #[tokio::test]
    async fn test_select_renders_a_table_page() -> Result<()> {
        let db = create_connection("sqlite::memory:").await?;
        let mut executor =
            SqlExecutor::new("CREATE TABLE t (id INTEGER, name TEXT); INSERT INTO t VALUES (1, 'a'); SELECT * FROM t;");

        let mut pages = Vec::new();
        while let Some(outcome) = executor.next_outcome(&db).await {
            let paginator = outcome_paginator(&outcome?, Paginator::wrapped("```", "```", 1985))?;
            pages.extend(paginator.pages());
        }

        assert_eq!(pages.len(), 3);
        assert!(pages[1].contains("1 row affected"));
        assert!(pages[2].starts_with("```\n# SELECT * FROM t;"));
        assert!(pages[2].contains("Returned 1 row in "));
        Ok(())
    }
}
