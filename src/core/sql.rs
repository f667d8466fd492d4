//! Raw SQL execution and result table formatting.
//!
//! A query string holding more than one `;` is split into separate
//! statements. Statements starting with `SELECT` return rows; everything
//! else is executed and reports the affected row count.

use crate::errors::Result;
use sea_orm::{ConnectionTrait, QueryResult, Statement};
use std::collections::VecDeque;
use std::fmt::Write;
use std::time::{Duration, Instant};
use tracing::debug;

/// What one statement produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResultSet {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Affected(u64),
}

/// One executed statement and how long it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    pub query: String,
    pub elapsed: Duration,
    pub result: QueryResultSet,
}

impl QueryOutcome {
    #[allow(clippy::cast_precision_loss)]
    fn millis(&self) -> f64 {
        self.elapsed.as_micros() as f64 / 1000.0
    }

    /// Human-readable report: the statement, then a table or affected count.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!("# {}\n", self.query);
        match &self.result {
            QueryResultSet::Rows { columns, rows } if !rows.is_empty() => {
                let mut table = TableFormat::new();
                table.set_columns(columns.clone());
                table.add_rows(rows.iter().cloned());
                let _ = write!(
                    out,
                    "{}\nReturned {} in {:.2}ms",
                    table.render(),
                    pluralize(rows.len(), "row"),
                    self.millis()
                );
            }
            QueryResultSet::Rows { .. } => {
                let _ = write!(out, "{:.2}ms: no rows", self.millis());
            }
            QueryResultSet::Affected(count) => {
                let _ = write!(
                    out,
                    "{:.2}ms: {} affected",
                    self.millis(),
                    pluralize(usize::try_from(*count).unwrap_or(usize::MAX), "row")
                );
            }
        }
        out
    }
}

/// `1 row`, `3 rows`.
#[must_use]
pub fn pluralize(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Runs each statement of a query in order, on demand.
#[derive(Debug, Clone)]
pub struct SqlExecutor {
    queries: VecDeque<String>,
}

impl SqlExecutor {
    #[must_use]
    pub fn new(query: &str) -> Self {
        let queries = if query.matches(';').count() > 1 {
            query
                .split(';')
                .map(str::trim)
                .filter(|statement| !statement.is_empty())
                .map(|statement| format!("{statement};"))
                .collect()
        } else {
            VecDeque::from([query.trim().to_string()])
        };
        Self { queries }
    }

    /// Statements not yet executed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queries.len()
    }

    /// Executes the next statement, or returns `None` when all have run.
    pub async fn next_outcome(&mut self, db: &impl ConnectionTrait) -> Option<Result<QueryOutcome>> {
        let query = self.queries.pop_front()?;
        Some(execute(db, query).await)
    }
}

async fn execute(db: &impl ConnectionTrait, query: String) -> Result<QueryOutcome> {
    let statement = Statement::from_string(db.get_database_backend(), query.clone());
    let is_select = query
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("select"));

    let started = Instant::now();
    let result = if is_select {
        let rows = db.query_all(statement).await?;
        let columns = rows.first().map(QueryResult::column_names).unwrap_or_default();
        let rows = rows
            .iter()
            .map(|row| (0..columns.len()).map(|index| cell(row, index)).collect())
            .collect();
        QueryResultSet::Rows { columns, rows }
    } else {
        QueryResultSet::Affected(db.execute(statement).await?.rows_affected())
    };
    let elapsed = started.elapsed();

    debug!("Executed {query:?} in {elapsed:?}");
    Ok(QueryOutcome {
        query,
        elapsed,
        result,
    })
}

/// Renders one cell without knowing the column type up front.
fn cell(row: &QueryResult, index: usize) -> String {
    if let Ok(value) = row.try_get_by_index::<Option<i64>>(index) {
        return value.map_or_else(|| "NULL".to_string(), |v| v.to_string());
    }
    if let Ok(value) = row.try_get_by_index::<Option<f64>>(index) {
        return value.map_or_else(|| "NULL".to_string(), |v| v.to_string());
    }
    if let Ok(value) = row.try_get_by_index::<Option<String>>(index) {
        return value.unwrap_or_else(|| "NULL".to_string());
    }
    if let Ok(Some(bytes)) = row.try_get_by_index::<Option<Vec<u8>>>(index) {
        return format!("<{} bytes>", bytes.len());
    }
    "?".to_string()
}

/// A reStructuredText-style grid table with centered cells.
#[derive(Debug, Clone, Default)]
pub struct TableFormat {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    widths: Vec<usize>,
}

impl TableFormat {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_columns(&mut self, columns: Vec<String>) {
        self.widths = columns.iter().map(|c| c.chars().count() + 2).collect();
        self.columns = columns;
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        for (width, value) in self.widths.iter_mut().zip(&row) {
            *width = (*width).max(value.chars().count() + 2);
        }
        self.rows.push(row);
    }

    pub fn add_rows(&mut self, rows: impl IntoIterator<Item = Vec<String>>) {
        for row in rows {
            self.add_row(row);
        }
    }

    fn entry(&self, values: &[String]) -> String {
        let cells: Vec<String> = self
            .widths
            .iter()
            .enumerate()
            .map(|(index, width)| {
                let value = values.get(index).map_or("", String::as_str);
                format!("{value:^width$}")
            })
            .collect();
        format!("|{}|", cells.join("|"))
    }

    #[must_use]
    pub fn render(&self) -> String {
        let dashes: Vec<String> = self.widths.iter().map(|w| "-".repeat(*w)).collect();
        let separator = format!("+{}+", dashes.join("+"));

        let mut lines = vec![separator.clone(), self.entry(&self.columns), separator.clone()];
        lines.extend(self.rows.iter().map(|row| self.entry(row)));
        lines.push(separator);
        lines.join("\n")
    }
}
