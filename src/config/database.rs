//! Database connection for the `sql` command.
//!
//! The bot keeps no schema of its own. The connection only serves queries
//! typed by the owner, so a missing or unreachable database disables `sql`
//! instead of stopping the bot.

use crate::errors::Result;
use sea_orm::{Database, DatabaseConnection};
use tracing::{info, warn};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/inspector.sqlite?mode=rwc";

/// Gets the database URL from `DATABASE_URL` or returns the default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Connects to `url`.
pub async fn create_connection(url: &str) -> Result<DatabaseConnection> {
    Database::connect(url).await.map_err(Into::into)
}

/// Connects to the configured database, logging instead of failing.
pub async fn connect_optional() -> Option<DatabaseConnection> {
    let url = get_database_url();
    match create_connection(&url).await {
        Ok(connection) => {
            info!("Connected to database for the sql command");
            Some(connection)
        }
        Err(e) => {
            warn!("Database unavailable, the sql command is disabled: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectionTrait, Statement};

    #[tokio::test]
    async fn test_create_connection() -> Result<()> {
        let db = create_connection("sqlite::memory:").await?;
        let rows = db
            .query_all(Statement::from_string(
                db.get_database_backend(),
                "SELECT 1 AS one",
            ))
            .await?;
        assert_eq!(rows.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_url_is_an_error() {
        assert!(create_connection("nosuchdb://nowhere").await.is_err());
    }
}
