//! Unified error type for the bot and its framework-agnostic core.

use crate::core::repl::{RuntimeError, SyntaxError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Line exceeds maximum page size {max}")]
    LineTooLong { max: usize },

    #[error("Paginator page size {page_size} is too large for this interface (limit {limit})")]
    InvalidPaginator { page_size: usize, limit: usize },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("Missing permissions: {0}")]
    Forbidden(String),

    #[error("Reaction event stream closed")]
    EventsClosed,

    #[error("Task was cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),

    #[error("Command execution error: {0}")]
    Command(String),

    #[error("Serenity/Poise framework error: {0}")]
    #[allow(clippy::enum_variant_names)]
    FrameworkError(Box<poise::serenity_prelude::Error>),
}

/// How a failed command is presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A stream or process stalled past its budget.
    Timeout,
    /// Code was rejected before it ran.
    Syntax,
    /// Anything else, including runtime failures of user code.
    Other,
}

impl Error {
    /// Classifies this error for outcome reporting.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Syntax(_) => FailureKind::Syntax,
            _ => FailureKind::Other,
        }
    }
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        use poise::serenity_prelude as serenity;

        if let serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(response)) = &value {
            if response.status_code.as_u16() == 403 {
                return Self::Forbidden(response.error.message.clone());
            }
        }
        Self::FrameworkError(Box::new(value))
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classifies_failures() {
        assert_eq!(
            Error::Timeout(Duration::from_secs(1)).kind(),
            FailureKind::Timeout
        );
        assert_eq!(
            Error::Syntax(SyntaxError::new("invalid syntax", "1 +", 1, 4)).kind(),
            FailureKind::Syntax
        );
        assert_eq!(
            Error::Runtime(RuntimeError::new("ZeroDivisionError", "division by zero")).kind(),
            FailureKind::Other
        );
        assert_eq!(Error::Cancelled.kind(), FailureKind::Other);
    }
}
