//! Core logic - framework-agnostic pagination, rendering and execution pipelines
//!
//! Nothing in here knows about Discord. Commands feed the output of the shell
//! reader, REPL engine or SQL executor into a [`paginator::Paginator`], and an
//! [`interface::PaginatorInterface`] renders it onto any
//! [`surface::MessageSurface`].

/// Markdown code block stripping for command arguments
pub mod codeblock;
/// Live, navigable paged messages
pub mod interface;
/// Splitting text into bounded pages
pub mod paginator;
/// Outcome reactions and failure reports
pub mod reactor;
/// REPL compilation, evaluation and scopes
pub mod repl;
/// Subprocess output streaming
pub mod shell;
/// Source file reading for `cat`
pub mod source;
/// Raw SQL execution and table formatting
pub mod sql;
/// The message destination capability and reaction event bus
pub mod surface;
/// Registry of running command tasks
pub mod tasks;
