//! Reactions that report a command's progress on the invoking message, and
//! delivery of failure reports.

use super::paginator::{Paginator, add_with_fallback};
use super::surface::{MessageId, MessageSurface, Rendered};
use crate::errors::{Error, FailureKind, Result};
use std::error::Error as _;
use std::fmt::Write;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Added when a command is still running after [`RUNNING_DELAY`].
pub const RUNNING: &str = "\u{25b6}";
pub const SUCCESS: &str = "\u{2705}";
pub const TIMED_OUT: &str = "\u{23f0}";
pub const SYNTAX_FAILURE: &str = "\u{2757}";
pub const OTHER_FAILURE: &str = "\u{203c}";

pub const RUNNING_DELAY: Duration = Duration::from_secs(1);

const REPORT_PAGE_SIZE: usize = 1985;

/// The reaction marking a failure of the given kind.
#[must_use]
pub const fn marker(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::Timeout => TIMED_OUT,
        FailureKind::Syntax => SYNTAX_FAILURE,
        FailureKind::Other => OTHER_FAILURE,
    }
}

/// Adds a reaction, ignoring any failure to do so.
pub async fn attempt_to_react<S: MessageSurface>(surface: &S, message: MessageId, emoji: &str) {
    if let Err(e) = surface.add_reaction(message, emoji).await {
        debug!("Could not react with {emoji} to {message}: {e}");
    }
}

/// Text describing a failure.
///
/// The short form is the error itself; the verbose form adds its cause chain
/// and internal representation.
#[must_use]
pub fn format_failure(error: &Error, verbose: bool) -> String {
    let mut report = match error {
        Error::Syntax(syntax) => syntax.pointer(),
        other => other.to_string(),
    };
    if !verbose {
        return report;
    }

    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(report, "\n\nCaused by: {cause}");
        source = cause.source();
    }
    let _ = write!(report, "\n\n{error:#?}");
    report
}

/// Sends `report` as one or more `py` code blocks, returning the last message.
pub async fn send_traceback<S: MessageSurface>(surface: &S, report: &str) -> Result<Option<MessageId>> {
    let mut paginator = Paginator::wrapped("```py", "```", REPORT_PAGE_SIZE);
    for line in report.replace("``", "`\u{200b}`").split('\n') {
        add_with_fallback(line, |piece| paginator.add_line(piece))?;
    }

    let mut last = None;
    for page in paginator.pages() {
        last = Some(surface.send(&Rendered::Content(page)).await?);
    }
    Ok(last)
}

/// Reports a command's lifetime on the message that invoked it.
pub struct ResponseReactor<S> {
    surface: S,
    message: MessageId,
    running: JoinHandle<()>,
}

impl<S: MessageSurface> ResponseReactor<S> {
    /// Starts the timer that marks the command as running.
    pub fn start(surface: S, message: MessageId) -> Self {
        let running = {
            let surface = surface.clone();
            tokio::spawn(async move {
                tokio::time::sleep(RUNNING_DELAY).await;
                attempt_to_react(&surface, message, RUNNING).await;
            })
        };
        Self {
            surface,
            message,
            running,
        }
    }

    /// Marks the outcome and, on failure, delivers the report.
    ///
    /// Timeouts and syntax errors get the short report; anything else gets
    /// the verbose one. Returns whether the command failed.
    pub async fn finish<T>(self, outcome: &Result<T>) -> bool {
        self.running.abort();

        let error = match outcome {
            Ok(_) => {
                attempt_to_react(&self.surface, self.message, SUCCESS).await;
                return false;
            }
            Err(error) => error,
        };

        let kind = error.kind();
        attempt_to_react(&self.surface, self.message, marker(kind)).await;

        let verbose = kind == FailureKind::Other;
        if let Err(e) = send_traceback(&self.surface, &format_failure(error, verbose)).await {
            debug!("Could not deliver failure report: {e}");
        }
        true
    }
}
