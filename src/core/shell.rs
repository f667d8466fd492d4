//! Runs a shell command and exposes its output as a lazy sequence of cleaned lines.
//!
//! Pipe reads block, so each stream is drained on the blocking pool and lines
//! are funneled through one bounded queue. Producers stall once the queue is
//! full until the consumer catches up.

use crate::errors::{Error, Result};
use regex::Regex;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Overall budget for a command's output.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

const QUEUE_CAPACITY: usize = 250;
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const CLOSE_WAIT: Duration = Duration::from_millis(500);
const STDERR_TAG: &[u8] = b"[stderr] ";

#[allow(clippy::expect_used)] // Static pattern, verified by tests
static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b(?:\[[0-?]*[ -/]*[@-~]|\][^\x07]*\x07|[@-Z\\-_])")
        .expect("ANSI escape pattern is valid")
});

/// Decodes one raw output line for display.
///
/// Strips carriage returns, surrounding newlines and terminal escape
/// sequences, and breaks up double backticks so the line cannot end a code
/// fence early.
#[must_use]
pub fn clean_bytes(line: &[u8]) -> String {
    let text = String::from_utf8_lossy(line).replace('\r', "");
    let text = ANSI_ESCAPE.replace_all(text.trim_matches('\n'), "");
    text.replace("``", "`\u{200b}`")
}

/// The shell used to run command strings.
#[must_use]
pub fn default_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string())
}

fn shell_command(program: &str, code: &str) -> Command {
    if cfg!(windows) {
        let mut command = Command::new("cmd");
        command.arg("/C").arg(code);
        command
    } else {
        let mut command = Command::new(program);
        command.arg("-c").arg(code);
        command
    }
}

/// The exit code, or the negated signal number for a signalled process.
fn exit_code(status: std::process::ExitStatus) -> Option<i32> {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Some(-signal);
        }
    }
    status.code()
}

fn spawn_reader<R>(stream: R, sender: mpsc::Sender<String>, tag: Option<&'static [u8]>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut reader = BufReader::new(stream);
        let mut buffer = Vec::new();

        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer) {
                Ok(0) => break,
                Ok(_) => {
                    let line = match tag {
                        Some(tag) => clean_bytes(&[tag, buffer.as_slice()].concat()),
                        None => clean_bytes(&buffer),
                    };
                    if sender.blocking_send(line).is_err() {
                        // consumer is gone
                        break;
                    }
                }
                Err(e) => {
                    debug!("Shell stream read failed: {e}");
                    break;
                }
            }
        }
    })
}

/// One spawned shell process and the readers draining it.
pub struct ShellReader {
    process: Child,
    receiver: mpsc::Receiver<String>,
    timeout: Duration,
    started: Option<Instant>,
    close_code: Option<i32>,
    released: bool,
    stdout_task: JoinHandle<()>,
    stderr_task: JoinHandle<()>,
}

impl ShellReader {
    /// Runs `code` in the default shell with the default timeout.
    pub fn new(code: &str) -> Result<Self> {
        Self::with_timeout(code, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(code: &str, timeout: Duration) -> Result<Self> {
        Self::spawn(&default_shell(), code, timeout)
    }

    /// Runs `code` through `program -c`.
    pub fn spawn(program: &str, code: &str, timeout: Duration) -> Result<Self> {
        let mut command = shell_command(program, code);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut process = command.spawn()?;
        debug!("Spawned shell process {} for {code:?}", process.id());

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| Error::Command("stdout was not captured".to_string()))?;
        let stderr = process
            .stderr
            .take()
            .ok_or_else(|| Error::Command("stderr was not captured".to_string()))?;

        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        let stdout_task = spawn_reader(stdout, sender.clone(), None);
        let stderr_task = spawn_reader(stderr, sender, Some(STDERR_TAG));

        Ok(Self {
            process,
            receiver,
            timeout,
            started: None,
            close_code: None,
            released: false,
            stdout_task,
            stderr_task,
        })
    }

    /// Whether both output streams have been fully read.
    #[must_use]
    pub fn closed(&self) -> bool {
        self.stdout_task.is_finished() && self.stderr_task.is_finished()
    }

    /// The exit code captured by [`ShellReader::close`].
    #[must_use]
    pub const fn close_code(&self) -> Option<i32> {
        self.close_code
    }

    /// Waits for the next output line.
    ///
    /// Returns `None` once both streams are exhausted, or
    /// [`Error::Timeout`] when the whole run exceeds the timeout, counted
    /// from the first call.
    pub async fn next_line(&mut self) -> Option<Result<String>> {
        let started = *self.started.get_or_insert_with(Instant::now);

        loop {
            match tokio::time::timeout(POLL_INTERVAL, self.receiver.recv()).await {
                Ok(Some(line)) => return Some(Ok(line)),
                Ok(None) => return None,
                Err(_) => {
                    if started.elapsed() >= self.timeout {
                        warn!("Shell output stalled past {:?}", self.timeout);
                        return Some(Err(Error::Timeout(self.timeout)));
                    }
                }
            }
        }
    }

    /// Terminates the process and captures its exit code.
    ///
    /// A process ended by a signal reports the negated signal number. The
    /// code is `None` when the process did not exit within half a second.
    pub async fn close(&mut self) -> Option<i32> {
        if self.released {
            return self.close_code;
        }
        self.released = true;

        if let Err(e) = self.process.kill() {
            debug!("Shell process already gone: {e}");
        }

        let deadline = Instant::now() + CLOSE_WAIT;
        loop {
            match self.process.try_wait() {
                Ok(Some(status)) => {
                    self.close_code = exit_code(status);
                    break;
                }
                Ok(None) if Instant::now() < deadline => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Ok(None) => {
                    info!("Shell process {} did not exit in time", self.process.id());
                    break;
                }
                Err(e) => {
                    warn!("Could not reap shell process: {e}");
                    break;
                }
            }
        }
        self.close_code
    }
}

impl Drop for ShellReader {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.process.kill();
            let _ = self.process.try_wait();
        }
    }
}
