//! Supervised execution of an external process with live output relay.
//!
//! [`Supervisor::run`] spawns the process, drains stdout and stderr on two
//! reader tasks, and delivers each line to a [`LineHandler`] from a single
//! coordinating loop. The loop only returns once the process has exited,
//! both streams reached end-of-stream and every buffered line was delivered.

use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::process::ExitStatus;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_util::sync::CancellationToken;

use super::launch::{exit_code, LaunchError, LaunchSpec, SupervisedChild};
use super::relay::{spawn_reader, RelayedLine, StreamOrigin};

/// Default upper bound on how long the loop waits for a line before
/// re-checking the process.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Default grace period between SIGTERM and SIGKILL on cancellation.
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Error returned by a line handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Receives each line of output as it arrives.
///
/// Failures (returned errors and panics) are logged and counted; they never
/// stop the relay.
pub trait LineHandler {
    /// Handle one relayed line.
    ///
    /// # Errors
    ///
    /// Any error is recorded in [`RunResult::handler_failures`].
    fn on_line(&mut self, line: &RelayedLine) -> Result<(), HandlerError>;
}

impl<F> LineHandler for F
where
    F: FnMut(&RelayedLine) -> Result<(), HandlerError>,
{
    fn on_line(&mut self, line: &RelayedLine) -> Result<(), HandlerError> {
        self(line)
    }
}

/// Handler that ignores every line.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl LineHandler for NoopHandler {
    fn on_line(&mut self, _line: &RelayedLine) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Outcome of a supervised run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// Exit code of the process (`128 + signal` if killed by a signal on Unix).
    pub exit_code: i32,
    /// Everything the process wrote to stdout.
    pub stdout: String,
    /// Everything the process wrote to stderr.
    pub stderr: String,
    /// Number of handler invocations that failed.
    pub handler_failures: usize,
    /// Whether the run was cancelled before the process exited on its own.
    pub cancelled: bool,
}

impl RunResult {
    /// True if the process exited with code 0 and was not cancelled.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.cancelled
    }
}

/// Runs external processes and relays their output.
#[derive(Debug, Clone)]
pub struct Supervisor {
    poll_interval: Duration,
    terminate_timeout: Duration,
    cancel: Option<CancellationToken>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    /// Create a supervisor with default timings and no cancellation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            terminate_timeout: DEFAULT_TERMINATE_TIMEOUT,
            cancel: None,
        }
    }

    /// Set the bounded wait used while no line is available.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the grace period before a cancelled process is force-killed.
    #[must_use]
    pub fn with_terminate_timeout(mut self, timeout: Duration) -> Self {
        self.terminate_timeout = timeout;
        self
    }

    /// Set a cancellation token that terminates the running process.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Get the configured poll interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Run a process to completion without relaying output.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError` if the process cannot be started.
    pub async fn output(&self, spec: LaunchSpec) -> Result<RunResult, LaunchError> {
        self.run(spec, &mut NoopHandler).await
    }

    /// Run a process to completion, delivering each output line to `handler`.
    ///
    /// A non-zero exit code is reported in the result, not as an error.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError` if the process cannot be started or its exit
    /// status cannot be collected.
    pub async fn run<H>(&self, spec: LaunchSpec, handler: &mut H) -> Result<RunResult, LaunchError>
    where
        H: LineHandler + ?Sized,
    {
        let mut child = SupervisedChild::spawn(&spec)?;
        tracing::info!(
            command = %spec.command_line(),
            pid = child.id(),
            "Process started"
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.take_stdout() {
            readers.push(spawn_reader(stdout, StreamOrigin::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.take_stderr() {
            readers.push(spawn_reader(stderr, StreamOrigin::Stderr, tx.clone()));
        }
        // Only the readers hold senders now; the channel closes when both finish.
        drop(tx);

        let mut relay = Relay::new(rx);
        let outcome = self.drive(&mut child, &mut relay, handler).await;

        for reader in readers {
            reader.abort();
        }

        let (status, cancelled) = outcome.map_err(|source| LaunchError::Wait {
            program: spec.program().to_path_buf(),
            source,
        })?;

        let result = RunResult {
            exit_code: exit_code(status),
            stdout: relay.stdout,
            stderr: relay.stderr,
            handler_failures: relay.handler_failures,
            cancelled,
        };

        tracing::info!(
            command = %spec.command_line(),
            exit_code = result.exit_code,
            cancelled = result.cancelled,
            handler_failures = result.handler_failures,
            "Process finished"
        );

        Ok(result)
    }

    /// Coordinating loop. Returns the exit status and whether it was cancelled.
    async fn drive<H>(
        &self,
        child: &mut SupervisedChild,
        relay: &mut Relay,
        handler: &mut H,
    ) -> io::Result<(ExitStatus, bool)>
    where
        H: LineHandler + ?Sized,
    {
        let mut status: Option<ExitStatus> = None;

        while relay.open {
            match tokio::time::timeout(self.poll_interval, relay.rx.recv()).await {
                Ok(Some(line)) => {
                    relay.deliver(&line, handler);
                    if status.is_some() {
                        continue;
                    }
                }
                Ok(None) => relay.open = false,
                Err(_) => {}
            }

            if status.is_none() {
                if self.is_cancelled() {
                    tracing::info!(pid = child.id(), "Run cancelled, terminating process");
                    match child.graceful_terminate(self.terminate_timeout).await {
                        Ok(exit) => {
                            // Descendants may still hold the pipes open, so
                            // only what is already buffered gets delivered.
                            relay.drain_buffered(handler);
                            return Ok((exit, true));
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to terminate process");
                        }
                    }
                }

                match child.try_wait() {
                    Ok(exited) => status = exited,
                    Err(e) => tracing::warn!(error = %e, "Failed to query process status"),
                }
            }
        }

        match status {
            Some(exit) => Ok((exit, false)),
            None => self.reap(child).await,
        }
    }

    /// Wait for a process whose output streams are already closed.
    async fn reap(&self, child: &mut SupervisedChild) -> io::Result<(ExitStatus, bool)> {
        let Some(cancel) = self.cancel.as_ref() else {
            return child.wait().await.map(|exit| (exit, false));
        };

        tokio::select! {
            exit = child.wait() => exit.map(|exit| (exit, false)),
            () = cancel.cancelled() => {
                tracing::info!(pid = child.id(), "Run cancelled, terminating process");
                child
                    .graceful_terminate(self.terminate_timeout)
                    .await
                    .map(|exit| (exit, true))
            }
        }
    }
}

/// Consumer side of the line channel plus accumulated output.
struct Relay {
    rx: UnboundedReceiver<RelayedLine>,
    open: bool,
    stdout: String,
    stderr: String,
    handler_failures: usize,
}

impl Relay {
    fn new(rx: UnboundedReceiver<RelayedLine>) -> Self {
        Self {
            rx,
            open: true,
            stdout: String::new(),
            stderr: String::new(),
            handler_failures: 0,
        }
    }

    fn deliver<H>(&mut self, line: &RelayedLine, handler: &mut H)
    where
        H: LineHandler + ?Sized,
    {
        match line.origin {
            StreamOrigin::Stdout => self.stdout.push_str(&line.text),
            StreamOrigin::Stderr => self.stderr.push_str(&line.text),
        }
        tracing::debug!(stream = %line.origin, line = line.content(), "relay");

        match catch_unwind(AssertUnwindSafe(|| handler.on_line(line))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.handler_failures += 1;
                tracing::warn!(stream = %line.origin, error = %e, "Line handler failed");
            }
            Err(_) => {
                self.handler_failures += 1;
                tracing::warn!(stream = %line.origin, "Line handler panicked");
            }
        }
    }

    fn drain_buffered<H>(&mut self, handler: &mut H)
    where
        H: LineHandler + ?Sized,
    {
        while let Ok(line) = self.rx.try_recv() {
            self.deliver(&line, handler);
        }
        self.open = false;
    }
}
