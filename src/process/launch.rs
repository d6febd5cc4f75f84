//! Launch specification and child process ownership.
//!
//! A [`LaunchSpec`] describes what to run. [`SupervisedChild`] owns the
//! spawned process and both of its output pipes for the lifetime of one
//! supervised run.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

/// Error type for launching or reaping an external program.
#[derive(thiserror::Error, Debug)]
pub enum LaunchError {
    /// The executable was not found.
    #[error("executable not found: {program}")]
    NotFound { program: PathBuf },
    /// Permission denied when spawning.
    #[error("permission denied: {program}")]
    PermissionDenied { program: PathBuf },
    /// Other I/O error.
    #[error("failed to start {program}: {source}")]
    Io {
        program: PathBuf,
        source: std::io::Error,
    },
    /// The process started but its exit status could not be collected.
    #[error("failed to wait for {program}: {source}")]
    Wait {
        program: PathBuf,
        source: std::io::Error,
    },
}

impl LaunchError {
    /// Create a `LaunchError` from an I/O error, classifying common cases.
    fn from_io(program: &Path, err: std::io::Error) -> Self {
        let program = program.to_path_buf();
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { program },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { program },
            _ => Self::Io {
                program,
                source: err,
            },
        }
    }

    /// The program that failed to launch.
    #[must_use]
    pub fn program(&self) -> &Path {
        match self {
            Self::NotFound { program }
            | Self::PermissionDenied { program }
            | Self::Io { program, .. }
            | Self::Wait { program, .. } => program,
        }
    }
}

/// What to run: executable, ordered arguments and working directory.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl LaunchSpec {
    /// Create a spec for the given executable with no arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Append a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments in order.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory for the process.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Get the executable path.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    #[must_use]
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Get the working directory, if set.
    #[must_use]
    pub fn get_working_dir(&self) -> Option<&PathBuf> {
        self.working_dir.as_ref()
    }

    /// Render the command line with shell quoting, for display and logs.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.to_string_lossy())
            .chain(self.args.iter().map(|a| Cow::Borrowed(a.as_str())))
            .map(shell_escape::escape)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        cmd
    }
}

/// A running external process owned by one supervised run.
#[derive(Debug)]
pub struct SupervisedChild {
    child: Child,
}

impl SupervisedChild {
    /// Spawn the process described by `spec` with both output streams piped.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError` if the process fails to spawn.
    pub fn spawn(spec: &LaunchSpec) -> Result<Self, LaunchError> {
        let child = spec
            .to_command()
            .spawn()
            .map_err(|e| LaunchError::from_io(spec.program(), e))?;

        Ok(Self { child })
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Check if the process has exited without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the process state cannot be queried.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Attempt graceful termination with a timeout, returning the exit status.
    ///
    /// On Unix, sends SIGTERM first, then SIGKILL after the timeout.
    /// On other platforms, falls back to immediate kill.
    ///
    /// # Errors
    ///
    /// Returns an error if termination fails.
    pub async fn graceful_terminate(&mut self, timeout: Duration) -> std::io::Result<ExitStatus> {
        #[cfg(unix)]
        {
            self.graceful_terminate_unix(timeout).await
        }

        #[cfg(not(unix))]
        {
            let _ = timeout;
            self.child.kill().await?;
            self.child.wait().await
        }
    }

    #[cfg(unix)]
    async fn graceful_terminate_unix(&mut self, timeout: Duration) -> std::io::Result<ExitStatus> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.id() else {
            // Already reaped; this returns the cached status.
            return self.child.wait().await;
        };

        let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
        let _ = kill(nix_pid, Signal::SIGTERM);

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                tracing::debug!(pid, "process ignored SIGTERM, killing");
                self.child.kill().await?;
                self.child.wait().await
            }
        }
    }
}

/// Map an exit status to a shell-style integer code.
///
/// Signal-terminated processes on Unix report `128 + signal`; anything else
/// without a code reports `-1`.
#[must_use]
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}
