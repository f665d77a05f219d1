//! External command execution.
//!
//! Every interaction with git, the package manager, the process manager and
//! the bots themselves goes through [`CommandRunner`]. The only signal read
//! back from any of them is the exit status.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tracing::{debug, warn};

/// How the child's standard streams are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StdioMode {
    /// Share this process's stdin/stdout/stderr.
    #[default]
    Inherit,
    /// Discard all output, no stdin.
    Null,
}

/// A fully described external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub stdio: StdioMode,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdio: StdioMode::default(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    #[must_use]
    pub const fn stdio(mut self, stdio: StdioMode) -> Self {
        self.stdio = stdio;
        self
    }

    /// Command line for logs, e.g. `git clone https://... alpha`.
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Exit status of a finished command. `code` is `None` when the process was
/// terminated by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exit {
    code: Option<i32>,
}

impl Exit {
    pub const fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub const fn signalled() -> Self {
        Self { code: None }
    }

    pub const fn code(self) -> Option<i32> {
        self.code
    }

    pub const fn success(self) -> bool {
        matches!(self.code, Some(0))
    }
}

impl From<std::process::ExitStatus> for Exit {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl fmt::Display for Exit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit {code}"),
            None => write!(f, "killed by signal"),
        }
    }
}

/// Errors from running external commands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("failed to execute `{cmd}`: {source}")]
    Spawn {
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for `{cmd}`: {source}")]
    Wait {
        cmd: String,
        #[source]
        source: std::io::Error,
    },
}

/// A running child process.
pub trait ChildProcess: Send {
    /// OS process id, if the child is still known to the OS.
    fn id(&self) -> Option<u32>;

    /// Wait for the child to exit.
    fn wait(&mut self) -> impl Future<Output = Result<Exit, CommandError>> + Send;

    /// Ask the child to stop, killing it if it is still alive after `timeout`.
    fn terminate(&mut self, timeout: Duration) -> impl Future<Output = ()> + Send;
}

/// Launches external commands.
pub trait CommandRunner: Send + Sync + 'static {
    type Child: ChildProcess + 'static;

    /// Start `spec` without waiting for it.
    fn spawn(&self, spec: &CommandSpec) -> Result<Self::Child, CommandError>;

    /// Run `spec` to completion and return its exit status.
    fn status(&self, spec: &CommandSpec) -> impl Future<Output = Result<Exit, CommandError>> + Send {
        let spawned = self.spawn(spec);
        async move { spawned?.wait().await }
    }
}

/// [`CommandRunner`] backed by real OS processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

/// A child spawned by [`SystemRunner`].
#[derive(Debug)]
pub struct SystemChild {
    child: tokio::process::Child,
    cmd_line: String,
}

impl CommandRunner for SystemRunner {
    type Child = SystemChild;

    fn spawn(&self, spec: &CommandSpec) -> Result<SystemChild, CommandError> {
        let cmd_line = spec.command_line();
        debug!(cwd = ?spec.cwd, "exec: {cmd_line}");

        let mut cmd = tokio::process::Command::new(&spec.program);
        cmd.args(&spec.args).kill_on_drop(true);
        if let Some(ref dir) = spec.cwd {
            cmd.current_dir(dir);
        }
        match spec.stdio {
            StdioMode::Inherit => {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
            StdioMode::Null => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null());
            }
        }

        let child = cmd.spawn().map_err(|source| CommandError::Spawn {
            cmd: cmd_line.clone(),
            source,
        })?;
        Ok(SystemChild { child, cmd_line })
    }
}

impl ChildProcess for SystemChild {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(&mut self) -> Result<Exit, CommandError> {
        self.child
            .wait()
            .await
            .map(Exit::from)
            .map_err(|source| CommandError::Wait {
                cmd: self.cmd_line.clone(),
                source,
            })
    }

    async fn terminate(&mut self, timeout: Duration) {
        #[cfg(unix)]
        {
            if let Some(pid) = self.child.id() {
                // SAFETY: pid is a valid process ID obtained from our own Child handle.
                // kill(2) with SIGTERM is safe to call on any owned subprocess.
                #[allow(unsafe_code)]
                #[allow(clippy::cast_possible_wrap)]
                let ret = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
                if ret != 0 {
                    let err = std::io::Error::last_os_error();
                    warn!(pid, error = %err, "Failed to send SIGTERM");
                }
            }
        }

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => debug!(cmd = %self.cmd_line, ?status, "child exited after SIGTERM"),
            Ok(Err(e)) => {
                warn!(cmd = %self.cmd_line, error = %e, "Error waiting for child");
                self.child.kill().await.ok();
            }
            Err(_) => {
                warn!(cmd = %self.cmd_line, "Timeout waiting for graceful shutdown, killing");
                self.child.kill().await.ok();
            }
        }
    }
}
