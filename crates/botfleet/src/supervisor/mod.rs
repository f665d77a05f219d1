//! Bot process supervision.
//!
//! One [`Supervisor`] serves every bot of a run; the configured
//! [`SupervisionPolicy`] decides how a bot is kept alive:
//!
//! ```text
//! Unstarted → ManagedRunning
//! ManagedRunning --exit 0--> Stopped            (process manager owns the bot)
//! ManagedRunning --exit≠0--> DirectRunning      (direct policy only)
//! DirectRunning  --exit≠0--> DirectRunning      (relaunch after backoff)
//! DirectRunning  --exit 0--> Stopped
//! ```

mod backoff;
mod direct;
pub mod managed;

use std::fmt;
use std::sync::Arc;

use botfleet_core::SanitizedName;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::cmd::{ChildProcess, CommandRunner, Exit};
use crate::config::{FleetConfig, SupervisionPolicy};

pub use backoff::RestartBackoff;

/// Who is running the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessMode {
    Managed,
    Direct,
}

/// Snapshot of the child currently (or last) running for a bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisedProcess {
    pub bot_name: SanitizedName,
    pub mode: ProcessMode,
    pub pid: Option<u32>,
    pub last_exit_code: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisionState {
    Unstarted,
    ManagedRunning,
    DirectRunning,
    Stopped,
}

impl fmt::Display for SupervisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unstarted => write!(f, "unstarted"),
            Self::ManagedRunning => write!(f, "managed-running"),
            Self::DirectRunning => write!(f, "direct-running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Result of the process-manager launch command itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// Not attempted (yet).
    Pending,
    Launched,
    LaunchFailed,
}

/// What happened to a bot by the time its supervision ended.
#[derive(Debug, Clone)]
pub struct SupervisionReport {
    pub bot: SanitizedName,
    pub final_state: SupervisionState,
    pub launch: LaunchOutcome,
    pub fallback_used: bool,
    /// Number of direct spawns, the first fallback launch included.
    pub direct_launches: u64,
    pub process: Option<SupervisedProcess>,
    /// Supervision ended because shutdown was requested.
    pub shutdown: bool,
}

impl SupervisionReport {
    fn new(bot: SanitizedName) -> Self {
        Self {
            bot,
            final_state: SupervisionState::Unstarted,
            launch: LaunchOutcome::Pending,
            fallback_used: false,
            direct_launches: 0,
            process: None,
            shutdown: false,
        }
    }

    fn track(&mut self, mode: ProcessMode, pid: Option<u32>) {
        self.process = Some(SupervisedProcess {
            bot_name: self.bot.clone(),
            mode,
            pid,
            last_exit_code: None,
        });
    }

    fn record_exit(&mut self, exit: Exit) {
        if let Some(process) = self.process.as_mut() {
            process.pid = None;
            process.last_exit_code = exit.code();
        }
    }
}

/// How waiting on a child ended.
enum Waited {
    Exited(Exit),
    WaitFailed,
    Shutdown,
}

/// Resolves once `true` is published on `rx`. Never resolves if the sender
/// is dropped without requesting shutdown.
pub(crate) async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Launches bots and keeps them running according to the configured policy.
pub struct Supervisor<R> {
    config: Arc<FleetConfig>,
    runner: Arc<R>,
    shutdown: watch::Receiver<bool>,
}

impl<R> Clone for Supervisor<R> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            runner: Arc::clone(&self.runner),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<R: CommandRunner> Supervisor<R> {
    pub const fn new(
        config: Arc<FleetConfig>,
        runner: Arc<R>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            runner,
            shutdown,
        }
    }

    /// Start `name` under the configured policy.
    ///
    /// Under [`SupervisionPolicy::ManagedDaemon`] this returns as soon as the
    /// launch command finishes. Under
    /// [`SupervisionPolicy::DirectSpawnWithFallback`] it only returns once
    /// the bot stops for good or shutdown is requested.
    pub async fn supervise(&self, name: &SanitizedName) -> SupervisionReport {
        match self.config.policy {
            SupervisionPolicy::ManagedDaemon => {
                let mut report = SupervisionReport::new(name.clone());
                if self.stopping() {
                    info!(bot = %name, "shutdown requested, not starting bot");
                    report.shutdown = true;
                } else {
                    report.launch = self.launch_managed(name).await;
                }
                report.final_state = SupervisionState::Stopped;
                report
            }
            SupervisionPolicy::DirectSpawnWithFallback => {
                self.supervise_with_fallback(name).await
            }
        }
    }

    /// Issue the process-manager start command and report only whether the
    /// command itself succeeded.
    pub async fn launch_managed(&self, name: &SanitizedName) -> LaunchOutcome {
        self.prepare_logs();
        let spec = managed::launch_command(&self.config, name);
        info!(bot = %name, manager = %self.config.process_manager, "starting bot with process manager");

        match self.runner.status(&spec).await {
            Ok(exit) if exit.success() => {
                info!(bot = %name, "bot started with process manager");
                LaunchOutcome::Launched
            }
            Ok(exit) => {
                error!(bot = %name, %exit, "failed to start bot with process manager");
                LaunchOutcome::LaunchFailed
            }
            Err(e) => {
                error!(bot = %name, error = %e, "failed to start bot with process manager");
                LaunchOutcome::LaunchFailed
            }
        }
    }

    fn stopping(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn prepare_logs(&self) {
        if let Err(e) = managed::ensure_logs_dir(&self.config) {
            warn!(dir = %self.config.logs_dir().display(), error = %e, "failed to create logs directory");
        }
    }

    /// Wait for `child` to exit, terminating it if shutdown is requested first.
    async fn wait_or_shutdown(&self, child: &mut R::Child) -> Waited {
        let mut shutdown = self.shutdown.clone();
        let exited = tokio::select! {
            res = child.wait() => Some(res),
            () = shutdown_requested(&mut shutdown) => None,
        };
        match exited {
            Some(Ok(exit)) => Waited::Exited(exit),
            Some(Err(e)) => {
                warn!(error = %e, "lost track of child process");
                Waited::WaitFailed
            }
            None => {
                child.terminate(self.config.terminate_timeout).await;
                Waited::Shutdown
            }
        }
    }
}
