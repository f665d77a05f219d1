//! Direct-spawn fallback: run the bot as our own child and relaunch it
//! whenever it exits unsuccessfully.

use botfleet_core::SanitizedName;
use tracing::{error, info, warn};

use super::{
    LaunchOutcome, ProcessMode, SupervisionReport, SupervisionState, Supervisor, Waited,
    managed, shutdown_requested,
};
use crate::cmd::{ChildProcess, CommandRunner, CommandSpec, StdioMode};
use crate::config::FleetConfig;

/// The bot's own entry command, run inside its checkout.
pub(super) fn entry_command(config: &FleetConfig, name: &SanitizedName) -> Option<CommandSpec> {
    let (program, args) = config.entry_command.split_first()?;
    Some(
        CommandSpec::new(program)
            .args(args.iter().cloned())
            .current_dir(config.bot_dir(name))
            .stdio(StdioMode::Inherit),
    )
}

impl<R: CommandRunner> Supervisor<R> {
    /// Launch through the process manager as a child; if that child exits
    /// unsuccessfully, fall back to running the bot directly.
    pub async fn supervise_with_fallback(&self, name: &SanitizedName) -> SupervisionReport {
        let mut report = SupervisionReport::new(name.clone());
        if self.stopping() {
            info!(bot = %name, "shutdown requested, not starting bot");
            report.shutdown = true;
            report.final_state = SupervisionState::Stopped;
            return report;
        }
        self.prepare_logs();

        let spec = managed::launch_command(&self.config, name);
        info!(bot = %name, manager = %self.config.process_manager, "starting bot with process manager");

        match self.runner.spawn(&spec) {
            Ok(mut child) => {
                report.final_state = SupervisionState::ManagedRunning;
                report.track(ProcessMode::Managed, child.id());
                match self.wait_or_shutdown(&mut child).await {
                    Waited::Shutdown => {
                        report.shutdown = true;
                        report.final_state = SupervisionState::Stopped;
                        return report;
                    }
                    Waited::Exited(exit) => {
                        report.record_exit(exit);
                        if exit.success() {
                            info!(bot = %name, "bot started with process manager");
                            report.launch = LaunchOutcome::Launched;
                            report.final_state = SupervisionState::Stopped;
                            return report;
                        }
                        warn!(bot = %name, %exit, "process manager launch failed, falling back to direct spawn");
                    }
                    Waited::WaitFailed => {
                        warn!(bot = %name, "process manager launch status unknown, falling back to direct spawn");
                    }
                }
            }
            Err(e) => {
                warn!(bot = %name, error = %e, "process manager could not be run, falling back to direct spawn");
            }
        }

        report.launch = LaunchOutcome::LaunchFailed;
        self.run_direct(name, &mut report).await;
        report
    }

    /// Relaunch loop. Ends when the bot exits 0, cannot be spawned, or
    /// shutdown is requested.
    async fn run_direct(&self, name: &SanitizedName, report: &mut SupervisionReport) {
        report.fallback_used = true;
        report.final_state = SupervisionState::Stopped;

        let Some(spec) = entry_command(&self.config, name) else {
            error!(bot = %name, "no entry command configured, cannot run bot directly");
            return;
        };

        let mut shutdown = self.shutdown.clone();
        let mut relaunches: u32 = 0;
        loop {
            if relaunches > 0 {
                let delay = self.config.restart_backoff.delay(relaunches);
                if !delay.is_zero() {
                    info!(bot = %name, delay_ms = delay.as_millis(), "waiting before relaunch");
                    let stopped = tokio::select! {
                        () = tokio::time::sleep(delay) => false,
                        () = shutdown_requested(&mut shutdown) => true,
                    };
                    if stopped {
                        report.shutdown = true;
                        return;
                    }
                }
            }

            let mut child = match self.runner.spawn(&spec) {
                Ok(child) => child,
                Err(e) => {
                    error!(bot = %name, error = %e, "failed to spawn bot directly, giving up");
                    return;
                }
            };
            report.direct_launches += 1;
            report.final_state = SupervisionState::DirectRunning;
            report.track(ProcessMode::Direct, child.id());
            info!(bot = %name, pid = ?child.id(), launches = report.direct_launches, "bot running directly");

            match self.wait_or_shutdown(&mut child).await {
                Waited::Shutdown => {
                    info!(bot = %name, "stopped bot on shutdown");
                    report.shutdown = true;
                    report.final_state = SupervisionState::Stopped;
                    return;
                }
                Waited::Exited(exit) if exit.success() => {
                    report.record_exit(exit);
                    info!(bot = %name, "bot exited cleanly, not restarting");
                    report.final_state = SupervisionState::Stopped;
                    return;
                }
                Waited::Exited(exit) => {
                    report.record_exit(exit);
                    warn!(bot = %name, %exit, relaunches, "bot exited unexpectedly, relaunching");
                }
                Waited::WaitFailed => {
                    warn!(bot = %name, relaunches, "lost bot process, relaunching");
                }
            }
            relaunches = relaunches.saturating_add(1);
        }
    }
}
