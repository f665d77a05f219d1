//! Process manager presence check with a single self-install attempt.

use tracing::{error, info, warn};

use crate::cmd::{CommandError, CommandRunner, CommandSpec, StdioMode};
use crate::config::FleetConfig;

/// How the process manager became available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    AlreadyInstalled,
    Installed,
}

#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    #[error("{tool} is not installed and installing it failed; install it manually with: {hint}")]
    ExternalToolMissing {
        tool: String,
        hint: String,
        #[source]
        source: Option<CommandError>,
    },
}

/// Verify the process manager runs (`<pm> --version`), installing it
/// globally through the package manager if it does not.
pub async fn ensure_process_manager<R: CommandRunner>(
    config: &FleetConfig,
    runner: &R,
) -> Result<ToolStatus, ToolchainError> {
    let pm = &config.process_manager;
    info!(tool = %pm, "checking process manager");

    let probe = CommandSpec::new(pm)
        .arg("--version")
        .stdio(StdioMode::Null);
    match runner.status(&probe).await {
        Ok(exit) if exit.success() => {
            info!(tool = %pm, "process manager is already installed");
            return Ok(ToolStatus::AlreadyInstalled);
        }
        Ok(exit) => warn!(tool = %pm, %exit, "process manager probe failed, installing"),
        Err(e) => warn!(tool = %pm, error = %e, "process manager not found, installing"),
    }

    let install = CommandSpec::new(&config.package_manager)
        .args(["global", "add", config.process_manager_package.as_str()])
        .stdio(StdioMode::Inherit);
    let hint = install.command_line();

    let source = match runner.status(&install).await {
        Ok(exit) if exit.success() => {
            info!(tool = %pm, "process manager installed");
            return Ok(ToolStatus::Installed);
        }
        Ok(exit) => {
            error!(tool = %pm, %exit, "process manager install failed");
            None
        }
        Err(e) => {
            error!(tool = %pm, error = %e, "process manager install could not be run");
            Some(e)
        }
    };

    Err(ToolchainError::ExternalToolMissing {
        tool: pm.clone(),
        hint,
        source,
    })
}
