//! Per-bot checkout provisioning.
//!
//! A bot is provisioned when `<root>/<name>` exists. Nothing inside an
//! existing directory is inspected or rewritten, so repeated runs never touch
//! a checkout or its `config.env`.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use botfleet_core::SanitizedName;
use tracing::{error, info, warn};

use crate::cmd::{CommandRunner, CommandSpec, StdioMode};
use crate::config::FleetConfig;

/// Result of [`provision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// The directory already existed; nothing was done.
    AlreadyPresent,
    /// Cloned and `config.env` written.
    Provisioned,
    /// The clone failed. Later steps may fail because the checkout is missing.
    CloneFailed,
    /// Cloned, but writing `config.env` failed.
    EnvWriteFailed,
}

/// Content of a freshly written `config.env`.
pub fn env_file_content(name: &SanitizedName) -> String {
    format!("VPS=true\nSESSION_ID={}", name.session_id())
}

/// Ensure the checkout for `name` exists, cloning it and writing its
/// environment file on first use.
pub async fn provision<R: CommandRunner>(
    config: &FleetConfig,
    runner: &R,
    name: &SanitizedName,
) -> ProvisionOutcome {
    let dir = config.bot_dir(name);
    if dir.exists() {
        info!(bot = %name, dir = %dir.display(), "checkout already present, skipping clone");
        return ProvisionOutcome::AlreadyPresent;
    }

    info!(bot = %name, repo = %config.repo_url, "cloning repository");
    let clone = CommandSpec::new(&config.git_bin)
        .args(["clone", config.repo_url.as_str(), name.as_str()])
        .current_dir(&config.root)
        .stdio(StdioMode::Inherit);

    let cloned = match runner.status(&clone).await {
        Ok(exit) if exit.success() => true,
        Ok(exit) => {
            error!(bot = %name, %exit, "git clone failed");
            false
        }
        Err(e) => {
            error!(bot = %name, error = %e, "git clone could not be run");
            false
        }
    };

    let env_path = config.env_file(name);
    match write_env_file(&env_path, name, config.restrict_env_permissions) {
        Ok(()) => {
            info!(bot = %name, session_id = %name.session_id(), "config file created");
        }
        Err(e) if cloned => {
            error!(bot = %name, path = %env_path.display(), error = %e, "failed to write config file");
            return ProvisionOutcome::EnvWriteFailed;
        }
        Err(e) => {
            warn!(bot = %name, path = %env_path.display(), error = %e, "no config file written, checkout is missing");
        }
    }

    if cloned {
        ProvisionOutcome::Provisioned
    } else {
        ProvisionOutcome::CloneFailed
    }
}

/// Write `config.env` for `name` at `path`, owner-only when `restrict` is set.
///
/// With `restrict` the file is created 0600, so it is never readable by
/// others, not even briefly.
fn write_env_file(path: &Path, name: &SanitizedName, restrict: bool) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    if restrict {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    // `mode` only applies on creation; a config.env shipped with the
    // checkout keeps its own until narrowed here.
    #[cfg(unix)]
    if restrict {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    let _ = restrict;

    file.write_all(env_file_content(name).as_bytes())
}
