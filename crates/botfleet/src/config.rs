//! Runtime configuration.
//!
//! Built once at startup from CLI flags and environment variables, then
//! shared read-only by every component.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use botfleet_core::{Error, Result, SanitizedName};

use crate::supervisor::RestartBackoff;

/// Repository cloned for every bot unless overridden.
pub const DEFAULT_REPO_URL: &str = "https://github.com/lyfe00011/levanter.git";

/// Name of the per-bot environment file inside its checkout.
pub const ENV_FILE_NAME: &str = "config.env";

/// Directory (under the fleet root) receiving process-manager log files.
pub const LOGS_DIR_NAME: &str = "logs";

/// How bots are kept running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupervisionPolicy {
    /// Hand the bot to the process manager and stop caring.
    #[default]
    ManagedDaemon,
    /// Try the process manager; if its launch fails, run the bot as our own
    /// child and relaunch it whenever it exits unsuccessfully.
    DirectSpawnWithFallback,
}

impl fmt::Display for SupervisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ManagedDaemon => write!(f, "managed"),
            Self::DirectSpawnWithFallback => write!(f, "direct"),
        }
    }
}

impl FromStr for SupervisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "managed" => Ok(Self::ManagedDaemon),
            "direct" => Ok(Self::DirectSpawnWithFallback),
            other => Err(format!(
                "unknown policy: {other} (expected 'managed' or 'direct')"
            )),
        }
    }
}

/// Complete fleet configuration.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// JSON registry of bots.
    pub bots_file: PathBuf,
    /// Directory holding one checkout per bot plus `logs/`.
    pub root: PathBuf,
    pub repo_url: String,
    pub policy: SupervisionPolicy,
    pub git_bin: String,
    pub package_manager: String,
    /// Arguments for the dependency install, e.g. `["install", "--silent"]`.
    pub install_args: Vec<String>,
    pub process_manager: String,
    /// Package installed globally when the process manager is missing.
    pub process_manager_package: String,
    /// Script the process manager starts inside each checkout.
    pub entry_script: String,
    /// Program and arguments for direct spawns, e.g. `["node", "index.js"]`.
    pub entry_command: Vec<String>,
    /// Restart delay handed to the process manager.
    pub pm_restart_delay: Duration,
    /// Ask the process manager to restart on file changes.
    pub watch: bool,
    pub restart_backoff: RestartBackoff,
    /// Install dependencies when the verification tool itself could not run.
    pub install_on_verify_error: bool,
    /// Create `config.env` readable by the owner only.
    pub restrict_env_permissions: bool,
    /// Grace period between SIGTERM and SIGKILL on shutdown.
    pub terminate_timeout: Duration,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            bots_file: PathBuf::from("bots.json"),
            root: PathBuf::from("."),
            repo_url: DEFAULT_REPO_URL.to_string(),
            policy: SupervisionPolicy::default(),
            git_bin: "git".to_string(),
            package_manager: "yarn".to_string(),
            install_args: vec!["install".to_string(), "--silent".to_string()],
            process_manager: "pm2".to_string(),
            process_manager_package: "pm2".to_string(),
            entry_script: "index.js".to_string(),
            entry_command: vec!["node".to_string(), "index.js".to_string()],
            pm_restart_delay: Duration::from_millis(5000),
            watch: true,
            restart_backoff: RestartBackoff::default(),
            install_on_verify_error: true,
            restrict_env_permissions: true,
            terminate_timeout: Duration::from_secs(5),
        }
    }
}

impl FleetConfig {
    /// Checkout directory of a bot: `<root>/<name>`.
    pub fn bot_dir(&self, name: &SanitizedName) -> PathBuf {
        self.root.join(name.as_str())
    }

    pub fn env_file(&self, name: &SanitizedName) -> PathBuf {
        self.bot_dir(name).join(ENV_FILE_NAME)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR_NAME)
    }

    /// Validate the configuration. Returns an error on invalid values.
    pub fn validate(&self) -> Result<()> {
        let tools = [
            ("git binary", &self.git_bin),
            ("package manager", &self.package_manager),
            ("process manager", &self.process_manager),
            ("process manager package", &self.process_manager_package),
            ("entry script", &self.entry_script),
            ("repository URL", &self.repo_url),
        ];
        for (what, value) in tools {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{what} must not be empty")));
            }
        }
        if self.install_args.is_empty() {
            return Err(Error::Config("install arguments must not be empty".into()));
        }
        if self.entry_command.is_empty() {
            return Err(Error::Config("entry command must not be empty".into()));
        }
        if let RestartBackoff::Exponential { initial, max } = self.restart_backoff
            && initial > max
        {
            return Err(Error::Config(format!(
                "restart backoff initial delay ({}ms) exceeds max delay ({}ms)",
                initial.as_millis(),
                max.as_millis()
            )));
        }
        Ok(())
    }
}
