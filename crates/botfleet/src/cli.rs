//! Command-line arguments.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{DEFAULT_REPO_URL, FleetConfig, SupervisionPolicy};
use crate::supervisor::RestartBackoff;

/// Provision bot checkouts and keep the bots running.
#[derive(Debug, Parser)]
#[command(name = "botfleet", version, about)]
pub struct FleetArgs {
    /// JSON file listing the bots (`[{"name": "..."}]`)
    #[arg(long, default_value = "bots.json", env = "BOTFLEET_BOTS_FILE")]
    pub bots_file: PathBuf,

    /// Directory holding one checkout per bot
    #[arg(long, default_value = ".", env = "BOTFLEET_ROOT")]
    pub root: PathBuf,

    /// Repository cloned for every new bot
    #[arg(long, default_value = DEFAULT_REPO_URL, env = "REPO_URL")]
    pub repo_url: String,

    /// Supervision policy: "managed" or "direct"
    #[arg(long, default_value = "managed", env = "BOTFLEET_POLICY", value_parser = parse_policy)]
    pub policy: SupervisionPolicy,

    /// git executable
    #[arg(long, default_value = "git", env = "BOTFLEET_GIT_BIN")]
    pub git_bin: String,

    /// Package manager executable
    #[arg(long, default_value = "yarn", env = "BOTFLEET_PACKAGE_MANAGER")]
    pub package_manager: String,

    /// Arguments for the dependency install, whitespace separated
    #[arg(long, default_value = "install --silent", env = "BOTFLEET_INSTALL_ARGS")]
    pub install_args: String,

    /// Process manager executable
    #[arg(long, default_value = "pm2", env = "BOTFLEET_PROCESS_MANAGER")]
    pub process_manager: String,

    /// Package to install globally when the process manager is missing
    #[arg(long, default_value = "pm2", env = "BOTFLEET_PROCESS_MANAGER_PACKAGE")]
    pub process_manager_package: String,

    /// Script the process manager starts inside each checkout
    #[arg(long, default_value = "index.js", env = "BOTFLEET_ENTRY_SCRIPT")]
    pub entry_script: String,

    /// Command run inside each checkout in direct mode, whitespace separated
    #[arg(long, default_value = "node index.js", env = "BOTFLEET_ENTRY_COMMAND")]
    pub entry_command: String,

    /// Restart delay passed to the process manager, in milliseconds
    #[arg(long, default_value_t = 5000, env = "BOTFLEET_PM_RESTART_DELAY_MS")]
    pub pm_restart_delay_ms: u64,

    /// Do not ask the process manager to restart bots on file changes
    #[arg(long, env = "BOTFLEET_NO_WATCH")]
    pub no_watch: bool,

    /// Delay strategy between direct-mode relaunches
    #[arg(
        long,
        default_value = "none",
        env = "BOTFLEET_RESTART_BACKOFF",
        value_parser = ["none", "fixed", "exponential"]
    )]
    pub restart_backoff: String,

    /// Fixed delay, or initial exponential delay, in milliseconds
    #[arg(long, default_value_t = 1000, env = "BOTFLEET_RESTART_DELAY_MS")]
    pub restart_delay_ms: u64,

    /// Upper bound of the exponential delay, in milliseconds
    #[arg(long, default_value_t = 60_000, env = "BOTFLEET_RESTART_MAX_DELAY_MS")]
    pub restart_max_delay_ms: u64,

    /// Skip dependency install when the dependency check itself cannot run
    #[arg(long, env = "BOTFLEET_NO_INSTALL_ON_VERIFY_ERROR")]
    pub no_install_on_verify_error: bool,

    /// Leave `config.env` with default file permissions
    #[arg(long, env = "BOTFLEET_NO_RESTRICT_ENV_PERMISSIONS")]
    pub no_restrict_env_permissions: bool,

    /// Seconds to wait for a bot to exit on shutdown before SIGKILL
    #[arg(long, default_value_t = 5, env = "BOTFLEET_TERMINATE_TIMEOUT")]
    pub terminate_timeout: u64,

    /// Log level filter (e.g. "info", "debug", "warn")
    #[arg(long, default_value = "info", env = "BOTFLEET_LOG_LEVEL")]
    pub log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "BOTFLEET_LOG_JSON")]
    pub log_json: bool,
}

fn parse_policy(s: &str) -> Result<SupervisionPolicy, String> {
    s.parse()
}

fn split_words(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

impl FleetArgs {
    fn restart_backoff(&self) -> RestartBackoff {
        match self.restart_backoff.as_str() {
            "fixed" => RestartBackoff::Fixed(Duration::from_millis(self.restart_delay_ms)),
            "exponential" => RestartBackoff::Exponential {
                initial: Duration::from_millis(self.restart_delay_ms),
                max: Duration::from_millis(self.restart_max_delay_ms),
            },
            _ => RestartBackoff::None,
        }
    }

    /// Build the immutable runtime configuration and validate it.
    pub fn into_config(self) -> botfleet_core::Result<FleetConfig> {
        let restart_backoff = self.restart_backoff();
        let config = FleetConfig {
            bots_file: self.bots_file,
            root: self.root,
            repo_url: self.repo_url,
            policy: self.policy,
            git_bin: self.git_bin,
            package_manager: self.package_manager,
            install_args: split_words(&self.install_args),
            process_manager: self.process_manager,
            process_manager_package: self.process_manager_package,
            entry_script: self.entry_script,
            entry_command: split_words(&self.entry_command),
            pm_restart_delay: Duration::from_millis(self.pm_restart_delay_ms),
            watch: !self.no_watch,
            restart_backoff,
            install_on_verify_error: !self.no_install_on_verify_error,
            restrict_env_permissions: !self.no_restrict_env_permissions,
            terminate_timeout: Duration::from_secs(self.terminate_timeout),
        };
        config.validate()?;
        Ok(config)
    }
}
