//! Dependency verification and installation for a bot checkout.

use botfleet_core::SanitizedName;
use tracing::{error, info, warn};

use crate::cmd::{CommandError, CommandRunner, CommandSpec, StdioMode};
use crate::config::FleetConfig;

/// Result of the dependency verification command.
#[derive(Debug)]
pub enum Verification {
    /// Verification ran and succeeded.
    Satisfied,
    /// Verification ran and reported missing or mismatched dependencies.
    /// `code` is `None` if it was killed by a signal.
    Unsatisfied { code: Option<i32> },
    /// The verification command could not be run at all.
    ToolFailed(CommandError),
}

/// Result of [`ensure_dependencies`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyOutcome {
    AlreadySatisfied,
    Installed,
    InstallFailed,
    /// Verification could not run and `install_on_verify_error` is off.
    Skipped,
}

/// Run `<package_manager> check --verify-tree` inside the bot's checkout.
pub async fn verify<R: CommandRunner>(
    config: &FleetConfig,
    runner: &R,
    name: &SanitizedName,
) -> Verification {
    let spec = CommandSpec::new(&config.package_manager)
        .args(["check", "--verify-tree"])
        .current_dir(config.bot_dir(name))
        .stdio(StdioMode::Null);

    match runner.status(&spec).await {
        Ok(exit) if exit.success() => Verification::Satisfied,
        Ok(exit) => Verification::Unsatisfied { code: exit.code() },
        Err(e) => Verification::ToolFailed(e),
    }
}

/// Make sure the bot's dependencies are installed, installing them when
/// verification does not succeed.
pub async fn ensure_dependencies<R: CommandRunner>(
    config: &FleetConfig,
    runner: &R,
    name: &SanitizedName,
) -> DependencyOutcome {
    info!(bot = %name, "checking dependencies");

    match verify(config, runner, name).await {
        Verification::Satisfied => {
            info!(bot = %name, "dependencies already installed");
            return DependencyOutcome::AlreadySatisfied;
        }
        Verification::Unsatisfied { code } => {
            info!(bot = %name, ?code, "dependency tree incomplete");
        }
        Verification::ToolFailed(e) if config.install_on_verify_error => {
            warn!(bot = %name, error = %e, "dependency check could not run, installing anyway");
        }
        Verification::ToolFailed(e) => {
            warn!(bot = %name, error = %e, "dependency check could not run, skipping install");
            return DependencyOutcome::Skipped;
        }
    }

    info!(bot = %name, "installing dependencies");
    let install = CommandSpec::new(&config.package_manager)
        .args(config.install_args.iter().cloned())
        .current_dir(config.bot_dir(name))
        .stdio(StdioMode::Inherit);

    match runner.status(&install).await {
        Ok(exit) if exit.success() => DependencyOutcome::Installed,
        Ok(exit) => {
            error!(bot = %name, %exit, "dependency install failed");
            DependencyOutcome::InstallFailed
        }
        Err(e) => {
            error!(bot = %name, error = %e, "dependency install could not be run");
            DependencyOutcome::InstallFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Outcome, ScriptedRunner};
    use botfleet_core::sanitize;
    use std::path::PathBuf;

    fn test_config() -> FleetConfig {
        FleetConfig {
            root: PathBuf::from("/srv/bots"),
            ..FleetConfig::default()
        }
    }

    #[tokio::test]
    async fn satisfied_tree_skips_install() {
        let runner = ScriptedRunner::new();
        runner.script("yarn", Some("check"), [Outcome::Exit(0)]);

        let outcome = ensure_dependencies(&test_config(), &runner, &sanitize("alpha")).await;
        assert_eq!(outcome, DependencyOutcome::AlreadySatisfied);
        assert_eq!(runner.count("yarn", Some("check")), 1);
        assert_eq!(runner.count("yarn", Some("install")), 0);
    }

    #[tokio::test]
    async fn unsatisfied_tree_installs_exactly_once() {
        let runner = ScriptedRunner::new();
        runner.script("yarn", Some("check"), [Outcome::Exit(1)]);

        let outcome = ensure_dependencies(&test_config(), &runner, &sanitize("alpha")).await;
        assert_eq!(outcome, DependencyOutcome::Installed);
        assert_eq!(runner.count("yarn", Some("install")), 1);
    }

    #[tokio::test]
    async fn commands_run_inside_checkout() {
        let runner = ScriptedRunner::new();
        runner.script("yarn", Some("check"), [Outcome::Exit(1)]);

        ensure_dependencies(&test_config(), &runner, &sanitize("alpha")).await;
        for call in runner.calls() {
            assert_eq!(call.cwd, Some(PathBuf::from("/srv/bots/alpha")));
        }
        let calls = runner.calls();
        assert_eq!(calls[0].args, ["check", "--verify-tree"]);
        assert_eq!(calls[0].stdio, StdioMode::Null);
        assert_eq!(calls[1].args, ["install", "--silent"]);
        assert_eq!(calls[1].stdio, StdioMode::Inherit);
    }

    #[tokio::test]
    async fn verify_distinguishes_tool_failure_from_unsatisfied() {
        let runner = ScriptedRunner::new();
        runner.script("yarn", Some("check"), [Outcome::Exit(2), Outcome::SpawnError]);
        let config = test_config();
        let name = sanitize("alpha");

        assert!(matches!(
            verify(&config, &runner, &name).await,
            Verification::Unsatisfied { code: Some(2) }
        ));
        assert!(matches!(
            verify(&config, &runner, &name).await,
            Verification::ToolFailed(CommandError::Spawn { .. })
        ));
    }

    #[tokio::test]
    async fn tool_failure_installs_by_default() {
        let runner = ScriptedRunner::new();
        runner.script("yarn", Some("check"), [Outcome::SpawnError]);

        let outcome = ensure_dependencies(&test_config(), &runner, &sanitize("alpha")).await;
        assert_eq!(outcome, DependencyOutcome::Installed);
        assert_eq!(runner.count("yarn", Some("install")), 1);
    }

    #[tokio::test]
    async fn tool_failure_can_skip_install() {
        let runner = ScriptedRunner::new();
        runner.script("yarn", Some("check"), [Outcome::SpawnError]);
        let config = FleetConfig {
            install_on_verify_error: false,
            ..test_config()
        };

        let outcome = ensure_dependencies(&config, &runner, &sanitize("alpha")).await;
        assert_eq!(outcome, DependencyOutcome::Skipped);
        assert_eq!(runner.count("yarn", Some("install")), 0);
    }

    #[tokio::test]
    async fn install_failure_is_reported_not_retried() {
        let runner = ScriptedRunner::new();
        runner
            .script("yarn", Some("check"), [Outcome::Exit(1)])
            .script("yarn", Some("install"), [Outcome::Exit(1)]);

        let outcome = ensure_dependencies(&test_config(), &runner, &sanitize("alpha")).await;
        assert_eq!(outcome, DependencyOutcome::InstallFailed);
        assert_eq!(runner.count("yarn", Some("install")), 1);
    }

    #[tokio::test]
    async fn custom_install_args_are_passed() {
        let runner = ScriptedRunner::new();
        runner.script("yarn", Some("check"), [Outcome::Exit(1)]);
        let config = FleetConfig {
            install_args: vec![
                "install".into(),
                "--force".into(),
                "--non-interactive".into(),
            ],
            ..test_config()
        };

        ensure_dependencies(&config, &runner, &sanitize("alpha")).await;
        let install = &runner.calls()[1];
        assert_eq!(install.args, ["install", "--force", "--non-interactive"]);
    }
}
