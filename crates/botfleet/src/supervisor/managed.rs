//! Process-manager launch command.

use std::io;

use botfleet_core::SanitizedName;

use crate::cmd::{CommandSpec, StdioMode};
use crate::config::{FleetConfig, LOGS_DIR_NAME};

/// stdout and stderr log paths, relative to the fleet root.
pub fn log_paths(name: &SanitizedName) -> (String, String) {
    (
        format!("{LOGS_DIR_NAME}/{name}-out.log"),
        format!("{LOGS_DIR_NAME}/{name}-error.log"),
    )
}

/// `<pm> start <entry> --name <bot> --cwd <bot> --restart-delay <ms>
/// --output logs/<bot>-out.log --error logs/<bot>-error.log [--watch]`,
/// run from the fleet root.
pub fn launch_command(config: &FleetConfig, name: &SanitizedName) -> CommandSpec {
    let (out_log, err_log) = log_paths(name);
    let spec = CommandSpec::new(&config.process_manager)
        .args(["start", config.entry_script.as_str()])
        .args(["--name", name.as_str()])
        .args(["--cwd", name.as_str()])
        .arg("--restart-delay")
        .arg(config.pm_restart_delay.as_millis().to_string())
        .args(["--output".to_string(), out_log])
        .args(["--error".to_string(), err_log])
        .current_dir(&config.root)
        .stdio(StdioMode::Inherit);

    if config.watch {
        spec.arg("--watch")
    } else {
        spec
    }
}

/// Create `<root>/logs` if it does not exist yet.
pub fn ensure_logs_dir(config: &FleetConfig) -> io::Result<()> {
    std::fs::create_dir_all(config.logs_dir())
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use botfleet_core::sanitize;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn launch_command_carries_every_option() {
        let config = FleetConfig {
            root: PathBuf::from("/srv/bots"),
            ..FleetConfig::default()
        };
        let spec = launch_command(&config, &sanitize("alpha"));
        assert_eq!(spec.program, "pm2");
        assert_eq!(
            spec.args,
            [
                "start",
                "index.js",
                "--name",
                "alpha",
                "--cwd",
                "alpha",
                "--restart-delay",
                "5000",
                "--output",
                "logs/alpha-out.log",
                "--error",
                "logs/alpha-error.log",
                "--watch",
            ]
        );
        assert_eq!(spec.cwd, Some(PathBuf::from("/srv/bots")));
    }

    #[test]
    fn watch_and_delay_are_configurable() {
        let config = FleetConfig {
            watch: false,
            pm_restart_delay: Duration::from_millis(1500),
            ..FleetConfig::default()
        };
        let spec = launch_command(&config, &sanitize("beta"));
        assert!(!spec.args.iter().any(|a| a == "--watch"));
        let delay_at = spec
            .args
            .iter()
            .position(|a| a == "--restart-delay")
            .expect("delay flag");
        assert_eq!(spec.args[delay_at + 1], "1500");
    }

    #[test]
    fn logs_dir_is_created_once_and_reused() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = FleetConfig {
            root: root.path().to_path_buf(),
            ..FleetConfig::default()
        };
        ensure_logs_dir(&config).expect("create");
        ensure_logs_dir(&config).expect("idempotent");
        assert!(root.path().join("logs").is_dir());
    }
}
