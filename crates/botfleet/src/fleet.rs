//! Whole-fleet run: registry → per bot (sanitize → provision → install →
//! launch) → optional resident supervision.

use std::collections::HashSet;
use std::sync::Arc;

use botfleet_core::{SanitizedName, load_registry, sanitize};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::cmd::CommandRunner;
use crate::config::{FleetConfig, SupervisionPolicy};
use crate::deps::{self, DependencyOutcome};
use crate::provision::{self, ProvisionOutcome};
use crate::supervisor::{LaunchOutcome, SupervisionReport, Supervisor};
use crate::toolchain::{self, ToolchainError};

/// Errors that abort the whole run before any bot is touched.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error(transparent)]
    Registry(#[from] botfleet_core::Error),

    #[error(transparent)]
    Toolchain(#[from] ToolchainError),
}

/// Setup result for one bot.
#[derive(Debug, Clone)]
pub struct BotSetup {
    pub name: SanitizedName,
    pub provision: ProvisionOutcome,
    pub dependencies: DependencyOutcome,
}

/// Outcome of a fleet run.
#[derive(Debug, Default)]
pub struct FleetSummary {
    /// Descriptors read from the registry.
    pub registered: usize,
    /// Descriptors skipped for an empty or duplicate sanitized name.
    pub skipped: usize,
    pub setups: Vec<BotSetup>,
    /// One report per launched bot, in completion order.
    pub reports: Vec<SupervisionReport>,
}

impl FleetSummary {
    pub fn launch_failures(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.launch == LaunchOutcome::LaunchFailed)
            .count()
    }
}

/// Set up and launch every bot in the registry.
///
/// Under [`SupervisionPolicy::DirectSpawnWithFallback`] each bot is
/// supervised on its own task started right after its setup, and this
/// returns once all of them have stopped.
pub async fn run<R: CommandRunner>(
    config: Arc<FleetConfig>,
    runner: Arc<R>,
    shutdown: watch::Receiver<bool>,
) -> Result<FleetSummary, FleetError> {
    let bots = load_registry(&config.bots_file)?;
    let mut summary = FleetSummary {
        registered: bots.len(),
        ..FleetSummary::default()
    };
    if bots.is_empty() {
        info!(path = %config.bots_file.display(), "bot registry is empty, nothing to do");
        return Ok(summary);
    }

    let tool = toolchain::ensure_process_manager(&config, runner.as_ref()).await?;
    info!(tool = %config.process_manager, status = ?tool, "process manager ready");

    let supervisor = Supervisor::new(Arc::clone(&config), Arc::clone(&runner), shutdown.clone());
    let mut supervised = JoinSet::new();
    let mut seen = HashSet::new();

    for bot in &bots {
        if *shutdown.borrow() {
            warn!("shutdown requested, not setting up remaining bots");
            break;
        }

        let name = sanitize(&bot.name);
        if name.is_empty() {
            warn!(raw = %bot.name, "bot name has no usable characters, skipping");
            summary.skipped += 1;
            continue;
        }
        if !seen.insert(name.clone()) {
            warn!(raw = %bot.name, bot = %name, "another bot already uses this name, skipping");
            summary.skipped += 1;
            continue;
        }

        info!(bot = %name, "setting up bot");
        let provision = provision::provision(&config, runner.as_ref(), &name).await;
        let dependencies = deps::ensure_dependencies(&config, runner.as_ref(), &name).await;
        summary.setups.push(BotSetup {
            name: name.clone(),
            provision,
            dependencies,
        });

        // A signal may have arrived while the setup commands ran.
        if *shutdown.borrow() {
            warn!(bot = %name, "shutdown requested during setup, not launching");
            break;
        }

        match config.policy {
            SupervisionPolicy::ManagedDaemon => {
                summary.reports.push(supervisor.supervise(&name).await);
            }
            SupervisionPolicy::DirectSpawnWithFallback => {
                let supervisor = supervisor.clone();
                supervised.spawn(async move { supervisor.supervise(&name).await });
            }
        }
    }

    if !supervised.is_empty() {
        info!(bots = supervised.len(), "supervising bots");
    }
    while let Some(joined) = supervised.join_next().await {
        match joined {
            Ok(report) => {
                info!(bot = %report.bot, state = %report.final_state, launches = report.direct_launches, "bot supervision ended");
                summary.reports.push(report);
            }
            Err(e) => error!(error = %e, "supervision task failed"),
        }
    }

    Ok(summary)
}
