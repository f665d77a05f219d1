//! `botfleet`
//!
//! Reads the bot registry, provisions a checkout per bot, installs its
//! dependencies and launches it under the configured supervision policy.

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use botfleet::cli::FleetArgs;
use botfleet::cmd::SystemRunner;
use botfleet::fleet;
use botfleet_core::tracing_init::{filter_for, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = FleetArgs::parse();

    let log_filter = filter_for(&["botfleet", "botfleet_core"], &args.log_level);
    init_tracing(&log_filter, args.log_json);

    let config = Arc::new(args.into_config()?);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        policy = %config.policy,
        bots_file = %config.bots_file.display(),
        root = %config.root.display(),
        backoff = %config.restart_backoff,
        "Starting botfleet"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let mut run = tokio::spawn(fleet::run(
        Arc::clone(&config),
        Arc::new(SystemRunner),
        shutdown_rx,
    ));

    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    #[cfg(unix)]
    let sigterm_future = sigterm.recv();
    #[cfg(not(unix))]
    let sigterm_future = std::future::pending::<Option<()>>();

    let finished = tokio::select! {
        result = &mut run => Some(result),
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
            None
        }
        _ = sigterm_future => {
            info!("Received SIGTERM shutdown signal");
            None
        }
    };

    let result = match finished {
        Some(result) => result,
        None => {
            // Bots supervised directly are stopped before the run returns.
            let _ = shutdown_tx.send(true);
            run.await
        }
    };
    let summary = result??;

    if summary.launch_failures() > 0 {
        warn!(
            failed = summary.launch_failures(),
            "some bots could not be started by the process manager"
        );
    }
    info!(
        registered = summary.registered,
        set_up = summary.setups.len(),
        skipped = summary.skipped,
        "botfleet finished"
    );
    Ok(())
}
