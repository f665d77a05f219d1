//! Logging setup for the `botfleet` binary.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. `RUST_LOG` wins over `default_filter`;
/// `log_json` switches the output to one JSON object per line.
pub fn init_tracing(default_filter: &str, log_json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let json = log_json.then(|| fmt::layer().json());
    let text = (!log_json).then(fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json)
        .with(text)
        .init();
}

/// Build the default filter directive for the given crate targets.
///
/// `filter_for(&["botfleet", "botfleet_core"], "debug")` yields
/// `"botfleet=debug,botfleet_core=debug"`.
pub fn filter_for(targets: &[&str], level: &str) -> String {
    targets
        .iter()
        .map(|t| format!("{t}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}
