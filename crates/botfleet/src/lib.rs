//! botfleet Library
//!
//! Provisions one checkout per registered bot and keeps the bots running:
//! - Command execution seam over git, the package manager and the process manager
//! - Checkout provisioning and dependency installation
//! - Process supervision with managed-daemon or direct-spawn fallback policy

pub mod cli;
pub mod cmd;
pub mod config;
pub mod deps;
pub mod fleet;
pub mod provision;
pub mod supervisor;
pub mod toolchain;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{FleetConfig, SupervisionPolicy};
pub use fleet::{FleetError, FleetSummary};
