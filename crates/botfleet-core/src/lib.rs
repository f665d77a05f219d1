//! `botfleet` Core Library
//!
//! Shared functionality for `botfleet` components:
//! - Bot registry loading (`bots.json`)
//! - Bot name sanitizing and session identifiers
//! - Common error types
//! - Tracing initialization

pub mod error;
pub mod registry;
pub mod sanitize;
pub mod tracing_init;

pub use error::{Error, Result};
pub use registry::{BotDescriptor, load_registry};
pub use sanitize::{SanitizedName, sanitize};
