//! Error types for `botfleet` core library.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using `botfleet` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `botfleet` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The bot registry file does not exist.
    #[error("bot registry {} not found, please make sure it exists", path.display())]
    ConfigMissing { path: PathBuf },

    /// The bot registry exists but is not a JSON array of `{ "name": ... }` objects.
    #[error("bot registry {} is malformed: {source}", path.display())]
    ConfigMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Invalid runtime setting
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
