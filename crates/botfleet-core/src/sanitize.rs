//! Bot name sanitizing.
//!
//! A bot's configured name is reduced to the identifier alphabet
//! `[A-Za-z0-9_]` before it is used as a directory name, a process-manager
//! label, or part of a session identifier.

use std::fmt;

/// Prefix of every generated session identifier.
pub const SESSION_ID_PREFIX: &str = "levanter_";

/// A bot name containing only `[A-Za-z0-9_]`.
///
/// Can only be constructed through [`sanitize`], so the alphabet invariant
/// always holds. May be empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SanitizedName(String);

impl SanitizedName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Session identifier written into the bot's `config.env`.
    pub fn session_id(&self) -> String {
        format!("{SESSION_ID_PREFIX}{}", self.0)
    }
}

impl fmt::Display for SanitizedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

const fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Remove every character outside `[A-Za-z0-9_]` from `name`.
pub fn sanitize(name: &str) -> SanitizedName {
    SanitizedName(name.chars().filter(|c| is_allowed(*c)).collect())
}
