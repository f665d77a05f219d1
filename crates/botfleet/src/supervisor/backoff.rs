//! Delay between direct-spawn relaunches.

use std::fmt;
use std::time::Duration;

/// Delay inserted before relaunching a crashed bot.
///
/// `None` relaunches immediately with no upper bound on attempts: a bot that
/// crashes on startup is relaunched as fast as the host can spawn it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartBackoff {
    #[default]
    None,
    Fixed(Duration),
    /// `initial * 2^(attempt - 1)`, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl RestartBackoff {
    /// Delay before relaunch number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::None => Duration::ZERO,
            Self::Fixed(delay) => delay,
            Self::Exponential { initial, max } => {
                let exponent = attempt.saturating_sub(1);
                1u32.checked_shl(exponent)
                    .and_then(|factor| initial.checked_mul(factor))
                    .map_or(max, |d| d.min(max))
            }
        }
    }
}

impl fmt::Display for RestartBackoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Fixed(d) => write!(f, "fixed({}ms)", d.as_millis()),
            Self::Exponential { initial, max } => write!(
                f,
                "exponential({}ms..{}ms)",
                initial.as_millis(),
                max.as_millis()
            ),
        }
    }
}
