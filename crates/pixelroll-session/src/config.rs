use std::time::Duration;

use crate::error::{Result, SessionError};

/// Timing of the roll session engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long after the first roll other rolling dice may join the session.
    pub capture_window: Duration,
    /// Maximum wait, after the capture window closes, for participants to
    /// come to rest before resolving degraded.
    pub settle_timeout: Duration,
    /// Session loop tick.
    pub poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capture_window: Duration::from_millis(300),
            settle_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(SessionError::InvalidConfig(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        if self.settle_timeout.is_zero() {
            return Err(SessionError::InvalidConfig(
                "settle_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
