//! Session lifecycle configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Session timeouts and the expiry sweep.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Inactivity after which a session expires, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// How often the sweep runs, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Days an expired session is kept before it is deleted
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// Run the sweep in this process
    #[serde(default = "default_sweep_enabled")]
    pub sweep_enabled: bool,
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Validate session configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidSessionTimeout);
        }
        if self.sweep_interval_secs == 0 {
            return Err(ValidationError::InvalidSweepInterval);
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            sweep_interval_secs: default_sweep_interval(),
            retention_days: default_retention_days(),
            sweep_enabled: default_sweep_enabled(),
        }
    }
}

fn default_timeout() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_retention_days() -> i64 {
    7
}

fn default_sweep_enabled() -> bool {
    true
}
