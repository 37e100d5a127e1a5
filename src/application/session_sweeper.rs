//! SessionSweeper - background expiry of idle sessions.
//!
//! Each tick deactivates sessions past their own expiry, then
//! deletes inactive sessions older than the retention window.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `interval` | 60s | Time between sweeps |
//! | `retention_days` | 7 | Age after which inactive sessions are deleted |
//!
//! ## Graceful Shutdown
//!
//! The sweeper listens on a watch channel and runs one last sweep before
//! stopping.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{error, info};

use crate::application::SessionManager;
use crate::config::SessionConfig;
use crate::domain::foundation::DomainError;

/// Configuration for the SessionSweeper.
#[derive(Debug, Clone)]
pub struct SessionSweeperConfig {
    pub interval: Duration,
    pub retention_days: i64,
}

impl Default for SessionSweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            retention_days: 7,
        }
    }
}

impl SessionSweeperConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_retention_days(mut self, days: i64) -> Self {
        self.retention_days = days;
        self
    }
}

impl From<&SessionConfig> for SessionSweeperConfig {
    fn from(config: &SessionConfig) -> Self {
        Self {
            interval: config.sweep_interval(),
            retention_days: config.retention_days,
        }
    }
}

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: u64,
    pub purged: u64,
}

/// Background session expiry service.
pub struct SessionSweeper {
    sessions: Arc<SessionManager>,
    config: SessionSweeperConfig,
}

impl SessionSweeper {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self::with_config(sessions, SessionSweeperConfig::default())
    }

    pub fn with_config(sessions: Arc<SessionManager>, config: SessionSweeperConfig) -> Self {
        Self { sessions, config }
    }

    /// Sweep on every interval tick until shutdown is signalled.
    ///
    /// A failed sweep is logged and retried on the next tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), DomainError> {
        let mut interval = time::interval(self.config.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        self.sweep_once().await?;
                        info!("session sweeper stopped");
                        return Ok(());
                    }
                }

                _ = interval.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        error!(error = %e, "session sweep failed");
                    }
                }
            }
        }
    }

    /// Run exactly one sweep.
    pub async fn sweep_once(&self) -> Result<SweepReport, DomainError> {
        let expired = self.sessions.expire_inactive().await?;
        let purged = self
            .sessions
            .purge_expired(self.config.retention_days)
            .await?;

        if expired > 0 || purged > 0 {
            info!(expired, purged, "session sweep completed");
        }
        Ok(SweepReport { expired, purged })
    }
}
