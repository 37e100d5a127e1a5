//! Outbound HTTP client configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Defaults for calls to service backends.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpClientConfig {
    /// Timeout when neither the action nor the service sets one, in seconds
    #[serde(default = "default_timeout")]
    pub default_timeout_secs: u64,

    /// Base delay between retries, doubled on each attempt, in milliseconds
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// User-Agent sent with every call
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl HttpClientConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Validate HTTP client configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.default_timeout_secs == 0 || self.default_timeout_secs > 300 {
            return Err(ValidationError::InvalidHttpTimeout);
        }
        Ok(())
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_timeout(),
            retry_backoff_ms: default_retry_backoff(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_retry_backoff() -> u64 {
    200
}

fn default_user_agent() -> String {
    format!("ussd-gateway/{}", env!("CARGO_PKG_VERSION"))
}
