//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `USSD_GATEWAY_` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use ussd_gateway::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {}", config.server.socket_addr().unwrap());
//! ```

mod database;
mod engine;
mod error;
mod http_client;
mod registry;
mod server;
mod session;

pub use database::DatabaseConfig;
pub use engine::EngineConfig;
pub use error::{ConfigError, ValidationError};
pub use http_client::HttpClientConfig;
pub use registry::RegistryConfig;
pub use server::{Environment, ServerConfig};
pub use session::SessionConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields a working
/// in-memory gateway. Load using [`AppConfig::load()`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration; absent means in-memory stores
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Session timeouts and expiry sweep
    #[serde(default)]
    pub session: SessionConfig,

    /// Engine behaviour and engine-owned screen texts
    #[serde(default)]
    pub engine: EngineConfig,

    /// Outbound HTTP defaults
    #[serde(default)]
    pub http_client: HttpClientConfig,

    /// Definition source for database-less deployments
    #[serde(default)]
    pub registry: RegistryConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `USSD_GATEWAY` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `USSD_GATEWAY__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `USSD_GATEWAY__DATABASE__URL=...` -> `database.url = ...`
    /// - `USSD_GATEWAY__ENGINE__MAIN_MENU_CODE=*500#` -> `engine.main_menu_code`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("USSD_GATEWAY")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        if let Some(database) = &self.database {
            database.validate()?;
        }
        self.session.validate()?;
        self.engine.validate()?;
        self.http_client.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
