//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `WEBCHAT` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use webchat::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {}", config.server.socket_addr().unwrap());
//! ```

mod bus;
mod engine;
mod error;
mod server;
mod streaming;

pub use bus::{BusBackend, BusConfig};
pub use engine::EngineConfig;
pub use error::{ConfigError, ValidationError};
pub use server::{Environment, ServerConfig};
pub use streaming::StreamingConfig;

use serde::Deserialize;

use crate::application::StreamingSettings;

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields a runnable
/// single-process server on the in-memory bus.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, logging, CORS)
    #[serde(default)]
    pub server: ServerConfig,

    /// Event bus configuration (memory or Redis Streams)
    #[serde(default)]
    pub bus: BusConfig,

    /// Streaming configuration (protocol, idle teardown, renderers)
    #[serde(default)]
    pub streaming: StreamingConfig,

    /// Inference engine configuration
    #[serde(default)]
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `WEBCHAT` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `WEBCHAT__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `WEBCHAT__BUS__REDIS_URL=...` -> `bus.redis_url = ...`
    /// - `WEBCHAT__STREAMING__PROTOCOL=both` -> `streaming.protocol = both`
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
                    .prefix("WEBCHAT")
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
        self.bus.validate()?;
        self.streaming.validate()?;
        self.engine.validate()?;
        Ok(())
    }

    /// Settings for the streaming core, combining bus naming and streaming knobs.
    pub fn streaming_settings(&self) -> Result<StreamingSettings, ValidationError> {
        self.streaming.settings(&self.bus)
    }
}
