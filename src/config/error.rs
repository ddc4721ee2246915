//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid host address: {0}")]
    InvalidHost(String),

    #[error("Invalid shutdown timeout")]
    InvalidTimeout,

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Capacity for {0} must be greater than zero")]
    ZeroCapacity(&'static str),

    #[error("Invalid custom renderer entry '{0}' (expected tool=kind)")]
    InvalidRenderer(String),

    #[error("Engine max_iterations must be between 1 and 100")]
    InvalidMaxIterations,

    #[error("Invalid profile entry '{0}' (expected slug=system prompt)")]
    InvalidProfile(String),
}
