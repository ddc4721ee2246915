//! Inference engine configuration

use std::time::Duration;

use serde::Deserialize;

use super::error::ValidationError;
use crate::adapters::engine::EchoEngineConfig;
use crate::domain::profile::{ChatProfile, ProfileCatalog, DEFAULT_PROFILE};

/// Engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Chat profiles as `slug=system prompt` entries separated by `;`.
    /// Must include a `default` profile.
    #[serde(default = "default_profiles")]
    pub profiles: String,

    /// Tool-call iterations allowed per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Delay between streamed chunks in milliseconds
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,
}

impl EngineConfig {
    /// Parses `profiles` into the catalog clients select from.
    pub fn profile_catalog(&self) -> Result<ProfileCatalog, ValidationError> {
        let mut profiles = Vec::new();
        for entry in self.profiles.split(';') {
            if entry.trim().is_empty() {
                continue;
            }
            let profile = entry
                .split_once('=')
                .and_then(|(slug, prompt)| ChatProfile::new(slug, prompt.trim()).ok())
                .ok_or_else(|| ValidationError::InvalidProfile(entry.trim().to_string()))?;
            profiles.push(profile);
        }

        let catalog = ProfileCatalog::new(profiles);
        if catalog.get(DEFAULT_PROFILE).is_none() {
            return Err(ValidationError::MissingRequired("engine.profiles.default"));
        }
        Ok(catalog)
    }

    /// Validate engine configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_iterations == 0 || self.max_iterations > 100 {
            return Err(ValidationError::InvalidMaxIterations);
        }
        self.profile_catalog()?;
        Ok(())
    }

    /// Engine settings shared by every profile; the system prompt comes from the profile.
    pub fn echo_config(&self) -> EchoEngineConfig {
        EchoEngineConfig {
            system_prompt: None,
            max_iterations: self.max_iterations,
            chunk_delay: Duration::from_millis(self.chunk_delay_ms),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            profiles: default_profiles(),
            max_iterations: default_max_iterations(),
            chunk_delay_ms: default_chunk_delay_ms(),
        }
    }
}

fn default_profiles() -> String {
    "default=You are an assistant;agent=You are a helpful assistant. Be concise.".to_string()
}

fn default_max_iterations() -> usize {
    5
}

fn default_chunk_delay_ms() -> u64 {
    20
}
