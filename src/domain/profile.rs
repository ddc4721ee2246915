//! Chat profiles - named engine presets a client can pick per conversation.
//!
//! A profile only matters when a conversation is created: its engine is built
//! from the selected profile (plus any per-request system prompt override) and
//! kept for the conversation's lifetime. Selecting a different profile for an
//! existing conversation has no effect.

use std::collections::BTreeMap;

use serde::Serialize;

use super::foundation::{DomainError, ErrorCode, ValidationError};

/// Slug used when a request names no profile.
pub const DEFAULT_PROFILE: &str = "default";

/// One selectable engine preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatProfile {
    pub slug: String,
    #[serde(rename = "default_prompt")]
    pub system_prompt: String,
}

impl ChatProfile {
    pub fn new(slug: impl Into<String>, system_prompt: impl Into<String>) -> Result<Self, ValidationError> {
        let slug = slug.into().trim().to_string();
        if slug.is_empty() {
            return Err(ValidationError::empty_field("profile.slug"));
        }
        if slug.contains(['/', '?', '#', ' ']) {
            return Err(ValidationError::invalid_format("profile.slug", "must be a single path segment"));
        }
        Ok(Self {
            slug,
            system_prompt: system_prompt.into(),
        })
    }

    /// The same profile with its system prompt replaced, unless `prompt` is blank.
    pub fn with_system_prompt(mut self, prompt: Option<&str>) -> Self {
        if let Some(prompt) = prompt.filter(|p| !p.trim().is_empty()) {
            self.system_prompt = prompt.to_string();
        }
        self
    }
}

impl Default for ChatProfile {
    fn default() -> Self {
        Self {
            slug: DEFAULT_PROFILE.to_string(),
            system_prompt: "You are an assistant".to_string(),
        }
    }
}

/// The set of profiles a server offers, keyed by slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileCatalog {
    profiles: BTreeMap<String, ChatProfile>,
}

impl ProfileCatalog {
    /// Later duplicates replace earlier ones.
    pub fn new(profiles: impl IntoIterator<Item = ChatProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|profile| (profile.slug.clone(), profile))
                .collect(),
        }
    }

    pub fn get(&self, slug: &str) -> Option<&ChatProfile> {
        self.profiles.get(slug)
    }

    /// Every profile, ordered by slug.
    pub fn list(&self) -> Vec<&ChatProfile> {
        self.profiles.values().collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Looks up `requested`, falling back to [`DEFAULT_PROFILE`] when it is absent or blank.
    pub fn resolve(&self, requested: Option<&str>) -> Result<ChatProfile, DomainError> {
        let slug = requested
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_PROFILE);
        self.get(slug).cloned().ok_or_else(|| {
            DomainError::new(ErrorCode::ProfileNotFound, "unknown profile").with_detail("profile", slug)
        })
    }
}

impl Default for ProfileCatalog {
    fn default() -> Self {
        Self::new([ChatProfile::default()])
    }
}
