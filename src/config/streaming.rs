//! Streaming configuration

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use super::bus::BusConfig;
use super::error::ValidationError;
use crate::application::StreamingSettings;
use crate::domain::streaming::Protocol;

/// Streaming configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StreamingConfig {
    /// Seconds an unwatched conversation keeps its reader (0 = forever)
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Wire protocol for viewer frames (semantic, timeline, both)
    #[serde(default)]
    pub protocol: Protocol,

    /// Tool-name to renderer-kind pairs, e.g. `calc=calc_result,search=search_hits`
    #[serde(default = "default_custom_renderers")]
    pub custom_renderers: String,

    /// Frames buffered per viewer before new frames are dropped
    #[serde(default = "default_viewer_queue_capacity")]
    pub viewer_queue_capacity: usize,

    /// Tool calls remembered per conversation for result enrichment
    #[serde(default = "default_tool_cache_capacity")]
    pub tool_cache_capacity: usize,

    /// Seconds an unwatched, idle conversation stays registered (0 = forever)
    #[serde(default = "default_evict_idle")]
    pub evict_idle_secs: u64,

    /// Seconds between eviction sweeps (0 = no sweeps)
    #[serde(default = "default_evict_interval")]
    pub evict_interval_secs: u64,
}

impl StreamingConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn evict_idle(&self) -> Duration {
        Duration::from_secs(self.evict_idle_secs)
    }

    pub fn evict_interval(&self) -> Duration {
        Duration::from_secs(self.evict_interval_secs)
    }

    /// Parses `custom_renderers` into a tool-name to kind map.
    pub fn custom_renderer_map(&self) -> Result<HashMap<String, String>, ValidationError> {
        let mut map = HashMap::new();
        for entry in self.custom_renderers.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            match entry.split_once('=') {
                Some((tool, kind)) if !tool.trim().is_empty() && !kind.trim().is_empty() => {
                    map.insert(tool.trim().to_string(), kind.trim().to_string());
                }
                _ => return Err(ValidationError::InvalidRenderer(entry.to_string())),
            }
        }
        Ok(map)
    }

    /// Validate streaming configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.viewer_queue_capacity == 0 {
            return Err(ValidationError::ZeroCapacity("streaming.viewer_queue_capacity"));
        }
        if self.tool_cache_capacity == 0 {
            return Err(ValidationError::ZeroCapacity("streaming.tool_cache_capacity"));
        }
        self.custom_renderer_map()?;
        Ok(())
    }

    /// Builds the settings the streaming core runs with.
    pub fn settings(&self, bus: &BusConfig) -> Result<StreamingSettings, ValidationError> {
        Ok(StreamingSettings {
            topic_prefix: bus.topic_prefix.clone(),
            consumer_prefix: bus.consumer_prefix.clone(),
            idle_timeout: self.idle_timeout(),
            protocol: self.protocol,
            custom_renderers: self.custom_renderer_map()?,
            tool_cache_capacity: self.tool_cache_capacity,
            evict_idle: self.evict_idle(),
            evict_interval: self.evict_interval(),
        })
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            protocol: Protocol::default(),
            custom_renderers: default_custom_renderers(),
            viewer_queue_capacity: default_viewer_queue_capacity(),
            tool_cache_capacity: default_tool_cache_capacity(),
            evict_idle_secs: default_evict_idle(),
            evict_interval_secs: default_evict_interval(),
        }
    }
}

fn default_idle_timeout() -> u64 {
    60
}

fn default_custom_renderers() -> String {
    "calc=calc_result".to_string()
}

fn default_viewer_queue_capacity() -> usize {
    256
}

fn default_tool_cache_capacity() -> usize {
    1024
}

fn default_evict_idle() -> u64 {
    300
}

fn default_evict_interval() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_defaults() {
        let config = StreamingConfig::default();
        assert_eq!(config.idle_timeout(), Duration::from_secs(60));
        assert_eq!(config.protocol, Protocol::Semantic);
        assert_eq!(config.evict_idle(), Duration::from_secs(300));
        assert_eq!(config.evict_interval(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_custom_renderers_parsing() {
        let config = StreamingConfig {
            custom_renderers: " calc=calc_result , search = search_hits,".to_string(),
            ..Default::default()
        };
        let map = config.custom_renderer_map().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["calc"], "calc_result");
        assert_eq!(map["search"], "search_hits");
    }

    #[test]
    fn test_empty_custom_renderers_is_allowed() {
        let config = StreamingConfig {
            custom_renderers: String::new(),
            ..Default::default()
        };
        assert!(config.custom_renderer_map().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_renderer_entry_rejected() {
        let config = StreamingConfig {
            custom_renderers: "calc".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidRenderer(entry)) if entry == "calc"
        ));
    }

    #[test]
    fn test_zero_viewer_queue_rejected() {
        let config = StreamingConfig {
            viewer_queue_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_settings_take_prefixes_from_bus() {
        let bus = BusConfig {
            topic_prefix: "conv/".to_string(),
            consumer_prefix: "edge".to_string(),
            ..Default::default()
        };
        let config = StreamingConfig {
            idle_timeout_secs: 0,
            protocol: Protocol::Both,
            ..Default::default()
        };
        let settings = config.settings(&bus).unwrap();
        assert_eq!(settings.topic_prefix, "conv/");
        assert_eq!(settings.consumer_prefix, "edge");
        assert_eq!(settings.idle_timeout, Duration::ZERO);
        assert_eq!(settings.protocol, Protocol::Both);
        assert_eq!(settings.custom_renderers["calc"], "calc_result");
        assert_eq!(settings.evict_idle, Duration::from_secs(300));
    }

    #[test]
    fn test_zero_eviction_passes_through_as_disabled() {
        let config = StreamingConfig {
            evict_idle_secs: 0,
            evict_interval_secs: 0,
            ..Default::default()
        };
        let settings = config.settings(&BusConfig::default()).unwrap();
        assert_eq!(settings.evict_idle, Duration::ZERO);
        assert_eq!(settings.evict_interval, Duration::ZERO);
    }
}
