//! Engine configuration, loadable from JSON.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which filter stages the chain builder includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainProfile {
    /// De-noise, three-band EQ, clarity shelf, compressor, gain, width, reverb.
    Basic,
    /// `Basic` plus the low-clarity, voice-clarity and high-smoothness filters.
    Professional,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Quiet period after the last parameter change before a render starts.
    pub debounce_ms: u64,
    /// Position polling cadence during bounded playback.
    pub poll_interval_ms: u64,
    /// Polling stops playback once position >= end - tolerance.
    pub stop_tolerance_secs: f64,
    /// Extra time the fallback timer waits past the segment length.
    pub fallback_margin_ms: u64,
    /// Seed for reverb impulse noise. `None` draws from OS entropy every render.
    pub reverb_seed: Option<u64>,
    pub profile: ChainProfile,
    /// Length of the selection created when a clip is loaded.
    pub default_segment_secs: f64,
    /// Minimum selection length enforced while dragging.
    pub min_segment_secs: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            poll_interval_ms: 4,
            stop_tolerance_secs: 0.01,
            fallback_margin_ms: 50,
            reverb_seed: None,
            profile: ChainProfile::Professional,
            default_segment_secs: 2.0,
            min_segment_secs: 0.1,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse { reason: e.to_string() })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "pollIntervalMs",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.stop_tolerance_secs.is_finite() || self.stop_tolerance_secs < 0.0 {
            return Err(ConfigError::Invalid {
                field: "stopToleranceSecs",
                reason: "must be a non-negative number".to_string(),
            });
        }
        if !self.default_segment_secs.is_finite() || self.default_segment_secs <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "defaultSegmentSecs",
                reason: "must be positive".to_string(),
            });
        }
        if !self.min_segment_secs.is_finite() || self.min_segment_secs <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "minSegmentSecs",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = EngineConfig::default();
        assert_eq!(c.debounce(), Duration::from_millis(300));
        assert_eq!(c.fallback_margin_ms, 50);
        assert_eq!(c.profile, ChainProfile::Professional);
        assert!(c.reverb_seed.is_none());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c = EngineConfig::from_json_str(r#"{"reverbSeed": 9, "profile": "basic"}"#).unwrap();
        assert_eq!(c.reverb_seed, Some(9));
        assert_eq!(c.profile, ChainProfile::Basic);
        assert_eq!(c.debounce_ms, 300);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = EngineConfig::from_json_str(r#"{"pollIntervalMs": 0}"#).unwrap_err();
        assert_eq!(err.code(), "config.invalid");
        let err = EngineConfig::from_json_str("{not json").unwrap_err();
        assert_eq!(err.code(), "config.parse");
    }

    #[test]
    fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"debounceMs": 120}"#).unwrap();
        let c = EngineConfig::from_json_file(&path).unwrap();
        assert_eq!(c.debounce_ms, 120);
        let missing = EngineConfig::from_json_file(dir.path().join("nope.json")).unwrap_err();
        assert_eq!(missing.code(), "config.io");
    }
}
