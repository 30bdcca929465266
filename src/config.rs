use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Rejected configuration value. Validation happens when a config is
/// applied, never inside the per-frame pipeline.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("{name} must be in ({lo}, {hi}], got {value}")]
    CoefficientOutOfRange {
        name: &'static str,
        lo: f32,
        hi: f32,
        value: f32,
    },

    #[error("{name} must be in [0, 1], got {value}")]
    UnitRangeExceeded { name: &'static str, value: f32 },

    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f32 },

    #[error("unknown preset '{0}'")]
    UnknownPreset(String),
}

/// Tunable parameters for the analysis engine.
///
/// Defaults are the untuned middle ground that works across genres; the
/// preset table below biases them toward specific material. All values are
/// read once at the start of a tick, so a frame always sees a consistent
/// snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Envelope attack coefficient, (0, 1]. Higher = snappier rise.
    pub attack: f32,
    /// Envelope release coefficient, (0, 1]. Lower = gentler fall.
    pub release: f32,
    /// Sensitivity multiplier on the onset stddev (threshold = mean + k * stddev).
    pub threshold_k: f32,
    /// Absolute threshold floor, suppresses detection during near-silence.
    pub threshold_floor: f32,
    /// Weight of bass flux vs full-spectrum flux in the onset signal, [0, 1].
    pub bass_weight: f32,
    /// Per-frame AGC peak decay factor, (0, 1).
    pub agc_decay: f32,
    /// Minimum AGC peak estimate, keeps the gain bounded during silence.
    pub agc_floor: f32,
    /// Minimum time between accepted beats, seconds.
    pub refractory_secs: f32,
    /// Confidence required before the predictor may synthesize beats, [0, 1].
    /// A gate of 1.0 disables prediction outright.
    pub prediction_gate: f32,
    /// Intensity assigned to predicted (not detected) beats, [0, 1].
    pub prediction_intensity: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            attack: 0.35,
            release: 0.08,
            threshold_k: 1.2,
            threshold_floor: 0.02,
            bass_weight: 0.7,
            agc_decay: 0.997,
            agc_floor: 0.001,
            refractory_secs: 0.25,
            prediction_gate: 0.5,
            prediction_intensity: 0.6,
        }
    }
}

impl EngineConfig {
    /// Look up a named preset. `default` returns the untuned defaults;
    /// `bassline` is the reduced bass-only variant (kick flux only, no
    /// prediction) for material where everything but the kick is noise.
    pub fn preset(name: &str) -> Result<Self, ConfigError> {
        let base = Self::default();
        let config = match name {
            "default" => base,
            "edm" => Self {
                attack: 0.5,
                bass_weight: 0.8,
                threshold_k: 1.4,
                refractory_secs: 0.2,
                prediction_gate: 0.4,
                ..base
            },
            "chill" => Self {
                release: 0.05,
                bass_weight: 0.6,
                threshold_k: 1.0,
                refractory_secs: 0.3,
                prediction_gate: 0.6,
                ..base
            },
            "rock" => Self {
                bass_weight: 0.65,
                threshold_k: 1.2,
                refractory_secs: 0.22,
                ..base
            },
            "bassline" => Self {
                bass_weight: 1.0,
                prediction_gate: 1.0,
                ..base
            },
            _ => return Err(ConfigError::UnknownPreset(name.to_string())),
        };
        Ok(config)
    }

    /// Names accepted by [`EngineConfig::preset`].
    pub fn preset_names() -> &'static [&'static str] {
        &["default", "edm", "chill", "rock", "bassline"]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::coefficient("attack", self.attack)?;
        Self::coefficient("release", self.release)?;
        Self::unit_range("bass_weight", self.bass_weight)?;
        Self::unit_range("prediction_gate", self.prediction_gate)?;
        Self::unit_range("prediction_intensity", self.prediction_intensity)?;
        Self::positive("threshold_k", self.threshold_k)?;
        Self::positive("threshold_floor", self.threshold_floor)?;
        Self::positive("agc_floor", self.agc_floor)?;
        Self::positive("refractory_secs", self.refractory_secs)?;
        if !(self.agc_decay > 0.0 && self.agc_decay < 1.0) {
            return Err(ConfigError::CoefficientOutOfRange {
                name: "agc_decay",
                lo: 0.0,
                hi: 1.0,
                value: self.agc_decay,
            });
        }
        Ok(())
    }

    /// Load a config from a JSON file and validate it.
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the config to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn coefficient(name: &'static str, value: f32) -> Result<(), ConfigError> {
        if value > 0.0 && value <= 1.0 {
            Ok(())
        } else {
            Err(ConfigError::CoefficientOutOfRange {
                name,
                lo: 0.0,
                hi: 1.0,
                value,
            })
        }
    }

    fn unit_range(name: &'static str, value: f32) -> Result<(), ConfigError> {
        if (0.0..=1.0).contains(&value) {
            Ok(())
        } else {
            Err(ConfigError::UnitRangeExceeded { name, value })
        }
    }

    fn positive(name: &'static str, value: f32) -> Result<(), ConfigError> {
        if value > 0.0 {
            Ok(())
        } else {
            Err(ConfigError::NonPositive { name, value })
        }
    }
}
