pub mod agc;
pub mod bands;
pub mod onset;
pub mod predictor;
pub mod tempo;

pub use bands::{BandExtractor, BandSet, BAND_COUNT, BAND_EDGES_HZ};
pub use tempo::BeatEvent;

use crate::config::{ConfigError, EngineConfig};
use agc::{BandNormalizer, EnvelopeFollower};
use onset::{OnsetSignalBuilder, PeakPicker};
use predictor::BeatPredictor;
use serde::{Deserialize, Serialize};
use tempo::TempoEstimator;

/// Per-bin spectral magnitudes for one capture block. Produced by the
/// capture layer, borrowed by the engine, immutable once built.
#[derive(Debug, Clone)]
pub struct SpectralFrame {
    pub magnitudes: Vec<f32>,
    pub sample_rate: f32,
    pub timestamp: f64,
    pub seq: u64,
}

/// One tick of analysis output. This is the sole externally visible
/// artifact of the engine; the transport layer owns any wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFrame {
    /// Normalized band energies, each in [0, 1].
    pub bands: [f32; BAND_COUNT],
    /// Max of the bands, in [0, 1].
    pub amplitude: f32,
    pub is_beat: bool,
    pub beat_intensity: f32,
    pub bpm: f32,
    pub confidence: f32,
    /// Monotonic tick counter.
    pub frame: u64,
    pub timestamp: f64,
}

impl Default for AnalysisFrame {
    fn default() -> Self {
        Self {
            bands: [0.0; BAND_COUNT],
            amplitude: 0.0,
            is_beat: false,
            beat_intensity: 0.0,
            bpm: 120.0,
            confidence: 0.0,
            frame: 0,
            timestamp: 0.0,
        }
    }
}

/// The analysis pipeline: raw spectral energy in, stable musically
/// meaningful control signals out, once per tick.
///
/// The engine owns all its mutable state exclusively and performs no I/O,
/// sleeping, or locking; every step is a bounded numeric computation over
/// fixed-size buffers. It degrades gracefully instead of failing: missing
/// input decays through the ordinary AGC/envelope math, degenerate
/// statistics collapse to floors, and insufficient history simply abstains
/// from detection.
pub struct AnalysisEngine {
    config: EngineConfig,
    normalizer: BandNormalizer,
    envelope: EnvelopeFollower,
    onset: OnsetSignalBuilder,
    picker: PeakPicker,
    tempo: TempoEstimator,
    predictor: BeatPredictor,
    last_beat: Option<f64>,
    frame: u64,
}

impl AnalysisEngine {
    /// Validates the configuration and builds a fresh engine. A bad config
    /// fails loudly here, before the tick loop ever starts.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let normalizer = BandNormalizer::new(&config);
        Ok(Self {
            config,
            normalizer,
            envelope: EnvelopeFollower::new(),
            onset: OnsetSignalBuilder::new(),
            picker: PeakPicker::new(),
            tempo: TempoEstimator::new(),
            predictor: BeatPredictor::new(),
            last_beat: None,
            frame: 0,
        })
    }

    /// Swap the parameter set between ticks. The new values take effect on
    /// the next call to [`tick`](Self::tick); a frame in flight always sees
    /// a consistent snapshot.
    pub fn apply_config(&mut self, config: EngineConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Reset the AGC peak estimates. The only way AGC state is ever reset.
    pub fn recalibrate(&mut self) {
        self.normalizer.recalibrate(&self.config);
    }

    /// Run one analysis tick. `input` is `None` when the capture layer
    /// delivered nothing this tick; the engine then feeds silence through
    /// the ordinary pipeline so bands decay along their existing
    /// trajectory.
    pub fn tick(&mut self, input: Option<&SpectralFrame>, now: f64) -> AnalysisFrame {
        let timestamp = input.map_or(now, |f| f.timestamp);

        let raw = match input {
            Some(frame) => BandExtractor::extract(frame),
            None => [0.0; BAND_COUNT],
        };

        let normalized = self.normalizer.normalize(&raw, &self.config);
        let smoothed = self.envelope.follow(&normalized, &self.config);

        let onset = self.onset.build(&smoothed, &self.config);
        let detection = self.picker.process(onset, &self.config);

        let refractory_elapsed = self
            .last_beat
            .map_or(true, |t| timestamp - t >= self.config.refractory_secs as f64);

        let mut is_beat = false;
        let mut beat_intensity = 0.0;

        if let Some(intensity) = detection {
            if refractory_elapsed {
                is_beat = true;
                beat_intensity = intensity;
            }
        }

        if !is_beat && refractory_elapsed {
            if let Some(last) = self.last_beat {
                let predicted = self.predictor.should_predict(
                    onset,
                    self.picker.rolling_mean(),
                    timestamp - last,
                    self.tempo.bpm(),
                    self.tempo.confidence(),
                    &self.config,
                );
                if predicted {
                    is_beat = true;
                    beat_intensity = self.config.prediction_intensity;
                }
            }
        }

        if is_beat {
            self.last_beat = Some(timestamp);
            self.tempo.push_beat(BeatEvent {
                timestamp,
                intensity: beat_intensity,
            });
        }

        let amplitude = smoothed.iter().fold(0.0f32, |a, &b| a.max(b));

        self.frame += 1;
        AnalysisFrame {
            bands: smoothed,
            amplitude,
            is_beat,
            beat_intensity,
            bpm: self.tempo.bpm(),
            confidence: self.tempo.confidence(),
            frame: self.frame,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> AnalysisEngine {
        AnalysisEngine::new(EngineConfig::default()).unwrap()
    }

    fn frame_at(magnitudes: Vec<f32>, seq: u64, timestamp: f64) -> SpectralFrame {
        SpectralFrame {
            magnitudes,
            sample_rate: 44100.0,
            timestamp,
            seq,
        }
    }

    #[test]
    fn invalid_config_fails_construction() {
        let config = EngineConfig {
            release: 0.0,
            ..EngineConfig::default()
        };
        assert!(AnalysisEngine::new(config).is_err());
    }

    #[test]
    fn frame_counter_is_monotonic() {
        let mut engine = engine();
        let mut prev = 0;
        for i in 0..10 {
            let out = engine.tick(None, i as f64 / 60.0);
            assert_eq!(out.frame, prev + 1);
            prev = out.frame;
        }
    }

    #[test]
    fn gap_input_decays_without_panicking() {
        let mut engine = engine();
        // One loud frame, then nothing but gaps.
        let loud = frame_at(vec![1.0; 512], 0, 0.0);
        engine.tick(Some(&loud), 0.0);
        let mut prev_amplitude = f32::MAX;
        for i in 1..120 {
            let out = engine.tick(None, i as f64 / 60.0);
            assert!(out.amplitude <= prev_amplitude);
            assert!(out.bands.iter().all(|b| b.is_finite()));
            prev_amplitude = out.amplitude;
        }
    }

    #[test]
    fn hot_swapped_config_applies_next_tick() {
        let mut engine = engine();
        engine
            .apply_config(EngineConfig::preset("edm").unwrap())
            .unwrap();
        assert_eq!(engine.config().bass_weight, 0.8);
        engine
            .apply_config(EngineConfig {
                attack: 2.0,
                ..EngineConfig::default()
            })
            .unwrap_err();
        // Rejected config leaves the previous one in place.
        assert_eq!(engine.config().bass_weight, 0.8);
    }
}
