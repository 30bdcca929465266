use super::bands::BandSet;
use crate::config::EngineConfig;
use std::collections::VecDeque;

/// Total capacity of the onset history ring; the statistics window below
/// only ever looks at the most recent slice of it.
const HISTORY_CAP: usize = 256;
/// Rolling mean/stddev window, ~1 second at 60 Hz.
const STATS_WINDOW: usize = 60;
/// Below this many samples detection abstains entirely.
const MIN_SAMPLES: usize = 5;
/// Strict local-maximum lookback.
const LOCAL_MAX_WINDOW: usize = 5;

const EPSILON: f32 = 1e-6;

/// Computes the scalar onset-strength signal from band energy deltas.
///
/// Deltas are half-wave rectified: energy decreases never contribute, or
/// every decay tail would register as a false onset. Bass flux is weighted
/// up because kick content anchors rhythm in most material.
pub struct OnsetSignalBuilder {
    prev_bass: f32,
    prev_total: f32,
}

impl OnsetSignalBuilder {
    pub fn new() -> Self {
        Self {
            prev_bass: 0.0,
            prev_total: 0.0,
        }
    }

    pub fn build(&mut self, bands: &BandSet, config: &EngineConfig) -> f32 {
        let bass = bands[0];
        let total: f32 = bands.iter().sum();

        let bass_flux = (bass - self.prev_bass).max(0.0);
        let full_flux = (total - self.prev_total).max(0.0);

        self.prev_bass = bass;
        self.prev_total = total;

        bass_flux * config.bass_weight + full_flux * (1.0 - config.bass_weight)
    }
}

/// Per-frame beat decision: adaptive threshold over recent onset history
/// plus a strict local-maximum test. Both are required; the local maximum
/// alone rejects sustained loud-but-flat passages, and the threshold alone
/// would fire on every frame of a sustained loud note.
///
/// The refractory period is enforced by the engine, which owns the
/// last-beat clock shared with the predictor.
pub struct PeakPicker {
    history: VecDeque<f32>,
}

impl PeakPicker {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(HISTORY_CAP),
        }
    }

    /// Observe this frame's onset value and decide whether it qualifies as
    /// a beat. Returns the beat intensity when it does.
    pub fn process(&mut self, onset: f32, config: &EngineConfig) -> Option<f32> {
        let is_local_max = self
            .history
            .iter()
            .rev()
            .take(LOCAL_MAX_WINDOW)
            .all(|&prev| onset >= prev);

        self.history.push_back(onset);
        if self.history.len() > HISTORY_CAP {
            self.history.pop_front();
        }

        // Insufficient history is not an error, just "no beat possible yet".
        if self.history.len() < MIN_SAMPLES {
            return None;
        }

        let (mean, stddev) = self.window_stats();
        // Zero variance collapses the threshold to its floor, never to a
        // division by zero downstream.
        let threshold = (mean + stddev * config.threshold_k).max(config.threshold_floor);

        if is_local_max && onset > threshold {
            let intensity = ((onset - threshold) / mean.max(EPSILON)).clamp(0.0, 1.0);
            Some(intensity)
        } else {
            None
        }
    }

    /// Rolling mean over the statistics window; the predictor uses this to
    /// check that something is still happening at expected beat times.
    pub fn rolling_mean(&self) -> f32 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.window_stats().0
    }

    fn window_stats(&self) -> (f32, f32) {
        let n = self.history.len().min(STATS_WINDOW);
        let window = self.history.iter().rev().take(n);
        let mean = window.clone().sum::<f32>() / n as f32;
        let variance = window.map(|&x| (x - mean) * (x - mean)).sum::<f32>() / n as f32;
        (mean, variance.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn negative_deltas_do_not_contribute() {
        let cfg = config();
        let mut builder = OnsetSignalBuilder::new();
        builder.build(&[1.0, 1.0, 1.0, 1.0, 1.0], &cfg);
        // Every band drops: pure decay must produce zero onset strength.
        let onset = builder.build(&[0.5, 0.5, 0.5, 0.5, 0.5], &cfg);
        assert_eq!(onset, 0.0);
    }

    #[test]
    fn bass_weight_blends_fluxes() {
        let cfg = EngineConfig {
            bass_weight: 1.0,
            ..config()
        };
        let mut builder = OnsetSignalBuilder::new();
        builder.build(&[0.0; 5], &cfg);
        // Only non-bass bands rise: with full bass weight the onset is zero.
        let onset = builder.build(&[0.0, 0.5, 0.5, 0.5, 0.5], &cfg);
        assert_eq!(onset, 0.0);
    }

    #[test]
    fn abstains_below_minimum_history() {
        let cfg = config();
        let mut picker = PeakPicker::new();
        for _ in 0..MIN_SAMPLES - 1 {
            assert!(picker.process(10.0, &cfg).is_none());
        }
    }

    #[test]
    fn spike_over_quiet_history_is_a_beat() {
        let cfg = config();
        let mut picker = PeakPicker::new();
        for _ in 0..30 {
            picker.process(0.001, &cfg);
        }
        let beat = picker.process(0.5, &cfg);
        assert!(beat.is_some());
        let intensity = beat.unwrap();
        assert!((0.0..=1.0).contains(&intensity));
        assert!(intensity > 0.5, "a huge spike over quiet history saturates intensity");
    }

    #[test]
    fn flat_loud_signal_never_fires() {
        // Constant onset: threshold floor sits at mean (stddev 0), and the
        // value never exceeds mean + floor logic strictly while flat.
        let cfg = config();
        let mut picker = PeakPicker::new();
        for _ in 0..200 {
            assert!(picker.process(0.5, &cfg).is_none());
        }
    }

    #[test]
    fn near_silence_suppressed_by_floor() {
        let cfg = config();
        let mut picker = PeakPicker::new();
        for _ in 0..60 {
            picker.process(0.0, &cfg);
        }
        // A tiny wiggle above a dead-flat history is a local max above
        // mean + k*stddev, but sits below the absolute floor.
        assert!(picker.process(0.01, &cfg).is_none());
    }

    #[test]
    fn local_maximum_required() {
        let cfg = config();
        let mut picker = PeakPicker::new();
        for _ in 0..30 {
            picker.process(0.001, &cfg);
        }
        picker.process(0.8, &cfg);
        // Strong but below the immediately preceding value: not a peak.
        assert!(picker.process(0.6, &cfg).is_none());
    }

    #[test]
    fn zero_variance_threshold_is_finite() {
        let cfg = config();
        let mut picker = PeakPicker::new();
        for _ in 0..60 {
            picker.process(0.0, &cfg);
        }
        let beat = picker.process(1.0, &cfg);
        assert!(beat.is_some(), "spike over flat-zero history must still detect");
        assert!(beat.unwrap().is_finite());
    }
}
