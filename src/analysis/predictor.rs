use crate::config::EngineConfig;

/// Fraction of a beat period around a whole-beat boundary that counts as
/// "on the beat".
const PHASE_TOLERANCE: f32 = 0.10;
/// The current onset must be at least this fraction of the rolling mean,
/// i.e. something is happening, just not enough to clear the strict
/// threshold.
const ONSET_MEAN_RATIO: f32 = 0.8;

/// Synthesizes a beat when detection likely missed one: extrapolates beat
/// phase from the tempo estimate and fills the gap only while the tempo is
/// trusted. A deliberate precision/recall tradeoff that keeps visual
/// rhythm continuous through passages with weak but real percussive
/// content.
pub struct BeatPredictor;

impl BeatPredictor {
    pub fn new() -> Self {
        Self
    }

    /// Decide whether to synthesize a beat this frame. Only called when no
    /// real beat fired and the refractory period has elapsed.
    pub fn should_predict(
        &self,
        onset: f32,
        onset_mean: f32,
        time_since_last_beat: f64,
        bpm: f32,
        confidence: f32,
        config: &EngineConfig,
    ) -> bool {
        if confidence <= config.prediction_gate || bpm <= 0.0 {
            return false;
        }

        let period = 60.0 / bpm as f64;
        let phase = time_since_last_beat / period;
        let frac = (phase.fract()) as f32;
        let near_boundary = frac < PHASE_TOLERANCE || frac > 1.0 - PHASE_TOLERANCE;
        if !near_boundary {
            return false;
        }

        onset > onset_mean * ONSET_MEAN_RATIO && onset_mean > 0.0
    }
}
