use super::bands::{BandSet, BAND_COUNT};
use crate::config::EngineConfig;

/// Running peak estimate for one band. The peak is captured instantly and
/// decays exponentially toward a floor, so quiet passages regain
/// sensitivity within a few seconds without the gain ever exploding.
#[derive(Debug, Clone, Copy)]
struct AgcState {
    band_max: f32,
}

impl AgcState {
    fn new(floor: f32) -> Self {
        Self { band_max: floor }
    }

    fn normalize(&mut self, raw: f32, decay: f32, floor: f32) -> f32 {
        if raw >= self.band_max {
            self.band_max = raw;
        } else {
            self.band_max = (self.band_max * decay).max(floor);
        }
        (raw / self.band_max).min(1.0)
    }
}

/// Per-band adaptive gain control. Maps unbounded raw band energy to a
/// comparable [0, 1] signal independently per band, so a quiet treble
/// region is not swamped by a loud bass region.
pub struct BandNormalizer {
    states: [AgcState; BAND_COUNT],
}

impl BandNormalizer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            states: [AgcState::new(config.agc_floor); BAND_COUNT],
        }
    }

    pub fn normalize(&mut self, raw: &BandSet, config: &EngineConfig) -> BandSet {
        let mut out = [0.0f32; BAND_COUNT];
        for (i, state) in self.states.iter_mut().enumerate() {
            out[i] = state.normalize(raw[i], config.agc_decay, config.agc_floor);
        }
        out
    }

    /// Drops the learned peaks back to the floor. Only called on explicit
    /// recalibration; AGC state persists across everything else.
    pub fn recalibrate(&mut self, config: &EngineConfig) {
        self.states = [AgcState::new(config.agc_floor); BAND_COUNT];
    }
}

/// Asymmetric attack/release smoothing. Attacks are near-immediate,
/// decays are gentle, which keeps the output percussive without visual
/// jitter. Must run exactly once per band per frame or the IIR
/// coefficients double-apply.
pub struct EnvelopeFollower {
    smoothed: BandSet,
}

impl EnvelopeFollower {
    pub fn new() -> Self {
        Self {
            smoothed: [0.0; BAND_COUNT],
        }
    }

    pub fn follow(&mut self, normalized: &BandSet, config: &EngineConfig) -> BandSet {
        for (s, &x) in self.smoothed.iter_mut().zip(normalized.iter()) {
            let coeff = if x > *s { config.attack } else { config.release };
            *s += (x - *s) * coeff;
        }
        self.smoothed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn normalized_stays_in_unit_range() {
        let cfg = config();
        let mut agc = BandNormalizer::new(&cfg);
        let inputs: [BandSet; 4] = [
            [0.0; 5],
            [1000.0, 0.5, 0.001, 3.0, 0.0],
            [0.0001; 5],
            [f32::MAX / 2.0, 1.0, 1.0, 1.0, 1.0],
        ];
        for raw in &inputs {
            let n = agc.normalize(raw, &cfg);
            assert!(n.iter().all(|&v| (0.0..=1.0).contains(&v)), "{n:?}");
        }
    }

    #[test]
    fn peak_capture_is_instant() {
        let cfg = config();
        let mut state = AgcState::new(cfg.agc_floor);
        let n = state.normalize(5.0, cfg.agc_decay, cfg.agc_floor);
        assert_eq!(n, 1.0);
        assert_eq!(state.band_max, 5.0);
    }

    #[test]
    fn peak_decay_is_monotonic_and_floored() {
        let cfg = config();
        let mut state = AgcState::new(cfg.agc_floor);
        state.normalize(1.0, cfg.agc_decay, cfg.agc_floor);

        let mut prev = state.band_max;
        for _ in 0..20_000 {
            state.normalize(0.0, cfg.agc_decay, cfg.agc_floor);
            assert!(state.band_max <= prev, "band_max must not grow in silence");
            assert!(state.band_max >= cfg.agc_floor, "band_max must respect the floor");
            prev = state.band_max;
        }
        assert_eq!(state.band_max, cfg.agc_floor);
    }

    #[test]
    fn silence_normalizes_to_zero_without_nan() {
        let cfg = config();
        let mut agc = BandNormalizer::new(&cfg);
        for _ in 0..100 {
            let n = agc.normalize(&[0.0; 5], &cfg);
            assert!(n.iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn recalibrate_resets_peaks() {
        let cfg = config();
        let mut agc = BandNormalizer::new(&cfg);
        agc.normalize(&[10.0; 5], &cfg);
        agc.recalibrate(&cfg);
        // A small signal right after recalibration normalizes to full scale.
        let n = agc.normalize(&[0.01; 5], &cfg);
        assert!(n.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn envelope_attack_faster_than_release() {
        let cfg = config();
        let mut env = EnvelopeFollower::new();
        let up = env.follow(&[1.0; 5], &cfg);
        let rise = up[0];
        let down = env.follow(&[0.0; 5], &cfg);
        let fall = rise - down[0];
        assert!(rise > fall, "attack step {rise} should exceed release step {fall}");
    }

    #[test]
    fn envelope_bounded_by_input_range() {
        let cfg = config();
        let mut env = EnvelopeFollower::new();
        for i in 0..1000 {
            let x = if i % 7 == 0 { 1.0 } else { 0.0 };
            let s = env.follow(&[x; 5], &cfg);
            assert!(s.iter().all(|&v| (0.0..=1.0).contains(&v)));
        }
    }
}
