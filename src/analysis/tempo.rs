use std::collections::VecDeque;

/// One detected or predicted beat. Never mutated after insertion; only
/// evicted once it ages out of the history window.
#[derive(Debug, Clone, Copy)]
pub struct BeatEvent {
    pub timestamp: f64,
    pub intensity: f32,
}

/// Beat history window in seconds.
const HISTORY_WINDOW_SECS: f64 = 10.0;
/// Minimum beats before any tempo estimate is attempted.
const MIN_BEATS: usize = 4;
/// Minimum plausible intervals required to trust the median.
const MIN_VALID_INTERVALS: usize = 3;
/// Plausible inter-beat interval range, exclusive: 30–200 BPM.
const MIN_INTERVAL_SECS: f32 = 0.3;
const MAX_INTERVAL_SECS: f32 = 2.0;
/// EMA coefficient for folding a new candidate into the estimate.
const SMOOTHING: f32 = 0.15;
/// Relative tolerance for treating a candidate as an octave error.
const OCTAVE_TOLERANCE: f32 = 0.08;
const DEFAULT_BPM: f32 = 120.0;

/// Derives BPM from inter-beat-interval history.
///
/// Uses the median interval rather than the mean: a single missed or
/// double-triggered beat produces one outlier interval, which the median
/// ignores and the mean would not. Candidates near half or double the
/// current estimate are folded back to the same octave before smoothing.
pub struct TempoEstimator {
    beats: VecDeque<BeatEvent>,
    bpm: f32,
    last_candidate: f32,
    confidence: f32,
}

impl TempoEstimator {
    pub fn new() -> Self {
        Self {
            beats: VecDeque::new(),
            bpm: DEFAULT_BPM,
            last_candidate: DEFAULT_BPM,
            confidence: 0.0,
        }
    }

    /// Smoothed tempo estimate; 120 BPM until sufficient history exists.
    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    /// How rhythmically regular recent beats are, [0, 1].
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Append a beat event, evict expired history, and re-estimate tempo
    /// when enough evidence has accumulated.
    pub fn push_beat(&mut self, event: BeatEvent) {
        while let Some(oldest) = self.beats.front() {
            if event.timestamp - oldest.timestamp > HISTORY_WINDOW_SECS {
                self.beats.pop_front();
            } else {
                break;
            }
        }
        self.beats.push_back(event);

        if self.beats.len() >= MIN_BEATS {
            self.reestimate();
        }
    }

    fn reestimate(&mut self) {
        let intervals = self.valid_intervals();
        if intervals.len() < MIN_VALID_INTERVALS {
            return;
        }

        let median = median(&intervals);
        let mut candidate = 60.0 / median;

        // Octave-error correction: a candidate near half or double the
        // current estimate is folded to its octave instead of letting the
        // smoothed value whiplash toward a doubled/halved tempo.
        if near(candidate, self.bpm * 2.0) {
            candidate /= 2.0;
        } else if near(candidate, self.bpm * 0.5) {
            candidate *= 2.0;
        }

        self.last_candidate = candidate;
        self.bpm = self.bpm * (1.0 - SMOOTHING) + candidate * SMOOTHING;
        self.confidence = interval_confidence(&intervals);
    }

    /// Successive inter-beat intervals, keeping only those inside the
    /// plausible tempo range. Out-of-range intervals are missed-beat or
    /// double-trigger artifacts, not tempo evidence.
    fn valid_intervals(&self) -> Vec<f32> {
        self.beats
            .iter()
            .zip(self.beats.iter().skip(1))
            .map(|(a, b)| (b.timestamp - a.timestamp) as f32)
            .filter(|&dt| dt > MIN_INTERVAL_SECS && dt < MAX_INTERVAL_SECS)
            .collect()
    }
}

/// Tight, consistent intervals (stddev near 0) yield confidence near 1;
/// erratic intervals collapse it to 0.
pub fn interval_confidence(intervals: &[f32]) -> f32 {
    const SCALE: f32 = 5.0;
    if intervals.is_empty() {
        return 0.0;
    }
    let n = intervals.len() as f32;
    let mean = intervals.iter().sum::<f32>() / n;
    let variance = intervals.iter().map(|&x| (x - mean) * (x - mean)).sum::<f32>() / n;
    (1.0 - variance.sqrt() * SCALE).clamp(0.0, 1.0)
}

fn median(values: &[f32]) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn near(candidate: f32, target: f32) -> bool {
    (candidate - target).abs() / target < OCTAVE_TOLERANCE
}
