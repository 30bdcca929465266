use super::SpectralFrame;

pub const BAND_COUNT: usize = 5;

/// Energy per band, indexed Bass, Low-Mid, Mid, High-Mid, High.
pub type BandSet = [f32; BAND_COUNT];

/// Band edges in Hz. The Bass lower edge assumes the FFT can resolve
/// 40 Hz; when it cannot, extraction clamps to the first non-DC bin.
pub const BAND_EDGES_HZ: [(f32, f32); BAND_COUNT] = [
    (40.0, 250.0),     // Bass
    (250.0, 500.0),    // Low-Mid
    (500.0, 2000.0),   // Mid
    (2000.0, 6000.0),  // High-Mid
    (6000.0, 20000.0), // High
];

/// Aggregates spectral magnitude bins into the fixed band layout.
/// Pure function of the input frame; raw output is non-negative and
/// unbounded (normalization happens downstream).
pub struct BandExtractor;

impl BandExtractor {
    pub fn extract(frame: &SpectralFrame) -> BandSet {
        let len = frame.magnitudes.len();
        let mut bands = [0.0f32; BAND_COUNT];
        if len == 0 {
            return bands;
        }

        // magnitudes hold fft_size/2 bins, so bin width = sample_rate / fft_size
        let bin_width = frame.sample_rate / (2.0 * len as f32);

        for (i, &(lo_hz, hi_hz)) in BAND_EDGES_HZ.iter().enumerate() {
            // Skip the DC bin; a lower edge the FFT cannot resolve is
            // clamped to the first real bin rather than treated as an error.
            let lo_bin = ((lo_hz / bin_width) as usize).max(1);
            let hi_bin = ((hi_hz / bin_width) as usize).min(len);
            bands[i] = Self::average_range(&frame.magnitudes, lo_bin, hi_bin);
        }

        bands
    }

    fn average_range(data: &[f32], start: usize, end: usize) -> f32 {
        if start >= end || start >= data.len() {
            return 0.0;
        }

        let end = end.min(data.len());
        let sum: f32 = data[start..end].iter().sum();
        sum / (end - start) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(magnitudes: Vec<f32>, sample_rate: f32) -> SpectralFrame {
        SpectralFrame {
            magnitudes,
            sample_rate,
            timestamp: 0.0,
            seq: 0,
        }
    }

    #[test]
    fn zero_spectrum_gives_zero_bands() {
        let f = frame(vec![0.0; 512], 44100.0);
        assert_eq!(BandExtractor::extract(&f), [0.0; BAND_COUNT]);
    }

    #[test]
    fn energy_lands_in_the_right_band() {
        // 1024-pt FFT at 44.1 kHz: bin width ~43 Hz. Put energy at ~1 kHz.
        let mut magnitudes = vec![0.0; 512];
        let bin_width = 44100.0 / 1024.0;
        let bin = (1000.0 / bin_width) as usize;
        magnitudes[bin] = 1.0;

        let bands = BandExtractor::extract(&frame(magnitudes, 44100.0));
        assert!(bands[2] > 0.0, "Mid band should see the 1 kHz energy");
        assert_eq!(bands[0], 0.0);
        assert_eq!(bands[4], 0.0);
    }

    #[test]
    fn coarse_fft_clamps_bass_to_first_bin() {
        // 64-pt FFT at 44.1 kHz: bin width ~689 Hz, far too coarse for 40 Hz.
        let mut magnitudes = vec![0.0; 32];
        magnitudes[1] = 2.0;
        let bands = BandExtractor::extract(&frame(magnitudes, 44100.0));
        // The Bass band degenerates but must not panic or go negative.
        assert!(bands.iter().all(|&b| b >= 0.0));
    }

    #[test]
    fn average_not_sum() {
        let mut magnitudes = vec![0.0; 512];
        let bin_width = 44100.0 / 1024.0;
        let lo = (500.0 / bin_width) as usize;
        let hi = (2000.0 / bin_width) as usize;
        for bin in lo..hi {
            magnitudes[bin] = 1.0;
        }
        let bands = BandExtractor::extract(&frame(magnitudes, 44100.0));
        assert!((bands[2] - 1.0).abs() < 1e-5, "uniform fill averages to 1.0");
    }
}
