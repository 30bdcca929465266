use crate::analysis::SpectralFrame;
use rustfft::{num_complex::Complex, FftPlanner};
use std::sync::Arc;

/// Turns fixed-size sample blocks into magnitude spectra. This is the
/// capture-layer transform the analysis engine consumes; the engine never
/// sees raw samples.
pub struct SpectrumAnalyzer {
    sample_rate: f32,
    fft_size: usize,
    fft: Arc<dyn rustfft::Fft<f32>>,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    seq: u64,
}

impl SpectrumAnalyzer {
    pub fn new(sample_rate: f32, fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            sample_rate,
            fft_size,
            fft,
            window: Self::hann_window(fft_size),
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            seq: 0,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Window, transform, and package one block. Blocks shorter than the
    /// FFT size are zero-padded; longer blocks are truncated.
    pub fn frame(&mut self, samples: &[f32], timestamp: f64) -> SpectralFrame {
        let len = self.fft_size.min(samples.len());
        for i in 0..len {
            self.scratch[i] = Complex::new(samples[i] * self.window[i], 0.0);
        }
        for slot in self.scratch[len..].iter_mut() {
            *slot = Complex::new(0.0, 0.0);
        }

        self.fft.process(&mut self.scratch);

        let magnitudes: Vec<f32> = self.scratch[..self.fft_size / 2]
            .iter()
            .map(|c| c.norm() * 2.0 / self.fft_size as f32)
            .collect();

        self.seq += 1;
        SpectralFrame {
            magnitudes,
            sample_rate: self.sample_rate,
            timestamp,
            seq: self.seq,
        }
    }

    fn hann_window(size: usize) -> Vec<f32> {
        (0..size)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32;
                0.5 * (1.0 - phase.cos())
            })
            .collect()
    }
}
