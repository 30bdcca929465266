pub mod spectrum;
pub mod stream;

pub use spectrum::SpectrumAnalyzer;
pub use stream::InputStream;

/// Samples per capture block; also the FFT size, following the capture
/// cadence the analysis tick rate is derived from.
pub const BLOCK_SIZE: usize = 1024;
