//! Real-time audio analysis and beat detection engine.
//!
//! Ingests a continuous audio signal and produces, at a fixed high frame
//! rate, a compact set of normalized descriptors (per-band energy levels,
//! a beat trigger, beat strength, and a tempo estimate) suitable for
//! driving a downstream visual renderer. Everything is causal (no future
//! lookahead) and stays numerically stable under silence, clipping, and
//! abrupt volume changes without manual tuning.

pub mod analysis;
pub mod capture;
pub mod config;
pub mod pipeline;

pub use analysis::{AnalysisEngine, AnalysisFrame, SpectralFrame, BAND_COUNT};
pub use config::{ConfigError, EngineConfig};
pub use pipeline::AnalysisPipeline;
