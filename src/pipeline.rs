use crate::analysis::{AnalysisEngine, AnalysisFrame};
use crate::capture::{InputStream, SpectrumAnalyzer, BLOCK_SIZE};
use crate::config::{ConfigError, EngineConfig};
use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Analysis cadence: one tick every ~16.7 ms.
const TICK: Duration = Duration::from_micros(16_667);

/// Capture-to-renderer plumbing around the engine.
///
/// Capture writes blocks from its own callback thread; a dedicated
/// analysis thread ticks the engine and publishes each completed frame
/// into a single-slot latest-value handoff. Consumers always see the most
/// recent frame, never a backlog, and capture is never blocked on
/// analysis.
pub struct AnalysisPipeline {
    latest: Arc<Mutex<AnalysisFrame>>,
    stop: Arc<AtomicBool>,
    config_tx: Sender<EngineConfig>,
    worker: Option<JoinHandle<()>>,
    // cpal streams are not Send; the stream lives with the pipeline owner
    // and feeds the worker through the channel.
    _input: InputStream,
}

impl AnalysisPipeline {
    pub fn spawn(config: EngineConfig) -> Result<Self> {
        let input = InputStream::open(BLOCK_SIZE)?;
        let sample_rate = input.sample_rate();

        let engine = AnalysisEngine::new(config)?;
        let spectrum = SpectrumAnalyzer::new(sample_rate, BLOCK_SIZE);

        let latest = Arc::new(Mutex::new(AnalysisFrame::default()));
        let stop = Arc::new(AtomicBool::new(false));
        let (config_tx, config_rx) = crossbeam_channel::unbounded();

        let blocks = input.receiver().clone();
        let worker = {
            let latest = Arc::clone(&latest);
            let stop = Arc::clone(&stop);
            std::thread::Builder::new()
                .name("beatflux-analysis".to_string())
                .spawn(move || worker_loop(engine, spectrum, blocks, config_rx, latest, stop))?
        };

        info!("analysis pipeline running at {} Hz capture", sample_rate);

        Ok(Self {
            latest,
            stop,
            config_tx,
            worker: Some(worker),
            _input: input,
        })
    }

    /// Latest completed analysis frame.
    pub fn latest_frame(&self) -> AnalysisFrame {
        *self.latest.lock().unwrap()
    }

    /// Validate and hand a new parameter set to the analysis thread; it is
    /// applied between ticks, never mid-frame.
    pub fn apply_config(&self, config: EngineConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let _ = self.config_tx.send(config);
        Ok(())
    }

    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for AnalysisPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    mut engine: AnalysisEngine,
    mut spectrum: SpectrumAnalyzer,
    blocks: Receiver<Vec<f32>>,
    config_rx: Receiver<EngineConfig>,
    latest: Arc<Mutex<AnalysisFrame>>,
    stop: Arc<AtomicBool>,
) {
    let started = Instant::now();

    while !stop.load(Ordering::Relaxed) {
        // Parameter swaps land at the top of the tick, so the frame below
        // always computes against one consistent snapshot.
        while let Ok(config) = config_rx.try_recv() {
            if let Err(e) = engine.apply_config(config) {
                warn!("rejected config swap: {}", e);
            }
        }

        let mut block = match blocks.recv_timeout(TICK) {
            Ok(block) => Some(block),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        // Newest block wins; anything older is stale by definition.
        while let Ok(newer) = blocks.try_recv() {
            block = Some(newer);
        }

        let now = started.elapsed().as_secs_f64();
        let frame = match &block {
            Some(samples) => {
                let spectral = spectrum.frame(samples, now);
                engine.tick(Some(&spectral), now)
            }
            None => engine.tick(None, now),
        };

        *latest.lock().unwrap() = frame;
    }
}
