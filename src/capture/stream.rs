use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};

/// Microphone/loopback capture. Mixes interleaved channels down to mono,
/// accumulates fixed-size blocks, and hands them to the analysis thread
/// over a bounded channel. When the consumer falls behind, blocks are
/// dropped rather than queued: the analysis side wants "now", not a
/// backlog.
pub struct InputStream {
    // Held only to keep the capture callback alive; cpal streams stop when
    // dropped.
    _stream: Stream,
    receiver: Receiver<Vec<f32>>,
    sample_rate: f32,
}

impl InputStream {
    pub fn open(block_size: usize) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow::anyhow!("No input device available"))?;

        let config = device
            .default_input_config()
            .map_err(|e| anyhow::anyhow!("Failed to get default input config: {}", e))?;

        info!(
            "Using audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        info!("Audio config: {:?}", config);

        let sample_rate = config.sample_rate().0 as f32;
        let (sender, receiver) = crossbeam_channel::bounded(32);

        let stream = Self::create_input_stream(&device, &config.into(), sender, block_size)?;
        stream.play()?;

        Ok(Self {
            _stream: stream,
            receiver,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn receiver(&self) -> &Receiver<Vec<f32>> {
        &self.receiver
    }

    fn create_input_stream(
        device: &Device,
        config: &StreamConfig,
        sender: Sender<Vec<f32>>,
        block_size: usize,
    ) -> Result<Stream> {
        let channels = config.channels as usize;
        let sample_rate = config.sample_rate.0;

        info!(
            "Creating input stream with {} channels at {} Hz",
            channels, sample_rate
        );

        let mut pending: Vec<f32> = Vec::with_capacity(block_size * 2);

        let stream = device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if channels == 1 {
                    pending.extend_from_slice(data);
                } else {
                    pending.extend(
                        data.chunks(channels)
                            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                    );
                }

                while pending.len() >= block_size {
                    let block: Vec<f32> = pending.drain(..block_size).collect();
                    if sender.try_send(block).is_err() {
                        debug!("analysis behind, dropping audio block");
                    }
                }
            },
            |err| {
                warn!("Audio stream error: {}", err);
            },
            None,
        )?;

        Ok(stream)
    }
}
