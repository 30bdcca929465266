use anyhow::Result;
use beatflux::{AnalysisPipeline, EngineConfig};
use clap::Parser;
use log::{debug, info};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "beatflux")]
#[command(about = "Real-time audio analysis and beat detection for visual renderers")]
struct Args {
    /// Named preset to start with
    #[arg(long, default_value = "default")]
    preset: String,

    /// JSON config file (takes precedence over --preset)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop after this many seconds (runs until killed when absent)
    #[arg(long)]
    duration: Option<f32>,

    /// Emit one JSON line per analysis frame instead of log output
    #[arg(long)]
    json: bool,

    /// List available presets and exit
    #[arg(long)]
    list_presets: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.list_presets {
        for name in EngineConfig::preset_names() {
            println!("{name}");
        }
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::preset(&args.preset)?,
    };

    info!("Starting beatflux (preset '{}')", args.preset);
    let pipeline = AnalysisPipeline::spawn(config)?;

    let started = Instant::now();
    let mut last_seen = 0u64;

    loop {
        std::thread::sleep(Duration::from_millis(16));

        let frame = pipeline.latest_frame();
        if frame.frame != last_seen {
            last_seen = frame.frame;

            if args.json {
                println!("{}", serde_json::to_string(&frame)?);
            } else {
                if frame.is_beat {
                    info!(
                        "beat  intensity={:.2} bpm={:.1} confidence={:.2}",
                        frame.beat_intensity, frame.bpm, frame.confidence
                    );
                }
                if frame.frame % 120 == 0 {
                    debug!(
                        "bands=[{:.2} {:.2} {:.2} {:.2} {:.2}] amplitude={:.2} bpm={:.1}",
                        frame.bands[0],
                        frame.bands[1],
                        frame.bands[2],
                        frame.bands[3],
                        frame.bands[4],
                        frame.amplitude,
                        frame.bpm
                    );
                }
            }
        }

        if let Some(duration) = args.duration {
            if started.elapsed().as_secs_f32() >= duration {
                break;
            }
        }
    }

    info!("Shutting down");
    Ok(())
}
