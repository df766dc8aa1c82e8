//! Drowsiness Monitor - Main Entry Point

mod config;
mod renderer;

use std::io::BufRead;
use std::path::PathBuf;

use alerting::AlarmPlayer;
use anyhow::{anyhow, Context};
use camera_capture::{open_source, VideoSource};
use clap::Parser;
use dms::{
    FramePipeline, OnnxLandmarkExtractor, Preset, RunSummary, SeetaFaceDetector, StopHandle,
};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::AppConfig;
use crate::renderer::LogRenderer;

/// Watch a video source and sound an alarm when the driver's eyes stay closed.
#[derive(Parser, Debug)]
#[command(name = "drowsiness-monitor", version)]
pub struct Cli {
    /// Path to the alarm .WAV file, or "no" to disable sound [default: alarm.wav]
    #[arg(short, long)]
    pub alarm: Option<String>,

    /// Index of the webcam, or path to a video file / frame directory [default: 0]
    #[arg(short = 'v', long)]
    pub webcam: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Threshold preset: default, strict (0.20 / 30) or lenient (0.15 / 90)
    #[arg(long)]
    pub preset: Option<Preset>,

    /// EAR below which the eyes count as closed [default: 0.17]
    #[arg(long)]
    pub ear_threshold: Option<f64>,

    /// Consecutive closed frames before the alarm [default: 60]
    #[arg(long)]
    pub consec_frames: Option<u32>,

    /// SeetaFace detector model
    #[arg(long)]
    pub face_model: Option<PathBuf>,

    /// 68-point landmark ONNX model
    #[arg(long)]
    pub landmark_model: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error) [default: info]
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Initialize tracing with the configured level
fn init_logging(level: &str) -> anyhow::Result<()> {
    let level: Level = level
        .parse()
        .map_err(|_| anyhow!("invalid log level: {}", level))?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("setting tracing subscriber")
}

/// Stop when "q" is entered on stdin
fn spawn_quit_listener(stop: StopHandle) {
    let spawned = std::thread::Builder::new()
        .name("quit-listener".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) if line.trim().eq_ignore_ascii_case("q") => {
                        info!("Quit requested");
                        stop.request_stop();
                        break;
                    }
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        });

    if let Err(e) = spawned {
        debug!("Quit listener unavailable: {}", e);
    }
}

/// Build the pipeline and run the frame loop on the current thread
fn run(config: AppConfig, stop: StopHandle) -> anyhow::Result<RunSummary> {
    let source: VideoSource = config.source.parse()?;

    let face_detector = SeetaFaceDetector::new(&config.dms)?;
    let landmark_extractor = OnnxLandmarkExtractor::new(&config.dms)?;

    info!("Starting video stream from {}", source);
    let frames = open_source(&source)?;

    let alarm = AlarmPlayer::from_config(&config.alarm);
    let mut pipeline = FramePipeline::new(
        config.dms,
        frames,
        face_detector,
        landmark_extractor,
        LogRenderer::new(),
        alarm,
    )?;

    Ok(pipeline.run(&stop)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_cli(&cli);

    init_logging(&config.log_level)?;

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    debug!("Configuration: {:?}", config);

    let stop = StopHandle::new();
    spawn_quit_listener(stop.clone());

    let interrupt = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping");
            interrupt.request_stop();
        }
    });

    let summary = tokio::task::spawn_blocking(move || run(config, stop))
        .await
        .context("frame loop panicked")??;

    info!(
        "Processed {} frames, {} drowsiness alarms ({:?})",
        summary.frames_processed, summary.alarms_started, summary.ended_by
    );
    info!("Cleaned up!");

    Ok(())
}
