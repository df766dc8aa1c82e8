//! Driver Monitoring System (DMS)
//!
//! Drowsiness detection from facial landmarks:
//! - Eye aspect ratio (EAR) from 68-point landmarks
//! - Debounced eyes-closed state machine
//! - Frame pipeline driving detection, state, alarm, and rendering

pub mod analysis;
pub mod config;
pub mod detector;
pub mod geometry;
pub mod pipeline;
pub mod state;

pub use analysis::{FaceReading, FrameAnalysis, Overlay};
pub use config::{DmsConfig, Preset};
pub use detector::{
    FaceDetector, FaceRegion, LandmarkExtractor, OnnxLandmarkExtractor, SeetaFaceDetector,
};
pub use geometry::{eye_aspect_ratio, FaceObservation, Point};
pub use pipeline::{FramePipeline, FrameRenderer, PipelineError, RunSummary, StopHandle, StopReason};
pub use state::{DriverState, DrowsinessPhase, StateTransition};

use thiserror::Error;

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Invalid landmark input: {0}")]
    InvalidInput(String),

    #[error("Degenerate eye geometry: zero horizontal eye width")]
    DegenerateGeometry,

    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),
}
