//! Camera Capture Library for Drowsiness Monitoring
//!
//! Provides the frame types and frame sources consumed by the DMS pipeline.
//! Supports:
//! - File sources: a video file (via ffmpeg), a still image, an animated GIF,
//!   or a directory of frames
//! - Live sources: frames pushed by an external capture driver thread

pub mod frame;
pub mod source;
pub mod video;

pub use frame::VideoFrame;
pub use source::{open_source, FrameSource, ImageSequenceSource, LiveStream, VideoSource};
pub use video::FfmpegVideoSource;

use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open video source: {0}")]
    Open(String),

    #[error("Invalid frame: {0}")]
    Format(String),

    #[error("Streaming error: {0}")]
    Stream(String),

    /// File source has no more frames. Not a failure; ends the session.
    #[error("End of stream")]
    EndOfStream,
}

impl From<image::ImageError> for CameraError {
    fn from(err: image::ImageError) -> Self {
        CameraError::Format(err.to_string())
    }
}
