//! Frame pipeline
//!
//! One synchronous loop: read a frame, resize it, find faces, reduce each
//! face to an EAR, advance the shared driver state, fire the alarm on the
//! activation edge, and hand the frame plus overlays to the renderer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alerting::AlarmPlayer;
use camera_capture::frame::VideoFrame;
use camera_capture::source::FrameSource;
use camera_capture::CameraError;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::analysis::{FaceReading, FrameAnalysis, Overlay};
use crate::detector::{FaceDetector, FaceRegion, LandmarkExtractor};
use crate::geometry::FaceObservation;
use crate::state::DriverState;
use crate::{DmsConfig, DmsError};

/// Pipeline error types
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Video source error: {0}")]
    Source(#[from] CameraError),

    #[error(transparent)]
    Dms(#[from] DmsError),
}

/// Receives each processed frame
pub trait FrameRenderer {
    /// Show the frame; return `true` to stop the loop
    fn render(&mut self, frame: &VideoFrame, analysis: &FrameAnalysis) -> bool;
}

/// Cross-thread stop request, checked once per frame
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Stop handle or renderer asked to stop
    StopRequested,
    /// File source ran out of frames
    EndOfStream,
}

/// Totals for a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub alarms_started: u64,
    pub ended_by: StopReason,
}

/// Drowsiness monitoring pipeline
pub struct FramePipeline<S, D, L, R> {
    config: DmsConfig,
    source: S,
    face_detector: D,
    landmark_extractor: L,
    renderer: R,
    state: DriverState,
    alarm: AlarmPlayer,
}

impl<S, D, L, R> FramePipeline<S, D, L, R>
where
    S: FrameSource,
    D: FaceDetector,
    L: LandmarkExtractor,
    R: FrameRenderer,
{
    /// Create a pipeline with a fresh driver state
    pub fn new(
        config: DmsConfig,
        source: S,
        face_detector: D,
        landmark_extractor: L,
        renderer: R,
        alarm: AlarmPlayer,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            state: DriverState::from_config(&config),
            config,
            source,
            face_detector,
            landmark_extractor,
            renderer,
            alarm,
        })
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    pub fn alarm(&self) -> &AlarmPlayer {
        &self.alarm
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Scale a captured frame to the working width
    pub fn prepare_frame(&self, frame: VideoFrame) -> VideoFrame {
        if frame.width == self.config.frame_width {
            return frame;
        }
        match frame.resize_to_width(self.config.frame_width) {
            Ok(resized) => resized,
            Err(e) => {
                warn!("Frame {} not resized: {}", frame.sequence, e);
                frame
            }
        }
    }

    /// Analyze one prepared frame and advance the driver state
    pub fn analyze(&mut self, frame: &VideoFrame) -> FrameAnalysis {
        let faces = match self.face_detector.detect_faces(frame) {
            Ok(faces) => faces,
            Err(e) => {
                warn!("Face detection failed on frame {}: {}", frame.sequence, e);
                Vec::new()
            }
        };

        let mut analysis = FrameAnalysis {
            sequence: frame.sequence,
            faces_detected: faces.len(),
            ..Default::default()
        };
        let mut render_alert = false;

        // No faces: the state is left exactly as the previous frame left it
        for face in &faces {
            let ear = match self.face_ear(frame, face) {
                Ok(ear) => ear,
                Err(e) => {
                    warn!("Skipping face on frame {}: {}", frame.sequence, e);
                    continue;
                }
            };

            let transition = self.state.update(ear);
            if transition.alarm_started {
                analysis.alarms_started += 1;
                self.alarm.trigger();
            }
            render_alert |= transition.render_alert;

            analysis.readings.push(FaceReading { region: *face, ear });
        }

        if render_alert {
            analysis.overlays.push(Overlay::alert());
        }
        analysis
            .overlays
            .extend(analysis.readings.iter().map(|r| Overlay::ear(r.ear)));

        analysis.phase = self.state.phase();
        analysis.consecutive_low_count = self.state.consecutive_low_count();

        debug!(
            "Frame {}: {} faces, phase {:?}, low count {}",
            analysis.sequence, analysis.faces_detected, analysis.phase,
            analysis.consecutive_low_count
        );

        analysis
    }

    /// Resize, analyze, and return the frame the analysis refers to
    pub fn process_frame(&mut self, frame: VideoFrame) -> (VideoFrame, FrameAnalysis) {
        let frame = self.prepare_frame(frame);
        let analysis = self.analyze(&frame);
        (frame, analysis)
    }

    fn face_ear(&mut self, frame: &VideoFrame, face: &FaceRegion) -> Result<f64, DmsError> {
        let landmarks = self.landmark_extractor.extract_landmarks(frame, face)?;
        FaceObservation::from_landmarks(&landmarks)?.average_ear()
    }

    /// Run until stopped or the source runs out
    pub fn run(&mut self, stop: &StopHandle) -> Result<RunSummary, PipelineError> {
        if self.source.is_live() && self.config.warmup_ms > 0 {
            info!("Waiting {}ms for the camera to warm up", self.config.warmup_ms);
            std::thread::sleep(Duration::from_millis(self.config.warmup_ms));
        }

        info!("Starting frame loop");
        let mut frames_processed = 0u64;
        let mut alarms_started = 0u64;

        let ended_by = loop {
            if stop.is_stop_requested() {
                break StopReason::StopRequested;
            }

            let frame = match self.source.read_frame() {
                Ok(frame) => frame,
                Err(CameraError::EndOfStream) => break StopReason::EndOfStream,
                // A live capture keeps going after a dropped frame
                Err(CameraError::Stream(e)) if self.source.is_live() => {
                    warn!("Live source error, waiting for the next frame: {}", e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let (frame, analysis) = self.process_frame(frame);
            frames_processed += 1;
            alarms_started += u64::from(analysis.alarms_started);

            if self.renderer.render(&frame, &analysis) {
                break StopReason::StopRequested;
            }
        };

        info!(
            "Frame loop ended ({:?}) after {} frames, {} alarms",
            ended_by, frames_processed, alarms_started
        );

        Ok(RunSummary {
            frames_processed,
            alarms_started,
            ended_by,
        })
    }
}
