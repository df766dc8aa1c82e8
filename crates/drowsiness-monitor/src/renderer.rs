//! Log-based frame renderer

use camera_capture::VideoFrame;
use dms::{FrameAnalysis, FrameRenderer};
use tracing::{debug, info, warn};

/// Renders overlays to the log instead of a window.
///
/// Per-frame overlay text goes to debug; alert start and clear go to
/// info/warn so a plain run only shows state changes.
#[derive(Debug, Default)]
pub struct LogRenderer {
    alert_shown: bool,
    face_visible: bool,
    frames: u64,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn alert_shown(&self) -> bool {
        self.alert_shown
    }
}

impl FrameRenderer for LogRenderer {
    fn render(&mut self, frame: &VideoFrame, analysis: &FrameAnalysis) -> bool {
        self.frames += 1;

        for overlay in &analysis.overlays {
            debug!(
                "Frame {} ({}x{}) @ {:?}: {}",
                frame.sequence, frame.width, frame.height, overlay.position, overlay.text
            );
        }

        if analysis.face_detected() != self.face_visible {
            self.face_visible = analysis.face_detected();
            if self.face_visible {
                info!("Face in view");
            } else {
                info!("No face in view");
            }
        }

        let alert = analysis.has_alert();
        if alert && !self.alert_shown {
            warn!(
                "DROWSINESS ALERT! eyes closed for {} frames (EAR {:.2})",
                analysis.consecutive_low_count,
                analysis.min_ear().unwrap_or_default()
            );
        } else if !alert && self.alert_shown {
            info!("Alert cleared");
        }
        self.alert_shown = alert;

        false
    }
}
