//! DMS analysis results and overlay directives

use serde::{Deserialize, Serialize};

use crate::detector::FaceRegion;
use crate::state::DrowsinessPhase;

/// Alert banner text
pub const ALERT_TEXT: &str = "DROWSINESS ALERT!";

/// Where the alert banner goes
pub const ALERT_POSITION: (i32, i32) = (10, 30);

/// Where the EAR readout goes
pub const EAR_POSITION: (i32, i32) = (300, 30);

/// Text to draw on a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    pub text: String,
    /// Baseline origin in pixels of the resized frame
    pub position: (i32, i32),
}

impl Overlay {
    pub fn alert() -> Self {
        Self {
            text: ALERT_TEXT.to_string(),
            position: ALERT_POSITION,
        }
    }

    pub fn ear(value: f64) -> Self {
        Self {
            text: format!("EAR: {:.2}", value),
            position: EAR_POSITION,
        }
    }

    pub fn is_alert(&self) -> bool {
        self.text == ALERT_TEXT
    }
}

/// EAR of one face in one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceReading {
    pub region: FaceRegion,
    pub ear: f64,
}

/// Complete analysis of one frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameAnalysis {
    /// Frame sequence number
    pub sequence: u32,

    /// Faces the detector returned
    pub faces_detected: usize,

    /// Faces that produced an EAR
    pub readings: Vec<FaceReading>,

    /// State after this frame
    pub phase: DrowsinessPhase,

    /// Consecutive eyes-closed frames after this frame
    pub consecutive_low_count: u32,

    /// Alarm activation edges on this frame (one per face that crossed
    /// the threshold with the alarm inactive)
    pub alarms_started: u32,

    /// Directives for the renderer
    pub overlays: Vec<Overlay>,
}

impl FrameAnalysis {
    pub fn face_detected(&self) -> bool {
        self.faces_detected > 0
    }

    /// Check if the alert banner is shown
    pub fn has_alert(&self) -> bool {
        self.overlays.iter().any(Overlay::is_alert)
    }

    /// Lowest EAR across faces
    pub fn min_ear(&self) -> Option<f64> {
        self.readings.iter().map(|r| r.ear).reduce(f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ear_overlay_format() {
        let overlay = Overlay::ear(0.1666);
        assert_eq!(overlay.text, "EAR: 0.17");
        assert_eq!(overlay.position, (300, 30));
        assert!(!overlay.is_alert());
    }

    #[test]
    fn test_alert_detection() {
        let mut analysis = FrameAnalysis::default();
        assert!(!analysis.has_alert());
        assert_eq!(analysis.min_ear(), None);

        analysis.overlays.push(Overlay::alert());
        assert!(analysis.has_alert());
        assert_eq!(analysis.overlays[0].position, (10, 30));
    }
}
