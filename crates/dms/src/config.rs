//! DMS configuration

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DmsError;

/// Named threshold sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    #[default]
    Default,
    Strict,
    Lenient,
}

impl FromStr for Preset {
    type Err = DmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Preset::Default),
            "strict" => Ok(Preset::Strict),
            "lenient" => Ok(Preset::Lenient),
            other => Err(DmsError::Config(format!(
                "unknown preset '{}' (expected default, strict or lenient)",
                other
            ))),
        }
    }
}

/// DMS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Averaged EAR below this counts as eyes closed
    pub ear_threshold: f64,

    /// Consecutive eyes-closed frames before the alarm fires
    pub consec_frames: u32,

    /// Frames are resized to this width before detection
    pub frame_width: u32,

    /// Pause after opening a live source (milliseconds)
    pub warmup_ms: u64,

    /// Smallest face the detector looks for (pixels)
    pub min_face_size: u32,

    /// Face detector score threshold
    pub face_score_threshold: f64,

    /// Model paths
    pub face_model_path: Option<String>,
    pub landmark_model_path: Option<String>,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.17,
            consec_frames: 60,
            frame_width: 450,
            warmup_ms: 1000,
            min_face_size: 40,
            face_score_threshold: 2.0,
            face_model_path: None,
            landmark_model_path: None,
        }
    }
}

impl DmsConfig {
    /// Create strict config (alarm after ~1s at 30fps)
    pub fn strict() -> Self {
        Self {
            ear_threshold: 0.20,
            consec_frames: 30,
            ..Default::default()
        }
    }

    /// Create lenient config (alarm after ~3s at 30fps)
    pub fn lenient() -> Self {
        Self {
            ear_threshold: 0.15,
            consec_frames: 90,
            ..Default::default()
        }
    }

    /// Config for a named preset
    pub fn preset(preset: Preset) -> Self {
        match preset {
            Preset::Default => Self::default(),
            Preset::Strict => Self::strict(),
            Preset::Lenient => Self::lenient(),
        }
    }

    /// Take the thresholds of `preset`, keeping everything else
    pub fn apply_preset(&mut self, preset: Preset) {
        let thresholds = Self::preset(preset);
        self.ear_threshold = thresholds.ear_threshold;
        self.consec_frames = thresholds.consec_frames;
    }

    /// Reject values the state machine cannot work with
    pub fn validate(&self) -> Result<(), DmsError> {
        if !self.ear_threshold.is_finite() || self.ear_threshold <= 0.0 {
            return Err(DmsError::Config(format!(
                "ear_threshold must be a positive number, got {}",
                self.ear_threshold
            )));
        }
        if self.consec_frames == 0 {
            return Err(DmsError::Config("consec_frames must be at least 1".into()));
        }
        if self.frame_width == 0 {
            return Err(DmsError::Config("frame_width must be at least 1".into()));
        }
        Ok(())
    }
}
