//! Application configuration
//!
//! Layers, lowest priority first: built-in defaults, an optional TOML file,
//! `DROWSY__*` environment variables, then command-line flags.

use std::path::Path;

use alerting::AlarmConfig;
use anyhow::Context;
use config::{Config, Environment, File};
use dms::{DmsConfig, Preset};
use serde::{Deserialize, Serialize};

use crate::Cli;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "DROWSY";

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Webcam index or path to a video file / frame directory
    pub source: String,

    /// Log level: trace, debug, info, warn, error
    pub log_level: String,

    /// Threshold preset; replaces `dms.ear_threshold` and `dms.consec_frames`
    pub preset: Option<Preset>,

    pub dms: DmsConfig,

    pub alarm: AlarmConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: "0".to_string(),
            log_level: "info".to_string(),
            preset: None,
            dms: DmsConfig::default(),
            alarm: AlarmConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load defaults, then the file (if given), then the environment
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default()).context("encoding defaults")?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("loading configuration")?;

        config
            .try_deserialize()
            .context("parsing configuration")
    }

    /// Command-line flags win over every other layer. A preset (from the
    /// flag or the file) is applied before the explicit threshold flags.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(preset) = cli.preset.or(self.preset) {
            self.preset = Some(preset);
            self.dms.apply_preset(preset);
        }
        if let Some(alarm) = &cli.alarm {
            self.alarm.sound = alarm.parse().unwrap_or_default();
        }
        if let Some(webcam) = &cli.webcam {
            self.source = webcam.clone();
        }
        if let Some(threshold) = cli.ear_threshold {
            self.dms.ear_threshold = threshold;
        }
        if let Some(frames) = cli.consec_frames {
            self.dms.consec_frames = frames;
        }
        if let Some(model) = &cli.face_model {
            self.dms.face_model_path = Some(model.display().to_string());
        }
        if let Some(model) = &cli.landmark_model {
            self.dms.landmark_model_path = Some(model.display().to_string());
        }
        if let Some(level) = &cli.log_level {
            self.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_defaults_without_file() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.dms.consec_frames, 60);
        assert!((config.dms.ear_threshold - 0.17).abs() < 1e-9);
        assert_eq!(config.alarm.sound.path(), Some(Path::new("alarm.wav")));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
source = "clips/night_drive"

[dms]
ear_threshold = 0.21
consec_frames = 45
landmark_model_path = "models/landmarks.onnx"

[alarm]
sound = "no"
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.source, "clips/night_drive");
        assert_eq!(config.dms.consec_frames, 45);
        assert!((config.dms.ear_threshold - 0.21).abs() < 1e-9);
        assert_eq!(config.dms.frame_width, 450);
        assert_eq!(
            config.dms.landmark_model_path.as_deref(),
            Some("models/landmarks.onnx")
        );
        assert!(config.alarm.sound.is_disabled());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(AppConfig::load(Some(Path::new("/no/such/monitor.toml"))).is_err());
    }

    #[test]
    fn test_preset_then_explicit_flags() {
        let cli = Cli::parse_from([
            "drowsiness-monitor",
            "--preset",
            "lenient",
            "--ear-threshold",
            "0.12",
        ]);
        let mut config = AppConfig::default();
        config.apply_cli(&cli);
        assert_eq!(config.preset, Some(Preset::Lenient));
        assert_eq!(config.dms.consec_frames, 90);
        assert_eq!(config.dms.ear_threshold, 0.12);

        assert!(Cli::try_parse_from(["drowsiness-monitor", "--preset", "sleepy"]).is_err());
    }

    #[test]
    fn test_preset_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "preset = \"strict\"").unwrap();

        let mut config = AppConfig::load(Some(file.path())).unwrap();
        config.apply_cli(&Cli::parse_from(["drowsiness-monitor"]));
        assert_eq!(config.dms.consec_frames, 30);
        assert_eq!(config.dms.ear_threshold, 0.20);
    }

    #[test]
    fn test_cli_wins() {
        let cli = Cli::parse_from([
            "drowsiness-monitor",
            "--alarm",
            "no",
            "--webcam",
            "2",
            "--consec-frames",
            "15",
            "--landmark-model",
            "lm.onnx",
        ]);

        let mut config = AppConfig::default();
        config.apply_cli(&cli);
        assert!(config.alarm.sound.is_disabled());
        assert_eq!(config.source, "2");
        assert_eq!(config.dms.consec_frames, 15);
        assert_eq!(config.dms.landmark_model_path, Some("lm.onnx".to_string()));
        assert_eq!(config.dms.ear_threshold, 0.17);
        assert_eq!(cli.config, None::<PathBuf>);
    }
}
