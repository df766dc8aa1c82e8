//! Sound playback backends

use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

use crate::AlarmError;

/// Plays a sound file to completion.
///
/// Called from the alarm thread, so blocking is expected.
pub trait SoundBackend: Send + Sync + 'static {
    fn play(&self, path: &Path) -> Result<(), AlarmError>;
}

/// Plays sounds through an external player program
#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
}

impl CommandBackend {
    /// Use `program`, passing `args` before the sound path
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Player shipped with the host OS
    pub fn system_default() -> Self {
        if cfg!(target_os = "macos") {
            Self::new("afplay", Vec::new())
        } else if cfg!(target_os = "windows") {
            Self::new(
                "powershell",
                vec![
                    "-NoProfile".into(),
                    "-Command".into(),
                    "param($p) (New-Object Media.SoundPlayer $p).PlaySync()".into(),
                ],
            )
        } else {
            Self::new("aplay", vec!["-q".into()])
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl SoundBackend for CommandBackend {
    fn play(&self, path: &Path) -> Result<(), AlarmError> {
        if !path.is_file() {
            return Err(AlarmError::ResourceMissing(path.display().to_string()));
        }

        debug!("Playing {} with {}", path.display(), self.program);

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| AlarmError::Playback(format!("{}: {}", self.program, e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(AlarmError::Playback(format!(
                "{} exited with {}",
                self.program, status
            )))
        }
    }
}
