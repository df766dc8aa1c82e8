//! Alarm sound resource

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Values that switch the sound off
const DISABLED_SENTINELS: &[&str] = &["no", "none", "off", "disabled"];

/// What the alarm plays on activation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AlarmResource {
    /// Alarm edges are still detected and rendered, but nothing is played
    Disabled,
    /// Path to an audio file
    Sound(PathBuf),
}

impl AlarmResource {
    /// Sound file, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            AlarmResource::Disabled => None,
            AlarmResource::Sound(path) => Some(path),
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, AlarmResource::Disabled)
    }
}

impl Default for AlarmResource {
    fn default() -> Self {
        AlarmResource::Sound(PathBuf::from("alarm.wav"))
    }
}

impl FromStr for AlarmResource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || DISABLED_SENTINELS.iter().any(|d| s.eq_ignore_ascii_case(d)) {
            Ok(AlarmResource::Disabled)
        } else {
            Ok(AlarmResource::Sound(PathBuf::from(s)))
        }
    }
}

impl TryFrom<String> for AlarmResource {
    type Error = std::convert::Infallible;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AlarmResource> for String {
    fn from(resource: AlarmResource) -> Self {
        resource.to_string()
    }
}

impl std::fmt::Display for AlarmResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlarmResource::Disabled => write!(f, "no"),
            AlarmResource::Sound(path) => write!(f, "{}", path.display()),
        }
    }
}
