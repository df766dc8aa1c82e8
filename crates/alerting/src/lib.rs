//! Alerting System
//!
//! Plays the drowsiness alarm on a detached thread so the frame loop never
//! waits on audio.

mod backend;
mod player;
mod resource;

pub use backend::{CommandBackend, SoundBackend};
pub use player::{AlarmConfig, AlarmPlayer, AlarmStats, TriggerOutcome};
pub use resource::AlarmResource;

use thiserror::Error;

/// Alarm error types
#[derive(Error, Debug)]
pub enum AlarmError {
    #[error("Alarm sound not found: {0}")]
    ResourceMissing(String),

    #[error("Alarm playback failed: {0}")]
    Playback(String),
}
