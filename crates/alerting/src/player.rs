//! Alarm Player Implementation

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::{AlarmResource, CommandBackend, SoundBackend};

/// Alarm configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// Sound to play on activation, or "no" to disable
    pub sound: AlarmResource,
    /// Player program (default: the OS player)
    pub player: Option<String>,
    /// Extra arguments passed before the sound path
    pub player_args: Vec<String>,
}

impl AlarmConfig {
    /// Build the playback backend this config describes
    pub fn backend(&self) -> CommandBackend {
        match &self.player {
            Some(program) => CommandBackend::new(program.clone(), self.player_args.clone()),
            None => CommandBackend::system_default(),
        }
    }
}

/// What `trigger` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Playback handed to a background thread
    Dispatched,
    /// Sound disabled; nothing played
    Silenced,
    /// Background thread could not be started
    Failed,
}

/// Playback counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlarmStats {
    /// Playback attempts handed off
    pub dispatched: u64,
    /// Playbacks that finished cleanly
    pub completed: u64,
    /// Playbacks that failed (missing file, bad player, no thread)
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    dispatched: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Fire-and-forget alarm player.
///
/// Each call to [`AlarmPlayer::trigger`] plays the sound once on a detached
/// thread. The caller decides when an activation edge occurred; the player
/// holds no alarm state. Playback is never cancelled and its outcome only
/// reaches the log and the counters.
pub struct AlarmPlayer {
    resource: AlarmResource,
    backend: Arc<dyn SoundBackend>,
    counters: Arc<Counters>,
}

impl AlarmPlayer {
    /// Create a player with an explicit backend
    pub fn new(resource: AlarmResource, backend: Arc<dyn SoundBackend>) -> Self {
        if let Some(path) = resource.path() {
            if !path.is_file() {
                // Not fatal: the attempt is still made and logged on trigger
                warn!("Alarm sound {} not found", path.display());
            }
        }
        Self {
            resource,
            backend,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Create a player from configuration
    pub fn from_config(config: &AlarmConfig) -> Self {
        Self::new(config.sound.clone(), Arc::new(config.backend()))
    }

    pub fn resource(&self) -> &AlarmResource {
        &self.resource
    }

    /// Play the alarm once without blocking the caller
    pub fn trigger(&self) -> TriggerOutcome {
        let path = match self.resource.path() {
            Some(path) => path.to_path_buf(),
            None => {
                info!("Drowsiness alarm activated (sound disabled)");
                return TriggerOutcome::Silenced;
            }
        };

        info!("Drowsiness alarm activated, playing {}", path.display());
        self.counters.dispatched.fetch_add(1, Ordering::SeqCst);

        let backend = self.backend.clone();
        let counters = self.counters.clone();

        let spawned = std::thread::Builder::new()
            .name("alarm-player".into())
            .spawn(move || match backend.play(&path) {
                Ok(()) => {
                    debug!("Alarm playback finished");
                    counters.completed.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => {
                    error!("{}", e);
                    counters.failed.fetch_add(1, Ordering::SeqCst);
                }
            });

        // Dropping the JoinHandle detaches the thread
        match spawned {
            Ok(_) => TriggerOutcome::Dispatched,
            Err(e) => {
                error!("Failed to start alarm thread: {}", e);
                self.counters.failed.fetch_add(1, Ordering::SeqCst);
                TriggerOutcome::Failed
            }
        }
    }

    /// Snapshot of playback counters
    pub fn stats(&self) -> AlarmStats {
        AlarmStats {
            dispatched: self.counters.dispatched.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
        }
    }
}
