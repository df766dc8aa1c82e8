//! Driver state tracking

use serde::{Deserialize, Serialize};

use crate::DmsConfig;

/// Where the driver sits in the eyes-closed debounce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DrowsinessPhase {
    /// Eyes open, counter at zero
    #[default]
    Awake,
    /// Eyes closed, not yet long enough to alarm
    Closing,
    /// Eyes closed for at least the configured frame count
    Alarming,
}

/// Result of feeding one EAR value to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateTransition {
    /// The EAR was below threshold
    pub eyes_closed: bool,
    /// This update flipped the alarm from inactive to active
    pub alarm_started: bool,
    /// Counter is at or past the threshold; draw the alert
    pub render_alert: bool,
}

/// Driver state (tracked over time).
///
/// One instance per session, shared by every face detected in a frame, and
/// written only by the frame loop. Frames with no face never reach
/// [`DriverState::update`], so a detection dropout neither advances nor
/// clears the counter.
#[derive(Debug, Clone)]
pub struct DriverState {
    ear_threshold: f64,
    consec_frames: u32,

    /// Frames in a row with EAR below threshold
    consecutive_low_count: u32,

    /// An alarm episode is ongoing
    alarm_active: bool,
}

impl DriverState {
    pub fn new(ear_threshold: f64, consec_frames: u32) -> Self {
        Self {
            ear_threshold,
            consec_frames,
            consecutive_low_count: 0,
            alarm_active: false,
        }
    }

    pub fn from_config(config: &DmsConfig) -> Self {
        Self::new(config.ear_threshold, config.consec_frames)
    }

    /// Advance by one face reading
    pub fn update(&mut self, ear: f64) -> StateTransition {
        if ear < self.ear_threshold {
            // Saturates instead of wrapping on very long closures
            self.consecutive_low_count = self.consecutive_low_count.saturating_add(1);

            let over = self.consecutive_low_count >= self.consec_frames;
            let alarm_started = over && !self.alarm_active;
            if alarm_started {
                self.alarm_active = true;
            }

            StateTransition {
                eyes_closed: true,
                alarm_started,
                render_alert: over,
            }
        } else {
            self.consecutive_low_count = 0;
            self.alarm_active = false;
            StateTransition::default()
        }
    }

    pub fn phase(&self) -> DrowsinessPhase {
        if self.alarm_active {
            DrowsinessPhase::Alarming
        } else if self.consecutive_low_count == 0 {
            DrowsinessPhase::Awake
        } else {
            DrowsinessPhase::Closing
        }
    }

    pub fn consecutive_low_count(&self) -> u32 {
        self.consecutive_low_count
    }

    pub fn is_alarm_active(&self) -> bool {
        self.alarm_active
    }

    pub fn ear_threshold(&self) -> f64 {
        self.ear_threshold
    }

    pub fn consec_frames(&self) -> u32 {
        self.consec_frames
    }

    /// Reset state (on driver change)
    pub fn reset(&mut self) {
        self.consecutive_low_count = 0;
        self.alarm_active = false;
    }
}

impl Default for DriverState {
    fn default() -> Self {
        Self::from_config(&DmsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alarm_fires_once_then_rearms() {
        let mut state = DriverState::new(0.17, 3);
        let ears = [0.20, 0.10, 0.10, 0.10, 0.20, 0.10];

        let transitions: Vec<StateTransition> = ears.iter().map(|&e| state.update(e)).collect();

        let started: Vec<usize> = transitions
            .iter()
            .enumerate()
            .filter(|(_, t)| t.alarm_started)
            .map(|(i, _)| i + 1)
            .collect();
        assert_eq!(started, vec![4]);

        assert!(transitions[3].render_alert);
        assert!(!transitions[4].render_alert);
        assert!(!transitions[4].eyes_closed);

        assert_eq!(state.consecutive_low_count(), 1);
        assert!(!state.is_alarm_active());
        assert_eq!(state.phase(), DrowsinessPhase::Closing);
    }

    #[test]
    fn test_counter_climbs_by_one() {
        let mut state = DriverState::new(0.2, 5);
        for expected in 1..=8u32 {
            state.update(0.05);
            assert_eq!(state.consecutive_low_count(), expected);
        }
        assert_eq!(state.phase(), DrowsinessPhase::Alarming);
    }

    #[test]
    fn test_alarm_not_retriggered_while_closed() {
        let mut state = DriverState::new(0.2, 2);
        let starts = (0..50).filter(|_| state.update(0.1).alarm_started).count();
        assert_eq!(starts, 1);
        assert!(state.is_alarm_active());

        // Every frame past the threshold still renders the alert
        let t = state.update(0.1);
        assert!(t.render_alert && !t.alarm_started);
    }

    #[test]
    fn test_open_frame_resets_everything() {
        let mut state = DriverState::new(0.2, 2);
        for _ in 0..10 {
            state.update(0.0);
        }
        assert!(state.is_alarm_active());

        // Exactly at threshold counts as open
        let t = state.update(0.2);
        assert_eq!(t, StateTransition::default());
        assert_eq!(state.consecutive_low_count(), 0);
        assert!(!state.is_alarm_active());
        assert_eq!(state.phase(), DrowsinessPhase::Awake);

        // Re-arms after the reset
        state.update(0.0);
        assert!(state.update(0.0).alarm_started);
    }

    #[test]
    fn test_counter_saturates() {
        let mut state = DriverState::new(0.2, 1);
        state.consecutive_low_count = u32::MAX - 1;
        state.alarm_active = true;
        state.update(0.0);
        state.update(0.0);
        assert_eq!(state.consecutive_low_count(), u32::MAX);
        assert!(state.is_alarm_active());
    }

    #[test]
    fn test_reset() {
        let mut state = DriverState::default();
        state.update(0.0);
        state.reset();
        assert_eq!(state.phase(), DrowsinessPhase::Awake);
        assert_eq!(state.consec_frames(), 60);
    }
}
