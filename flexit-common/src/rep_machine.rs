//! Debounced two-state repetition counter
//!
//! `Up` is the initial state. Reaching the down threshold while Up counts a
//! repetition, provided the cooldown since the previous transition has
//! elapsed. Reaching the up threshold while Down re-arms the counter
//! regardless of the cooldown, and restarts the cooldown window so jitter
//! around the top of the movement cannot produce a rapid second count.
//! Angles strictly between the thresholds never change anything.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace};

use crate::profile::ExerciseProfile;
use crate::time::Timestamp;

/// Repetition phase of the tracked joint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepState {
    /// Extended / resting (initial)
    #[default]
    Up,
    /// Flexed / contracted
    Down,
}

impl fmt::Display for RepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepState::Up => write!(f, "up"),
            RepState::Down => write!(f, "down"),
        }
    }
}

/// A state change applied by [`RepStateMachine::evaluate`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// Up → Down; the only transition that counts
    Down { count: u32, at: Timestamp },
    /// Down → Up
    Up { at: Timestamp },
}

/// Threshold subset of an [`ExerciseProfile`] the machine needs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepThresholds {
    pub down_angle: f64,
    pub up_angle: f64,
    pub cooldown: Duration,
}

impl From<&ExerciseProfile> for RepThresholds {
    fn from(profile: &ExerciseProfile) -> Self {
        Self {
            down_angle: profile.down_angle,
            up_angle: profile.up_angle,
            cooldown: profile.cooldown,
        }
    }
}

/// One counter per active session
#[derive(Debug, Clone)]
pub struct RepStateMachine {
    thresholds: RepThresholds,
    state: RepState,
    count: u32,
    last_transition: Option<Timestamp>,
}

impl RepStateMachine {
    pub fn new(thresholds: RepThresholds) -> Self {
        Self {
            thresholds,
            state: RepState::Up,
            count: 0,
            last_transition: None,
        }
    }

    pub fn state(&self) -> RepState {
        self.state
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn last_transition(&self) -> Option<Timestamp> {
        self.last_transition
    }

    pub fn thresholds(&self) -> &RepThresholds {
        &self.thresholds
    }

    fn cooldown_elapsed(&self, at: Timestamp) -> bool {
        match self.last_transition {
            None => true,
            Some(last) => at.saturating_since(last) > self.thresholds.cooldown,
        }
    }

    /// Evaluate one accepted frame's angle; `None` means the frame was a no-op
    pub fn evaluate(&mut self, angle: f64, at: Timestamp) -> Option<Transition> {
        if !angle.is_finite() {
            return None;
        }

        match self.state {
            RepState::Up if angle <= self.thresholds.down_angle => {
                if !self.cooldown_elapsed(at) {
                    debug!(angle, at_ms = at.as_millis(), "Down crossing suppressed by cooldown");
                    return None;
                }
                self.count += 1;
                self.state = RepState::Down;
                self.last_transition = Some(at);
                Some(Transition::Down {
                    count: self.count,
                    at,
                })
            }
            RepState::Down if angle >= self.thresholds.up_angle => {
                self.state = RepState::Up;
                self.last_transition = Some(at);
                Some(Transition::Up { at })
            }
            _ => {
                trace!(angle, state = %self.state, "No transition");
                None
            }
        }
    }
}
