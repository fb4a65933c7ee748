//! # Flexit Common Library
//!
//! Repetition counting core shared by all Flexit binaries:
//! - Landmark frames and the BlazePose keypoint index set
//! - Joint-angle geometry
//! - Landmark confidence gating
//! - Exercise profile registry
//! - The debounced Up/Down repetition state machine
//! - Workout session lifecycle and its events
//! - Config file resolution and monotonic time utilities

pub mod angle;
pub mod config;
pub mod error;
pub mod events;
pub mod gate;
pub mod landmarks;
pub mod profile;
pub mod rep_machine;
pub mod session;
pub mod time;

pub use error::{Error, Result};
pub use events::{EventBus, SessionEvent};
pub use landmarks::{Landmark, LandmarkFrame, PoseLandmark};
pub use profile::{ExerciseProfile, ProfileRegistry};
pub use rep_machine::{RepState, RepStateMachine};
pub use session::{SessionPhase, SessionSummary, WorkoutSession};
pub use time::{Clock, ManualClock, MonotonicClock, Timestamp};
