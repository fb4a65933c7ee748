//! Workout session lifecycle
//!
//! `Idle → Selected → Active → {Completed | Stopped}`, and from either end
//! state back to `Selected` for the next run.
//!
//! A [`WorkoutSession`] is a single-owner value. It changes only through
//! [`select`](WorkoutSession::select), [`start`](WorkoutSession::start),
//! [`on_frame`](WorkoutSession::on_frame) and [`stop`](WorkoutSession::stop),
//! each of which returns the events it produced. Per-frame problems
//! (rejected landmarks, degenerate geometry, dead-zone angles) are absorbed
//! here and only show up in [`FrameStats`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::events::SessionEvent;
use crate::gate::LandmarkGate;
use crate::landmarks::LandmarkFrame;
use crate::profile::{ExerciseProfile, ProfileRegistry};
use crate::rep_machine::{RepState, RepStateMachine, Transition};
use crate::time::Timestamp;
use crate::{Error, Result};

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Selected,
    Active,
    Completed,
    Stopped,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Idle => write!(f, "idle"),
            SessionPhase::Selected => write!(f, "selected"),
            SessionPhase::Active => write!(f, "active"),
            SessionPhase::Completed => write!(f, "completed"),
            SessionPhase::Stopped => write!(f, "stopped"),
        }
    }
}

/// Per-run frame accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameStats {
    /// Frames that produced a usable angle
    pub accepted: u64,
    /// Frames dropped by the landmark gate
    pub rejected: u64,
    /// Frames whose landmarks gave no usable angle
    pub degenerate: u64,
}

/// Result of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub exercise_id: String,
    pub count: u32,
    pub target: u32,
    /// Monotonic duration from start to the last observed instant
    pub elapsed: Duration,
    /// True when the run ended by reaching the target
    pub reached_target: bool,
    pub frames: FrameStats,
    /// Wall-clock time the run ended
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Selection {
    profile: ExerciseProfile,
    target: u32,
}

#[derive(Debug, Clone)]
struct ActiveRun {
    session_id: Uuid,
    machine: RepStateMachine,
    started_at: Timestamp,
    last_frame_at: Option<Timestamp>,
    stats: FrameStats,
}

/// Counting session for one subject
#[derive(Debug, Clone)]
pub struct WorkoutSession {
    registry: Arc<ProfileRegistry>,
    phase: SessionPhase,
    selection: Option<Selection>,
    active: Option<ActiveRun>,
    last_summary: Option<SessionSummary>,
}

impl WorkoutSession {
    pub fn new(registry: Arc<ProfileRegistry>) -> Self {
        Self {
            registry,
            phase: SessionPhase::Idle,
            selection: None,
            active: None,
            last_summary: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Profile of the selected or running exercise
    pub fn profile(&self) -> Option<&ExerciseProfile> {
        self.selection.as_ref().map(|s| &s.profile)
    }

    pub fn target(&self) -> Option<u32> {
        self.selection.as_ref().map(|s| s.target)
    }

    /// Repetitions counted in the running session (0 when not active)
    pub fn count(&self) -> u32 {
        self.active.as_ref().map_or(0, |run| run.machine.count())
    }

    pub fn rep_state(&self) -> Option<RepState> {
        self.active.as_ref().map(|run| run.machine.state())
    }

    pub fn frame_stats(&self) -> Option<FrameStats> {
        self.active.as_ref().map(|run| run.stats)
    }

    /// Summary of the most recently finished run
    pub fn last_summary(&self) -> Option<&SessionSummary> {
        self.last_summary.as_ref()
    }

    fn phase_change(&mut self, to: SessionPhase) -> SessionEvent {
        let from = self.phase;
        self.phase = to;
        SessionEvent::PhaseChanged { from, to }
    }

    /// Choose an exercise with its profile's default target
    pub fn select(&mut self, exercise_id: &str) -> Result<Vec<SessionEvent>> {
        let target = self.registry.lookup(exercise_id)?.default_target;
        self.select_with_target(exercise_id, target)
    }

    /// Choose an exercise and a target repetition count
    pub fn select_with_target(
        &mut self,
        exercise_id: &str,
        target: u32,
    ) -> Result<Vec<SessionEvent>> {
        if !matches!(
            self.phase,
            SessionPhase::Idle | SessionPhase::Completed | SessionPhase::Stopped
        ) {
            return Err(Error::InvalidPhase {
                operation: "select an exercise",
                phase: self.phase,
            });
        }
        let profile = self.registry.lookup(exercise_id)?.clone();
        if target == 0 {
            return Err(Error::InvalidTarget(target));
        }

        info!(
            exercise = %profile.id,
            target,
            rule = %profile.rule,
            "Exercise selected"
        );
        self.selection = Some(Selection { profile, target });
        Ok(vec![self.phase_change(SessionPhase::Selected)])
    }

    /// Begin counting; the pose source must already report readiness
    pub fn start(&mut self, source_ready: bool, now: Timestamp) -> Result<Vec<SessionEvent>> {
        if self.phase != SessionPhase::Selected {
            return Err(Error::InvalidPhase {
                operation: "start",
                phase: self.phase,
            });
        }
        if !source_ready {
            return Err(Error::SourceNotReady);
        }
        let selection = self.selection.as_ref().ok_or(Error::InvalidPhase {
            operation: "start",
            phase: self.phase,
        })?;

        let run = ActiveRun {
            session_id: Uuid::new_v4(),
            machine: RepStateMachine::new((&selection.profile).into()),
            started_at: now,
            last_frame_at: None,
            stats: FrameStats::default(),
        };
        info!(
            session_id = %run.session_id,
            exercise = %selection.profile.id,
            target = selection.target,
            "Session started"
        );
        self.active = Some(run);
        Ok(vec![self.phase_change(SessionPhase::Active)])
    }

    /// Run one frame through gate, angle extraction and the rep machine
    ///
    /// Reaching the target finishes the session within this call.
    pub fn on_frame(&mut self, frame: &LandmarkFrame) -> Result<Vec<SessionEvent>> {
        let not_active = Error::InvalidPhase {
            operation: "process a frame",
            phase: self.phase,
        };
        if self.phase != SessionPhase::Active {
            return Err(not_active);
        }
        let (Some(selection), Some(run)) = (self.selection.as_ref(), self.active.as_mut()) else {
            return Err(not_active);
        };

        let gated = match LandmarkGate::admit(frame, &selection.profile) {
            Ok(gated) => gated,
            Err(rejected) => {
                run.stats.rejected += 1;
                debug!(at_ms = frame.timestamp.as_millis(), "{}", rejected);
                return Ok(Vec::new());
            }
        };

        let angle = match selection.profile.rule.extract(&gated) {
            Ok(angle) => angle,
            Err(e) => {
                run.stats.degenerate += 1;
                debug!(at_ms = frame.timestamp.as_millis(), "Skipping frame: {}", e);
                return Ok(Vec::new());
            }
        };

        run.stats.accepted += 1;
        run.last_frame_at = Some(
            run.last_frame_at
                .map_or(frame.timestamp, |last| last.max(frame.timestamp)),
        );

        let mut events = Vec::new();
        match run.machine.evaluate(angle, frame.timestamp) {
            Some(Transition::Down { count, at }) => {
                info!(
                    session_id = %run.session_id,
                    count,
                    target = selection.target,
                    angle,
                    "Repetition counted"
                );
                events.push(SessionEvent::RepStateChanged {
                    state: RepState::Down,
                    angle,
                    timestamp: at,
                });
                events.push(SessionEvent::RepCompleted {
                    count,
                    target: selection.target,
                    timestamp: at,
                });
                if count >= selection.target {
                    events.extend(self.finish(SessionPhase::Completed, at));
                }
            }
            Some(Transition::Up { at }) => {
                debug!(angle, "Joint extended, counter re-armed");
                events.push(SessionEvent::RepStateChanged {
                    state: RepState::Up,
                    angle,
                    timestamp: at,
                });
            }
            None => {}
        }

        Ok(events)
    }

    /// Cancel the running session, keeping whatever count was reached
    ///
    /// Calling it again after the session ended is a no-op.
    pub fn stop(&mut self, now: Timestamp) -> Result<Vec<SessionEvent>> {
        match self.phase {
            SessionPhase::Active => Ok(self.finish(SessionPhase::Stopped, now)),
            SessionPhase::Completed | SessionPhase::Stopped => Ok(Vec::new()),
            phase => Err(Error::InvalidPhase {
                operation: "stop",
                phase,
            }),
        }
    }

    fn finish(&mut self, end: SessionPhase, now: Timestamp) -> Vec<SessionEvent> {
        let (Some(selection), Some(run)) = (self.selection.take(), self.active.take()) else {
            return Vec::new();
        };

        let observed = run.last_frame_at.map_or(now, |last| last.max(now));
        let summary = SessionSummary {
            session_id: run.session_id,
            exercise_id: selection.profile.id,
            count: run.machine.count(),
            target: selection.target,
            elapsed: observed.saturating_since(run.started_at),
            reached_target: end == SessionPhase::Completed,
            frames: run.stats,
            finished_at: Utc::now(),
        };
        info!(
            session_id = %summary.session_id,
            exercise = %summary.exercise_id,
            count = summary.count,
            target = summary.target,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            outcome = %end,
            "Session finished"
        );

        self.last_summary = Some(summary.clone());
        vec![
            self.phase_change(end),
            SessionEvent::SessionCompleted { summary },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> WorkoutSession {
        WorkoutSession::new(Arc::new(ProfileRegistry::builtin()))
    }

    #[test]
    fn test_new_session_is_idle() {
        let s = session();
        assert_eq!(s.phase(), SessionPhase::Idle);
        assert_eq!(s.count(), 0);
        assert!(s.profile().is_none());
    }

    #[test]
    fn test_select_uses_default_target() {
        let mut s = session();
        let events = s.select("sit-up").unwrap();
        assert_eq!(
            events,
            vec![SessionEvent::PhaseChanged {
                from: SessionPhase::Idle,
                to: SessionPhase::Selected
            }]
        );
        assert_eq!(s.target(), Some(15));
    }

    #[test]
    fn test_select_unknown_exercise_keeps_phase() {
        let mut s = session();
        assert!(matches!(s.select("jumping-jack"), Err(Error::UnknownExercise(_))));
        assert_eq!(s.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_select_zero_target_rejected() {
        let mut s = session();
        assert!(matches!(
            s.select_with_target("squat", 0),
            Err(Error::InvalidTarget(0))
        ));
    }

    #[test]
    fn test_start_requires_ready_source() {
        let mut s = session();
        s.select("squat").unwrap();
        assert!(matches!(s.start(false, Timestamp::ZERO), Err(Error::SourceNotReady)));
        assert_eq!(s.phase(), SessionPhase::Selected);
        s.start(true, Timestamp::ZERO).unwrap();
        assert_eq!(s.phase(), SessionPhase::Active);
        assert_eq!(s.rep_state(), Some(RepState::Up));
    }

    #[test]
    fn test_start_without_selection() {
        let mut s = session();
        assert!(matches!(
            s.start(true, Timestamp::ZERO),
            Err(Error::InvalidPhase { phase: SessionPhase::Idle, .. })
        ));
    }

    #[test]
    fn test_select_while_active_rejected() {
        let mut s = session();
        s.select("squat").unwrap();
        s.start(true, Timestamp::ZERO).unwrap();
        assert!(matches!(
            s.select("push-up"),
            Err(Error::InvalidPhase { phase: SessionPhase::Active, .. })
        ));
    }

    #[test]
    fn test_frame_outside_active_rejected() {
        let mut s = session();
        let frame = LandmarkFrame::new(Timestamp::ZERO, Vec::new());
        assert!(matches!(s.on_frame(&frame), Err(Error::InvalidPhase { .. })));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut s = session();
        s.select("push-up").unwrap();
        s.start(true, Timestamp::from_millis(1000)).unwrap();

        let events = s.stop(Timestamp::from_millis(4000)).unwrap();
        assert_eq!(events.len(), 2);
        match &events[1] {
            SessionEvent::SessionCompleted { summary } => {
                assert_eq!(summary.exercise_id, "push-up");
                assert_eq!(summary.count, 0);
                assert_eq!(summary.target, 10);
                assert_eq!(summary.elapsed, Duration::from_millis(3000));
                assert!(!summary.reached_target);
            }
            other => panic!("Expected SessionCompleted, got {:?}", other),
        }
        assert_eq!(s.phase(), SessionPhase::Stopped);
        assert!(s.stop(Timestamp::from_millis(5000)).unwrap().is_empty());
    }

    #[test]
    fn test_stop_before_start_rejected() {
        let mut s = session();
        s.select("squat").unwrap();
        assert!(matches!(s.stop(Timestamp::ZERO), Err(Error::InvalidPhase { .. })));
    }

    #[test]
    fn test_reselect_after_stop() {
        let mut s = session();
        s.select("squat").unwrap();
        s.start(true, Timestamp::ZERO).unwrap();
        s.stop(Timestamp::from_millis(10)).unwrap();

        s.select_with_target("sit-up", 3).unwrap();
        assert_eq!(s.phase(), SessionPhase::Selected);
        assert_eq!(s.target(), Some(3));
        assert!(s.last_summary().is_some());
    }
}
