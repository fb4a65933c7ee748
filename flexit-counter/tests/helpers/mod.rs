//! Test helpers for flexit-counter integration tests
//!
//! - Synthetic squat frames with an exact knee angle
//! - In-memory and failing workout record sinks
//! - A scripted pose source

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use flexit_common::{
    Clock, EventBus, Landmark, LandmarkFrame, ManualClock, PoseLandmark, ProfileRegistry,
    Timestamp, WorkoutSession,
};
use flexit_counter::{
    Backpressure, PoseSource, Result, SessionDeps, SinkError, WorkoutRecord, WorkoutRecordSink,
};
use tokio_util::sync::CancellationToken;

/// Full frame whose hip-knee-ankle angle is `degrees` on both legs
pub fn squat_frame(degrees: f64, ms: u64) -> LandmarkFrame {
    let mut landmarks: Vec<Landmark> = (0..PoseLandmark::COUNT)
        .map(|i| Landmark::new(0.1 + i as f64 * 0.02, 0.1, 0.9))
        .collect();

    let theta = degrees.to_radians();
    for (hip, knee, ankle, x) in [
        (PoseLandmark::LeftHip, PoseLandmark::LeftKnee, PoseLandmark::LeftAnkle, 0.4),
        (PoseLandmark::RightHip, PoseLandmark::RightKnee, PoseLandmark::RightAnkle, 0.6),
    ] {
        landmarks[hip.index()] = Landmark::new(x, 0.3, 0.9);
        landmarks[knee.index()] = Landmark::new(x, 0.5, 0.9);
        landmarks[ankle.index()] =
            Landmark::new(x + 0.2 * theta.sin(), 0.5 - 0.2 * theta.cos(), 0.9);
    }

    LandmarkFrame::new(Timestamp::from_millis(ms), landmarks)
}

/// Two full squat reps: down at 0ms, up at 300ms, down again at 1500ms
pub fn two_rep_frames() -> Vec<LandmarkFrame> {
    vec![
        squat_frame(170.0, 0),
        squat_frame(120.0, 100),
        squat_frame(175.0, 300),
        squat_frame(150.0, 900),
        squat_frame(120.0, 1500),
    ]
}

/// Squat session already started at t=0
pub fn active_squat_session(target: u32) -> WorkoutSession {
    let mut session = WorkoutSession::new(Arc::new(ProfileRegistry::builtin()));
    session.select_with_target("squat", target).unwrap();
    session.start(true, Timestamp::ZERO).unwrap();
    session
}

pub fn deps(
    sink: Arc<dyn WorkoutRecordSink>,
    clock: ManualClock,
    capacity: usize,
    backpressure: Backpressure,
) -> SessionDeps {
    let clock: Arc<dyn Clock> = Arc::new(clock);
    SessionDeps {
        sink,
        event_bus: EventBus::new(64),
        clock,
        frame_queue_capacity: capacity,
        backpressure,
        cancel: CancellationToken::new(),
    }
}

/// Sink that keeps records in memory
#[derive(Default)]
pub struct MemoryRecordSink {
    records: Mutex<Vec<WorkoutRecord>>,
}

impl MemoryRecordSink {
    pub fn records(&self) -> Vec<WorkoutRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkoutRecordSink for MemoryRecordSink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn save(&self, record: &WorkoutRecord) -> std::result::Result<(), SinkError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn history(&self) -> std::result::Result<Vec<WorkoutRecord>, SinkError> {
        Ok(self.records())
    }
}

/// Sink whose backend always answers 503
#[derive(Default)]
pub struct UnavailableSink;

#[async_trait]
impl WorkoutRecordSink for UnavailableSink {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    async fn save(&self, _record: &WorkoutRecord) -> std::result::Result<(), SinkError> {
        Err(SinkError::Api(503, "service unavailable".to_string()))
    }

    async fn history(&self) -> std::result::Result<Vec<WorkoutRecord>, SinkError> {
        Err(SinkError::Api(503, "service unavailable".to_string()))
    }
}

/// Pose source yielding a fixed list of frames, optionally repeating the last one forever
pub struct ScriptedSource {
    frames: VecDeque<LandmarkFrame>,
    repeat_last: bool,
    ready: bool,
    torn_down: Arc<AtomicBool>,
}

impl ScriptedSource {
    pub fn new(frames: Vec<LandmarkFrame>, repeat_last: bool) -> Self {
        Self {
            frames: frames.into(),
            repeat_last,
            ready: false,
            torn_down: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn torn_down_flag(&self) -> Arc<AtomicBool> {
        self.torn_down.clone()
    }
}

#[async_trait]
impl PoseSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn prepare(&mut self) -> Result<()> {
        self.ready = true;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    async fn next_frame(&mut self) -> Result<Option<LandmarkFrame>> {
        // Yield so the session task gets to run between frames
        tokio::task::yield_now().await;
        if self.repeat_last && self.frames.len() == 1 {
            return Ok(self.frames.front().cloned());
        }
        Ok(self.frames.pop_front())
    }

    async fn teardown(&mut self) {
        self.torn_down.store(true, Ordering::SeqCst);
    }
}
