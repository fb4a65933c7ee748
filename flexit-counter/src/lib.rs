//! # flexit-counter
//!
//! Async shell around the flexit-common counting core: pose sources, the
//! session task and its frame queue, workout record sinks and bootstrap
//! configuration.

pub mod config;
pub mod error;
pub mod pose;
pub mod runner;
pub mod sink;

pub use config::TomlConfig;
pub use error::{Error, Result};
pub use pose::{pump, PoseSource, PumpStats, ReplaySource};
pub use runner::{spawn_session, Backpressure, FrameSender, SessionDeps, SessionHandle, SubmitOutcome};
pub use sink::{
    ExerciseTotals, HttpRecordSink, JsonlRecordSink, SinkError, WorkoutRecord, WorkoutRecordSink,
    WorkoutTotals,
};
