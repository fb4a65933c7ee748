//! Common error types for Flexit

use thiserror::Error;

use crate::session::SessionPhase;

/// Common result type for Flexit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the caller of the counting core
///
/// Per-frame problems (low confidence, degenerate geometry, dead-zone angles)
/// are never represented here; see [`crate::gate::FrameRejected`] and
/// [`crate::angle::GeometryError`].
#[derive(Error, Debug)]
pub enum Error {
    /// Exercise identifier has no registry entry
    #[error("Unknown exercise: {0}")]
    UnknownExercise(String),

    /// Session start requested before the pose source reported readiness
    #[error("Pose source is not ready")]
    SourceNotReady,

    /// Lifecycle operation invoked from a phase that does not allow it
    #[error("Cannot {operation} while session is {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: SessionPhase,
    },

    /// Session target must be at least one repetition
    #[error("Invalid target: {0} (must be at least 1)")]
    InvalidTarget(u32),

    /// Exercise profile failed validation
    #[error("Invalid exercise profile: {0}")]
    InvalidProfile(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
