//! Error types for flexit-counter

use thiserror::Error;

use flexit_common::SessionSummary;

use crate::sink::SinkError;

/// Main error type for flexit-counter
#[derive(Error, Debug)]
pub enum Error {
    /// Session lifecycle or configuration error from the counting core
    #[error(transparent)]
    Common(#[from] flexit_common::Error),

    /// Workout record sink failure outside a session
    #[error("Record sink error: {0}")]
    Sink(#[from] SinkError),

    /// Session finished locally but its record could not be saved
    ///
    /// The summary is returned so the caller can retry or report it.
    #[error("Failed to save {} session ({} reps): {}", .summary.exercise_id, .summary.count, .source)]
    Persistence {
        summary: Box<SessionSummary>,
        source: SinkError,
    },

    /// Pose source failed to load or deliver frames
    #[error("Pose source error: {0}")]
    PoseSource(String),

    /// Bootstrap configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Session task ended abnormally
    #[error("Session task error: {0}")]
    SessionTask(String),
}

/// Convenience Result type using flexit-counter Error
pub type Result<T> = std::result::Result<T, Error>;
