//! Persistence of finished workouts
//!
//! The session task hands every completed or stopped session to a
//! [`WorkoutRecordSink`] exactly once. A failed save never reopens the
//! session; the error is reported to the caller together with the summary.
//! Sinks also read saved records back for the history view.

pub mod http;
pub mod jsonl;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use flexit_common::SessionSummary;

pub use http::HttpRecordSink;
pub use jsonl::JsonlRecordSink;

/// Date format the workout backend expects (UTC, no fractional seconds)
const RECORD_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Record sink errors
#[derive(Debug, Error)]
pub enum SinkError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Backend returned an error response
    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Local file error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One finished workout as stored by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutRecord {
    pub exercise_type: String,
    pub reps: u32,
    pub date: String,
}

impl WorkoutRecord {
    pub fn new(exercise_type: impl Into<String>, reps: u32, finished_at: DateTime<Utc>) -> Self {
        Self {
            exercise_type: exercise_type.into(),
            reps,
            date: finished_at.format(RECORD_DATE_FORMAT).to_string(),
        }
    }

    pub fn from_summary(summary: &SessionSummary) -> Self {
        Self::new(summary.exercise_id.clone(), summary.count, summary.finished_at)
    }
}

/// Destination for finished workout records
#[async_trait]
pub trait WorkoutRecordSink: Send + Sync {
    /// Sink identifier for logging (e.g. "http", "jsonl")
    fn name(&self) -> &'static str;

    async fn save(&self, record: &WorkoutRecord) -> Result<(), SinkError>;

    /// Every record saved so far, oldest first
    async fn history(&self) -> Result<Vec<WorkoutRecord>, SinkError>;
}

/// Totals for one exercise
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExerciseTotals {
    pub workouts: usize,
    pub reps: u64,
}

/// Aggregate view over saved workouts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkoutTotals {
    pub workouts: usize,
    pub reps: u64,
    pub per_exercise: BTreeMap<String, ExerciseTotals>,
}

impl WorkoutTotals {
    pub fn from_records(records: &[WorkoutRecord]) -> Self {
        let mut totals = Self::default();
        for record in records {
            totals.workouts += 1;
            totals.reps += u64::from(record.reps);
            let entry = totals
                .per_exercise
                .entry(record.exercise_type.clone())
                .or_default();
            entry.workouts += 1;
            entry.reps += u64::from(record.reps);
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_record_date_format() {
        let finished = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 3).unwrap();
        let record = WorkoutRecord::new("squat", 12, finished);
        assert_eq!(record.date, "2024-03-09T07:05:03");
    }

    #[test]
    fn test_record_json_shape() {
        let finished = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let json = serde_json::to_value(WorkoutRecord::new("push-up", 10, finished)).unwrap();
        assert_eq!(json["exercise_type"], "push-up");
        assert_eq!(json["reps"], 10);
        assert_eq!(json["date"], "2024-01-01T00:00:00");
    }

    #[test]
    fn test_totals_group_by_exercise() {
        let at = Utc.with_ymd_and_hms(2024, 5, 2, 18, 0, 0).unwrap();
        let records = vec![
            WorkoutRecord::new("squat", 10, at),
            WorkoutRecord::new("push-up", 7, at),
            WorkoutRecord::new("squat", 12, at),
        ];

        let totals = WorkoutTotals::from_records(&records);
        assert_eq!(totals.workouts, 3);
        assert_eq!(totals.reps, 29);
        assert_eq!(
            totals.per_exercise["squat"],
            ExerciseTotals { workouts: 2, reps: 22 }
        );
        assert_eq!(totals.per_exercise["push-up"].reps, 7);
        assert!(WorkoutTotals::from_records(&[]).per_exercise.is_empty());
    }
}
