//! Local JSON-lines workout log
//!
//! Used when no backend is configured: one record per line, appended.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;
use tokio::sync::Mutex;

use super::{SinkError, WorkoutRecord, WorkoutRecordSink};

/// Append-only JSONL file sink
pub struct JsonlRecordSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlRecordSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl WorkoutRecordSink for JsonlRecordSink {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    async fn save(&self, record: &WorkoutRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn history(&self) -> Result<Vec<WorkoutRecord>, SinkError> {
        let _guard = self.write_lock.lock().await;
        let file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        let mut lines = BufReader::new(file).lines();
        let mut line_no = 0usize;
        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                // Torn trailing writes are skipped
                Err(e) => warn!(path = %self.path.display(), line = line_no, "Skipping unreadable record: {}", e),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("workouts.jsonl");
        let sink = JsonlRecordSink::new(&path);

        sink.save(&WorkoutRecord::new("squat", 10, Utc::now())).await.unwrap();
        sink.save(&WorkoutRecord::new("sit-up", 4, Utc::now())).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let records: Vec<WorkoutRecord> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].exercise_type, "squat");
        assert_eq!(records[1].reps, 4);

        let history = sink.history().await.unwrap();
        assert_eq!(history, records);
    }

    #[tokio::test]
    async fn test_history_of_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlRecordSink::new(dir.path().join("never-written.jsonl"));
        assert!(sink.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_skips_unreadable_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workouts.jsonl");
        std::fs::write(
            &path,
            "{\"exercise_type\":\"squat\",\"reps\":8,\"date\":\"2024-02-01T10:00:00\"}\n\n{\"exercise_ty",
        )
        .unwrap();

        let history = JsonlRecordSink::new(&path).history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reps, 8);
    }
}
