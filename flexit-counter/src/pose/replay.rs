//! Recorded landmark replay
//!
//! Reads a JSON-lines capture of pose-model output, one frame per line:
//!
//! ```text
//! {"t_ms": 0, "landmarks": [{"x": 0.51, "y": 0.32, "visibility": 0.98}, ...]}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. `t_ms` is relative to
//! the start of the capture and is rebased onto the session clock when the
//! first frame is read. With `realtime` enabled frames are paced by their
//! capture times; otherwise they are delivered as fast as the queue accepts.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::{info, warn};

use flexit_common::{Clock, Landmark, LandmarkFrame, Timestamp};

use super::PoseSource;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct ReplayLine {
    t_ms: u64,
    landmarks: Vec<Landmark>,
}

/// Pose source replaying a JSONL landmark capture
pub struct ReplaySource {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    realtime: bool,
    lines: Option<Lines<BufReader<File>>>,
    line_no: usize,
    origin: Option<Timestamp>,
    last_t_ms: Option<u64>,
}

impl ReplaySource {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>, realtime: bool) -> Self {
        Self {
            path: path.into(),
            clock,
            realtime,
            lines: None,
            line_no: 0,
            origin: None,
            last_t_ms: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse_line(&self, line: &str) -> Result<ReplayLine> {
        serde_json::from_str(line).map_err(|e| {
            Error::PoseSource(format!(
                "{}:{}: invalid frame: {}",
                self.path.display(),
                self.line_no,
                e
            ))
        })
    }
}

#[async_trait]
impl PoseSource for ReplaySource {
    fn name(&self) -> &str {
        "replay"
    }

    async fn prepare(&mut self) -> Result<()> {
        let file = File::open(&self.path).await.map_err(|e| {
            Error::PoseSource(format!("Failed to open {}: {}", self.path.display(), e))
        })?;
        self.lines = Some(BufReader::new(file).lines());
        info!(path = %self.path.display(), realtime = self.realtime, "Replay source ready");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.lines.is_some()
    }

    async fn next_frame(&mut self) -> Result<Option<LandmarkFrame>> {
        let Some(lines) = self.lines.as_mut() else {
            return Err(Error::PoseSource("replay source not prepared".to_string()));
        };

        let raw = loop {
            self.line_no += 1;
            match lines.next_line().await? {
                None => return Ok(None),
                Some(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() || trimmed.starts_with('#') {
                        continue;
                    }
                    break trimmed.to_string();
                }
            }
        };
        let parsed = self.parse_line(&raw)?;

        if let Some(last) = self.last_t_ms {
            if parsed.t_ms < last {
                warn!(
                    line = self.line_no,
                    t_ms = parsed.t_ms,
                    previous_ms = last,
                    "Replay frame timestamp goes backwards"
                );
            }
        }
        self.last_t_ms = Some(parsed.t_ms);

        let origin = *self.origin.get_or_insert_with(|| self.clock.now());
        let timestamp = origin.saturating_add(Duration::from_millis(parsed.t_ms));

        if self.realtime {
            let wait = timestamp.saturating_since(self.clock.now());
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }

        Ok(Some(LandmarkFrame::new(timestamp, parsed.landmarks)))
    }

    async fn teardown(&mut self) {
        if self.lines.take().is_some() {
            info!(path = %self.path.display(), lines_read = self.line_no, "Replay source closed");
        }
    }
}
