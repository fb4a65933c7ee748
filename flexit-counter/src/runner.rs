//! Session task
//!
//! One tokio task owns the [`WorkoutSession`]. Frames reach it over a bounded
//! mpsc queue fed by the pose pump; stop requests arrive on a separate
//! control channel that is always polled first, so a stop and the frames
//! queued behind it are handled in a fixed order on the one task.
//!
//! When the session ends (target reached, stopped, or every frame sender
//! dropped) the task:
//! 1. Closes and drains the frame queue, counting the discarded frames
//! 2. Cancels the shared token so the pose pump tears its source down
//! 3. Saves the workout record exactly once
//! 4. Returns the summary, or [`Error::Persistence`] carrying it

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use flexit_common::{
    Clock, EventBus, LandmarkFrame, SessionEvent, SessionPhase, SessionSummary, WorkoutSession,
};

use crate::error::{Error, Result};
use crate::sink::{WorkoutRecord, WorkoutRecordSink};

/// What `submit` does when the frame queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backpressure {
    /// Wait for queue capacity
    #[default]
    Block,
    /// Discard the newest frame
    Drop,
}

/// Result of offering one frame to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Queued,
    /// Queue full under [`Backpressure::Drop`]
    Dropped,
    /// Session no longer accepts frames
    Closed,
}

/// Producer side of the session's frame queue
#[derive(Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<LandmarkFrame>,
    policy: Backpressure,
    dropped: Arc<AtomicU64>,
}

impl FrameSender {
    pub async fn submit(&self, frame: LandmarkFrame) -> SubmitOutcome {
        match self.policy {
            Backpressure::Block => match self.tx.send(frame).await {
                Ok(()) => SubmitOutcome::Queued,
                Err(_) => SubmitOutcome::Closed,
            },
            Backpressure::Drop => match self.tx.try_send(frame) {
                Ok(()) => SubmitOutcome::Queued,
                Err(mpsc::error::TrySendError::Full(frame)) => {
                    let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    trace!(at_ms = frame.timestamp.as_millis(), dropped, "Frame queue full, frame dropped");
                    SubmitOutcome::Dropped
                }
                Err(mpsc::error::TrySendError::Closed(_)) => SubmitOutcome::Closed,
            },
        }
    }

    pub fn policy(&self) -> Backpressure {
        self.policy
    }

    /// Frames discarded so far because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug, Clone, Copy)]
enum Control {
    Stop,
}

/// Everything the session task needs besides the session itself
#[derive(Clone)]
pub struct SessionDeps {
    pub sink: Arc<dyn WorkoutRecordSink>,
    pub event_bus: EventBus,
    pub clock: Arc<dyn Clock>,
    pub frame_queue_capacity: usize,
    pub backpressure: Backpressure,
    /// Cancelled when the session ends; shared with the pose pump
    pub cancel: CancellationToken,
}

/// Control side of a running session task
pub struct SessionHandle {
    control: mpsc::UnboundedSender<Control>,
    task: JoinHandle<Result<SessionSummary>>,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Ask the session to stop
    ///
    /// Safe to call any number of times, including after the session ended.
    pub fn stop(&self) {
        if self.control.send(Control::Stop).is_err() {
            debug!("Stop requested after session task exited");
        }
    }

    /// True once the session has ended
    pub fn is_finished(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token cancelled when the session ends
    pub fn cancelled_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the session task and return its outcome
    pub async fn wait(self) -> Result<SessionSummary> {
        let SessionHandle { control, task, .. } = self;
        let joined = task.await;
        drop(control);
        joined.map_err(|e| Error::SessionTask(e.to_string()))?
    }
}

/// Move an active session onto its own task
///
/// The session must already be started; a session in any other phase makes
/// the task return immediately with the lifecycle error.
pub fn spawn_session(session: WorkoutSession, deps: SessionDeps) -> (FrameSender, SessionHandle) {
    let (frame_tx, frame_rx) = mpsc::channel(deps.frame_queue_capacity.max(1));
    let (control_tx, control_rx) = mpsc::unbounded_channel();

    let sender = FrameSender {
        tx: frame_tx,
        policy: deps.backpressure,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    let cancel = deps.cancel.clone();
    let task = tokio::spawn(run_session(session, frame_rx, control_rx, deps));

    (
        sender,
        SessionHandle {
            control: control_tx,
            task,
            cancel,
        },
    )
}

async fn run_session(
    mut session: WorkoutSession,
    mut frames: mpsc::Receiver<LandmarkFrame>,
    mut control: mpsc::UnboundedReceiver<Control>,
    deps: SessionDeps,
) -> Result<SessionSummary> {
    if session.phase() != SessionPhase::Active {
        deps.cancel.cancel();
        return Err(flexit_common::Error::InvalidPhase {
            operation: "run a session task",
            phase: session.phase(),
        }
        .into());
    }
    info!(
        exercise = session.profile().map(|p| p.id.as_str()).unwrap_or_default(),
        queue_capacity = deps.frame_queue_capacity,
        backpressure = ?deps.backpressure,
        "Session task started"
    );

    let mut control_open = true;
    while session.phase() == SessionPhase::Active {
        tokio::select! {
            biased;

            command = control.recv(), if control_open => match command {
                Some(Control::Stop) => {
                    info!("Stop requested");
                    let events = session.stop(deps.clock.now())?;
                    publish(&deps.event_bus, events);
                }
                None => {
                    // Handle dropped without stopping; keep counting
                    control_open = false;
                }
            },

            frame = frames.recv() => match frame {
                Some(frame) => {
                    let events = session.on_frame(&frame)?;
                    publish(&deps.event_bus, events);
                }
                None => {
                    info!("Frame producers gone, stopping session");
                    let events = session.stop(deps.clock.now())?;
                    publish(&deps.event_bus, events);
                }
            },
        }
    }

    frames.close();
    let mut discarded = 0u64;
    while frames.try_recv().is_ok() {
        discarded += 1;
    }
    if discarded > 0 {
        info!(discarded, "Discarded frames queued after session end");
    }
    deps.cancel.cancel();

    let summary = session
        .last_summary()
        .cloned()
        .ok_or_else(|| Error::SessionTask("session ended without a summary".to_string()))?;

    let record = WorkoutRecord::from_summary(&summary);
    match deps.sink.save(&record).await {
        Ok(()) => {
            info!(
                sink = deps.sink.name(),
                exercise = %record.exercise_type,
                reps = record.reps,
                date = %record.date,
                "Workout saved"
            );
            Ok(summary)
        }
        Err(e) => {
            error!(sink = deps.sink.name(), "Failed to save workout: {}", e);
            Err(Error::Persistence {
                summary: Box::new(summary),
                source: e,
            })
        }
    }
}

fn publish(bus: &EventBus, events: Vec<SessionEvent>) {
    for event in events {
        trace!(event_type = event.event_type(), "Publishing session event");
        if let SessionEvent::SessionCompleted { .. } = &event {
            if bus.subscriber_count() == 0 {
                warn!("Session completed with no event subscribers");
            }
        }
        bus.emit_lossy(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flexit_common::Timestamp;

    fn sender(capacity: usize, policy: Backpressure) -> (FrameSender, mpsc::Receiver<LandmarkFrame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            FrameSender {
                tx,
                policy,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    fn frame(ms: u64) -> LandmarkFrame {
        LandmarkFrame::new(Timestamp::from_millis(ms), Vec::new())
    }

    #[tokio::test]
    async fn test_drop_policy_discards_newest() {
        let (tx, mut rx) = sender(1, Backpressure::Drop);
        assert_eq!(tx.submit(frame(0)).await, SubmitOutcome::Queued);
        assert_eq!(tx.submit(frame(33)).await, SubmitOutcome::Dropped);
        assert_eq!(tx.dropped(), 1);
        assert_eq!(rx.recv().await.unwrap().timestamp, Timestamp::ZERO);
    }

    #[tokio::test]
    async fn test_closed_queue_reported() {
        let (tx, rx) = sender(4, Backpressure::Block);
        drop(rx);
        assert!(tx.is_closed());
        assert_eq!(tx.submit(frame(0)).await, SubmitOutcome::Closed);
    }

    #[test]
    fn test_backpressure_parses_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            on_full: Backpressure,
        }
        let w: Wrapper = toml::from_str("on_full = \"drop\"").unwrap();
        assert_eq!(w.on_full, Backpressure::Drop);
        assert_eq!(Backpressure::default(), Backpressure::Block);
    }
}
