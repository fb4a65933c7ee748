//! Pose source adapters
//!
//! A pose source wraps the external pose-estimation model: it loads, reports
//! readiness, then yields one landmark frame at a time in capture order.
//! [`pump`] forwards those frames into the session's bounded frame queue until
//! the source is exhausted or the session cancels it, then tears the source
//! down.

pub mod replay;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use flexit_common::LandmarkFrame;

use crate::error::Result;
use crate::runner::{FrameSender, SubmitOutcome};

pub use replay::ReplaySource;

/// External producer of landmark frames
#[async_trait]
pub trait PoseSource: Send {
    /// Source identifier for logging
    fn name(&self) -> &str;

    /// Load the model / open the input; must succeed before `is_ready`
    async fn prepare(&mut self) -> Result<()>;

    fn is_ready(&self) -> bool;

    /// Next frame, or `None` once the source is exhausted
    async fn next_frame(&mut self) -> Result<Option<LandmarkFrame>>;

    /// Release model and capture resources
    async fn teardown(&mut self);
}

/// Frame delivery counters for one pump run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub delivered: u64,
    pub dropped: u64,
}

/// Forward frames from `source` into `frames` until exhaustion or cancellation
///
/// The source is torn down on every exit path.
pub async fn pump<S>(source: &mut S, frames: FrameSender, cancel: CancellationToken) -> Result<PumpStats>
where
    S: PoseSource + ?Sized,
{
    let name = source.name().to_string();
    let mut stats = PumpStats::default();

    let result = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(source = %name, "Pose pump cancelled by session");
                break Ok(());
            }
            next = source.next_frame() => next,
        };

        match next {
            Ok(Some(frame)) => match frames.submit(frame).await {
                SubmitOutcome::Queued => stats.delivered += 1,
                SubmitOutcome::Dropped => stats.dropped += 1,
                SubmitOutcome::Closed => {
                    debug!(source = %name, "Frame queue closed");
                    break Ok(());
                }
            },
            Ok(None) => {
                info!(source = %name, "Pose source exhausted");
                break Ok(());
            }
            Err(e) => {
                warn!(source = %name, "Pose source failed: {}", e);
                break Err(e);
            }
        }
    };

    // Dropping the sender lets the session see end-of-stream
    drop(frames);
    source.teardown().await;
    info!(
        source = %name,
        delivered = stats.delivered,
        dropped = stats.dropped,
        "Pose source released"
    );

    result.map(|()| stats)
}
