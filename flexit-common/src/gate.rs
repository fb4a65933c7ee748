//! Landmark confidence gate
//!
//! Admits a frame only when every landmark the active profile needs is
//! present, finite and at least as confident as the profile's minimum.
//! Rejection is the normal outcome during occlusion or motion blur: the frame
//! is dropped and nothing downstream runs.

use std::fmt;
use thiserror::Error;

use crate::angle::Point2;
use crate::landmarks::{LandmarkFrame, PoseLandmark};
use crate::profile::ExerciseProfile;
use crate::time::Timestamp;

/// Why a required landmark failed the gate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    /// Frame carries fewer keypoints than the landmark's index
    Missing,
    /// Coordinates are NaN or infinite
    NonFinite,
    /// Visibility below the profile minimum
    LowConfidence { visibility: f64, minimum: f64 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Missing => f.write_str("missing"),
            RejectReason::NonFinite => f.write_str("non-finite coordinates"),
            RejectReason::LowConfidence {
                visibility,
                minimum,
            } => write!(f, "visibility {:.2} below {:.2}", visibility, minimum),
        }
    }
}

/// Frame dropped by the gate (soft skip, never surfaced to the user)
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("Frame rejected: {landmark} {reason}")]
pub struct FrameRejected {
    /// First required landmark that failed
    pub landmark: PoseLandmark,
    pub reason: RejectReason,
}

/// The subset of a frame's landmarks required by one profile
#[derive(Debug, Clone, PartialEq)]
pub struct GatedLandmarks {
    pub timestamp: Timestamp,
    points: Vec<(PoseLandmark, Point2)>,
}

impl GatedLandmarks {
    pub fn point(&self, landmark: PoseLandmark) -> Option<Point2> {
        self.points
            .iter()
            .find(|(lm, _)| *lm == landmark)
            .map(|(_, p)| *p)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Stateless landmark filter for one exercise profile
pub struct LandmarkGate;

impl LandmarkGate {
    pub fn admit(
        frame: &LandmarkFrame,
        profile: &ExerciseProfile,
    ) -> Result<GatedLandmarks, FrameRejected> {
        let required = profile.required_landmarks();
        let mut points = Vec::with_capacity(required.len());

        for landmark in required {
            let reject = |reason| FrameRejected { landmark, reason };

            let lm = frame.get(landmark).ok_or_else(|| reject(RejectReason::Missing))?;
            if !lm.is_finite() {
                return Err(reject(RejectReason::NonFinite));
            }
            if lm.visibility.is_nan() || lm.visibility < profile.min_confidence {
                return Err(reject(RejectReason::LowConfidence {
                    visibility: lm.visibility,
                    minimum: profile.min_confidence,
                }));
            }
            points.push((landmark, Point2::new(lm.x, lm.y)));
        }

        Ok(GatedLandmarks {
            timestamp: frame.timestamp,
            points,
        })
    }
}
