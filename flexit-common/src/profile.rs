//! Exercise profile registry
//!
//! Each supported exercise is one declarative [`ExerciseProfile`]: the joints
//! whose angle represents the movement, the Down/Up thresholds, the minimum
//! landmark confidence and the rep cooldown. A single generic evaluation path
//! consumes these entries, so adding an exercise means adding a profile.
//!
//! The registry is built once at start-up (built-in table plus optional
//! config overrides) and is never mutated afterwards.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::info;

use crate::angle::{joint_angle, GeometryError};
use crate::gate::GatedLandmarks;
use crate::landmarks::PoseLandmark;
use crate::{Error, Result};

/// Three landmarks forming a joint: the angle is measured at `vertex`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointTriple {
    pub a: PoseLandmark,
    pub vertex: PoseLandmark,
    pub c: PoseLandmark,
}

impl JointTriple {
    pub const fn new(a: PoseLandmark, vertex: PoseLandmark, c: PoseLandmark) -> Self {
        Self { a, vertex, c }
    }

    fn landmarks(&self) -> [PoseLandmark; 3] {
        [self.a, self.vertex, self.c]
    }

    fn angle(&self, points: &GatedLandmarks) -> std::result::Result<f64, GeometryError> {
        let a = points.point(self.a).ok_or(GeometryError::InvalidGeometry)?;
        let b = points.point(self.vertex).ok_or(GeometryError::InvalidGeometry)?;
        let c = points.point(self.c).ok_or(GeometryError::InvalidGeometry)?;
        joint_angle(a, b, c)
    }
}

impl fmt::Display for JointTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.a, self.vertex, self.c)
    }
}

/// How one representative angle is extracted from a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleRule {
    /// Angle of a single joint
    Single(JointTriple),
    /// Mean of the left and right joint angles
    BilateralAverage(JointTriple, JointTriple),
}

impl AngleRule {
    /// Every landmark the rule reads, without duplicates, in index order
    pub fn required_landmarks(&self) -> Vec<PoseLandmark> {
        let mut required: Vec<PoseLandmark> = match self {
            AngleRule::Single(joint) => joint.landmarks().to_vec(),
            AngleRule::BilateralAverage(left, right) => {
                left.landmarks().into_iter().chain(right.landmarks()).collect()
            }
        };
        required.sort();
        required.dedup();
        required
    }

    /// Extract the representative angle; either side failing fails the frame
    pub fn extract(&self, points: &GatedLandmarks) -> std::result::Result<f64, GeometryError> {
        match self {
            AngleRule::Single(joint) => joint.angle(points),
            AngleRule::BilateralAverage(left, right) => {
                let left = left.angle(points)?;
                let right = right.angle(points)?;
                Ok((left + right) / 2.0)
            }
        }
    }
}

impl fmt::Display for AngleRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AngleRule::Single(joint) => write!(f, "{}", joint),
            AngleRule::BilateralAverage(left, right) => write!(f, "avg({}, {})", left, right),
        }
    }
}

/// Immutable counting configuration for one exercise
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseProfile {
    /// Registry key (e.g. "squat", "push-up")
    pub id: String,
    pub display_name: String,
    /// Target offered when the caller does not choose one
    pub default_target: u32,
    pub rule: AngleRule,
    /// Angle at or below which the joint counts as flexed (Down)
    pub down_angle: f64,
    /// Angle at or above which the joint counts as extended (Up)
    pub up_angle: f64,
    /// Minimum visibility every required landmark must reach
    pub min_confidence: f64,
    /// Minimum time between consecutive Down transitions
    pub cooldown: Duration,
}

impl ExerciseProfile {
    pub fn required_landmarks(&self) -> Vec<PoseLandmark> {
        self.rule.required_landmarks()
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidProfile("exercise id is empty".to_string()));
        }
        let in_range = |v: f64| v.is_finite() && (0.0..=180.0).contains(&v);
        if !in_range(self.down_angle) || !in_range(self.up_angle) {
            return Err(Error::InvalidProfile(format!(
                "{}: thresholds must lie within [0, 180] degrees",
                self.id
            )));
        }
        if self.down_angle >= self.up_angle {
            return Err(Error::InvalidProfile(format!(
                "{}: down_angle ({}) must be below up_angle ({})",
                self.id, self.down_angle, self.up_angle
            )));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(Error::InvalidProfile(format!(
                "{}: min_confidence ({}) must lie within [0, 1]",
                self.id, self.min_confidence
            )));
        }
        if self.default_target == 0 {
            return Err(Error::InvalidProfile(format!(
                "{}: default_target must be at least 1",
                self.id
            )));
        }
        Ok(())
    }

    fn apply(&mut self, overrides: &ProfileOverride) {
        if let Some(name) = &overrides.display_name {
            self.display_name = name.clone();
        }
        if let Some(target) = overrides.default_target {
            self.default_target = target;
        }
        if let Some(rule) = overrides.joints {
            self.rule = rule.into();
        }
        if let Some(down) = overrides.down_angle {
            self.down_angle = down;
        }
        if let Some(up) = overrides.up_angle {
            self.up_angle = up;
        }
        if let Some(confidence) = overrides.min_confidence {
            self.min_confidence = confidence;
        }
        if let Some(ms) = overrides.cooldown_ms {
            self.cooldown = Duration::from_millis(ms);
        }
    }
}

/// Joint selection as written in a config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointsSpec {
    Single([PoseLandmark; 3]),
    Bilateral([[PoseLandmark; 3]; 2]),
}

impl From<JointsSpec> for AngleRule {
    fn from(joints: JointsSpec) -> Self {
        let triple = |[a, b, c]: [PoseLandmark; 3]| JointTriple::new(a, b, c);
        match joints {
            JointsSpec::Single(joint) => AngleRule::Single(triple(joint)),
            JointsSpec::Bilateral([left, right]) => {
                AngleRule::BilateralAverage(triple(left), triple(right))
            }
        }
    }
}

/// Per-exercise overrides from the `[exercises.<id>]` config tables
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileOverride {
    pub display_name: Option<String>,
    pub default_target: Option<u32>,
    pub joints: Option<JointsSpec>,
    pub down_angle: Option<f64>,
    pub up_angle: Option<f64>,
    pub min_confidence: Option<f64>,
    pub cooldown_ms: Option<u64>,
}

/// Fixed mapping from exercise identifier to profile
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, ExerciseProfile>,
}

impl ProfileRegistry {
    /// Squat, push-up and sit-up with the stock thresholds
    pub fn builtin() -> Self {
        use PoseLandmark::*;

        let profiles = [
            ExerciseProfile {
                id: "squat".to_string(),
                display_name: "Squats".to_string(),
                default_target: 10,
                rule: AngleRule::BilateralAverage(
                    JointTriple::new(LeftHip, LeftKnee, LeftAnkle),
                    JointTriple::new(RightHip, RightKnee, RightAnkle),
                ),
                down_angle: 130.0,
                up_angle: 170.0,
                min_confidence: 0.5,
                cooldown: Duration::from_millis(1000),
            },
            ExerciseProfile {
                id: "push-up".to_string(),
                display_name: "Push Ups".to_string(),
                default_target: 10,
                rule: AngleRule::BilateralAverage(
                    JointTriple::new(LeftShoulder, LeftElbow, LeftWrist),
                    JointTriple::new(RightShoulder, RightElbow, RightWrist),
                ),
                down_angle: 85.0,
                up_angle: 150.0,
                min_confidence: 0.5,
                cooldown: Duration::from_millis(1200),
            },
            ExerciseProfile {
                id: "sit-up".to_string(),
                display_name: "Sit Ups".to_string(),
                default_target: 15,
                rule: AngleRule::Single(JointTriple::new(LeftShoulder, LeftHip, LeftKnee)),
                down_angle: 55.0,
                up_angle: 105.0,
                min_confidence: 0.5,
                cooldown: Duration::from_millis(1000),
            },
        ];

        Self {
            profiles: profiles.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    /// Built-in table with config overrides applied, every entry validated
    ///
    /// An id absent from the built-in table defines a new exercise and must
    /// name its joints.
    pub fn with_overrides(overrides: &BTreeMap<String, ProfileOverride>) -> Result<Self> {
        let mut registry = Self::builtin();

        for (id, over) in overrides {
            match registry.profiles.get_mut(id) {
                Some(profile) => {
                    profile.apply(over);
                    info!(exercise = %id, "Applied exercise profile override");
                }
                None => {
                    let joints = over.joints.ok_or_else(|| {
                        Error::InvalidProfile(format!(
                            "{}: new exercise requires `joints`",
                            id
                        ))
                    })?;
                    let mut profile = ExerciseProfile {
                        id: id.clone(),
                        display_name: id.clone(),
                        default_target: 10,
                        rule: joints.into(),
                        down_angle: 90.0,
                        up_angle: 160.0,
                        min_confidence: 0.5,
                        cooldown: Duration::from_millis(1000),
                    };
                    profile.apply(over);
                    info!(exercise = %id, rule = %profile.rule, "Registered custom exercise");
                    registry.profiles.insert(id.clone(), profile);
                }
            }
        }

        for profile in registry.profiles.values() {
            profile.validate()?;
        }

        Ok(registry)
    }

    pub fn lookup(&self, id: &str) -> Result<&ExerciseProfile> {
        self.profiles
            .get(id)
            .ok_or_else(|| Error::UnknownExercise(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExerciseProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
