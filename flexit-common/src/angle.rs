//! Joint-angle geometry
//!
//! The angle at a vertex is measured from the difference of the two limb
//! vectors' directions and folded into [0, 180] degrees, so the result is the
//! same whichever side of the body the limb is on.

use thiserror::Error;

/// Squared length below which a limb vector is considered degenerate
const MIN_VECTOR_LENGTH_SQ: f64 = 1e-12;

/// 2D point in normalised image coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// No usable angle can be computed from the given points
///
/// Callers treat this as "skip this frame", never as a fatal error.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    #[error("Invalid geometry: coincident or non-finite points")]
    InvalidGeometry,
}

/// Angle at vertex `b` formed by `a` and `c`, in degrees within [0, 180]
pub fn joint_angle(a: Point2, b: Point2, c: Point2) -> Result<f64, GeometryError> {
    let (ax, ay) = (a.x - b.x, a.y - b.y);
    let (cx, cy) = (c.x - b.x, c.y - b.y);

    if ![ax, ay, cx, cy].iter().all(|v| v.is_finite()) {
        return Err(GeometryError::InvalidGeometry);
    }
    if ax * ax + ay * ay < MIN_VECTOR_LENGTH_SQ || cx * cx + cy * cy < MIN_VECTOR_LENGTH_SQ {
        return Err(GeometryError::InvalidGeometry);
    }

    let radians = cy.atan2(cx) - ay.atan2(ax);
    let degrees = radians.to_degrees().abs();

    Ok(if degrees > 180.0 { 360.0 - degrees } else { degrees })
}
