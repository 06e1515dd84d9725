//! Vector and angle math over 2-D keypoint positions.
//!
//! Every function here treats a missing point as "unknown" and propagates
//! `None` instead of substituting zero, since 0° is a valid joint angle.

use serde::{Deserialize, Serialize};

/// A position in the source video's pixel coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Both coordinates are finite numbers
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Vector pointing from `origin` to `self`
    fn relative_to(&self, origin: &Point) -> (f64, f64) {
        (self.x - origin.x, self.y - origin.y)
    }
}

/// Unit vector along `v`, `None` for a zero-length or overflowing ray
fn unit(v: (f64, f64)) -> Option<(f64, f64)> {
    let magnitude = v.0.hypot(v.1);
    if magnitude == 0.0 || !magnitude.is_finite() {
        return None;
    }
    Some((v.0 / magnitude, v.1 / magnitude))
}

/// Angle at vertex `b` formed by the rays b→a and b→c, in degrees.
///
/// Returns `None` when any point is missing or non-finite, or when either ray
/// has zero length. The result is always a finite value within [0, 180].
pub fn angle(a: Option<Point>, b: Option<Point>, c: Option<Point>) -> Option<f64> {
    let (a, b, c) = (a?, b?, c?);
    if !(a.is_finite() && b.is_finite() && c.is_finite()) {
        return None;
    }

    // Rays are normalised first so tiny or huge coordinates cannot
    // underflow or overflow the products below
    let ab = unit(a.relative_to(&b))?;
    let cb = unit(c.relative_to(&b))?;

    let dot = ab.0 * cb.0 + ab.1 * cb.1;
    let cross = ab.0 * cb.1 - ab.1 * cb.0;
    let degrees = cross.abs().atan2(dot).to_degrees();

    degrees.is_finite().then_some(degrees)
}

/// Arithmetic mean of the present values, `None` if all are missing
pub fn average(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    Some(present.iter().sum::<f64>() / present.len() as f64)
}
