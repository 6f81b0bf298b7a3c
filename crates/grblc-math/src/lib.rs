#![warn(missing_docs)]

//! Math types for the grblc laser G-code compiler.
//!
//! Thin wrappers around nalgebra providing the 2D machine-plane types
//! used by the toolpath engines: points, vectors, rotations about the
//! origin, and tolerance constants.

use nalgebra::Vector2;

/// A point in the 2D machine plane (mm).
pub type Point2 = nalgebra::Point2<f64>;

/// A vector in the 2D machine plane (mm).
pub type Vec2 = Vector2<f64>;

/// A rotation about the origin, precomputed for repeated application.
///
/// Hatching rotates every vertex of a polygon into scanline space and
/// every emitted span back out, so the sine/cosine pair is computed once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation2 {
    cos: f64,
    sin: f64,
}

impl Rotation2 {
    /// Rotation by `angle` radians (counter-clockwise positive).
    pub fn from_radians(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self { cos, sin }
    }

    /// Rotation by `angle` degrees.
    pub fn from_degrees(angle: f64) -> Self {
        Self::from_radians(angle.to_radians())
    }

    /// Identity rotation.
    pub fn identity() -> Self {
        Self { cos: 1.0, sin: 0.0 }
    }

    /// The inverse rotation.
    pub fn inverse(&self) -> Self {
        Self {
            cos: self.cos,
            sin: -self.sin,
        }
    }

    /// Rotate a point about the origin.
    pub fn apply(&self, p: Point2) -> Point2 {
        Point2::new(
            p.x * self.cos - p.y * self.sin,
            p.x * self.sin + p.y * self.cos,
        )
    }
}

/// Euclidean distance between two points.
pub fn distance(a: Point2, b: Point2) -> f64 {
    (b - a).norm()
}

/// Round `value` to the nearest multiple of `step`.
///
/// Used to quantize emitted coordinates to the machine resolution.
/// A non-positive `step` returns the value unchanged.
pub fn quantize(value: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return value;
    }
    (value / step).round() * step
}

/// Number of decimal places needed to print a coordinate quantized to
/// `step` without trailing noise digits (e.g. 0.1 -> 1, 0.01 -> 2,
/// 0.25 -> 2).
///
/// Counts digits until every multiple of `step` prints exactly, not
/// just until the leading digit surfaces, so non-decade steps like
/// 0.25 get their full precision. Capped at 6 decimals.
pub fn decimals_for(step: f64) -> usize {
    if step <= 0.0 {
        return 0;
    }
    let mut decimals = 0usize;
    let mut s = step;
    while (s - s.round()).abs() > 1e-9 && decimals < 6 {
        s *= 10.0;
        decimals += 1;
    }
    decimals
}

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Linear distance tolerance in mm.
    pub linear: f64,
}

impl Tolerance {
    /// Default toolpath tolerances (1e-9 mm linear).
    pub const DEFAULT: Self = Self { linear: 1e-9 };

    /// Check if two points are coincident within tolerance.
    pub fn points_equal(&self, a: Point2, b: Point2) -> bool {
        (a - b).norm() < self.linear
    }

    /// Check if a scalar distance is effectively zero.
    pub fn is_zero(&self, d: f64) -> bool {
        d.abs() < self.linear
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}
