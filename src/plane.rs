//! # Disparity planes
//!
//! A disparity plane is an affine function `d(x, y) = a*x + b*y + c` over image coordinates. It
//! lets a single pixel describe a slanted surface, and lets the same plane be handed to
//! neighbouring pixels during propagation.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Normals whose z component is smaller than this in magnitude are treated as degenerate.
pub const MIN_NORMAL_Z: f32 = 0.05;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisparityPlane {
    pub a: f32,
    pub b: f32,
    pub c: f32
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl DisparityPlane {
    pub fn new(a: f32, b: f32, c: f32) -> Self {
        Self { a, b, c }
    }

    /// Fronto-parallel plane at disparity `d`.
    pub fn constant(d: f32) -> Self {
        Self::new(0.0, 0.0, d)
    }

    /// Plane with the given slant coefficients passing through disparity `d` at `(x, y)`.
    pub fn from_slant(x: f32, y: f32, d: f32, a: f32, b: f32) -> Self {
        Self::new(a, b, d - a * x - b * y)
    }

    /// Plane through the point `(x, y, d)` with normal `n`.
    ///
    /// Returns `None` when the normal is too close to lying in the image plane, or when the
    /// resulting coefficients are not finite.
    pub fn from_point_normal(x: f32, y: f32, d: f32, n: [f32; 3]) -> Option<Self> {
        if !(n[2].abs() >= MIN_NORMAL_Z) {
            return None;
        }

        let plane = Self::from_slant(x, y, d, -n[0] / n[2], -n[1] / n[2]);
        if plane.is_finite() {
            Some(plane)
        }
        else {
            None
        }
    }

    /// Disparity of the plane at `(x, y)`.
    #[inline]
    pub fn evaluate(&self, x: f32, y: f32) -> f32 {
        self.a * x + self.b * y + self.c
    }

    /// Unit normal of the plane, oriented with a positive z component.
    pub fn normal(&self) -> [f32; 3] {
        let norm = (self.a * self.a + self.b * self.b + 1.0).sqrt();
        [-self.a / norm, -self.b / norm, 1.0 / norm]
    }

    pub fn is_finite(&self) -> bool {
        self.a.is_finite() && self.b.is_finite() && self.c.is_finite()
    }

    /// Express the plane in the coordinates of the other view.
    ///
    /// A pixel `x` with disparity `d` in this view lands at `x + sign * d` in the other view, so
    /// the transferred plane is `d' = (a*x' + b*y + c) / (1 + sign*a)`. Returns `None` for
    /// slants that make the mapping degenerate.
    pub fn to_other_view(&self, sign: f32) -> Option<Self> {
        let denom = 1.0 + sign * self.a;
        if !(denom.abs() >= MIN_NORMAL_Z) {
            return None;
        }

        let plane = Self::new(self.a / denom, self.b / denom, self.c / denom);
        if plane.is_finite() {
            Some(plane)
        }
        else {
            None
        }
    }
}

/// Normalise a 3-vector, returning `None` for zero-length or non-finite input.
pub fn normalize(v: [f32; 3]) -> Option<[f32; 3]> {
    let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if norm > 0.0 && norm.is_finite() {
        Some([v[0] / norm, v[1] / norm, v[2] / norm])
    }
    else {
        None
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_normal_round_trips_through_own_pixel() {
        let plane = DisparityPlane::from_point_normal(12.0, 7.0, 5.5, [0.2, -0.1, 0.97]).unwrap();
        assert!((plane.evaluate(12.0, 7.0) - 5.5).abs() < 1e-4);

        // Rebuilding from the plane's own normal gives back the same plane
        let rebuilt = DisparityPlane::from_point_normal(12.0, 7.0, 5.5, plane.normal()).unwrap();
        assert!((rebuilt.a - plane.a).abs() < 1e-5);
        assert!((rebuilt.b - plane.b).abs() < 1e-5);
        assert!((rebuilt.c - plane.c).abs() < 1e-3);
    }

    #[test]
    fn degenerate_normals_are_rejected() {
        assert!(DisparityPlane::from_point_normal(0.0, 0.0, 1.0, [1.0, 0.0, 0.0]).is_none());
        assert!(DisparityPlane::from_point_normal(0.0, 0.0, 1.0, [0.0, 0.0, f32::NAN]).is_none());
    }

    #[test]
    fn transfer_lands_on_matching_pixel() {
        let left = DisparityPlane::new(0.1, 0.05, 3.0);
        let (x, y) = (20.0, 4.0);
        let d = left.evaluate(x, y);

        let right = left.to_other_view(-1.0).unwrap();
        let xr = x - d;
        assert!((right.evaluate(xr, y) - d).abs() < 1e-4);

        // And back again
        let back = right.to_other_view(1.0).unwrap();
        assert!((back.evaluate(x, y) - d).abs() < 1e-3);
    }

    #[test]
    fn constant_plane_transfers_unchanged() {
        let plane = DisparityPlane::constant(4.0);
        assert_eq!(plane.to_other_view(-1.0), Some(plane));
        assert_eq!(plane.to_other_view(1.0), Some(plane));
    }
}
