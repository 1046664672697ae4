#![warn(missing_docs)]

//! Parametric curve abstractions for the luthier surface kernel.
//!
//! Provides the [`Curve3d`] trait every curve representation implements,
//! plus generic algorithms written against it: closest-point parameter
//! inversion, curve–curve intersection and minimum distance.

mod intersect;
mod project;

pub use intersect::{intersect_curves, min_distance, CurveIntersection};
pub use project::{closest_parameter, refine_parameter};

use luthier_kernel_math::{Point3, Vec3};

// =============================================================================
// Curve trait
// =============================================================================

/// A parametric curve in 3D space.
pub trait Curve3d: Send + Sync + std::fmt::Debug {
    /// Evaluate the curve at parameter `t` to get a 3D point.
    fn evaluate(&self, t: f64) -> Point3;

    /// Derivatives at `t` up to and including `order`.
    ///
    /// Entry `k` holds the k-th derivative; entry 0 is the position as a
    /// vector. The returned vector has `order + 1` entries.
    fn derivatives(&self, t: f64, order: usize) -> Vec<Vec3>;

    /// Parameter domain `(t_min, t_max)`.
    fn domain(&self) -> (f64, f64);

    /// First derivative at parameter `t`.
    fn tangent(&self, t: f64) -> Vec3 {
        self.derivatives(t, 1)
            .get(1)
            .copied()
            .unwrap_or_else(Vec3::zeros)
    }

    /// Suggested number of segments for sampling the curve.
    ///
    /// Default returns 32.
    fn suggested_segments(&self) -> usize {
        32
    }
}

// =============================================================================
// Line3d
// =============================================================================

/// A 3D line segment defined by origin and direction.
///
/// Parameterization: `P(t) = origin + t * direction`, `t ∈ [0, 1]`.
#[derive(Debug, Clone)]
pub struct Line3d {
    /// Starting point.
    pub origin: Point3,
    /// Direction (its magnitude is the segment length).
    pub direction: Vec3,
}

impl Line3d {
    /// Create a line from two endpoints, parameterized so `t=0` gives `start` and `t=1` gives `end`.
    pub fn from_points(start: Point3, end: Point3) -> Self {
        Self {
            origin: start,
            direction: end - start,
        }
    }
}

impl Curve3d for Line3d {
    fn evaluate(&self, t: f64) -> Point3 {
        self.origin + t * self.direction
    }

    fn derivatives(&self, t: f64, order: usize) -> Vec<Vec3> {
        let mut ders = vec![Vec3::zeros(); order + 1];
        ders[0] = self.evaluate(t).coords;
        if order >= 1 {
            ders[1] = self.direction;
        }
        ders
    }

    fn domain(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    fn suggested_segments(&self) -> usize {
        1
    }
}

/// Sample a curve uniformly in parameter space (`segments + 1` samples).
pub(crate) fn sample_curve<C: Curve3d + ?Sized>(curve: &C, segments: usize) -> Vec<(f64, Point3)> {
    let (t0, t1) = curve.domain();
    let n = segments.max(1);
    (0..=n)
        .map(|i| {
            let t = if i == n {
                t1
            } else {
                t0 + (t1 - t0) * i as f64 / n as f64
            };
            (t, curve.evaluate(t))
        })
        .collect()
}
