#![warn(missing_docs)]

//! Math types for the luthier surface kernel.
//!
//! Thin wrappers around nalgebra providing the point and vector types used
//! by the B-spline crates, tolerance constants, and the dense linear solve
//! behind interpolation and constrained least-squares fitting.

use nalgebra::{DMatrix, Vector3};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Linear distance tolerance in model units.
    pub linear: f64,
    /// Parametric tolerance (knot and curve-parameter comparisons).
    pub parametric: f64,
    /// Angular tolerance in radians.
    pub angular: f64,
}

impl Tolerance {
    /// Default tolerances (1e-7 linear, 1e-10 parametric, 1e-9 rad angular).
    pub const DEFAULT: Self = Self {
        linear: 1e-7,
        parametric: 1e-10,
        angular: 1e-9,
    };

    /// Check if two points are coincident within tolerance.
    pub fn points_equal(&self, a: &Point3, b: &Point3) -> bool {
        (a - b).norm() < self.linear
    }

    /// Check if two curve parameters (or knots) are equal within tolerance.
    pub fn params_equal(&self, a: f64, b: f64) -> bool {
        (a - b).abs() < self.parametric
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

/// Pivots smaller than this fraction of the largest pivot mark a matrix as singular.
const SINGULAR_PIVOT_RATIO: f64 = 1e-14;

/// Solve `a * x = b` for a square `a` and any number of right-hand-side columns.
///
/// Uses an LU decomposition with partial pivoting. Returns `None` when `a` is
/// not square, its row count does not match `b`, or the system is singular
/// (a vanishing pivot or a non-finite solution).
pub fn solve_dense(a: DMatrix<f64>, b: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    if a.nrows() != a.ncols() || a.nrows() != b.nrows() || a.nrows() == 0 {
        return None;
    }
    let lu = a.lu();
    let diag = lu.u().diagonal();
    let max_pivot = diag.iter().fold(0.0_f64, |m, d| m.max(d.abs()));
    if max_pivot == 0.0
        || diag
            .iter()
            .any(|d| d.abs() <= SINGULAR_PIVOT_RATIO * max_pivot)
    {
        return None;
    }
    let x = lu.solve(b)?;
    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

/// Largest distance between any pair of points.
pub fn max_pairwise_distance(points: &[Point3]) -> f64 {
    let mut max = 0.0_f64;
    for (i, a) in points.iter().enumerate() {
        for b in &points[i + 1..] {
            max = max.max((a - b).norm());
        }
    }
    max
}
