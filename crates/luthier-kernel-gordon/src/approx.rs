//! Constrained least-squares B-spline fitting.
//!
//! [`BSplineApproxInterp`] fits one curve to an ordered point sequence. Each
//! point is either approximated (least squares) or interpolated (exact), and
//! interpolated points may be flagged as kinks, which get a C0 knot. Exact
//! constraints enter through Lagrange multipliers:
//!
//! ```text
//! | AᵀA  Cᵀ | |x|   |Aᵗb|
//! | C    0  | |λ| = | d |
//! ```
//!
//! One LU solve handles the x, y and z right-hand sides together.

use luthier_kernel_geom::closest_parameter;
use luthier_kernel_math::{max_pairwise_distance, solve_dense, Point3};
use luthier_kernel_nurbs::{BSplineBasis, BSplineCurve, KnotVector};
use nalgebra::DMatrix;

use crate::{GordonError, Result};

/// Knot tolerance used when placing kink knots.
const KINK_KNOT_TOLERANCE: f64 = 1e-4;

/// Seam constraints added to the fit of a closed point sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuityMode {
    /// Open curve, no seam constraints.
    None,
    /// First and second derivatives match at the seam. Position already
    /// matches because both end points are interpolated.
    C1C2,
    /// Position, first and second derivatives match at the seam.
    C0C1C2,
}

impl ContinuityMode {
    /// Number of extra equations this mode adds.
    pub fn num_conditions(self) -> usize {
        match self {
            ContinuityMode::None => 0,
            ContinuityMode::C1C2 => 2,
            ContinuityMode::C0C1C2 => 3,
        }
    }

    /// Derivative orders constrained at the seam, in equation order.
    fn orders(self) -> &'static [usize] {
        match self {
            ContinuityMode::None => &[],
            ContinuityMode::C1C2 => &[1, 2],
            ContinuityMode::C0C1C2 => &[1, 2, 0],
        }
    }
}

/// A fitted curve and its largest deviation from the approximated points.
#[derive(Debug, Clone)]
pub struct CurveFit {
    /// The fitted curve.
    pub curve: BSplineCurve,
    /// Maximum distance from an approximated point to the curve at its parameter.
    pub error: f64,
}

/// Fits a B-spline through a point sequence under mixed approximation and
/// interpolation constraints.
#[derive(Debug, Clone)]
pub struct BSplineApproxInterp {
    points: Vec<Point3>,
    approximated: Vec<usize>,
    interpolated: Vec<usize>,
    kinks: Vec<usize>,
    degree: usize,
    num_control_points: usize,
    continuous_if_closed: bool,
}

impl BSplineApproxInterp {
    /// Start a fit where every point is approximated.
    ///
    /// With `continuous_if_closed`, a point sequence whose ends coincide is
    /// fitted by a curve that is C2 across its seam.
    pub fn new(
        points: Vec<Point3>,
        num_control_points: usize,
        degree: usize,
        continuous_if_closed: bool,
    ) -> Self {
        Self {
            approximated: (0..points.len()).collect(),
            points,
            interpolated: Vec::new(),
            kinks: Vec::new(),
            degree,
            num_control_points,
            continuous_if_closed,
        }
    }

    /// Interpolate point `index` exactly, optionally as a C0 kink.
    pub fn interpolate_point(&mut self, index: usize, with_kink: bool) {
        match self.approximated.iter().position(|&i| i == index) {
            Some(pos) => {
                self.approximated.remove(pos);
                self.interpolated.push(index);
            }
            None => log::warn!(
                "invalid index {} for interpolation: not an approximated point",
                index
            ),
        }
        if with_kink {
            self.kinks.push(index);
        }
    }

    /// Points being fitted.
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    /// Parameters from cumulative `|Δp|^(2·alpha)`, normalized to `[0, 1]`.
    ///
    /// `alpha = 0` is uniform, `0.5` chord length.
    pub fn compute_parameters(&self, alpha: f64) -> Vec<f64> {
        let n = self.points.len();
        let mut params = Vec::with_capacity(n);
        params.push(0.0);
        let mut sum = 0.0;
        for pair in self.points.windows(2) {
            sum += (pair[1] - pair[0]).norm_squared().powf(alpha);
            params.push(sum);
        }
        if n < 2 {
            return params;
        }
        if sum > 0.0 {
            for t in params.iter_mut().skip(1) {
                *t /= sum;
            }
        } else {
            for (i, t) in params.iter_mut().enumerate() {
                *t = i as f64 / (n - 1) as f64;
            }
        }
        params[n - 1] = 1.0;
        params
    }

    /// Clamped knots with uniform interior spacing over the parameter range,
    /// plus a knot of multiplicity `degree` at every kink.
    pub fn compute_knots(&self, ncp: usize, params: &[f64]) -> Result<(Vec<f64>, Vec<usize>)> {
        let order = self.degree + 1;
        if ncp < order {
            return Err(GordonError::TooFewControlPoints {
                available: ncp,
                required: order,
            });
        }
        let umin = params.iter().copied().fold(f64::INFINITY, f64::min);
        let umax = params.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let interior = ncp - order;
        let mut knots = Vec::with_capacity(interior + 2);
        let mut mults = Vec::with_capacity(interior + 2);
        knots.push(umin);
        mults.push(order);
        for i in 1..=interior {
            knots.push(umin + (umax - umin) * i as f64 / (interior + 1) as f64);
            mults.push(1);
        }
        knots.push(umax);
        mults.push(order);

        for &k in &self.kinks {
            let t = params[k];
            match knots
                .iter()
                .position(|knot| (knot - t).abs() <= KINK_KNOT_TOLERANCE)
            {
                Some(pos) => mults[pos] = (mults[pos] + self.degree).min(self.degree),
                None => {
                    let pos = knots.partition_point(|knot| *knot < t);
                    knots.insert(pos, t);
                    mults.insert(pos, self.degree);
                }
            }
        }
        Ok((knots, mults))
    }

    /// True if seam constraints were requested and the end points coincide
    /// relative to the point cloud size.
    pub fn is_closed(&self) -> bool {
        if !self.continuous_if_closed || self.points.len() < 2 {
            return false;
        }
        let tol = 1e-12 * max_pairwise_distance(&self.points);
        let last = self.points.len() - 1;
        (self.points[0] - self.points[last]).norm() < tol
    }

    /// True if both end points are interpolated.
    pub fn first_and_last_interpolated(&self) -> bool {
        let last = self.points.len().saturating_sub(1);
        self.interpolated.contains(&0) && self.interpolated.contains(&last)
    }

    /// Seam constraints for the current point set.
    pub fn continuity_mode(&self) -> ContinuityMode {
        if !self.is_closed() {
            ContinuityMode::None
        } else if self.first_and_last_interpolated() {
            ContinuityMode::C1C2
        } else {
            ContinuityMode::C0C1C2
        }
    }

    /// Fit one curve for fixed parameters and knots.
    ///
    /// A singular system is reported as [`GordonError::SingularSystem`].
    pub fn solve(&self, params: &[f64], knots: &[f64], mults: &[usize]) -> Result<CurveFit> {
        let flat = KnotVector::from_unique(knots, mults).into_vec();
        let degree = self.degree;
        let mode = self.continuity_mode();
        let n_cont = mode.num_conditions();
        let n_interp = self.interpolated.len();
        let n_ctr = flat.len().saturating_sub(degree + 1);

        let required = (n_interp + n_cont).max(degree + 1 + n_cont);
        if n_ctr < required {
            return Err(GordonError::TooFewControlPoints {
                available: n_ctr,
                required,
            });
        }
        if self.approximated.is_empty() && n_ctr != n_interp + n_cont {
            return Err(GordonError::TooFewControlPoints {
                available: n_ctr,
                required: n_interp + n_cont,
            });
        }

        let basis = BSplineBasis::new(degree, &flat);
        let n_vars = n_ctr + n_interp + n_cont;
        let mut lhs = DMatrix::zeros(n_vars, n_vars);
        let mut rhs = DMatrix::zeros(n_vars, 3);

        if !self.approximated.is_empty() {
            let app_params: Vec<f64> = self.approximated.iter().map(|&i| params[i]).collect();
            let a = basis.matrix(&app_params, 0);
            let b = point_rows(&self.points, &self.approximated);
            lhs.view_mut((0, 0), (n_ctr, n_ctr))
                .copy_from(&a.tr_mul(&a));
            rhs.view_mut((0, 0), (n_ctr, 3)).copy_from(&a.tr_mul(&b));
        }

        if n_interp > 0 {
            let interp_params: Vec<f64> = self.interpolated.iter().map(|&i| params[i]).collect();
            let c = basis.matrix(&interp_params, 0);
            lhs.view_mut((n_ctr, 0), (n_interp, n_ctr)).copy_from(&c);
            lhs.view_mut((0, n_ctr), (n_ctr, n_interp))
                .copy_from(&c.transpose());
            rhs.view_mut((n_ctr, 0), (n_interp, 3))
                .copy_from(&point_rows(&self.points, &self.interpolated));
        }

        if n_cont > 0 {
            let (t_start, t_end) = (params[0], params[params.len() - 1]);
            let row0 = n_ctr + n_interp;
            for (k, &order) in mode.orders().iter().enumerate() {
                let start = basis.evaluate(t_start, order);
                let end = basis.evaluate(t_end, order);
                for col in 0..n_ctr {
                    let v = start[col] - end[col];
                    lhs[(row0 + k, col)] = v;
                    lhs[(col, row0 + k)] = v;
                }
            }
        }

        let x = solve_dense(lhs, &rhs).ok_or(GordonError::SingularSystem)?;
        let poles = (0..n_ctr)
            .map(|i| Point3::new(x[(i, 0)], x[(i, 1)], x[(i, 2)]))
            .collect();
        let curve = BSplineCurve::try_new(poles, flat, degree)?;

        let error = self
            .approximated
            .iter()
            .map(|&i| (curve.eval(params[i]) - self.points[i]).norm())
            .fold(0.0, f64::max);
        Ok(CurveFit { curve, error })
    }

    /// Fit with iterative parameter correction.
    ///
    /// Empty `initial_params` selects chord-length parameters. Each pass
    /// re-projects the approximated points onto the current curve and solves
    /// again, until the error stops improving or `max_iterations` passes ran.
    pub fn fit_curve_optimal(&self, initial_params: &[f64], max_iterations: usize) -> Result<CurveFit> {
        let mut params = if initial_params.is_empty() {
            self.compute_parameters(0.5)
        } else {
            initial_params.to_vec()
        };
        if params.len() != self.points.len() {
            return Err(GordonError::ParameterCountMismatch {
                what: "fit parameters",
                expected: self.points.len(),
                got: params.len(),
            });
        }

        let (knots, mults) = self.compute_knots(self.num_control_points, &params)?;
        let mut fit = self.solve(&params, &knots, &mults)?;
        let mut old_error = fit.error * 2.0;
        let mut iteration = 0;

        while fit.error > 0.0
            && (old_error - fit.error) / fit.error.max(1e-6) > 1e-6
            && iteration < max_iterations
        {
            old_error = fit.error;
            self.optimize_parameters(&fit.curve, &mut params);
            fit = self.solve(&params, &knots, &mults)?;
            iteration += 1;
        }
        Ok(fit)
    }

    /// Re-project every approximated point onto `curve`.
    fn optimize_parameters(&self, curve: &BSplineCurve, params: &mut [f64]) {
        for &i in &self.approximated {
            params[i] = closest_parameter(curve, &self.points[i]);
        }
    }
}

fn point_rows(points: &[Point3], indices: &[usize]) -> DMatrix<f64> {
    let mut m = DMatrix::zeros(indices.len(), 3);
    for (row, &i) in indices.iter().enumerate() {
        for k in 0..3 {
            m[(row, k)] = points[i][k];
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave(n: usize) -> Vec<Point3> {
        (0..n)
            .map(|i| {
                let t = i as f64 / (n - 1) as f64;
                Point3::new(10.0 * t, (6.0 * t).sin(), 0.3 * t * t)
            })
            .collect()
    }

    /// Closed loop sampled with the first point repeated at the end.
    fn loop_points(n: usize) -> Vec<Point3> {
        let mut pts: Vec<Point3> = (0..n)
            .map(|i| {
                let a = std::f64::consts::TAU * i as f64 / n as f64;
                Point3::new(4.0 * a.cos(), 2.0 * a.sin(), 0.5 * (3.0 * a).cos())
            })
            .collect();
        pts.push(pts[0]);
        pts
    }

    #[test]
    fn test_collinear_points_fit_exactly() {
        let pts: Vec<Point3> = (0..5).map(|i| Point3::new(i as f64, 2.0 * i as f64, 0.0)).collect();
        let mut approx = BSplineApproxInterp::new(pts.clone(), 5, 1, false);
        for i in 0..5 {
            approx.interpolate_point(i, false);
        }
        let params = [0.0, 0.25, 0.5, 0.75, 1.0];
        let fit = approx.fit_curve_optimal(&params, 10).unwrap();
        assert_eq!(fit.error, 0.0);
        for (p, &t) in pts.iter().zip(&params) {
            assert!((fit.curve.eval(t) - p).norm() < 1e-12);
        }
    }

    #[test]
    fn test_compute_parameters() {
        let pts = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 3.0),
        ];
        let approx = BSplineApproxInterp::new(pts, 3, 2, false);
        assert_eq!(approx.compute_parameters(0.0), vec![0.0, 0.5, 1.0]);
        let chord = approx.compute_parameters(0.5);
        assert!((chord[1] - 0.25).abs() < 1e-15);
        assert_eq!(chord[2], 1.0);
    }

    #[test]
    fn test_compute_knots_with_kink() {
        let mut approx = BSplineApproxInterp::new(wave(11), 7, 3, false);
        approx.interpolate_point(4, true);
        let params = approx.compute_parameters(0.0);
        let (knots, mults) = approx.compute_knots(7, &params).unwrap();
        assert_eq!(knots.len(), 6);
        assert!((knots[3] - 0.4).abs() < 1e-15);
        assert_eq!(mults, vec![4, 1, 1, 3, 1, 4]);
        assert!(matches!(
            approx.compute_knots(3, &params),
            Err(GordonError::TooFewControlPoints { .. })
        ));
    }

    #[test]
    fn test_interpolated_points_are_honored() {
        let pts = wave(40);
        let mut approx = BSplineApproxInterp::new(pts.clone(), 10, 3, false);
        for i in [0, 13, 27, 39] {
            approx.interpolate_point(i, false);
        }
        let params = approx.compute_parameters(0.5);
        let fit = approx.fit_curve_optimal(&params, 0).unwrap();
        for i in [0, 13, 27, 39] {
            let miss = (fit.curve.eval(params[i]) - pts[i]).norm();
            assert!(miss < 1e-10, "point {i} missed by {miss}");
        }
        assert!(fit.error < 0.05, "error {}", fit.error);
    }

    #[test]
    fn test_optimization_reduces_error() {
        let pts = wave(60);
        let mut approx = BSplineApproxInterp::new(pts, 8, 3, false);
        approx.interpolate_point(0, false);
        approx.interpolate_point(59, false);
        let single = approx.fit_curve_optimal(&[], 0).unwrap();
        let optimal = approx.fit_curve_optimal(&[], 10).unwrap();
        assert!(optimal.error <= single.error);
    }

    #[test]
    fn test_invalid_interpolation_index_is_ignored() {
        let mut approx = BSplineApproxInterp::new(wave(6), 4, 2, false);
        approx.interpolate_point(2, false);
        approx.interpolate_point(2, false);
        approx.interpolate_point(17, false);
        assert_eq!(approx.interpolated, vec![2]);
        assert_eq!(approx.approximated, vec![0, 1, 3, 4, 5]);
    }

    #[test]
    fn test_continuity_mode_selection() {
        let mut approx = BSplineApproxInterp::new(loop_points(20), 12, 3, true);
        assert!(approx.is_closed());
        assert_eq!(approx.continuity_mode(), ContinuityMode::C0C1C2);
        approx.interpolate_point(0, false);
        approx.interpolate_point(20, false);
        assert_eq!(approx.continuity_mode(), ContinuityMode::C1C2);

        let open = BSplineApproxInterp::new(loop_points(20), 12, 3, false);
        assert_eq!(open.continuity_mode(), ContinuityMode::None);
        let not_closed = BSplineApproxInterp::new(wave(20), 12, 3, true);
        assert_eq!(not_closed.continuity_mode(), ContinuityMode::None);
    }

    #[test]
    fn test_closed_fit_is_c2_at_seam() {
        for interpolate_ends in [false, true] {
            let pts = loop_points(30);
            let mut approx = BSplineApproxInterp::new(pts.clone(), 14, 3, true);
            if interpolate_ends {
                approx.interpolate_point(0, false);
                approx.interpolate_point(30, false);
            }
            let fit = approx.fit_curve_optimal(&[], 5).unwrap();
            let start = fit.curve.derivatives(0.0, 2);
            let end = fit.curve.derivatives(1.0, 2);
            for k in 0..3 {
                let scale = start[k].norm().max(1.0);
                assert!(
                    (start[k] - end[k]).norm() < 1e-8 * scale,
                    "derivative {} differs at seam: {:?} vs {:?}",
                    k,
                    start[k],
                    end[k]
                );
            }
        }
    }

    #[test]
    fn test_too_few_control_points() {
        let mut approx = BSplineApproxInterp::new(wave(10), 4, 3, false);
        for i in 0..5 {
            approx.interpolate_point(i, false);
        }
        let params = approx.compute_parameters(0.5);
        assert!(matches!(
            approx.fit_curve_optimal(&params, 3),
            Err(GordonError::TooFewControlPoints { .. })
        ));
    }

    #[test]
    fn test_singular_system_is_an_error() {
        let pts = vec![Point3::new(0.0, 0.0, 0.0); 3];
        let approx = BSplineApproxInterp::new(pts, 3, 1, false);
        let result = approx.solve(&[0.25, 0.25, 0.25], &[0.0, 0.5, 1.0], &[2, 1, 2]);
        assert!(matches!(result, Err(GordonError::SingularSystem)));
    }
}
