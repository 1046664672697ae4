//! B-spline toolbox shared by the network orchestrator and the surface builder.
//!
//! Everything here works on owned copies: operations that change knots or
//! degrees return new curves and surfaces.

use std::slice;

use luthier_kernel_geom::{closest_parameter, intersect_curves, min_distance};
use luthier_kernel_math::{Point3, Tolerance};
use luthier_kernel_nurbs::{
    interpolate, BSplineCurve, BSplineSurface, KnotVector, SurfaceDirection,
};

use crate::approx::BSplineApproxInterp;
use crate::{GordonError, Result};

/// Relative tolerance handed to the raw curve–curve intersector.
const RAW_INTERSECTION_TOL: f64 = 1e-7;

/// A min-distance fallback farther apart than this (relative to the curve
/// scale) is not an intersection.
const FALLBACK_GAP_LIMIT: f64 = 1e-3;

/// Parametric tolerance for locating breaks and kinks in a sample grid.
const BREAK_TOL: f64 = 1e-10;

/// Fraction of the sample spacing within which a break replaces a sample.
const BREAK_SNAP: f64 = 0.3;

/// Minimum number of samples taken when re-fitting a curve.
const MIN_REPARAM_SAMPLES: usize = 101;

/// Degree of re-fitted curves.
const REPARAM_DEGREE: usize = 3;

/// Stateless B-spline algorithms parameterized by a parametric tolerance.
#[derive(Debug, Clone, Copy)]
pub struct BSplineAlgorithms {
    par_tolerance: f64,
    kink_angle: f64,
}

impl Default for BSplineAlgorithms {
    fn default() -> Self {
        Self::new(1e-8)
    }
}

impl BSplineAlgorithms {
    /// Create with the given parametric tolerance and a 6° kink angle.
    ///
    /// The tolerance doubles as the relative factor for closedness checks.
    pub fn new(par_tolerance: f64) -> Self {
        Self {
            par_tolerance,
            kink_angle: 6f64.to_radians(),
        }
    }

    /// Replace the tangent-deviation threshold for kinks, in degrees.
    pub fn with_kink_angle(mut self, degrees: f64) -> Self {
        self.kink_angle = degrees.to_radians();
        self
    }

    /// The parametric tolerance.
    pub fn par_tolerance(&self) -> f64 {
        self.par_tolerance
    }

    /// Largest distance of any pole from the first pole, over all curves.
    pub fn scale(curves: &[BSplineCurve]) -> f64 {
        curves
            .iter()
            .filter_map(|c| {
                let first = c.control_points.first()?;
                Some(
                    c.control_points
                        .iter()
                        .map(|p| (p - first).norm())
                        .fold(0.0, f64::max),
                )
            })
            .fold(0.0, f64::max)
    }

    /// Largest distance of a grid point from the first point of its row.
    pub fn scale_point_grid(points: &[Vec<Point3>]) -> f64 {
        points
            .iter()
            .filter_map(|row| {
                let first = row.first()?;
                Some(row.iter().map(|p| (p - first).norm()).fold(0.0, f64::max))
            })
            .fold(0.0, f64::max)
    }

    /// True if the first and last rows of a `[u][v]` grid coincide.
    pub fn is_u_dir_closed(points: &[Vec<Point3>], tolerance: f64) -> bool {
        match (points.first(), points.last()) {
            (Some(first), Some(last)) => first
                .iter()
                .zip(last)
                .all(|(a, b)| (a - b).norm() < tolerance),
            _ => false,
        }
    }

    /// True if the first and last columns of a `[u][v]` grid coincide.
    pub fn is_v_dir_closed(points: &[Vec<Point3>], tolerance: f64) -> bool {
        !points.is_empty()
            && points.iter().all(|row| match (row.first(), row.last()) {
                (Some(a), Some(b)) => (a - b).norm() < tolerance,
                _ => false,
            })
    }

    /// True if the curve's end points coincide within the default linear tolerance.
    pub fn is_closed(curve: &BSplineCurve) -> bool {
        curve.is_closed(Tolerance::DEFAULT.linear)
    }

    /// Raise every curve to the highest degree among them.
    pub fn match_degree(curves: &[BSplineCurve]) -> Result<Vec<BSplineCurve>> {
        let max_degree = curves.iter().map(|c| c.degree).max().unwrap_or(0);
        curves
            .iter()
            .map(|c| Ok(c.elevate_degree(max_degree)?))
            .collect()
    }

    /// Swap the parameter directions of a surface.
    pub fn flip_surface(surface: &BSplineSurface) -> BSplineSurface {
        surface.exchange_uv()
    }

    /// True if all curves share the first curve's domain within `tol`.
    pub fn have_same_range(curves: &[BSplineCurve], tol: f64) -> bool {
        same_range(curves, tol)
    }

    /// True if all curves share one degree.
    pub fn have_same_degree(curves: &[BSplineCurve]) -> bool {
        same_degree(curves)
    }

    /// Copies of `curves` with one shared knot vector.
    ///
    /// Knots closer than `tol` are merged and every knot gets the highest
    /// multiplicity it has in any curve. Curves must already share their
    /// domain and degree.
    pub fn create_common_knots_vector_curves(
        curves: &[BSplineCurve],
        tol: f64,
    ) -> Result<Vec<BSplineCurve>> {
        let mut result = curves.to_vec();
        make_geometry_compatible(&mut result, tol, "curve")?;
        Ok(result)
    }

    /// Copies of `surfaces` with shared knot vectors in both directions.
    pub fn create_common_knots_vector_surfaces(
        surfaces: &[BSplineSurface],
        tol: f64,
    ) -> Result<Vec<BSplineSurface>> {
        let mut views: Vec<SurfaceKnots> = surfaces
            .iter()
            .map(|s| SurfaceKnots {
                surface: s.clone(),
                dir: SurfaceDirection::U,
            })
            .collect();
        make_geometry_compatible(&mut views, tol, "surface")?;
        for view in &mut views {
            view.dir = SurfaceDirection::V;
        }
        make_geometry_compatible(&mut views, tol, "surface")?;
        Ok(views.into_iter().map(|v| v.surface).collect())
    }

    /// Map the curve's domain affinely onto `[umin, umax]` if it is off by more than `tol`.
    pub fn reparametrize_bspline(curve: &BSplineCurve, umin: f64, umax: f64, tol: f64) -> BSplineCurve {
        let (t0, t1) = curve.parameter_domain();
        if (t0 - umin).abs() > tol || (t1 - umax).abs() > tol {
            curve.reparametrized(umin, umax)
        } else {
            curve.clone()
        }
    }

    /// Interior knots where the curve is only C0 and its tangent turns by
    /// more than the kink angle.
    pub fn kink_parameters(&self, curve: &BSplineCurve) -> Vec<f64> {
        let kv = curve.knot_vector();
        let knots = kv.knots();
        let mults = kv.mults();
        let eps = self.par_tolerance;
        let mut kinks = Vec::new();
        for idx in 1..knots.len().saturating_sub(1) {
            if mults[idx] != curve.degree {
                continue;
            }
            let k = knots[idx];
            let angle = curve.tangent(k + eps).angle(&curve.tangent(k - eps));
            if angle > self.kink_angle {
                kinks.push(k);
            }
        }
        kinks
    }

    /// Intersection parameter pairs `(on a, on b)` of two curves.
    ///
    /// Distances are judged against `tol3d` times the mean curve scale. The
    /// first two hits collapse into one when they are closer than that. For
    /// a closed curve met exactly once at a domain end, the matching pair at
    /// the other end is added. If the curve search finds nothing at all, the
    /// closest approach is used as long as its gap stays below `1e-3` of the
    /// scale. Hits the search found but the distance check dropped are not
    /// replaced.
    pub fn intersections(&self, a: &BSplineCurve, b: &BSplineCurve, tol3d: f64) -> Vec<(f64, f64)> {
        let scale = (Self::scale(slice::from_ref(a)) + Self::scale(slice::from_ref(b))) / 2.0;
        let threshold = tol3d * scale;

        let mut raw = intersect_curves(a, b, RAW_INTERSECTION_TOL.max(tol3d) * scale);
        if raw.len() >= 2 && (raw[0].point - raw[1].point).norm() < threshold {
            raw.truncate(1);
        }

        let mut result: Vec<(f64, f64)> = raw
            .iter()
            .filter(|hit| hit.distance < threshold)
            .map(|hit| (hit.param_a, hit.param_b))
            .collect();

        if let [(pa, pb)] = result[..] {
            let (a0, a1) = a.parameter_domain();
            let (b0, b1) = b.parameter_domain();
            if Self::is_closed(a) {
                if (pa - a0).abs() < self.par_tolerance {
                    result.push((a1, pb));
                }
                if (pa - a1).abs() < self.par_tolerance {
                    result.push((a0, pb));
                }
            } else if Self::is_closed(b) {
                if (pb - b0).abs() < self.par_tolerance {
                    result.push((pa, b1));
                }
                if (pb - b1).abs() < self.par_tolerance {
                    result.push((pa, b0));
                }
            }
        }

        if raw.is_empty() {
            let closest = min_distance(a, b);
            if closest.distance <= FALLBACK_GAP_LIMIT * scale {
                if closest.distance > threshold {
                    log::warn!(
                        "closest approach of curves exceeds tolerance: {:e} > {:e}",
                        closest.distance,
                        threshold
                    );
                }
                result.push((closest.param_a, closest.param_b));
            }
        }
        result
    }

    /// Skin a surface through `curves`, placing curve `k` at `v_params[k]`.
    ///
    /// The curves run in `u`. With `make_closed`, the last curve is taken to
    /// repeat the first and the surface is smooth across its `v` seam.
    pub fn curves_to_surface(
        &self,
        curves: &[BSplineCurve],
        v_params: &[f64],
        make_closed: bool,
    ) -> Result<BSplineSurface> {
        if v_params.len() != curves.len() {
            return Err(GordonError::ParameterCountMismatch {
                what: "skinning parameters",
                expected: curves.len(),
                got: v_params.len(),
            });
        }
        let tolerance = Self::scale(curves) * self.par_tolerance;
        let matched = Self::match_degree(curves)?;
        let compatible = Self::create_common_knots_vector_curves(&matched, tolerance)?;
        let Some(first) = compatible.first() else {
            return Err(GordonError::TooFewProfiles(0));
        };

        let n_points = if make_closed {
            compatible.len() - 1
        } else {
            compatible.len()
        };

        let mut poles: Vec<Vec<Point3>> = Vec::with_capacity(first.num_control_points());
        let mut v_knots: Option<(Vec<f64>, Vec<usize>, usize)> = None;
        for cp_idx in 0..first.num_control_points() {
            let column: Vec<Point3> = compatible[..n_points]
                .iter()
                .map(|c| c.control_points[cp_idx])
                .collect();
            let spline = interpolate(&column, v_params, make_closed)?;
            if v_knots.is_none() {
                v_knots = Some((spline.unique_knots(), spline.multiplicities(), spline.degree));
            }
            poles.push(spline.control_points);
        }

        let Some((knots_v, mults_v, degree_v)) = v_knots else {
            return Err(GordonError::TooFewControlPoints {
                available: 0,
                required: first.degree + 1,
            });
        };
        Ok(BSplineSurface::from_poles_mults_knots(
            &poles,
            &first.unique_knots(),
            &first.multiplicities(),
            &knots_v,
            &mults_v,
            first.degree,
            degree_v,
        )?)
    }

    /// Interpolate a `[u][v]` point grid at the given parameters.
    ///
    /// A direction is closed only if requested and its first and last
    /// grid lines coincide.
    pub fn points_to_surface(
        &self,
        points: &[Vec<Point3>],
        u_params: &[f64],
        v_params: &[f64],
        u_closed: bool,
        v_closed: bool,
    ) -> Result<BSplineSurface> {
        let tolerance = self.par_tolerance * Self::scale_point_grid(points);
        let make_v = v_closed && Self::is_v_dir_closed(points, tolerance);
        let make_u = u_closed && Self::is_u_dir_closed(points, tolerance);

        let n_u = if make_u { points.len() - 1 } else { points.len() };
        let n_v = points.first().map_or(0, Vec::len);
        let u_splines = (0..n_v)
            .map(|v_idx| {
                let row: Vec<Point3> = points[..n_u].iter().map(|col| col[v_idx]).collect();
                Ok(interpolate(&row, u_params, make_u)?)
            })
            .collect::<Result<Vec<_>>>()?;

        self.curves_to_surface(&u_splines, v_params, make_v)
    }

    /// Re-fit `curve` so that parameter `old_params[i]` moves to `new_params[i]`.
    ///
    /// The result is a cubic with `num_control_points` poles. It passes
    /// exactly through the curve points at the moved parameters and at the
    /// curve's kinks, and approximates the rest of the curve.
    pub fn reparametrize_continuously_approx(
        &self,
        curve: &BSplineCurve,
        old_params: &[f64],
        new_params: &[f64],
        num_control_points: usize,
        fit_iterations: usize,
    ) -> Result<BSplineCurve> {
        if old_params.len() != new_params.len() {
            return Err(GordonError::ParameterCountMismatch {
                what: "reparametrization",
                expected: old_params.len(),
                got: new_params.len(),
            });
        }
        if new_params.len() < 2 {
            return Err(GordonError::ParameterCountMismatch {
                what: "reparametrization",
                expected: 2,
                got: new_params.len(),
            });
        }
        let (new_first, new_last) = (new_params[0], new_params[new_params.len() - 1]);

        // Maps new parameters to old ones through the x coordinate.
        let old_points: Vec<Point3> = old_params.iter().map(|&t| Point3::new(t, 0.0, 0.0)).collect();
        let reparam = interpolate(&old_points, new_params, false)?;

        let mut breaks: Vec<f64> = new_params[1..new_params.len() - 1].to_vec();
        let kinks: Vec<f64> = self
            .kink_parameters(curve)
            .into_iter()
            .map(|k| closest_parameter(&reparam, &Point3::new(k, 0.0, 0.0)))
            .collect();
        for &kink in &kinks {
            if let Some(pos) = find_inside_tolerance(&breaks, kink, BREAK_TOL) {
                breaks.remove(pos);
            }
        }

        let mut params = linspace_with_breaks(
            new_first,
            new_last,
            MIN_REPARAM_SAMPLES.max(2 * num_control_points),
            &breaks,
        );
        params.extend_from_slice(&kinks);
        params.sort_by(f64::total_cmp);

        let (t0, t1) = curve.parameter_domain();
        let points = params
            .iter()
            .map(|&t| curve.eval(reparam.eval(t).x.clamp(t0, t1)))
            .collect();

        let make_continuous = Self::is_closed(curve)
            && curve.tangent(t0).angle(&curve.tangent(t1)) < self.kink_angle;
        let mut approx =
            BSplineApproxInterp::new(points, num_control_points, REPARAM_DEGREE, make_continuous);

        breaks.insert(0, new_first);
        breaks.push(new_last);
        for &b in &breaks {
            if let Some(pos) = find_inside_tolerance(&params, b, BREAK_TOL) {
                approx.interpolate_point(pos, false);
            }
        }
        for &kink in &kinks {
            if let Some(pos) = find_inside_tolerance(&params, kink, BREAK_TOL) {
                approx.interpolate_point(pos, true);
            }
        }

        Ok(approx.fit_curve_optimal(&params, fit_iterations)?.curve)
    }
}

/// `n_values` evenly spaced values over `[umin, umax]` that also contain every break.
///
/// A break within `0.3` of the spacing replaces the nearest value; others
/// are inserted in order.
pub fn linspace_with_breaks(umin: f64, umax: f64, n_values: usize, breaks: &[f64]) -> Vec<f64> {
    let n = n_values.max(2);
    let du = (umax - umin) / (n - 1) as f64;
    let mut result: Vec<f64> = (0..n).map(|i| i as f64 * du + umin).collect();
    result[n - 1] = umax;

    for &b in breaks {
        match find_inside_tolerance(&result, b, du * BREAK_SNAP) {
            Some(pos) => result[pos] = b,
            None => {
                let pos = result.partition_point(|&x| x < b);
                result.insert(pos, b);
            }
        }
    }
    result
}

/// Index of the first value closer than `tol` to `val`.
pub fn find_inside_tolerance(values: &[f64], val: f64, tol: f64) -> Option<usize> {
    values.iter().position(|&x| (val - x).abs() < tol)
}

// =============================================================================
// Knot unification
// =============================================================================

/// Knot-level view of one direction of a B-spline.
trait KnotAdapter: Sized {
    fn degree(&self) -> usize;
    fn knot_vector(&self) -> KnotVector;
    fn with_knot(&self, t: f64, mult: usize, tol: f64) -> Result<Self>;
    fn with_multiplicity(&self, index: usize, mult: usize) -> Result<Self>;
}

impl KnotAdapter for BSplineCurve {
    fn degree(&self) -> usize {
        self.degree
    }

    fn knot_vector(&self) -> KnotVector {
        BSplineCurve::knot_vector(self)
    }

    fn with_knot(&self, t: f64, mult: usize, tol: f64) -> Result<Self> {
        Ok(self.insert_knot_mult(t, mult, tol)?)
    }

    fn with_multiplicity(&self, index: usize, mult: usize) -> Result<Self> {
        Ok(self.increase_multiplicity(index, mult)?)
    }
}

/// A surface seen through one of its parameter directions.
struct SurfaceKnots {
    surface: BSplineSurface,
    dir: SurfaceDirection,
}

impl KnotAdapter for SurfaceKnots {
    fn degree(&self) -> usize {
        self.surface.degree(self.dir)
    }

    fn knot_vector(&self) -> KnotVector {
        self.surface.knot_vector(self.dir)
    }

    fn with_knot(&self, t: f64, mult: usize, tol: f64) -> Result<Self> {
        Ok(Self {
            surface: self.surface.insert_knot(self.dir, t, mult, tol)?,
            dir: self.dir,
        })
    }

    fn with_multiplicity(&self, index: usize, mult: usize) -> Result<Self> {
        Ok(Self {
            surface: self.surface.increase_multiplicity(self.dir, index, mult)?,
            dir: self.dir,
        })
    }
}

fn same_range<T: KnotAdapter>(items: &[T], tol: f64) -> bool {
    let Some(first) = items.first() else {
        return true;
    };
    let reference = first.knot_vector();
    items.iter().skip(1).all(|item| {
        let kv = item.knot_vector();
        (kv.min() - reference.min()).abs() <= tol && (kv.max() - reference.max()).abs() <= tol
    })
}

fn same_degree<T: KnotAdapter>(items: &[T]) -> bool {
    items.windows(2).all(|w| w[0].degree() == w[1].degree())
}

/// Give every item the union knot vector of all items.
fn make_geometry_compatible<T: KnotAdapter>(
    items: &mut [T],
    tol: f64,
    family: &'static str,
) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }
    if !same_range(items, tol) {
        return Err(GordonError::RangeMismatch { family });
    }
    if !same_degree(items) {
        return Err(GordonError::DegreeMismatch { family });
    }

    let mut all: Vec<f64> = items.iter().flat_map(|item| item.knot_vector().knots()).collect();
    all.sort_by(f64::total_cmp);
    let mut unique: Vec<f64> = Vec::with_capacity(all.len());
    let mut prev = all[0];
    unique.push(prev);
    for &k in &all[1..] {
        if (k - prev).abs() > tol {
            unique.push(k);
        }
        prev = k;
    }

    let mut target_mults = vec![0usize; unique.len()];
    for item in items.iter() {
        let kv = item.knot_vector();
        let (knots, mults) = (kv.knots(), kv.mults());
        for (idx, &u) in unique.iter().enumerate() {
            if let Some(pos) = find_inside_tolerance(&knots, u, tol) {
                target_mults[idx] = target_mults[idx].max(mults[pos]);
            }
        }
    }

    for item in items.iter_mut() {
        for (&u, &mult) in unique.iter().zip(&target_mults) {
            let kv = item.knot_vector();
            let (knots, mults) = (kv.knots(), kv.mults());
            match find_inside_tolerance(&knots, u, tol) {
                Some(pos) if mults[pos] < mult => *item = item.with_multiplicity(pos, mult)?,
                Some(_) => {}
                None => *item = item.with_knot(u, mult, tol)?,
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line(a: Point3, b: Point3) -> BSplineCurve {
        BSplineCurve::new(vec![a, b], vec![0.0, 0.0, 1.0, 1.0], 1)
    }

    fn wavy(knots: Vec<f64>, z: f64) -> BSplineCurve {
        let n = knots.len() - 4;
        let pts = (0..n)
            .map(|i| Point3::new(i as f64, (i as f64 * 1.3).sin(), z))
            .collect();
        BSplineCurve::new(pts, knots, 3)
    }

    #[test]
    fn test_scale() {
        let c = line(Point3::new(1.0, 1.0, 0.0), Point3::new(4.0, 5.0, 0.0));
        assert_relative_eq!(BSplineAlgorithms::scale(&[c]), 5.0);
        assert_eq!(BSplineAlgorithms::scale(&[]), 0.0);
    }

    #[test]
    fn test_grid_closedness() {
        let p = |x: f64, y: f64| Point3::new(x, y, 0.0);
        let grid = vec![
            vec![p(0.0, 0.0), p(1.0, 0.0), p(0.0, 0.0)],
            vec![p(0.0, 1.0), p(1.0, 1.0), p(0.0, 1.0)],
            vec![p(0.0, 0.0), p(1.0, 0.0), p(0.0, 0.0)],
        ];
        assert!(BSplineAlgorithms::is_u_dir_closed(&grid, 1e-9));
        assert!(BSplineAlgorithms::is_v_dir_closed(&grid, 1e-9));
        let open = vec![vec![p(0.0, 0.0), p(1.0, 0.0)], vec![p(0.0, 1.0), p(1.0, 1.0)]];
        assert!(!BSplineAlgorithms::is_u_dir_closed(&open, 1e-9));
        assert!(!BSplineAlgorithms::is_v_dir_closed(&open, 1e-9));
    }

    #[test]
    fn test_match_degree_keeps_shape() {
        let quad = BSplineCurve::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 2.0, 0.0),
                Point3::new(2.0, 0.0, 1.0),
            ],
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            2,
        );
        let cubic = wavy(vec![0.0, 0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0, 1.0], 0.0);
        let matched = BSplineAlgorithms::match_degree(&[quad.clone(), cubic]).unwrap();
        assert!(BSplineAlgorithms::have_same_degree(&matched));
        for t in [0.0, 0.2, 0.5, 0.9, 1.0] {
            assert!((matched[0].eval(t) - quad.eval(t)).norm() < 1e-12);
        }
    }

    #[test]
    fn test_common_knots_curves() {
        let a = wavy(vec![0.0, 0.0, 0.0, 0.0, 0.3, 1.0, 1.0, 1.0, 1.0], 0.0);
        let b = wavy(vec![0.0, 0.0, 0.0, 0.0, 0.5, 0.5, 1.0, 1.0, 1.0, 1.0], 1.0);
        let out = BSplineAlgorithms::create_common_knots_vector_curves(&[a.clone(), b.clone()], 1e-10)
            .unwrap();
        assert_eq!(out[0].knots, out[1].knots);
        assert_eq!(out[0].unique_knots(), vec![0.0, 0.3, 0.5, 1.0]);
        assert_eq!(out[0].multiplicities(), vec![4, 1, 2, 4]);
        for t in [0.1, 0.3, 0.45, 0.5, 0.77] {
            assert!((out[0].eval(t) - a.eval(t)).norm() < 1e-12);
            assert!((out[1].eval(t) - b.eval(t)).norm() < 1e-12);
        }

        // A second pass inserts nothing.
        let again = BSplineAlgorithms::create_common_knots_vector_curves(&out, 1e-10).unwrap();
        assert_eq!(again, out);
    }

    #[test]
    fn test_common_knots_rejects_mismatched_ranges() {
        let a = line(Point3::origin(), Point3::new(1.0, 0.0, 0.0));
        let b = a.reparametrized(0.0, 2.0);
        assert!(matches!(
            BSplineAlgorithms::create_common_knots_vector_curves(&[a, b], 1e-10),
            Err(GordonError::RangeMismatch { family: "curve" })
        ));
    }

    #[test]
    fn test_common_knots_surfaces() {
        let algo = BSplineAlgorithms::new(1e-12);
        let profiles_a = [
            wavy(vec![0.0, 0.0, 0.0, 0.0, 0.4, 1.0, 1.0, 1.0, 1.0], 0.0),
            wavy(vec![0.0, 0.0, 0.0, 0.0, 0.4, 1.0, 1.0, 1.0, 1.0], 1.0),
        ];
        let profiles_b = [
            wavy(vec![0.0, 0.0, 0.0, 0.0, 0.6, 1.0, 1.0, 1.0, 1.0], 0.0),
            wavy(vec![0.0, 0.0, 0.0, 0.0, 0.6, 1.0, 1.0, 1.0, 1.0], 2.0),
        ];
        let sa = algo.curves_to_surface(&profiles_a, &[0.0, 1.0], false).unwrap();
        let sb = algo.curves_to_surface(&profiles_b, &[0.0, 1.0], false).unwrap();
        let out = BSplineAlgorithms::create_common_knots_vector_surfaces(&[sa.clone(), sb], 1e-12)
            .unwrap();
        assert_eq!(out[0].knots_u, out[1].knots_u);
        assert_eq!(out[0].knots_v, out[1].knots_v);
        assert_eq!(out[0].n_u, out[1].n_u);
        for (u, v) in [(0.2, 0.3), (0.5, 0.5), (0.9, 0.1)] {
            assert!((out[0].eval(u, v) - sa.eval(u, v)).norm() < 1e-12);
        }
    }

    #[test]
    fn test_kink_parameters() {
        let corner = BSplineCurve::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
            ],
            vec![0.0, 0.0, 0.5, 1.0, 1.0],
            1,
        );
        let algo = BSplineAlgorithms::default();
        assert_eq!(algo.kink_parameters(&corner), vec![0.5]);

        let straight = BSplineCurve::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(2.0, 0.05, 0.0),
            ],
            vec![0.0, 0.0, 0.5, 1.0, 1.0],
            1,
        );
        assert!(algo.kink_parameters(&straight).is_empty());
    }

    #[test]
    fn test_reparametrize_bspline() {
        let c = line(Point3::origin(), Point3::new(3.0, 0.0, 0.0)).reparametrized(2.0, 5.0);
        let r = BSplineAlgorithms::reparametrize_bspline(&c, 0.0, 1.0, 1e-10);
        assert_eq!(r.parameter_domain(), (0.0, 1.0));
        assert!((r.eval(0.5) - Point3::new(1.5, 0.0, 0.0)).norm() < 1e-12);
        let same = BSplineAlgorithms::reparametrize_bspline(&r, 0.0, 1.0, 1e-10);
        assert_eq!(same, r);
    }

    #[test]
    fn test_intersections_of_crossing_lines() {
        let algo = BSplineAlgorithms::new(1e-10);
        let a = line(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0));
        let b = line(Point3::new(3.0, -5.0, 0.0), Point3::new(3.0, 5.0, 0.0));
        let hits = algo.intersections(&a, &b, 1e-10);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].0 - 0.3).abs() < 1e-9);
        assert!((hits[0].1 - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_intersections_fallback_window() {
        let algo = BSplineAlgorithms::new(1e-10);
        let a = line(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0));

        // A near miss is accepted through the closest approach.
        let near = line(Point3::new(4.0, -5.0, 1e-4), Point3::new(4.0, 5.0, 1e-4));
        let hits = algo.intersections(&a, &near, 1e-10);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].0 - 0.4).abs() < 1e-6);

        // A clear miss is not.
        let far = line(Point3::new(4.0, -5.0, 1.0), Point3::new(4.0, 5.0, 1.0));
        assert!(algo.intersections(&a, &far, 1e-10).is_empty());
    }

    #[test]
    fn test_filtered_hit_does_not_fall_back() {
        let algo = BSplineAlgorithms::new(1e-10);
        let a = line(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0));
        // Close enough for the curve search, too far for the distance check.
        let skew = line(Point3::new(4.0, -5.0, 1e-8), Point3::new(4.0, 5.0, 1e-8));
        assert!(algo.intersections(&a, &skew, 1e-10).is_empty());
        assert_eq!(algo.intersections(&a, &skew, 1e-8).len(), 1);
    }

    #[test]
    fn test_intersections_with_closed_curve_at_seam() {
        let algo = BSplineAlgorithms::new(1e-10);
        let square = BSplineCurve::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(10.0, 0.0, 0.0),
                Point3::new(10.0, 10.0, 0.0),
                Point3::new(0.0, 10.0, 0.0),
                Point3::new(0.0, 0.0, 0.0),
            ],
            vec![0.0, 0.0, 0.25, 0.5, 0.75, 1.0, 1.0],
            1,
        );
        let pin = line(Point3::new(0.0, 0.0, -5.0), Point3::new(0.0, 0.0, 5.0));
        let mut hits = algo.intersections(&square, &pin, 1e-10);
        hits.sort_by(|x, y| x.0.total_cmp(&y.0));
        assert_eq!(hits.len(), 2);
        assert!(hits[0].0.abs() < 1e-9);
        assert!((hits[1].0 - 1.0).abs() < 1e-9);
        assert!((hits[0].1 - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_curves_to_surface_passes_through_curves() {
        let algo = BSplineAlgorithms::new(1e-12);
        let curves = [
            wavy(vec![0.0, 0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0, 1.0], 0.0),
            wavy(vec![0.0, 0.0, 0.0, 0.0, 0.25, 1.0, 1.0, 1.0, 1.0], 1.0),
            wavy(vec![0.0, 0.0, 0.0, 0.0, 0.75, 1.0, 1.0, 1.0, 1.0], 3.0),
        ];
        let v_params = [0.0, 0.4, 1.0];
        let surf = algo.curves_to_surface(&curves, &v_params, false).unwrap();
        for (c, &v) in curves.iter().zip(&v_params) {
            for u in [0.0, 0.3, 0.5, 0.8, 1.0] {
                let miss = (surf.eval(u, v) - c.eval(u)).norm();
                assert!(miss < 1e-10, "miss {miss} at u={u}, v={v}");
            }
        }
        assert!(matches!(
            algo.curves_to_surface(&curves, &[0.0, 1.0], false),
            Err(GordonError::ParameterCountMismatch { .. })
        ));
    }

    #[test]
    fn test_points_to_surface_interpolates_grid() {
        let algo = BSplineAlgorithms::new(1e-12);
        let f = |u: f64, v: f64| Point3::new(10.0 * u, 10.0 * v, (3.0 * u).sin() * v);
        let u_params = [0.0, 0.3, 0.6, 1.0];
        let v_params = [0.0, 0.5, 1.0];
        let grid: Vec<Vec<Point3>> = u_params
            .iter()
            .map(|&u| v_params.iter().map(|&v| f(u, v)).collect())
            .collect();
        let surf = algo
            .points_to_surface(&grid, &u_params, &v_params, false, false)
            .unwrap();
        for (i, &u) in u_params.iter().enumerate() {
            for (j, &v) in v_params.iter().enumerate() {
                assert!((surf.eval(u, v) - grid[i][j]).norm() < 1e-10);
            }
        }
    }

    #[test]
    fn test_linspace_with_breaks() {
        let values = linspace_with_breaks(0.0, 1.0, 11, &[0.52, 0.55]);
        assert_eq!(values.len(), 12);
        assert!(values.windows(2).all(|w| w[0] < w[1]));
        assert!(values.contains(&0.52));
        assert!(values.contains(&0.55));
        assert!(!values.iter().any(|&v| (v - 0.5).abs() < 1e-12));
    }

    #[test]
    fn test_find_inside_tolerance() {
        let values = [0.0, 0.5, 1.0];
        assert_eq!(find_inside_tolerance(&values, 0.5 + 1e-12, 1e-10), Some(1));
        assert_eq!(find_inside_tolerance(&values, 0.7, 1e-10), None);
    }

    #[test]
    fn test_reparametrize_continuously_moves_parameters() {
        let algo = BSplineAlgorithms::default();
        let curve = BSplineCurve::clamped_uniform(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(2.0, 3.0, 0.0),
                Point3::new(5.0, 3.5, 1.0),
                Point3::new(7.0, 1.0, 1.0),
                Point3::new(10.0, 0.0, 0.0),
            ],
            3,
        );
        let old = [0.0, 0.3, 1.0];
        let new = [0.0, 0.5, 1.0];
        let fitted = algo
            .reparametrize_continuously_approx(&curve, &old, &new, 12, 10)
            .unwrap();
        assert_eq!(fitted.degree, 3);
        assert_eq!(fitted.num_control_points(), 12);
        assert_eq!(fitted.parameter_domain(), (0.0, 1.0));
        for (&o, &n) in old.iter().zip(&new) {
            let miss = (fitted.eval(n) - curve.eval(o)).norm();
            assert!(miss < 1e-9, "break {n} missed by {miss}");
        }
    }
}
