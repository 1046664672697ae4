//! Non-rational tensor-product B-spline surfaces.

use luthier_kernel_math::Point3;

use crate::knots::{basis_functions, find_span, validate_knots, KnotVector};
use crate::{BSplineCurve, NurbsError, Result};

/// Parametric direction of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceDirection {
    /// First parameter.
    U,
    /// Second parameter.
    V,
}

/// A non-rational tensor-product B-spline surface.
///
/// Control points are stored in row-major order: `points[v_idx * n_u + u_idx]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BSplineSurface {
    /// Control points in row-major order.
    pub control_points: Vec<Point3>,
    /// Number of control points in the u direction.
    pub n_u: usize,
    /// Number of control points in the v direction.
    pub n_v: usize,
    /// Knot vector in u. Length = n_u + degree_u + 1.
    pub knots_u: Vec<f64>,
    /// Knot vector in v. Length = n_v + degree_v + 1.
    pub knots_v: Vec<f64>,
    /// Polynomial degree in u.
    pub degree_u: usize,
    /// Polynomial degree in v.
    pub degree_v: usize,
}

impl BSplineSurface {
    /// Create a B-spline surface.
    ///
    /// `control_points` is in row-major order: `[v=0,u=0], [v=0,u=1], ..., [v=1,u=0], ...`
    ///
    /// # Panics
    /// Panics if `control_points.len() != n_u * n_v`, or if either knot vector
    /// has the wrong length for its direction or decreases anywhere.
    pub fn new(
        control_points: Vec<Point3>,
        n_u: usize,
        n_v: usize,
        knots_u: Vec<f64>,
        knots_v: Vec<f64>,
        degree_u: usize,
        degree_v: usize,
    ) -> Self {
        assert_eq!(
            control_points.len(),
            n_u * n_v,
            "control points count mismatch: {} != {} * {}",
            control_points.len(),
            n_u,
            n_v
        );
        assert!(
            validate_knots(&knots_u, n_u, degree_u),
            "invalid u knot vector"
        );
        assert!(
            validate_knots(&knots_v, n_v, degree_v),
            "invalid v knot vector"
        );
        Self {
            control_points,
            n_u,
            n_v,
            knots_u,
            knots_v,
            degree_u,
            degree_v,
        }
    }

    /// Build from a pole grid indexed `[u_idx][v_idx]`, unique knots and multiplicities.
    #[allow(clippy::too_many_arguments)]
    pub fn from_poles_mults_knots(
        poles: &[Vec<Point3>],
        knots_u: &[f64],
        mults_u: &[usize],
        knots_v: &[f64],
        mults_v: &[usize],
        degree_u: usize,
        degree_v: usize,
    ) -> Result<Self> {
        let n_u = poles.len();
        let n_v = poles.first().map_or(0, Vec::len);
        let flat_u = KnotVector::from_unique(knots_u, mults_u).into_vec();
        let flat_v = KnotVector::from_unique(knots_v, mults_v).into_vec();
        if n_u <= degree_u || !validate_knots(&flat_u, n_u, degree_u) {
            return Err(NurbsError::InvalidKnotVector {
                expected: n_u + degree_u + 1,
                actual: flat_u.len(),
            });
        }
        if n_v <= degree_v || !validate_knots(&flat_v, n_v, degree_v) {
            return Err(NurbsError::InvalidKnotVector {
                expected: n_v + degree_v + 1,
                actual: flat_v.len(),
            });
        }
        if poles.iter().any(|column| column.len() != n_v) {
            return Err(NurbsError::InvalidKnotVector {
                expected: n_v + degree_v + 1,
                actual: flat_v.len(),
            });
        }

        let mut control_points = Vec::with_capacity(n_u * n_v);
        for v_idx in 0..n_v {
            for column in poles {
                control_points.push(column[v_idx]);
            }
        }
        Ok(Self {
            control_points,
            n_u,
            n_v,
            knots_u: flat_u,
            knots_v: flat_v,
            degree_u,
            degree_v,
        })
    }

    /// Control point at `(u_idx, v_idx)`.
    pub fn pole(&self, u_idx: usize, v_idx: usize) -> Point3 {
        self.control_points[v_idx * self.n_u + u_idx]
    }

    /// Replace the control point at `(u_idx, v_idx)`.
    pub fn set_pole(&mut self, u_idx: usize, v_idx: usize, point: Point3) {
        self.control_points[v_idx * self.n_u + u_idx] = point;
    }

    /// Evaluate the surface at `(u, v)` using tensor-product De Boor.
    pub fn eval(&self, u: f64, v: f64) -> Point3 {
        let nu = self.n_u - 1;
        let nv = self.n_v - 1;
        let u = u.clamp(self.knots_u[self.degree_u], self.knots_u[nu + 1]);
        let v = v.clamp(self.knots_v[self.degree_v], self.knots_v[nv + 1]);

        let span_u = find_span(&self.knots_u, nu, self.degree_u, u);
        let span_v = find_span(&self.knots_v, nv, self.degree_v, v);
        let basis_u = basis_functions(&self.knots_u, span_u, self.degree_u, u);
        let basis_v = basis_functions(&self.knots_v, span_v, self.degree_v, v);

        let mut point = Point3::origin();
        for (j, &bv) in basis_v.iter().enumerate() {
            let v_idx = span_v - self.degree_v + j;
            for (i, &bu) in basis_u.iter().enumerate() {
                let u_idx = span_u - self.degree_u + i;
                point.coords += (bu * bv) * self.pole(u_idx, v_idx).coords;
            }
        }
        point
    }

    /// Parameter domain.
    pub fn parameter_domain(&self) -> ((f64, f64), (f64, f64)) {
        (
            (self.knots_u[self.degree_u], self.knots_u[self.n_u]),
            (self.knots_v[self.degree_v], self.knots_v[self.n_v]),
        )
    }

    /// Degree in `dir`.
    pub fn degree(&self, dir: SurfaceDirection) -> usize {
        match dir {
            SurfaceDirection::U => self.degree_u,
            SurfaceDirection::V => self.degree_v,
        }
    }

    /// Number of poles in `dir`.
    pub fn num_poles(&self, dir: SurfaceDirection) -> usize {
        match dir {
            SurfaceDirection::U => self.n_u,
            SurfaceDirection::V => self.n_v,
        }
    }

    /// Knot vector in `dir`.
    pub fn knot_vector(&self, dir: SurfaceDirection) -> KnotVector {
        match dir {
            SurfaceDirection::U => KnotVector::new(self.knots_u.clone()),
            SurfaceDirection::V => KnotVector::new(self.knots_v.clone()),
        }
    }

    /// Swap the roles of `u` and `v`.
    pub fn exchange_uv(&self) -> Self {
        let mut control_points = Vec::with_capacity(self.control_points.len());
        for u_idx in 0..self.n_u {
            for v_idx in 0..self.n_v {
                control_points.push(self.pole(u_idx, v_idx));
            }
        }
        Self {
            control_points,
            n_u: self.n_v,
            n_v: self.n_u,
            knots_u: self.knots_v.clone(),
            knots_v: self.knots_u.clone(),
            degree_u: self.degree_v,
            degree_v: self.degree_u,
        }
    }

    /// One curve per `v` index, running in `u`.
    fn u_rows(&self) -> Vec<BSplineCurve> {
        (0..self.n_v)
            .map(|v_idx| {
                let row = self.control_points[v_idx * self.n_u..(v_idx + 1) * self.n_u].to_vec();
                BSplineCurve {
                    control_points: row,
                    knots: self.knots_u.clone(),
                    degree: self.degree_u,
                }
            })
            .collect()
    }

    /// Apply the same knot/degree operation to every `u` row.
    ///
    /// The operation must depend only on the row's knots and degree so all
    /// rows keep a shared knot vector.
    fn map_u_rows<F>(&self, op: F) -> Result<Self>
    where
        F: Fn(&BSplineCurve) -> Result<BSplineCurve>,
    {
        let rows = self
            .u_rows()
            .iter()
            .map(op)
            .collect::<Result<Vec<_>>>()?;
        let Some(first) = rows.first() else {
            return Ok(self.clone());
        };
        let n_u = first.num_control_points();
        let knots_u = first.knots.clone();
        let degree_u = first.degree;
        let control_points = rows.into_iter().flat_map(|r| r.control_points).collect();
        Ok(Self {
            control_points,
            n_u,
            n_v: self.n_v,
            knots_u,
            knots_v: self.knots_v.clone(),
            degree_u,
            degree_v: self.degree_v,
        })
    }

    fn map_direction<F>(&self, dir: SurfaceDirection, op: F) -> Result<Self>
    where
        F: Fn(&BSplineCurve) -> Result<BSplineCurve>,
    {
        match dir {
            SurfaceDirection::U => self.map_u_rows(op),
            SurfaceDirection::V => Ok(self.exchange_uv().map_u_rows(op)?.exchange_uv()),
        }
    }

    /// Insert knot `t` with multiplicity `mult` in direction `dir`.
    ///
    /// See [`BSplineCurve::insert_knot_mult`] for the multiplicity rules.
    pub fn insert_knot(&self, dir: SurfaceDirection, t: f64, mult: usize, tol: f64) -> Result<Self> {
        self.map_direction(dir, |row| row.insert_knot_mult(t, mult, tol))
    }

    /// Raise the multiplicity of unique knot `index` in direction `dir` to `mult`.
    pub fn increase_multiplicity(
        &self,
        dir: SurfaceDirection,
        index: usize,
        mult: usize,
    ) -> Result<Self> {
        self.map_direction(dir, |row| row.increase_multiplicity(index, mult))
    }

    /// Raise the degrees to `(degree_u, degree_v)`.
    pub fn elevate_degree(&self, degree_u: usize, degree_v: usize) -> Result<Self> {
        self.map_direction(SurfaceDirection::U, |row| row.elevate_degree(degree_u))?
            .map_direction(SurfaceDirection::V, |row| row.elevate_degree(degree_v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bilinear() -> BSplineSurface {
        let pts = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(0.0, 10.0, 0.0),
            Point3::new(10.0, 10.0, 0.0),
        ];
        let knots = vec![0.0, 0.0, 1.0, 1.0];
        BSplineSurface::new(pts, 2, 2, knots.clone(), knots, 1, 1)
    }

    /// Biquadratic bump, 3x3 poles.
    fn bump() -> BSplineSurface {
        let mut pts = Vec::new();
        for j in 0..3 {
            for i in 0..3 {
                let z = if i == 1 && j == 1 { 4.0 } else { 0.0 };
                pts.push(Point3::new(i as f64, 2.0 * j as f64, z));
            }
        }
        let knots = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        BSplineSurface::new(pts, 3, 3, knots.clone(), knots, 2, 2)
    }

    fn assert_same_shape(a: &BSplineSurface, b: &BSplineSurface) {
        for i in 0..=6 {
            for j in 0..=6 {
                let (u, v) = (i as f64 / 6.0, j as f64 / 6.0);
                let (pa, pb) = (a.eval(u, v), b.eval(u, v));
                assert!(
                    (pa - pb).norm() < 1e-10,
                    "mismatch at ({}, {}): {:?} vs {:?}",
                    u,
                    v,
                    pa,
                    pb
                );
            }
        }
    }

    #[test]
    #[should_panic(expected = "control points count mismatch")]
    fn test_new_panics_on_pole_count() {
        let knots = vec![0.0, 0.0, 1.0, 1.0];
        BSplineSurface::new(vec![Point3::origin(); 3], 2, 2, knots.clone(), knots, 1, 1);
    }

    #[test]
    #[should_panic(expected = "invalid v knot vector")]
    fn test_new_panics_on_decreasing_knots() {
        let knots = vec![0.0, 0.0, 1.0, 1.0];
        let bad = vec![0.0, 1.0, 0.5, 1.0];
        BSplineSurface::new(vec![Point3::origin(); 4], 2, 2, knots, bad, 1, 1);
    }

    #[test]
    fn test_bspline_surface_bilinear() {
        let surf = bilinear();
        assert!((surf.eval(0.0, 0.0) - Point3::new(0.0, 0.0, 0.0)).norm() < 1e-10);
        assert!((surf.eval(1.0, 1.0) - Point3::new(10.0, 10.0, 0.0)).norm() < 1e-10);
        assert!((surf.eval(0.5, 0.5) - Point3::new(5.0, 5.0, 0.0)).norm() < 1e-10);
    }

    #[test]
    fn test_from_poles_mults_knots() {
        let poles = vec![
            vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 10.0, 0.0)],
            vec![Point3::new(10.0, 0.0, 0.0), Point3::new(10.0, 10.0, 0.0)],
        ];
        let surf =
            BSplineSurface::from_poles_mults_knots(&poles, &[0.0, 1.0], &[2, 2], &[0.0, 1.0], &[2, 2], 1, 1)
                .unwrap();
        assert_eq!(surf, bilinear());
        assert!(
            BSplineSurface::from_poles_mults_knots(&poles, &[0.0, 1.0], &[3, 3], &[0.0, 1.0], &[2, 2], 1, 1)
                .is_err()
        );
    }

    #[test]
    fn test_pole_access() {
        let mut surf = bump();
        assert_eq!(surf.pole(1, 1), Point3::new(1.0, 2.0, 4.0));
        surf.set_pole(1, 1, Point3::new(1.0, 2.0, -4.0));
        assert!(surf.eval(0.5, 0.5).z < 0.0);
    }

    #[test]
    fn test_exchange_uv() {
        let surf = bump();
        let mut skewed = surf.clone();
        skewed.set_pole(2, 0, Point3::new(2.0, 0.0, 1.0));
        let flipped = skewed.exchange_uv();
        assert_eq!(flipped.pole(0, 2), skewed.pole(2, 0));
        for (u, v) in [(0.1, 0.7), (0.4, 0.4), (0.9, 0.2)] {
            assert!((flipped.eval(v, u) - skewed.eval(u, v)).norm() < 1e-12);
        }
        assert_eq!(flipped.exchange_uv(), skewed);
    }

    #[test]
    fn test_insert_knots_both_directions() {
        let surf = bump();
        let refined = surf
            .insert_knot(SurfaceDirection::U, 0.3, 1, 1e-10)
            .unwrap()
            .insert_knot(SurfaceDirection::V, 0.6, 2, 1e-10)
            .unwrap();
        assert_eq!((refined.n_u, refined.n_v), (4, 5));
        assert_eq!(refined.knot_vector(SurfaceDirection::V).mults(), vec![3, 2, 3]);
        assert_same_shape(&surf, &refined);

        let raised = refined
            .increase_multiplicity(SurfaceDirection::U, 1, 2)
            .unwrap();
        assert_eq!(raised.num_poles(SurfaceDirection::U), 5);
        assert_same_shape(&surf, &raised);
    }

    #[test]
    fn test_elevate_degree() {
        let surf = bilinear();
        let elevated = surf.elevate_degree(3, 2).unwrap();
        assert_eq!(elevated.degree(SurfaceDirection::U), 3);
        assert_eq!(elevated.degree(SurfaceDirection::V), 2);
        assert_eq!((elevated.n_u, elevated.n_v), (4, 3));
        assert_same_shape(&surf, &elevated);
    }
}
