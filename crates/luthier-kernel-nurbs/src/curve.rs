//! Non-rational B-spline curves.

use luthier_kernel_geom::Curve3d;
use luthier_kernel_math::{solve_dense, Point3, Vec3};
use nalgebra::DMatrix;

use crate::knots::{basis_functions, find_span, validate_knots, BSplineBasis, KnotVector};
use crate::{NurbsError, Result};

/// A non-rational B-spline curve in 3D.
///
/// Defined by control points, a knot vector, and a polynomial degree.
/// Evaluated using De Boor's algorithm.
#[derive(Debug, Clone, PartialEq)]
pub struct BSplineCurve {
    /// Control points in 3D.
    pub control_points: Vec<Point3>,
    /// Knot vector. Length = control_points.len() + degree + 1.
    pub knots: Vec<f64>,
    /// Polynomial degree (order = degree + 1).
    pub degree: usize,
}

impl BSplineCurve {
    /// Create a B-spline curve.
    ///
    /// # Panics
    /// Panics if the knot vector length doesn't match `n + degree + 1` or the
    /// knots decrease anywhere. Use [`BSplineCurve::try_new`] for untrusted input.
    pub fn new(control_points: Vec<Point3>, knots: Vec<f64>, degree: usize) -> Self {
        assert!(
            validate_knots(&knots, control_points.len(), degree),
            "invalid knot vector: len={} but expected {} (n={}, p={})",
            knots.len(),
            control_points.len() + degree + 1,
            control_points.len(),
            degree
        );
        Self {
            control_points,
            knots,
            degree,
        }
    }

    /// Create a B-spline curve, reporting an inconsistent knot vector as an error.
    pub fn try_new(control_points: Vec<Point3>, knots: Vec<f64>, degree: usize) -> Result<Self> {
        if control_points.len() <= degree || !validate_knots(&knots, control_points.len(), degree)
        {
            return Err(NurbsError::InvalidKnotVector {
                expected: control_points.len() + degree + 1,
                actual: knots.len(),
            });
        }
        Ok(Self {
            control_points,
            knots,
            degree,
        })
    }

    /// Build from poles, unique knots and multiplicities.
    pub fn from_poles_mults_knots(
        control_points: Vec<Point3>,
        knots: &[f64],
        mults: &[usize],
        degree: usize,
    ) -> Result<Self> {
        let flat = KnotVector::from_unique(knots, mults).into_vec();
        Self::try_new(control_points, flat, degree)
    }

    /// Create a clamped uniform B-spline with the given degree.
    ///
    /// The knot vector is clamped (first and last knots repeated `degree+1` times)
    /// with uniform internal spacing.
    ///
    /// # Panics
    /// Panics if there are not more than `degree` control points.
    pub fn clamped_uniform(control_points: Vec<Point3>, degree: usize) -> Self {
        let n = control_points.len();
        assert!(
            n > degree,
            "need more than {degree} control points for degree {degree}, got {n}"
        );
        let m = n + degree + 1;
        let mut knots = vec![0.0; m];

        let n_internal = m - 2 * (degree + 1);
        for i in 0..=degree {
            knots[i] = 0.0;
            knots[m - 1 - i] = 1.0;
        }
        for i in 1..=n_internal {
            knots[degree + i] = i as f64 / (n_internal + 1) as f64;
        }

        Self::new(control_points, knots, degree)
    }

    /// Evaluate the curve at parameter `t` using De Boor's algorithm.
    pub fn eval(&self, t: f64) -> Point3 {
        let n = self.control_points.len() - 1;
        let t = t.clamp(self.knots[self.degree], self.knots[n + 1]);
        let span = find_span(&self.knots, n, self.degree, t);
        let basis = basis_functions(&self.knots, span, self.degree, t);

        let mut point = Point3::origin();
        for (i, &b) in basis.iter().enumerate() {
            let cp = &self.control_points[span - self.degree + i];
            point.coords += b * cp.coords;
        }
        point
    }

    /// Position and derivatives up to `order` at `t` (entry 0 is the position).
    pub fn derivatives(&self, t: f64, order: usize) -> Vec<Vec3> {
        let (t_min, t_max) = self.parameter_domain();
        let t = t.clamp(t_min, t_max);
        let basis = BSplineBasis::new(self.degree, &self.knots);
        let span = basis.find_span(t);
        let ders = basis.basis_and_derivatives(span, t, order);

        ders.iter()
            .map(|row| {
                row.iter().enumerate().fold(Vec3::zeros(), |acc, (i, &b)| {
                    acc + b * self.control_points[span - self.degree + i].coords
                })
            })
            .collect()
    }

    /// First derivative at parameter `t`.
    pub fn tangent(&self, t: f64) -> Vec3 {
        if self.degree == 0 {
            return Vec3::zeros();
        }
        self.derivatives(t, 1)[1]
    }

    /// Parameter domain `(t_min, t_max)`.
    pub fn parameter_domain(&self) -> (f64, f64) {
        (
            self.knots[self.degree],
            self.knots[self.control_points.len()],
        )
    }

    /// Start of the parameter domain.
    pub fn first_parameter(&self) -> f64 {
        self.parameter_domain().0
    }

    /// End of the parameter domain.
    pub fn last_parameter(&self) -> f64 {
        self.parameter_domain().1
    }

    /// Number of control points.
    pub fn num_control_points(&self) -> usize {
        self.control_points.len()
    }

    /// The knot vector as a [`KnotVector`].
    pub fn knot_vector(&self) -> KnotVector {
        KnotVector::new(self.knots.clone())
    }

    /// Distinct knot values.
    pub fn unique_knots(&self) -> Vec<f64> {
        self.knot_vector().knots()
    }

    /// Multiplicity of each distinct knot.
    pub fn multiplicities(&self) -> Vec<usize> {
        self.knot_vector().mults()
    }

    /// True if the start and end points coincide within `tol`.
    pub fn is_closed(&self, tol: f64) -> bool {
        let (t0, t1) = self.parameter_domain();
        (self.eval(t0) - self.eval(t1)).norm() <= tol
    }

    /// Insert a knot value using Boehm's algorithm.
    ///
    /// Returns a new curve with one additional control point.
    pub fn insert_knot(&self, t: f64) -> Self {
        let n = self.control_points.len() - 1;
        let p = self.degree;
        let span = find_span(&self.knots, n, p, t);

        let mut new_knots = Vec::with_capacity(self.knots.len() + 1);
        new_knots.extend_from_slice(&self.knots[..=span]);
        new_knots.push(t);
        new_knots.extend_from_slice(&self.knots[span + 1..]);

        let mut new_pts = Vec::with_capacity(self.control_points.len() + 1);
        new_pts.extend_from_slice(&self.control_points[..=(span - p)]);
        for i in (span - p + 1)..=span {
            let alpha = (t - self.knots[i]) / (self.knots[i + p] - self.knots[i]);
            let pt = self.control_points[i - 1].coords * (1.0 - alpha)
                + self.control_points[i].coords * alpha;
            new_pts.push(Point3::from(pt));
        }
        new_pts.extend_from_slice(&self.control_points[span..]);

        Self::new(new_pts, new_knots, p)
    }

    /// Insert `t` with multiplicity `mult`.
    ///
    /// A knot already present within `tol` has its multiplicity raised by
    /// `mult` instead. Interior multiplicities never exceed the degree and
    /// the domain end knots are left untouched.
    pub fn insert_knot_mult(&self, t: f64, mult: usize, tol: f64) -> Result<Self> {
        let (t0, t1) = self.parameter_domain();
        let knots = self.unique_knots();
        let mults = self.multiplicities();

        if let Some(idx) = knots.iter().position(|k| (k - t).abs() <= tol) {
            if idx == 0 || idx == knots.len() - 1 {
                return Ok(self.clone());
            }
            let target = (mults[idx] + mult).min(self.degree);
            return Ok(self.insert_repeated(knots[idx], target.saturating_sub(mults[idx])));
        }
        if t <= t0 || t >= t1 {
            return Err(NurbsError::KnotOutOfRange(t));
        }
        Ok(self.insert_repeated(t, mult.min(self.degree)))
    }

    /// Raise the multiplicity of unique knot `index` to `mult`.
    ///
    /// Never lowers a multiplicity; the domain end knots are left untouched.
    pub fn increase_multiplicity(&self, index: usize, mult: usize) -> Result<Self> {
        let knots = self.unique_knots();
        let mults = self.multiplicities();
        if index >= knots.len() {
            return Err(NurbsError::KnotIndexOutOfRange {
                index,
                count: knots.len(),
            });
        }
        if index == 0 || index == knots.len() - 1 {
            return Ok(self.clone());
        }
        let target = mult.min(self.degree);
        Ok(self.insert_repeated(knots[index], target.saturating_sub(mults[index])))
    }

    fn insert_repeated(&self, t: f64, times: usize) -> Self {
        let mut curve = self.clone();
        for _ in 0..times {
            curve = curve.insert_knot(t);
        }
        curve
    }

    /// Raise the degree to `degree`, keeping the shape and continuity.
    ///
    /// Every knot multiplicity grows by the degree difference; the new poles
    /// solve the collocation system at the Greville abscissae.
    pub fn elevate_degree(&self, degree: usize) -> Result<Self> {
        if degree < self.degree {
            return Err(NurbsError::DegreeDecrease {
                from: self.degree,
                to: degree,
            });
        }
        if degree == self.degree {
            return Ok(self.clone());
        }

        let raise = degree - self.degree;
        let kv = self.knot_vector();
        let mults: Vec<usize> = kv.mults().iter().map(|m| m + raise).collect();
        let knots = KnotVector::from_unique(&kv.knots(), &mults).into_vec();
        let n = knots.len() - degree - 1;

        let greville: Vec<f64> = (0..n)
            .map(|i| knots[i + 1..=i + degree].iter().sum::<f64>() / degree as f64)
            .collect();
        let a = BSplineBasis::new(degree, &knots).matrix(&greville, 0);
        let mut rhs = DMatrix::zeros(n, 3);
        for (row, &g) in greville.iter().enumerate() {
            let p = self.eval(g);
            for k in 0..3 {
                rhs[(row, k)] = p[k];
            }
        }
        let x = solve_dense(a, &rhs).ok_or(NurbsError::SingularSystem)?;
        let poles = (0..n)
            .map(|i| Point3::new(x[(i, 0)], x[(i, 1)], x[(i, 2)]))
            .collect();
        Self::try_new(poles, knots, degree)
    }

    /// The same curve traversed in the opposite direction over the same domain.
    pub fn reversed(&self) -> Self {
        let mut control_points = self.control_points.clone();
        control_points.reverse();
        Self {
            control_points,
            knots: KnotVector::new(self.knots.clone()).reversed().into_vec(),
            degree: self.degree,
        }
    }

    /// Affinely map the knot vector onto `[t_min, t_max]`.
    pub fn reparametrized(&self, t_min: f64, t_max: f64) -> Self {
        let (a, b) = self.parameter_domain();
        let scale = (t_max - t_min) / (b - a);
        let knots = self
            .knots
            .iter()
            .map(|&k| {
                if k == a {
                    t_min
                } else if k == b {
                    t_max
                } else {
                    t_min + (k - a) * scale
                }
            })
            .collect();
        Self {
            control_points: self.control_points.clone(),
            knots,
            degree: self.degree,
        }
    }
}

impl Curve3d for BSplineCurve {
    fn evaluate(&self, t: f64) -> Point3 {
        self.eval(t)
    }

    fn derivatives(&self, t: f64, order: usize) -> Vec<Vec3> {
        BSplineCurve::derivatives(self, t, order)
    }

    fn domain(&self) -> (f64, f64) {
        self.parameter_domain()
    }

    fn tangent(&self, t: f64) -> Vec3 {
        BSplineCurve::tangent(self, t)
    }

    fn suggested_segments(&self) -> usize {
        let spans = self.num_control_points().saturating_sub(self.degree).max(1);
        (spans * self.degree.max(1)).clamp(8, 128)
    }
}
