//! Global B-spline interpolation.

use luthier_kernel_math::{solve_dense, Point3};
use nalgebra::DMatrix;

use crate::knots::BSplineBasis;
use crate::{BSplineCurve, NurbsError, Result};

/// Highest degree used for interpolating curves.
const MAX_INTERPOLATION_DEGREE: usize = 3;

/// Interpolate `points` at the given parameters.
///
/// Open curves take one parameter per point, use degree `min(3, n - 1)` and
/// knots placed by averaging the parameters.
///
/// Closed curves take the distinct points only and one extra parameter for
/// the closing point (the first point repeated). Interior knots sit at the
/// parameters and the curve matches derivatives up to order `degree - 1` at
/// the seam, so the result is a clamped curve that is smooth across its
/// start and end.
pub fn interpolate(points: &[Point3], params: &[f64], closed: bool) -> Result<BSplineCurve> {
    let n = points.len();
    if n < 2 {
        return Err(NurbsError::TooFewPoints { needed: 2, got: n });
    }
    let expected = if closed { n + 1 } else { n };
    if params.len() != expected {
        return Err(NurbsError::ParameterCountMismatch {
            expected,
            got: params.len(),
        });
    }
    if params.windows(2).any(|w| w[1] <= w[0]) {
        return Err(NurbsError::NonIncreasingParameters);
    }

    if closed {
        interpolate_closed(points, params)
    } else {
        interpolate_open(points, params)
    }
}

fn interpolate_open(points: &[Point3], params: &[f64]) -> Result<BSplineCurve> {
    let n = points.len();
    let degree = MAX_INTERPOLATION_DEGREE.min(n - 1);

    let mut knots = Vec::with_capacity(n + degree + 1);
    knots.extend(std::iter::repeat(params[0]).take(degree + 1));
    for j in 1..n - degree {
        let avg = params[j..j + degree].iter().sum::<f64>() / degree as f64;
        knots.push(avg);
    }
    knots.extend(std::iter::repeat(params[n - 1]).take(degree + 1));

    let a = BSplineBasis::new(degree, &knots).matrix(params, 0);
    let rhs = point_rows(points.iter());
    solve_poles(a, &rhs, knots, degree)
}

fn interpolate_closed(points: &[Point3], params: &[f64]) -> Result<BSplineCurve> {
    let m = points.len();
    let degree = MAX_INTERPOLATION_DEGREE.min(m);
    let (t_start, t_end) = (params[0], params[m]);

    let mut knots = Vec::with_capacity(m + 2 * degree + 1);
    knots.extend(std::iter::repeat(t_start).take(degree + 1));
    knots.extend_from_slice(&params[1..m]);
    knots.extend(std::iter::repeat(t_end).take(degree + 1));
    let n_poles = m + degree;

    let basis = BSplineBasis::new(degree, &knots);
    let mut a = DMatrix::zeros(n_poles, n_poles);
    let values = basis.matrix(params, 0);
    a.rows_mut(0, m + 1).copy_from(&values);
    for k in 1..degree {
        let start = basis.evaluate(t_start, k);
        let end = basis.evaluate(t_end, k);
        for col in 0..n_poles {
            a[(m + k, col)] = start[col] - end[col];
        }
    }

    let mut rhs = DMatrix::zeros(n_poles, 3);
    let closing = points.iter().chain(std::iter::once(&points[0]));
    for (row, p) in closing.enumerate() {
        for k in 0..3 {
            rhs[(row, k)] = p[k];
        }
    }
    solve_poles(a, &rhs, knots, degree)
}

fn point_rows<'a>(points: impl ExactSizeIterator<Item = &'a Point3>) -> DMatrix<f64> {
    let mut rhs = DMatrix::zeros(points.len(), 3);
    for (row, p) in points.enumerate() {
        for k in 0..3 {
            rhs[(row, k)] = p[k];
        }
    }
    rhs
}

fn solve_poles(
    a: DMatrix<f64>,
    rhs: &DMatrix<f64>,
    knots: Vec<f64>,
    degree: usize,
) -> Result<BSplineCurve> {
    let x = solve_dense(a, rhs).ok_or(NurbsError::SingularSystem)?;
    let poles = (0..x.nrows())
        .map(|i| Point3::new(x[(i, 0)], x[(i, 1)], x[(i, 2)]))
        .collect();
    BSplineCurve::try_new(poles, knots, degree)
}
