//! Knot vectors and B-spline basis functions.

use nalgebra::DMatrix;

use crate::{NurbsError, Result};

// =============================================================================
// Knot vector utilities
// =============================================================================

/// Validate a knot vector: non-decreasing, length = n_control_points + degree + 1.
pub(crate) fn validate_knots(knots: &[f64], n_points: usize, degree: usize) -> bool {
    if knots.len() != n_points + degree + 1 {
        return false;
    }
    knots.windows(2).all(|w| w[0] <= w[1])
}

/// Find the knot span index for parameter `t`.
///
/// Returns `i` such that `knots[i] <= t < knots[i+1]`, clamped to valid range.
/// For `t` at the end of the domain, returns the last valid span.
pub(crate) fn find_span(knots: &[f64], n: usize, degree: usize, t: f64) -> usize {
    // n = number of control points - 1 (last index)
    if t >= knots[n + 1] {
        return n;
    }
    if t <= knots[degree] {
        // Skip repeated knots at the domain start.
        let mut span = degree;
        while span < n && knots[span + 1] <= t {
            span += 1;
        }
        return span;
    }
    let mut low = degree;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;
    while t < knots[mid] || t >= knots[mid + 1] {
        if t < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// Compute non-zero basis function values at parameter `t`.
///
/// Returns a vector of `degree + 1` values `N[span-degree..=span]` at `t`.
pub(crate) fn basis_functions(knots: &[f64], span: usize, degree: usize, t: f64) -> Vec<f64> {
    let mut n = vec![0.0; degree + 1];
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];
    n[0] = 1.0;

    for j in 1..=degree {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;
        for r in 0..j {
            let denom = right[r + 1] + left[j - r];
            if denom.abs() < 1e-30 {
                // Zero-length knot interval
                n[r] = saved;
                saved = 0.0;
                continue;
            }
            let temp = n[r] / denom;
            n[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        n[j] = saved;
    }

    n
}

// =============================================================================
// KnotVector
// =============================================================================

/// A sorted knot multiset.
///
/// Repeated values encode multiplicity. All transformations return a new
/// vector.
#[derive(Debug, Clone, PartialEq)]
pub struct KnotVector {
    vector: Vec<f64>,
}

impl KnotVector {
    /// Build from raw knots, sorting them ascending.
    pub fn new(mut knots: Vec<f64>) -> Self {
        knots.sort_by(f64::total_cmp);
        Self { vector: knots }
    }

    /// Build from unique knots and their multiplicities.
    pub fn from_unique(knots: &[f64], mults: &[usize]) -> Self {
        let vector = knots
            .iter()
            .zip(mults)
            .flat_map(|(&k, &m)| std::iter::repeat(k).take(m))
            .collect();
        Self::new(vector)
    }

    /// The full knot multiset.
    pub fn as_slice(&self) -> &[f64] {
        &self.vector
    }

    /// Consume into the raw knot list.
    pub fn into_vec(self) -> Vec<f64> {
        self.vector
    }

    /// Number of knots including repeats.
    pub fn len(&self) -> usize {
        self.vector.len()
    }

    /// True if the vector holds no knots.
    pub fn is_empty(&self) -> bool {
        self.vector.is_empty()
    }

    /// Distinct knot values in ascending order.
    pub fn knots(&self) -> Vec<f64> {
        let mut unique: Vec<f64> = Vec::with_capacity(self.vector.len());
        for &k in &self.vector {
            if unique.last() != Some(&k) {
                unique.push(k);
            }
        }
        unique
    }

    /// Multiplicity of each entry of [`KnotVector::knots`].
    pub fn mults(&self) -> Vec<usize> {
        let mut mults: Vec<usize> = Vec::new();
        let mut last: Option<f64> = None;
        for &k in &self.vector {
            match (last, mults.last_mut()) {
                (Some(prev), Some(count)) if prev == k => *count += 1,
                _ => mults.push(1),
            }
            last = Some(k);
        }
        mults
    }

    /// Smallest knot (0 for an empty vector).
    pub fn min(&self) -> f64 {
        self.vector.first().copied().unwrap_or(0.0)
    }

    /// Largest knot (0 for an empty vector).
    pub fn max(&self) -> f64 {
        self.vector.last().copied().unwrap_or(0.0)
    }

    /// Knot vector of the reversed-direction curve: `k -> min + max - k`.
    pub fn reversed(&self) -> Self {
        let (lo, hi) = (self.min(), self.max());
        Self {
            vector: self.vector.iter().rev().map(|k| lo + hi - k).collect(),
        }
    }

    /// Affinely remap `[min, max]` onto `[0, length]`.
    pub fn scaled(&self, length: f64) -> Result<Self> {
        if length <= 0.0 {
            return Err(NurbsError::InvalidScale(length));
        }
        let (lo, hi) = (self.min(), self.max());
        if hi <= lo {
            return Err(NurbsError::DegenerateKnotVector);
        }
        let factor = length / (hi - lo);
        let vector = self
            .vector
            .iter()
            .map(|&k| if k == hi { length } else { (k - lo) * factor })
            .collect();
        Ok(Self { vector })
    }
}

// =============================================================================
// Basis functions and derivatives
// =============================================================================

/// B-spline basis of a given degree over a knot vector.
#[derive(Debug, Clone, Copy)]
pub struct BSplineBasis<'a> {
    degree: usize,
    knots: &'a [f64],
}

impl<'a> BSplineBasis<'a> {
    /// Create a basis. `knots` must hold at least `2 * (degree + 1)` entries.
    pub fn new(degree: usize, knots: &'a [f64]) -> Self {
        Self { degree, knots }
    }

    /// Polynomial degree.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of basis functions (control points).
    pub fn num_functions(&self) -> usize {
        self.knots.len() - self.degree - 1
    }

    /// Span index containing `u`; the last non-empty span at the domain end.
    pub fn find_span(&self, u: f64) -> usize {
        find_span(self.knots, self.num_functions() - 1, self.degree, u)
    }

    /// Values and derivatives of the `degree + 1` non-zero basis functions.
    ///
    /// Row `k` of the result holds the k-th derivatives of
    /// `N[span-degree..=span]`. Rows above the degree are zero.
    pub fn basis_and_derivatives(&self, span: usize, u: f64, max_deriv: usize) -> Vec<Vec<f64>> {
        let p = self.degree;
        let knots = self.knots;
        let mut ndu = vec![vec![0.0; p + 1]; p + 1];
        let mut left = vec![0.0; p + 1];
        let mut right = vec![0.0; p + 1];
        ndu[0][0] = 1.0;

        for j in 1..=p {
            left[j] = u - knots[span + 1 - j];
            right[j] = knots[span + j] - u;
            let mut saved = 0.0;
            for r in 0..j {
                ndu[j][r] = right[r + 1] + left[j - r];
                let temp = ndu[r][j - 1] / ndu[j][r];
                ndu[r][j] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            ndu[j][j] = saved;
        }

        let mut ders = vec![vec![0.0; p + 1]; max_deriv + 1];
        for j in 0..=p {
            ders[0][j] = ndu[j][p];
        }

        let n = max_deriv.min(p);
        let mut a = [vec![0.0; p + 1], vec![0.0; p + 1]];
        for r in 0..=p {
            let (mut s1, mut s2) = (0, 1);
            a[0][0] = 1.0;
            for k in 1..=n {
                let mut d = 0.0;
                let rk = r as isize - k as isize;
                let pk = p - k;
                if rk >= 0 {
                    a[s2][0] = a[s1][0] / ndu[pk + 1][rk as usize];
                    d = a[s2][0] * ndu[rk as usize][pk];
                }
                let j1 = if rk >= -1 { 1 } else { (-rk) as usize };
                let j2 = if r as isize - 1 <= pk as isize {
                    k - 1
                } else {
                    p - r
                };
                for j in j1..=j2 {
                    let idx = (rk + j as isize) as usize;
                    a[s2][j] = (a[s1][j] - a[s1][j - 1]) / ndu[pk + 1][idx];
                    d += a[s2][j] * ndu[idx][pk];
                }
                if r <= pk {
                    a[s2][k] = -a[s1][k - 1] / ndu[pk + 1][r];
                    d += a[s2][k] * ndu[r][pk];
                }
                ders[k][r] = d;
                std::mem::swap(&mut s1, &mut s2);
            }
        }

        let mut factor = p as f64;
        for (k, row) in ders.iter_mut().enumerate().take(n + 1).skip(1) {
            for v in row.iter_mut() {
                *v *= factor;
            }
            factor *= (p - k) as f64;
        }
        ders
    }

    /// Full-length vector of the `deriv`-th derivative of every basis function at `u`.
    pub fn evaluate(&self, u: f64, deriv: usize) -> Vec<f64> {
        let span = self.find_span(u);
        let local = self.basis_and_derivatives(span, u, deriv);
        let mut full = vec![0.0; self.num_functions()];
        for (j, v) in local[deriv].iter().enumerate() {
            full[span - self.degree + j] = *v;
        }
        full
    }

    /// Collocation matrix: one row per parameter, one column per basis function.
    pub fn matrix(&self, params: &[f64], deriv: usize) -> DMatrix<f64> {
        let mut m = DMatrix::zeros(params.len(), self.num_functions());
        for (row, &u) in params.iter().enumerate() {
            let span = self.find_span(u);
            let local = self.basis_and_derivatives(span, u, deriv);
            for (j, v) in local[deriv].iter().enumerate() {
                m[(row, span - self.degree + j)] = *v;
            }
        }
        m
    }
}
