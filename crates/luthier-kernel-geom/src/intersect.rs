//! Curve–curve intersection and minimum distance.
//!
//! Both algorithms work in two phases. Polyline samplings of the two curves
//! are compared segment against segment to find starting parameter pairs,
//! and each start is refined with Gauss–Newton on `A(s) - B(t)`.

use luthier_kernel_math::{Point3, Vec3};

use crate::{sample_curve, Curve3d};

const MAX_GAUSS_NEWTON_ITERS: usize = 50;

/// Relative parametric distance under which two solutions are the same crossing.
const DUPLICATE_PARAM_EPS: f64 = 1e-7;

/// A parameter pair where two curves meet (or come closest).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveIntersection {
    /// Parameter on the first curve.
    pub param_a: f64,
    /// Parameter on the second curve.
    pub param_b: f64,
    /// Midpoint of the two curve points.
    pub point: Point3,
    /// Distance between the two curve points.
    pub distance: f64,
}

/// Find all parameter pairs where `a` and `b` meet within `tol`.
///
/// Results are sorted by `param_a`; crossings found from several starting
/// pairs are reported once.
pub fn intersect_curves<A, B>(a: &A, b: &B, tol: f64) -> Vec<CurveIntersection>
where
    A: Curve3d + ?Sized,
    B: Curve3d + ?Sized,
{
    let samples_a = sample_curve(a, (a.suggested_segments() * 4).max(16));
    let samples_b = sample_curve(b, (b.suggested_segments() * 4).max(16));
    let (a0, a1) = a.domain();
    let (b0, b1) = b.domain();
    let eps_a = DUPLICATE_PARAM_EPS * (a1 - a0).abs().max(1.0);
    let eps_b = DUPLICATE_PARAM_EPS * (b1 - b0).abs().max(1.0);

    let mut found: Vec<CurveIntersection> = Vec::new();
    for sa in samples_a.windows(2) {
        for sb in samples_b.windows(2) {
            let (pa0, pa1) = (sa[0].1, sa[1].1);
            let (pb0, pb1) = (sb[0].1, sb[1].1);
            // Chord deviation is bounded by chord length for well-sampled curves.
            let margin = (pa1 - pa0).norm().max((pb1 - pb0).norm()) + tol;
            if !boxes_overlap(&pa0, &pa1, &pb0, &pb1, margin) {
                continue;
            }
            let (s, t) = segment_closest_params(&pa0, &pa1, &pb0, &pb1);
            let qa = pa0 + (pa1 - pa0) * s;
            let qb = pb0 + (pb1 - pb0) * t;
            if (qa - qb).norm() > margin {
                continue;
            }

            let start_a = sa[0].0 + (sa[1].0 - sa[0].0) * s;
            let start_b = sb[0].0 + (sb[1].0 - sb[0].0) * t;
            let hit = refine_pair(a, b, start_a, start_b);
            if hit.distance > tol {
                continue;
            }
            match found.iter_mut().find(|f| {
                (f.param_a - hit.param_a).abs() < eps_a && (f.param_b - hit.param_b).abs() < eps_b
            }) {
                Some(existing) => {
                    if hit.distance < existing.distance {
                        *existing = hit;
                    }
                }
                None => found.push(hit),
            }
        }
    }

    found.sort_by(|x, y| x.param_a.total_cmp(&y.param_a));
    found
}

/// Closest pair of points between `a` and `b`.
pub fn min_distance<A, B>(a: &A, b: &B) -> CurveIntersection
where
    A: Curve3d + ?Sized,
    B: Curve3d + ?Sized,
{
    let samples_a = sample_curve(a, (a.suggested_segments() * 4).max(16));
    let samples_b = sample_curve(b, (b.suggested_segments() * 4).max(16));

    let mut best = (samples_a[0].0, samples_b[0].0);
    let mut best_d = f64::INFINITY;
    for sa in samples_a.windows(2) {
        for sb in samples_b.windows(2) {
            let (s, t) = segment_closest_params(&sa[0].1, &sa[1].1, &sb[0].1, &sb[1].1);
            let qa = sa[0].1 + (sa[1].1 - sa[0].1) * s;
            let qb = sb[0].1 + (sb[1].1 - sb[0].1) * t;
            let d = (qa - qb).norm();
            if d < best_d {
                best_d = d;
                best = (
                    sa[0].0 + (sa[1].0 - sa[0].0) * s,
                    sb[0].0 + (sb[1].0 - sb[0].0) * t,
                );
            }
        }
    }

    refine_pair(a, b, best.0, best.1)
}

/// Gauss–Newton refinement of `|A(s) - B(t)|` from a starting pair.
///
/// Parameters are clamped to their domains. The returned pair is the best
/// one seen during the iteration.
fn refine_pair<A, B>(a: &A, b: &B, s_init: f64, t_init: f64) -> CurveIntersection
where
    A: Curve3d + ?Sized,
    B: Curve3d + ?Sized,
{
    let (a0, a1) = a.domain();
    let (b0, b1) = b.domain();
    let eps = 1e-15 * (a1 - a0).abs().max((b1 - b0).abs()).max(1.0);

    let mut s = s_init.clamp(a0, a1);
    let mut t = t_init.clamp(b0, b1);
    let mut best = make_hit(a, b, s, t);

    for _ in 0..MAX_GAUSS_NEWTON_ITERS {
        let da = a.derivatives(s, 1);
        let db = b.derivatives(t, 1);
        let r: Vec3 = da[0] - db[0];
        let ja = da[1];
        let jb = -db[1];

        let m11 = ja.dot(&ja);
        let m12 = ja.dot(&jb);
        let m22 = jb.dot(&jb);
        let g1 = -ja.dot(&r);
        let g2 = -jb.dot(&r);
        let det = m11 * m22 - m12 * m12;
        if det.abs() <= f64::EPSILON * m11 * m22 || det == 0.0 {
            break;
        }
        let ds = (g1 * m22 - g2 * m12) / det;
        let dt = (m11 * g2 - m12 * g1) / det;

        let next_s = (s + ds).clamp(a0, a1);
        let next_t = (t + dt).clamp(b0, b1);
        let hit = make_hit(a, b, next_s, next_t);
        if hit.distance <= best.distance {
            best = hit;
        }
        if (next_s - s).abs() <= eps && (next_t - t).abs() <= eps {
            break;
        }
        s = next_s;
        t = next_t;
    }

    best
}

fn make_hit<A, B>(a: &A, b: &B, s: f64, t: f64) -> CurveIntersection
where
    A: Curve3d + ?Sized,
    B: Curve3d + ?Sized,
{
    let pa = a.evaluate(s);
    let pb = b.evaluate(t);
    CurveIntersection {
        param_a: s,
        param_b: t,
        point: midpoint(&pa, &pb),
        distance: (pa - pb).norm(),
    }
}

fn midpoint(a: &Point3, b: &Point3) -> Point3 {
    Point3::from((a.coords + b.coords) * 0.5)
}

fn boxes_overlap(a0: &Point3, a1: &Point3, b0: &Point3, b1: &Point3, margin: f64) -> bool {
    (0..3).all(|k| {
        let (amin, amax) = (a0[k].min(a1[k]), a0[k].max(a1[k]));
        let (bmin, bmax) = (b0[k].min(b1[k]), b0[k].max(b1[k]));
        amin <= bmax + margin && bmin <= amax + margin
    })
}

/// Parameters `(s, t) ∈ [0,1]²` of the closest points between segments `p0p1` and `q0q1`.
fn segment_closest_params(p0: &Point3, p1: &Point3, q0: &Point3, q1: &Point3) -> (f64, f64) {
    let d1 = p1 - p0;
    let d2 = q1 - q0;
    let r = p0 - q0;
    let a = d1.norm_squared();
    let e = d2.norm_squared();
    let f = d2.dot(&r);

    if a <= f64::EPSILON && e <= f64::EPSILON {
        return (0.0, 0.0);
    }
    if a <= f64::EPSILON {
        return (0.0, (f / e).clamp(0.0, 1.0));
    }
    let c = d1.dot(&r);
    if e <= f64::EPSILON {
        return ((-c / a).clamp(0.0, 1.0), 0.0);
    }

    let b = d1.dot(&d2);
    let denom = a * e - b * b;
    let mut s = if denom > f64::EPSILON * a * e {
        ((b * f - c * e) / denom).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let mut t = (b * s + f) / e;
    if t < 0.0 {
        t = 0.0;
        s = (-c / a).clamp(0.0, 1.0);
    } else if t > 1.0 {
        t = 1.0;
        s = ((b - c) / a).clamp(0.0, 1.0);
    }
    (s, t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Line3d;
    use approx::assert_abs_diff_eq;

    /// Parabola `(t, t², 0)` over `[-2, 2]`.
    #[derive(Debug)]
    struct Parabola;

    impl Curve3d for Parabola {
        fn evaluate(&self, t: f64) -> Point3 {
            Point3::new(t, t * t, 0.0)
        }

        fn derivatives(&self, t: f64, order: usize) -> Vec<Vec3> {
            let all = [
                Vec3::new(t, t * t, 0.0),
                Vec3::new(1.0, 2.0 * t, 0.0),
                Vec3::new(0.0, 2.0, 0.0),
            ];
            (0..=order)
                .map(|k| all.get(k).copied().unwrap_or_else(Vec3::zeros))
                .collect()
        }

        fn domain(&self) -> (f64, f64) {
            (-2.0, 2.0)
        }
    }

    #[test]
    fn test_crossing_lines() {
        let a = Line3d::from_points(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0));
        let b = Line3d::from_points(Point3::new(3.0, -5.0, 0.0), Point3::new(3.0, 5.0, 0.0));
        let hits = intersect_curves(&a, &b, 1e-9);
        assert_eq!(hits.len(), 1);
        assert_abs_diff_eq!(hits[0].param_a, 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(hits[0].param_b, 0.5, epsilon = 1e-12);
        assert!(hits[0].distance < 1e-12);
    }

    #[test]
    fn test_lines_meeting_at_endpoints() {
        let a = Line3d::from_points(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0));
        let b = Line3d::from_points(Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 10.0, 0.0));
        let hits = intersect_curves(&a, &b, 1e-9);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].param_a.abs() < 1e-12);
        assert!(hits[0].param_b.abs() < 1e-12);
    }

    #[test]
    fn test_parabola_line_two_hits() {
        let line = Line3d::from_points(Point3::new(-3.0, 1.0, 0.0), Point3::new(3.0, 1.0, 0.0));
        let hits = intersect_curves(&Parabola, &line, 1e-9);
        assert_eq!(hits.len(), 2);
        assert_abs_diff_eq!(hits[0].param_a, -1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(hits[1].param_a, 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_skew_lines_do_not_intersect() {
        let a = Line3d::from_points(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0));
        let b = Line3d::from_points(Point3::new(5.0, -5.0, 1.0), Point3::new(5.0, 5.0, 1.0));
        assert!(intersect_curves(&a, &b, 1e-9).is_empty());

        let closest = min_distance(&a, &b);
        assert_abs_diff_eq!(closest.distance, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(closest.param_a, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(closest.point.z, 0.5, epsilon = 1e-12);
    }
}
