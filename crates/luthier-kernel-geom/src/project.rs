//! Closest-point parameter inversion.

use luthier_kernel_math::Point3;

use crate::{sample_curve, Curve3d};

const MAX_NEWTON_ITERS: usize = 30;

/// Find the parameter of the point on `curve` closest to `point`.
///
/// A uniform polyline sampling picks the starting parameter (projecting onto
/// the nearest chord), then Newton iteration on `C'(t)·(C(t) - P) = 0`
/// refines it. The result always lies inside the curve domain.
pub fn closest_parameter<C: Curve3d + ?Sized>(curve: &C, point: &Point3) -> f64 {
    let segments = (curve.suggested_segments() * 4).max(16);
    let samples = sample_curve(curve, segments);

    let mut best_t = samples[0].0;
    let mut best_d = f64::INFINITY;
    for pair in samples.windows(2) {
        let (ta, pa) = pair[0];
        let (tb, pb) = pair[1];
        let chord = pb - pa;
        let len2 = chord.norm_squared();
        let s = if len2 > 0.0 {
            ((point - pa).dot(&chord) / len2).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let d = (point - (pa + chord * s)).norm_squared();
        if d < best_d {
            best_d = d;
            best_t = ta + (tb - ta) * s;
        }
    }

    refine_parameter(curve, point, best_t)
}

/// Refine a parameter estimate for the closest point to `point` by Newton iteration.
///
/// Never returns a parameter farther from `point` than the initial guess.
pub fn refine_parameter<C: Curve3d + ?Sized>(curve: &C, point: &Point3, t_init: f64) -> f64 {
    let (t0, t1) = curve.domain();
    let eps = 1e-15 * (t1 - t0).abs().max(1.0);

    let dist2 = |t: f64| (curve.evaluate(t) - point).norm_squared();
    let mut t = t_init.clamp(t0, t1);
    let mut best_t = t;
    let mut best_d = dist2(t);

    for _ in 0..MAX_NEWTON_ITERS {
        let ders = curve.derivatives(t, 2);
        let diff = ders[0] - point.coords;
        let f = ders[1].dot(&diff);
        let df = ders[2].dot(&diff) + ders[1].norm_squared();
        if df.abs() < f64::MIN_POSITIVE {
            break;
        }
        let next = (t - f / df).clamp(t0, t1);
        let d = dist2(next);
        if d <= best_d {
            best_d = d;
            best_t = next;
        }
        if (next - t).abs() <= eps {
            break;
        }
        t = next;
    }

    best_t
}
