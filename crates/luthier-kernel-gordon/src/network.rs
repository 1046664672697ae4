//! Gordon surfaces from raw, possibly incompatible curve networks.
//!
//! [`InterpolateCurveNetwork`] prepares a network for the
//! [`GordonSurfaceBuilder`]:
//!
//! 1. map every curve onto `[0, 1]`
//! 2. intersect every profile with every guide
//! 3. sort and orient the network
//! 4. average the intersection parameters into one parameter per curve
//! 5. re-fit every curve so its intersections sit at those parameters
//!
//! and then builds the surface.

use std::time::Instant;

use luthier_kernel_nurbs::{BSplineCurve, BSplineSurface};
use rayon::prelude::*;

use crate::algorithms::BSplineAlgorithms;
use crate::builder::{CurveNetwork, GordonSurfaceBuilder, GordonSurfaces};
use crate::options::NetworkOptions;
use crate::sorter::{CurveNetworkSorter, SortedNetwork};
use crate::{GordonError, Result};

/// Receives one tick per re-fitted curve.
///
/// Ticks may arrive from several threads when fitting runs in parallel.
pub trait Progress: Sync {
    /// Fitting starts; `total` ticks will follow.
    fn start(&self, _total: usize) {}
    /// One curve is done.
    fn advance(&self) {}
    /// All curves are done.
    fn finish(&self) {}
}

/// Progress sink that ignores every tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {}

/// A network ready for the surface builder.
#[derive(Debug, Clone)]
struct CompatibleNetwork {
    profiles: Vec<BSplineCurve>,
    guides: Vec<BSplineCurve>,
    params_u: Vec<f64>,
    params_v: Vec<f64>,
}

#[derive(Debug, Clone)]
struct NetworkResult {
    surfaces: GordonSurfaces,
    network: CurveNetwork,
    params_u: Vec<f64>,
    params_v: Vec<f64>,
}

/// Interpolates a network of profiles and guides with a Gordon surface.
///
/// The input curves are copied; results are computed on first access and kept.
#[derive(Debug, Clone)]
pub struct InterpolateCurveNetwork {
    profiles: Vec<BSplineCurve>,
    guides: Vec<BSplineCurve>,
    options: NetworkOptions,
    result: Option<NetworkResult>,
}

impl InterpolateCurveNetwork {
    /// Create from profiles and guides in any order and orientation.
    pub fn new(
        profiles: &[BSplineCurve],
        guides: &[BSplineCurve],
        options: NetworkOptions,
    ) -> Result<Self> {
        if profiles.len() < 2 {
            return Err(GordonError::TooFewProfiles(profiles.len()));
        }
        if guides.len() < 2 {
            return Err(GordonError::TooFewGuides(guides.len()));
        }
        options.validate()?;
        Ok(Self {
            profiles: profiles.to_vec(),
            guides: guides.to_vec(),
            options,
            result: None,
        })
    }

    /// Build the surface if not done yet.
    pub fn perform(&mut self) -> Result<()> {
        self.perform_with_progress(&NoProgress)
    }

    /// Build the surface if not done yet, reporting each re-fitted curve.
    pub fn perform_with_progress(&mut self, progress: &dyn Progress) -> Result<()> {
        if self.result.is_some() {
            return Ok(());
        }
        let compatible = self.make_curves_compatible(progress)?;

        let start = Instant::now();
        let mut builder = GordonSurfaceBuilder::new(
            compatible.profiles,
            compatible.guides,
            compatible.params_u.clone(),
            compatible.params_v.clone(),
            self.options.builder_options(),
        )?;
        let surfaces = builder.surfaces()?.clone();
        let network = builder.curve_network()?;
        log::debug!("built gordon surface in {:?}", start.elapsed());

        self.result = Some(NetworkResult {
            surfaces,
            network,
            params_u: compatible.params_u,
            params_v: compatible.params_v,
        });
        Ok(())
    }

    /// The Gordon surface.
    pub fn surface(&mut self) -> Result<&BSplineSurface> {
        Ok(&self.result()?.surfaces.gordon)
    }

    /// The skin through the re-fitted profiles.
    pub fn surface_profiles(&mut self) -> Result<&BSplineSurface> {
        Ok(&self.result()?.surfaces.profiles)
    }

    /// The skin through the re-fitted guides.
    pub fn surface_guides(&mut self) -> Result<&BSplineSurface> {
        Ok(&self.result()?.surfaces.guides)
    }

    /// The tensor-product surface through the intersection points.
    pub fn surface_intersections(&mut self) -> Result<&BSplineSurface> {
        Ok(&self.result()?.surfaces.intersections)
    }

    /// The sorted, re-fitted curves.
    pub fn curve_network(&mut self) -> Result<&CurveNetwork> {
        Ok(&self.result()?.network)
    }

    /// Surface parameters of the guides (`u`) and profiles (`v`).
    pub fn intersection_parameters(&mut self) -> Result<(&[f64], &[f64])> {
        let result = self.result()?;
        Ok((&result.params_u, &result.params_v))
    }

    fn result(&mut self) -> Result<&NetworkResult> {
        self.perform()?;
        self.result.as_ref().ok_or(GordonError::InconsistentSurfaces)
    }

    fn make_curves_compatible(&self, progress: &dyn Progress) -> Result<CompatibleNetwork> {
        let opts = &self.options;
        let tol = opts.tolerance;

        let unit = |c: &BSplineCurve| BSplineAlgorithms::reparametrize_bspline(c, 0.0, 1.0, opts.par_tolerance);
        let profiles: Vec<BSplineCurve> = self.profiles.iter().map(unit).collect();
        let guides: Vec<BSplineCurve> = self.guides.iter().map(unit).collect();
        let (n_profiles, n_guides) = (profiles.len(), guides.len());

        let start = Instant::now();
        let (params_profiles, params_guides) =
            compute_intersections(&profiles, &guides, opts.par_tolerance)?;
        log::debug!(
            "computed {}x{} curve intersections in {:?}",
            n_profiles,
            n_guides,
            start.elapsed()
        );

        let start = Instant::now();
        let mut sorter = CurveNetworkSorter::new(profiles, guides, params_profiles, params_guides)?;
        sorter.perform()?;
        log::debug!(
            "sorted network in {:?}: profiles [{}], guides [{}]",
            start.elapsed(),
            sorter.profile_ids().join(", "),
            sorter.guide_ids().join(", ")
        );
        let SortedNetwork {
            profiles,
            guides,
            mut params_profiles,
            mut params_guides,
        } = sorter.into_network();

        eliminate_inaccuracies(
            &profiles,
            &guides,
            &mut params_profiles,
            &mut params_guides,
            tol,
            opts.par_tolerance,
        );

        let mut new_params_profiles: Vec<f64> = (0..n_guides)
            .map(|j| params_profiles.iter().map(|row| row[j]).sum::<f64>() / n_profiles as f64)
            .collect();
        let mut new_params_guides: Vec<f64> = params_guides
            .iter()
            .map(|row| row.iter().sum::<f64>() / n_guides as f64)
            .collect();

        if new_params_profiles[0] > tol || new_params_guides[0] > tol {
            return Err(GordonError::MissingStartIntersection);
        }

        let max_poles_u = profiles.iter().map(BSplineCurve::num_control_points).max().unwrap_or(0);
        let max_poles_v = guides.iter().map(BSplineCurve::num_control_points).max().unwrap_or(0);
        let ncp_u = control_point_budget(n_guides, max_poles_u, opts);
        let ncp_v = control_point_budget(n_profiles, max_poles_v, opts);

        snap_ends(&mut new_params_profiles, tol);
        snap_ends(&mut new_params_guides, tol);

        let old_profile_params: Vec<Vec<f64>> = params_profiles
            .into_iter()
            .map(|mut row| {
                snap_ends(&mut row, tol);
                row
            })
            .collect();
        let old_guide_params: Vec<Vec<f64>> = (0..n_guides)
            .map(|j| {
                let mut col: Vec<f64> = params_guides.iter().map(|row| row[j]).collect();
                snap_ends(&mut col, tol);
                col
            })
            .collect();

        let algo = BSplineAlgorithms::default().with_kink_angle(opts.kink_angle_degrees);
        let start = Instant::now();
        progress.start(n_profiles + n_guides);
        let refit = |curve: &BSplineCurve, old: &Vec<f64>, new: &[f64], ncp: usize| {
            let fitted =
                algo.reparametrize_continuously_approx(curve, old, new, ncp, opts.fit_iterations);
            progress.advance();
            fitted
        };

        let (profiles, guides) = if opts.parallel {
            let profiles = profiles
                .par_iter()
                .zip(old_profile_params.par_iter())
                .map(|(c, old)| refit(c, old, &new_params_profiles, ncp_u))
                .collect::<Result<Vec<_>>>()?;
            let guides = guides
                .par_iter()
                .zip(old_guide_params.par_iter())
                .map(|(c, old)| refit(c, old, &new_params_guides, ncp_v))
                .collect::<Result<Vec<_>>>()?;
            (profiles, guides)
        } else {
            let profiles = profiles
                .iter()
                .zip(&old_profile_params)
                .map(|(c, old)| refit(c, old, &new_params_profiles, ncp_u))
                .collect::<Result<Vec<_>>>()?;
            let guides = guides
                .iter()
                .zip(&old_guide_params)
                .map(|(c, old)| refit(c, old, &new_params_guides, ncp_v))
                .collect::<Result<Vec<_>>>()?;
            (profiles, guides)
        };
        progress.finish();
        log::debug!(
            "re-fitted {} curves with {}/{} control points in {:?}",
            n_profiles + n_guides,
            ncp_u,
            ncp_v,
            start.elapsed()
        );

        Ok(CompatibleNetwork {
            profiles,
            guides,
            params_u: new_params_profiles,
            params_v: new_params_guides,
        })
    }
}

/// Intersection parameters of every profile with every guide, as
/// `[profile][guide]` matrices of parameters on the profiles and on the guides.
///
/// A pair must meet exactly once. Two meetings are accepted only when one
/// family is closed: at the first curve of the other family the smaller
/// parameter is kept, at the last one the larger.
pub fn compute_intersections(
    profiles: &[BSplineCurve],
    guides: &[BSplineCurve],
    par_tolerance: f64,
) -> Result<(Vec<Vec<f64>>, Vec<Vec<f64>>)> {
    let algo = BSplineAlgorithms::new(par_tolerance);
    let profiles_closed = profiles.first().is_some_and(BSplineAlgorithms::is_closed);
    let guides_closed = guides.first().is_some_and(BSplineAlgorithms::is_closed);
    let (last_profile, last_guide) = (profiles.len().saturating_sub(1), guides.len().saturating_sub(1));

    let mut params_u = vec![vec![0.0; guides.len()]; profiles.len()];
    let mut params_v = vec![vec![0.0; guides.len()]; profiles.len()];
    for (i, profile) in profiles.iter().enumerate() {
        for (j, guide) in guides.iter().enumerate() {
            let hits = algo.intersections(profile, guide, par_tolerance);
            match hits.as_slice() {
                [] => return Err(GordonError::NoIntersection { profile: i, guide: j }),
                [(pu, pv)] => {
                    params_u[i][j] = *pu;
                    params_v[i][j] = *pv;
                }
                [a, b] if profiles_closed || guides_closed => {
                    if profiles_closed {
                        params_u[i][j] = if j == 0 {
                            a.0.min(b.0)
                        } else if j == last_guide {
                            a.0.max(b.0)
                        } else {
                            a.0
                        };
                        params_v[i][j] = a.1;
                    }
                    if guides_closed {
                        params_v[i][j] = if i == 0 {
                            a.1.min(b.1)
                        } else if i == last_profile {
                            a.1.max(b.1)
                        } else {
                            a.1
                        };
                        params_u[i][j] = a.0;
                    }
                }
                _ => {
                    return Err(GordonError::TooManyIntersections {
                        profile: i,
                        guide: j,
                        count: hits.len(),
                    })
                }
            }
        }
    }
    Ok((params_u, params_v))
}

/// Snap intersection parameters near the first profile's and first guide's
/// end knots onto those knots.
fn eliminate_inaccuracies(
    profiles: &[BSplineCurve],
    guides: &[BSplineCurve],
    params_profiles: &mut [Vec<f64>],
    params_guides: &mut [Vec<f64>],
    tol: f64,
    par_tol: f64,
) {
    let (Some(profile), Some(guide)) = (profiles.first(), guides.first()) else {
        return;
    };
    let snap_start = |value: &mut f64, knot: f64| {
        if (*value - knot).abs() < tol {
            *value = if knot.abs() < par_tol { 0.0 } else { knot };
        }
    };
    let snap_end = |value: &mut f64, knot: f64| {
        if (*value - knot).abs() < tol {
            *value = knot;
        }
    };

    let (p_first, p_last) = profile.parameter_domain();
    let (g_first, g_last) = guide.parameter_domain();
    for row in params_profiles.iter_mut() {
        if let Some(v) = row.first_mut() {
            snap_start(v, p_first);
        }
        if let Some(v) = row.last_mut() {
            snap_end(v, p_last);
        }
    }
    if let Some(row) = params_guides.first_mut() {
        row.iter_mut().for_each(|v| snap_start(v, g_first));
    }
    if let Some(row) = params_guides.last_mut() {
        row.iter_mut().for_each(|v| snap_end(v, g_last));
    }
}

/// Control points for curves crossed by `n_crossing` curves of the other family.
fn control_point_budget(n_crossing: usize, max_poles: usize, opts: &NetworkOptions) -> usize {
    // Two extra for the seam equations of closed curves.
    let min = (n_crossing + 2).max(opts.min_control_points);
    let max = min.max(opts.max_control_points);
    min.max((max_poles + 10).min(max))
}

fn snap_ends(params: &mut [f64], tol: f64) {
    if let Some(first) = params.first_mut() {
        if first.abs() < tol {
            *first = 0.0;
        }
    }
    if let Some(last) = params.last_mut() {
        if (*last - 1.0).abs() < tol {
            *last = 1.0;
        }
    }
}
