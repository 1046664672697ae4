//! Gordon surface construction from a compatible curve network.
//!
//! The Gordon surface of a network is
//!
//! ```text
//! S = skin(profiles) + skin(guides) - T
//! ```
//!
//! where `T` interpolates the grid of intersection points. All three
//! surfaces are brought to common degrees and knot vectors first, so the
//! combination is a plain sum over control points.

use luthier_kernel_math::Point3;
use luthier_kernel_nurbs::{BSplineCurve, BSplineSurface};

use crate::algorithms::BSplineAlgorithms;
use crate::options::BuilderOptions;
use crate::{GordonError, Result};

/// Tolerance on the parameter domains shared by one curve family.
const RANGE_TOL: f64 = 1e-5;

/// The profiles and guides a surface was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveNetwork {
    /// Curves running in `u`.
    pub profiles: Vec<BSplineCurve>,
    /// Curves running in `v`.
    pub guides: Vec<BSplineCurve>,
}

/// The Gordon surface and the three surfaces it is combined from.
///
/// All four share degrees, knot vectors and pole grid sizes.
#[derive(Debug, Clone, PartialEq)]
pub struct GordonSurfaces {
    /// `profiles + guides - intersections`.
    pub gordon: BSplineSurface,
    /// Skin through the profiles.
    pub profiles: BSplineSurface,
    /// Skin through the guides, with `u` and `v` exchanged to match the profiles.
    pub guides: BSplineSurface,
    /// Tensor-product interpolation of the intersection points.
    pub intersections: BSplineSurface,
}

/// Builds a Gordon surface from profiles and guides that already meet at
/// known parameters.
///
/// Guide `i` sits at `params_u[i]` on every profile and profile `k` sits at
/// `params_v[k]` on every guide. Surfaces are built on first access and kept.
#[derive(Debug, Clone)]
pub struct GordonSurfaceBuilder {
    profiles: Vec<BSplineCurve>,
    guides: Vec<BSplineCurve>,
    params_u: Vec<f64>,
    params_v: Vec<f64>,
    options: BuilderOptions,
    surfaces: Option<GordonSurfaces>,
}

impl GordonSurfaceBuilder {
    /// Create a builder, checking curve counts, parameter counts and tolerances.
    pub fn new(
        profiles: Vec<BSplineCurve>,
        guides: Vec<BSplineCurve>,
        params_u: Vec<f64>,
        params_v: Vec<f64>,
        options: BuilderOptions,
    ) -> Result<Self> {
        if profiles.len() < 2 {
            return Err(GordonError::TooFewProfiles(profiles.len()));
        }
        if guides.len() < 2 {
            return Err(GordonError::TooFewGuides(guides.len()));
        }
        options.validate()?;
        if params_u.len() != guides.len() {
            return Err(GordonError::ParameterCountMismatch {
                what: "params_u",
                expected: guides.len(),
                got: params_u.len(),
            });
        }
        if params_v.len() != profiles.len() {
            return Err(GordonError::ParameterCountMismatch {
                what: "params_v",
                expected: profiles.len(),
                got: params_v.len(),
            });
        }
        Ok(Self {
            profiles,
            guides,
            params_u,
            params_v,
            options,
            surfaces: None,
        })
    }

    /// Build the surfaces if not done yet.
    pub fn perform(&mut self) -> Result<()> {
        self.surfaces()?;
        Ok(())
    }

    /// All four surfaces.
    pub fn surfaces(&mut self) -> Result<&GordonSurfaces> {
        if self.surfaces.is_none() {
            self.surfaces = Some(self.create_gordon_surface()?);
        }
        self.surfaces.as_ref().ok_or(GordonError::InconsistentSurfaces)
    }

    /// The Gordon surface.
    pub fn surface_gordon(&mut self) -> Result<&BSplineSurface> {
        Ok(&self.surfaces()?.gordon)
    }

    /// The skin through the profiles.
    pub fn surface_profiles(&mut self) -> Result<&BSplineSurface> {
        Ok(&self.surfaces()?.profiles)
    }

    /// The skin through the guides.
    pub fn surface_guides(&mut self) -> Result<&BSplineSurface> {
        Ok(&self.surfaces()?.guides)
    }

    /// The tensor-product surface through the intersection points.
    pub fn surface_intersections(&mut self) -> Result<&BSplineSurface> {
        Ok(&self.surfaces()?.intersections)
    }

    /// The curves the surfaces interpolate.
    pub fn curve_network(&mut self) -> Result<CurveNetwork> {
        self.perform()?;
        Ok(CurveNetwork {
            profiles: self.profiles.clone(),
            guides: self.guides.clone(),
        })
    }

    fn create_gordon_surface(&self) -> Result<GordonSurfaces> {
        check_equal_range(&self.profiles, "profile")?;
        check_equal_range(&self.guides, "guide")?;
        self.check_curve_network_compatibility()?;

        let algo = BSplineAlgorithms::new(self.options.par_tolerance);

        // Intersection points come from the profiles.
        let points: Vec<Vec<Point3>> = self
            .params_u
            .iter()
            .map(|&u| self.profiles.iter().map(|p| p.eval(u)).collect())
            .collect();

        let tp_tolerance = algo.par_tolerance() * BSplineAlgorithms::scale_point_grid(&points);
        let make_u_closed = BSplineAlgorithms::is_u_dir_closed(&points, tp_tolerance);
        let make_v_closed = BSplineAlgorithms::is_v_dir_closed(&points, tp_tolerance);

        let surf_profiles = algo.curves_to_surface(&self.profiles, &self.params_v, make_v_closed)?;
        let surf_guides = BSplineAlgorithms::flip_surface(&algo.curves_to_surface(
            &self.guides,
            &self.params_u,
            make_u_closed,
        )?);
        let tensor = algo.points_to_surface(
            &points,
            &self.params_u,
            &self.params_v,
            make_u_closed,
            make_v_closed,
        )?;

        let parts = [surf_guides, surf_profiles, tensor];
        let degree_u = parts.iter().map(|s| s.degree_u).max().unwrap_or(0);
        let degree_v = parts.iter().map(|s| s.degree_v).max().unwrap_or(0);
        let elevated = parts
            .iter()
            .map(|s| Ok(s.elevate_degree(degree_u, degree_v)?))
            .collect::<Result<Vec<_>>>()?;

        let unified =
            BSplineAlgorithms::create_common_knots_vector_surfaces(&elevated, self.options.par_tolerance)?;
        let [guides, profiles, intersections]: [BSplineSurface; 3] = unified
            .try_into()
            .map_err(|_| GordonError::InconsistentSurfaces)?;

        let same_grid = |s: &BSplineSurface| s.n_u == profiles.n_u && s.n_v == profiles.n_v;
        if !same_grid(&guides) || !same_grid(&intersections) {
            return Err(GordonError::InconsistentSurfaces);
        }

        let mut gordon = profiles.clone();
        for (k, pole) in gordon.control_points.iter_mut().enumerate() {
            *pole += guides.control_points[k] - intersections.control_points[k];
        }

        Ok(GordonSurfaces {
            gordon,
            profiles,
            guides,
            intersections,
        })
    }

    /// Check that every profile and guide meet at their matched parameters.
    ///
    /// A network whose parameters do not reach `0` and `1` is only warned about.
    fn check_curve_network_compatibility(&self) -> Result<()> {
        let splines_scale =
            0.5 * (BSplineAlgorithms::scale(&self.profiles) + BSplineAlgorithms::scale(&self.guides));
        let scale_tol = splines_scale * self.options.tolerance;

        for (dir, params) in [("u", &self.params_u), ("v", &self.params_v)] {
            let first = params.first().copied().unwrap_or(0.0);
            let last = params.last().copied().unwrap_or(1.0);
            if first.abs() > scale_tol || (last - 1.0).abs() > scale_tol {
                log::warn!(
                    "curves in {} direction stick out of the network: parameters span [{}, {}]",
                    dir,
                    first,
                    last
                );
            }
        }

        for (guide_idx, (guide, &u)) in self.guides.iter().zip(&self.params_u).enumerate() {
            for (profile_idx, (profile, &v)) in self.profiles.iter().zip(&self.params_v).enumerate()
            {
                let distance = (profile.eval(u) - guide.eval(v)).norm();
                if distance > scale_tol {
                    return Err(GordonError::IncompatibleNetwork {
                        profile: profile_idx,
                        guide: guide_idx,
                        distance,
                    });
                }
            }
        }
        Ok(())
    }
}

fn check_equal_range(curves: &[BSplineCurve], family: &'static str) -> Result<()> {
    let Some(first) = curves.first() else {
        return Ok(());
    };
    let (t0, t1) = first.parameter_domain();
    for c in curves {
        let (a, b) = c.parameter_domain();
        if (a - t0).abs() >= RANGE_TOL || (b - t1).abs() >= RANGE_TOL {
            return Err(GordonError::RangeMismatch { family });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use luthier_kernel_math::Vec3;

    /// Biquadratic surface every network in these tests lies on.
    fn s(u: f64, v: f64) -> Point3 {
        Point3::new(10.0 * u, 10.0 * v, 2.0 * u * (1.0 - u) + v * v)
    }

    /// Quadratic Bézier through a parabola given by its value and derivative at 0
    /// and its value at 1.
    fn bezier(p0: Point3, d0: Vec3, p2: Point3) -> BSplineCurve {
        BSplineCurve::new(
            vec![p0, p0 + d0 * 0.5, p2],
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            2,
        )
    }

    fn profile_at(v: f64) -> BSplineCurve {
        bezier(s(0.0, v), Vec3::new(10.0, 0.0, 2.0), s(1.0, v))
    }

    fn guide_at(u: f64) -> BSplineCurve {
        bezier(s(u, 0.0), Vec3::new(0.0, 10.0, 0.0), s(u, 1.0))
    }

    const US: [f64; 3] = [0.0, 0.3, 1.0];
    const VS: [f64; 3] = [0.0, 0.5, 1.0];

    fn builder(options: BuilderOptions) -> Result<GordonSurfaceBuilder> {
        GordonSurfaceBuilder::new(
            VS.iter().map(|&v| profile_at(v)).collect(),
            US.iter().map(|&u| guide_at(u)).collect(),
            US.to_vec(),
            VS.to_vec(),
            options,
        )
    }

    #[test]
    fn test_gordon_interpolates_network() {
        let mut b = builder(BuilderOptions::default()).unwrap();
        let gordon = b.surface_gordon().unwrap().clone();
        for &u in &US {
            for &v in &VS {
                let miss = (gordon.eval(u, v) - s(u, v)).norm();
                assert!(miss < 1e-9, "miss {miss} at ({u}, {v})");
            }
        }
        // The network lies on a biquadratic, so the whole surface is reproduced.
        for (u, v) in [(0.1, 0.2), (0.55, 0.75), (0.9, 0.35)] {
            assert!((gordon.eval(u, v) - s(u, v)).norm() < 1e-9);
        }
    }

    #[test]
    fn test_component_surfaces_share_grids() {
        let mut b = builder(BuilderOptions::default()).unwrap();
        let surfaces = b.surfaces().unwrap().clone();
        for part in [&surfaces.profiles, &surfaces.guides, &surfaces.intersections] {
            assert_eq!(part.knots_u, surfaces.gordon.knots_u);
            assert_eq!(part.knots_v, surfaces.gordon.knots_v);
            assert_eq!(part.n_u, surfaces.gordon.n_u);
            assert_eq!(part.n_v, surfaces.gordon.n_v);
        }
        // Each skin passes through its own curves.
        for &v in &VS {
            for u in [0.0, 0.4, 1.0] {
                assert!((surfaces.profiles.eval(u, v) - profile_at(v).eval(u)).norm() < 1e-9);
            }
        }
    }

    #[test]
    fn test_results_are_memoized() {
        let mut b = builder(BuilderOptions::default()).unwrap();
        let first = b.surface_gordon().unwrap().clone();
        let second = b.surface_gordon().unwrap().clone();
        assert_eq!(first, second);
        let network = b.curve_network().unwrap();
        assert_eq!(network.profiles.len(), 3);
        assert_eq!(network.guides.len(), 3);
    }

    #[test]
    fn test_constructor_checks() {
        let profiles: Vec<_> = VS.iter().map(|&v| profile_at(v)).collect();
        let guides: Vec<_> = US.iter().map(|&u| guide_at(u)).collect();
        assert!(matches!(
            GordonSurfaceBuilder::new(
                profiles[..1].to_vec(),
                guides.clone(),
                US.to_vec(),
                vec![0.0],
                BuilderOptions::default()
            ),
            Err(GordonError::TooFewProfiles(1))
        ));
        let bad = BuilderOptions {
            tolerance: -1.0,
            ..Default::default()
        };
        assert!(matches!(builder(bad), Err(GordonError::InvalidTolerance { .. })));
        assert!(matches!(
            GordonSurfaceBuilder::new(
                profiles,
                guides,
                vec![0.0, 1.0],
                VS.to_vec(),
                BuilderOptions::default()
            ),
            Err(GordonError::ParameterCountMismatch { what: "params_u", .. })
        ));
    }

    #[test]
    fn test_incompatible_network() {
        let mut b = GordonSurfaceBuilder::new(
            VS.iter().map(|&v| profile_at(v)).collect(),
            US.iter().map(|&u| guide_at(u)).collect(),
            vec![0.0, 0.5, 1.0],
            VS.to_vec(),
            BuilderOptions::default(),
        )
        .unwrap();
        assert!(matches!(
            b.perform(),
            Err(GordonError::IncompatibleNetwork { profile: 0, guide: 1, .. })
        ));
    }

    #[test]
    fn test_range_mismatch() {
        let mut guides: Vec<_> = US.iter().map(|&u| guide_at(u)).collect();
        guides[2] = guides[2].reparametrized(0.0, 2.0);
        let mut b = GordonSurfaceBuilder::new(
            VS.iter().map(|&v| profile_at(v)).collect(),
            guides,
            US.to_vec(),
            VS.to_vec(),
            BuilderOptions::default(),
        )
        .unwrap();
        assert!(matches!(
            b.perform(),
            Err(GordonError::RangeMismatch { family: "guide" })
        ));
    }
}
