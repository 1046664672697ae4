#![warn(missing_docs)]

//! Gordon surface interpolation of B-spline curve networks.
//!
//! A curve network is two families of curves, profiles and guides, where
//! every profile crosses every guide once. The Gordon surface through the
//! network is the sum of the skin through the profiles and the skin
//! through the guides, minus the tensor-product surface through their
//! intersection points.
//!
//! # Key types
//!
//! - [`InterpolateCurveNetwork`] — end-to-end entry point for raw networks
//! - [`GordonSurfaceBuilder`] — Gordon formula for already compatible networks
//! - [`CurveNetworkSorter`] — orders and orients profiles and guides
//! - [`BSplineApproxInterp`] — constrained least-squares curve fitting
//! - [`BSplineAlgorithms`] — knot unification, skinning, re-parametrization
//!
//! # Example
//!
//! ```
//! use luthier_kernel_gordon::{InterpolateCurveNetwork, NetworkOptions};
//! use luthier_kernel_math::Point3;
//! use luthier_kernel_nurbs::BSplineCurve;
//!
//! let line = |a: Point3, b: Point3| BSplineCurve::new(vec![a, b], vec![0.0, 0.0, 1.0, 1.0], 1);
//! let p = |x: f64, y: f64| Point3::new(x, y, 0.0);
//! let profiles = [line(p(0.0, 0.0), p(10.0, 0.0)), line(p(0.0, 10.0), p(10.0, 10.0))];
//! let guides = [line(p(0.0, 0.0), p(0.0, 10.0)), line(p(10.0, 0.0), p(10.0, 10.0))];
//!
//! let mut net = InterpolateCurveNetwork::new(&profiles, &guides, NetworkOptions::default())?;
//! let mid = net.surface()?.eval(0.5, 0.5);
//! assert!((mid - p(5.0, 5.0)).norm() < 1e-6);
//! # Ok::<(), luthier_kernel_gordon::GordonError>(())
//! ```

mod algorithms;
mod approx;
mod builder;
mod error;
mod network;
mod options;
mod sorter;

pub use algorithms::{find_inside_tolerance, linspace_with_breaks, BSplineAlgorithms};
pub use approx::{BSplineApproxInterp, ContinuityMode, CurveFit};
pub use builder::{CurveNetwork, GordonSurfaceBuilder, GordonSurfaces};
pub use error::{GordonError, Result};
pub use network::{compute_intersections, InterpolateCurveNetwork, NoProgress, Progress};
pub use options::{BuilderOptions, NetworkOptions};
pub use sorter::{CurveNetworkSorter, SortedNetwork};
