#![warn(missing_docs)]

//! B-spline curves and surfaces for the luthier surface kernel.
//!
//! Provides non-rational B-spline curves and tensor-product surfaces,
//! evaluated via De Boor's algorithm, together with the knot-level
//! operations that curve-network fitting needs. [`BSplineCurve`] implements
//! the `Curve3d` trait from `luthier-kernel-geom`.
//!
//! # Key types
//!
//! - [`KnotVector`] — sorted knot multiset with unique knots and multiplicities
//! - [`BSplineBasis`] — basis functions and their derivatives
//! - [`BSplineCurve`] — non-rational B-spline curve in 3D
//! - [`BSplineSurface`] — non-rational tensor-product B-spline surface
//!
//! # Algorithms
//!
//! - **De Boor's algorithm** for stable B-spline evaluation
//! - **Boehm's algorithm** for knot insertion (refinement)
//! - **NURBS-book A2.3** for basis derivatives
//! - **Global interpolation** through points at given parameters, open or closed

mod curve;
mod error;
mod interpolate;
mod knots;
mod surface;

pub use curve::BSplineCurve;
pub use error::{NurbsError, Result};
pub use interpolate::interpolate;
pub use knots::{BSplineBasis, KnotVector};
pub use surface::{BSplineSurface, SurfaceDirection};
