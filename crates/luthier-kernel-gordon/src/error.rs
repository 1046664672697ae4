//! Error types for curve-network interpolation.

use luthier_kernel_nurbs::NurbsError;
use thiserror::Error;

/// Errors that can occur while building a Gordon surface.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GordonError {
    /// Fewer than two profile curves.
    #[error("not enough profiles: need at least 2, got {0}")]
    TooFewProfiles(usize),

    /// Fewer than two guide curves.
    #[error("not enough guides: need at least 2, got {0}")]
    TooFewGuides(usize),

    /// A tolerance was zero, negative or not finite.
    #[error("{name} must be positive, got {value}")]
    InvalidTolerance {
        /// Which tolerance.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// Invalid option values.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// Parameter list length disagrees with the curve count.
    #[error("{what}: expected {expected} parameters, got {got}")]
    ParameterCountMismatch {
        /// Which parameter list.
        what: &'static str,
        /// Required length.
        expected: usize,
        /// Supplied length.
        got: usize,
    },

    /// An intersection-parameter matrix has the wrong shape.
    #[error("intersection parameter matrix must be {rows}x{cols}")]
    MatrixShape {
        /// Required row count (profiles).
        rows: usize,
        /// Required column count (guides).
        cols: usize,
    },

    /// Curves of one family do not share a parameter range.
    #[error("{family} curves must share one parameter range")]
    RangeMismatch {
        /// `"profile"` or `"guide"`.
        family: &'static str,
    },

    /// Curves of one family do not share a degree.
    #[error("{family} curves must share one degree")]
    DegreeMismatch {
        /// `"profile"`, `"guide"` or `"surface"`.
        family: &'static str,
    },

    /// A profile and a guide do not intersect.
    #[error("profile {profile} and guide {guide} do not intersect")]
    NoIntersection {
        /// Profile index.
        profile: usize,
        /// Guide index.
        guide: usize,
    },

    /// A profile and a guide intersect ambiguously.
    #[error("profile {profile} and guide {guide} intersect {count} times")]
    TooManyIntersections {
        /// Profile index.
        profile: usize,
        /// Guide index.
        guide: usize,
        /// Number of intersections found.
        count: usize,
    },

    /// No profile/guide pair starts the network.
    #[error("cannot find starting curves of curve network")]
    NoStartCurves,

    /// Some curve never reaches the network's start.
    #[error("at least one curve has no intersection at the beginning of the network")]
    MissingStartIntersection,

    /// A profile and a guide do not meet at their matched parameters.
    #[error(
        "profile {profile} and guide {guide} are {distance} apart at their intersection parameters"
    )]
    IncompatibleNetwork {
        /// Profile index.
        profile: usize,
        /// Guide index.
        guide: usize,
        /// 3D distance between the two curve points.
        distance: f64,
    },

    /// Too few control points for the requested constraints.
    #[error("too few control points: {available} available, {required} required")]
    TooFewControlPoints {
        /// Control points requested.
        available: usize,
        /// Control points the constraints need.
        required: usize,
    },

    /// The constrained least-squares system is singular.
    #[error("singular least-squares system while fitting a curve")]
    SingularSystem,

    /// The three Gordon component surfaces disagree after unification.
    #[error("gordon component surfaces have inconsistent pole grids")]
    InconsistentSurfaces,

    /// An underlying B-spline operation failed.
    #[error(transparent)]
    Nurbs(#[from] NurbsError),
}

/// Result type for curve-network operations.
pub type Result<T> = std::result::Result<T, GordonError>;
