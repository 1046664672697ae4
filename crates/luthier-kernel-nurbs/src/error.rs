use thiserror::Error;

/// Errors from B-spline construction and modification.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NurbsError {
    /// Knot vector length or ordering does not match the control points.
    #[error("invalid knot vector: len={actual} but expected {expected}")]
    InvalidKnotVector {
        /// Required knot count (`n + degree + 1`).
        expected: usize,
        /// Knot count supplied.
        actual: usize,
    },

    /// A knot vector was rescaled to a non-positive length.
    #[error("knot vector length must be positive, got {0}")]
    InvalidScale(f64),

    /// A knot vector spans an empty parameter range.
    #[error("knot vector spans an empty parameter range")]
    DegenerateKnotVector,

    /// Not enough points for the requested construction.
    #[error("too few points: need at least {needed}, got {got}")]
    TooFewPoints {
        /// Minimum point count.
        needed: usize,
        /// Point count supplied.
        got: usize,
    },

    /// The number of parameters does not match the number of points.
    #[error("expected {expected} parameters, got {got}")]
    ParameterCountMismatch {
        /// Required parameter count.
        expected: usize,
        /// Parameter count supplied.
        got: usize,
    },

    /// Interpolation parameters must be strictly increasing.
    #[error("interpolation parameters are not strictly increasing")]
    NonIncreasingParameters,

    /// A knot lies outside the curve's parameter domain.
    #[error("knot {0} lies outside the parameter domain")]
    KnotOutOfRange(f64),

    /// A unique-knot index past the end of the knot list.
    #[error("knot index {index} out of range ({count} unique knots)")]
    KnotIndexOutOfRange {
        /// Index requested.
        index: usize,
        /// Number of unique knots.
        count: usize,
    },

    /// Degree elevation was asked to lower the degree.
    #[error("cannot lower degree from {from} to {to}")]
    DegreeDecrease {
        /// Current degree.
        from: usize,
        /// Requested degree.
        to: usize,
    },

    /// The collocation system of an interpolation was singular.
    #[error("interpolation system is singular")]
    SingularSystem,
}

/// Result type for B-spline operations.
pub type Result<T> = std::result::Result<T, NurbsError>;
