//! Tolerances and limits for Gordon surface construction.

use serde::{Deserialize, Serialize};

use crate::{GordonError, Result};

/// Tolerances for [`GordonSurfaceBuilder`](crate::GordonSurfaceBuilder).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderOptions {
    /// Relative 3D tolerance for curve-network compatibility, scaled by the
    /// network size.
    pub tolerance: f64,
    /// Parametric tolerance for knot comparisons and closedness detection.
    pub par_tolerance: f64,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-7,
            par_tolerance: 1e-12,
        }
    }
}

impl BuilderOptions {
    /// Validate tolerances.
    pub fn validate(&self) -> Result<()> {
        check_positive("tolerance", self.tolerance)?;
        check_positive("par_tolerance", self.par_tolerance)
    }
}

/// Options for [`InterpolateCurveNetwork`](crate::InterpolateCurveNetwork).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkOptions {
    /// Relative 3D tolerance for intersections and compatibility checks.
    pub tolerance: f64,
    /// Parametric tolerance.
    pub par_tolerance: f64,
    /// Ceiling on control points of a re-parametrized curve.
    pub max_control_points: usize,
    /// Floor on control points of a re-parametrized curve.
    pub min_control_points: usize,
    /// Parameter-optimization passes per curve fit.
    pub fit_iterations: usize,
    /// Tangent deviation (degrees) above which a C0 knot is kept as a kink.
    pub kink_angle_degrees: f64,
    /// Re-parametrize curves on the rayon thread pool.
    pub parallel: bool,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-5,
            par_tolerance: 1e-10,
            max_control_points: 80,
            min_control_points: 10,
            fit_iterations: 10,
            kink_angle_degrees: 6.0,
            parallel: false,
        }
    }
}

impl NetworkOptions {
    /// Validate the options.
    pub fn validate(&self) -> Result<()> {
        check_positive("tolerance", self.tolerance)?;
        check_positive("par_tolerance", self.par_tolerance)?;
        if self.min_control_points < 4 {
            return Err(GordonError::InvalidOptions(
                "min_control_points must be at least 4".into(),
            ));
        }
        if self.max_control_points < self.min_control_points {
            return Err(GordonError::InvalidOptions(
                "max_control_points must not be below min_control_points".into(),
            ));
        }
        if !(self.kink_angle_degrees > 0.0 && self.kink_angle_degrees < 180.0) {
            return Err(GordonError::InvalidOptions(
                "kink_angle_degrees must be between 0 and 180".into(),
            ));
        }
        Ok(())
    }

    /// Builder tolerances derived from these options.
    pub fn builder_options(&self) -> BuilderOptions {
        BuilderOptions {
            tolerance: self.tolerance,
            par_tolerance: self.par_tolerance,
        }
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(GordonError::InvalidTolerance { name, value })
    }
}
