//! Soft constraints on warped points driven by dual variables.

use crate::{WarpError, WarpResult};
use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Linear penalties `Σ_b λ_b · f(τ_b)` added to the warp objective.
///
/// The points `τ_b` are evaluated on the warp's existing kernel centres, so
/// they only change the right-hand side of the normal equations.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DualConstraints {
    points: Vec<Point3<f64>>,
    lambdas: Vec<Vector3<f64>>,
}

impl DualConstraints {
    /// Pairs constrained points with their multipliers.
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::LengthMismatch`] if the lengths differ, or
    /// [`WarpError::NonFinite`] if a multiplier is not finite.
    pub fn new(points: Vec<Point3<f64>>, lambdas: Vec<Vector3<f64>>) -> WarpResult<Self> {
        if points.len() != lambdas.len() {
            return Err(WarpError::LengthMismatch {
                what: "dual multipliers",
                expected: points.len(),
                found: lambdas.len(),
            });
        }
        if lambdas.iter().any(|l| l.iter().any(|v| !v.is_finite())) {
            return Err(WarpError::NonFinite("dual multipliers"));
        }
        Ok(Self { points, lambdas })
    }

    /// Constrained points.
    #[must_use]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Multipliers, one per point.
    #[must_use]
    pub fn lambdas(&self) -> &[Vector3<f64>] {
        &self.lambdas
    }

    /// Number of constrained points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether there are no constraints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
