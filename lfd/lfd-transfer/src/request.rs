//! Declarative trajectory optimization requests.
//!
//! The layout mirrors the JSON problem description consumed by the external
//! trajectory optimizer: every cost and constraint is `{"type": ..., "params":
//! ...}` and the initial guess is `{"type": "given_traj", "data": ...}`.

use nalgebra::DMatrix;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Problem dimensions and the driven DOF group.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BasicInfo {
    /// Number of timesteps.
    pub n_steps: usize,
    /// Manipulator name.
    pub manip: String,
    /// Whether the first timestep is held fixed.
    pub start_fixed: bool,
}

/// Pull a link's corner offsets towards target positions at one timestep.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RelPtsParams {
    /// Target world positions, one per corner.
    pub xyzs: Vec<[f64; 3]>,
    /// Corner offsets in the link frame.
    pub rel_xyzs: Vec<[f64; 3]>,
    /// Link name.
    pub link: String,
    /// Timestep index.
    pub timestep: usize,
    /// Per-dimension position weight.
    pub pos_coeffs: [f64; 3],
}

/// [`RelPtsParams`] plus a linear term per corner from the dual variables.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RelPtsLambdasParams {
    /// Target world positions, one per corner.
    pub xyzs: Vec<[f64; 3]>,
    /// Corner offsets in the link frame.
    pub rel_xyzs: Vec<[f64; 3]>,
    /// Link name.
    pub link: String,
    /// Timestep index.
    pub timestep: usize,
    /// Linear cost coefficients, one per corner.
    pub lambdas: Vec<[f64; 3]>,
    /// Per-dimension position weight.
    pub pos_coeffs: [f64; 3],
}

/// A cost term of the optimization problem.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "type", content = "params", rename_all = "snake_case")
)]
pub enum CostTerm {
    /// Quadratic penalty on consecutive joint differences.
    JointVel {
        /// One coefficient, or one per DOF.
        coeffs: Vec<f64>,
    },
    /// Signed-distance collision penalty.
    Collision {
        /// Whether collisions are checked between timesteps.
        continuous: bool,
        /// Penalty coefficients.
        coeffs: Vec<f64>,
        /// Safety distances.
        dist_pen: Vec<f64>,
    },
    /// Follow target points.
    RelPts(RelPtsParams),
    /// Follow target points with dual linear terms.
    RelPtsLambdas(RelPtsLambdasParams),
}

/// A hard constraint of the optimization problem.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "type", content = "params", rename_all = "snake_case")
)]
pub enum ConstraintTerm {
    /// Bound on per-step joint change.
    JointVelLimits {
        /// Limit per DOF.
        vals: Vec<f64>,
        /// First constrained step.
        first_step: usize,
        /// Last constrained step.
        last_step: usize,
    },
}

/// Initial trajectory guess.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "type", content = "data", rename_all = "snake_case")
)]
pub enum InitInfo {
    /// Explicit trajectory, one row per timestep.
    GivenTraj(Vec<Vec<f64>>),
    /// Hold the current configuration.
    Stationary,
}

impl InitInfo {
    /// Wraps a joint trajectory matrix.
    #[must_use]
    pub fn given(traj: &DMatrix<f64>) -> Self {
        Self::GivenTraj(
            traj.row_iter()
                .map(|row| row.iter().copied().collect())
                .collect(),
        )
    }
}

/// A complete trajectory optimization problem.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OptimizationRequest {
    /// Dimensions and DOF group.
    pub basic_info: BasicInfo,
    /// Cost terms.
    pub costs: Vec<CostTerm>,
    /// Constraint terms.
    pub constraints: Vec<ConstraintTerm>,
    /// Initial guess.
    pub init_info: InitInfo,
}

impl OptimizationRequest {
    /// The initial guess as a matrix, if one was given.
    ///
    /// Returns `None` for a stationary guess or ragged rows.
    #[must_use]
    pub fn init_trajectory(&self) -> Option<DMatrix<f64>> {
        let InitInfo::GivenTraj(rows) = &self.init_info else {
            return None;
        };
        let ncols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != ncols) {
            return None;
        }
        Some(DMatrix::from_fn(rows.len(), ncols, |i, j| rows[i][j]))
    }

    /// Number of contact-following terms.
    #[must_use]
    pub fn contact_term_count(&self) -> usize {
        self.costs
            .iter()
            .filter(|c| matches!(c, CostTerm::RelPts(_) | CostTerm::RelPtsLambdas(_)))
            .count()
    }
}
