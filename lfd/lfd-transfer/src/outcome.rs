//! Transfer results and diagnostics.

use crate::{Manipulator, SolveStatus};
use lfd_types::AugmentedTrajectory;
use nalgebra::DMatrix;

/// Why a transfer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Non-iterative strategy finished its single solve.
    SinglePass,
    /// Discrepancy fell below the threshold.
    Converged,
    /// The iteration cap was hit.
    MaxIterationsReached,
    /// The solver failed to converge under the abort policy.
    SolverAborted,
}

/// Convergence record of one transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferDiagnostics {
    /// Why the transfer stopped.
    pub termination: Termination,
    /// Loop iterations started (1 for single-pass strategies).
    pub iterations: usize,
    /// Trajectory-vs-warp discrepancy after each completed iteration.
    pub discrepancies: Vec<f64>,
    /// Warp objective after each completed iteration.
    pub warp_objectives: Vec<f64>,
    /// Solver objective of the returned trajectory.
    pub solver_objective: f64,
    /// Status of the last solve.
    pub final_solve: SolveStatus,
    /// Number of solves that did not converge.
    pub unconverged_solves: usize,
}

impl TransferDiagnostics {
    pub(crate) const fn single_pass(solver_objective: f64, status: SolveStatus) -> Self {
        Self {
            termination: Termination::SinglePass,
            iterations: 1,
            discrepancies: Vec::new(),
            warp_objectives: Vec::new(),
            solver_objective,
            final_solve: status,
            unconverged_solves: match status {
                SolveStatus::Converged => 0,
                SolveStatus::NotConverged => 1,
            },
        }
    }

    /// Whether the transfer and its last solve both converged.
    #[must_use]
    pub fn converged(&self) -> bool {
        matches!(
            self.termination,
            Termination::SinglePass | Termination::Converged
        ) && self.final_solve == SolveStatus::Converged
    }

    /// Discrepancy after the last completed iteration.
    #[must_use]
    pub fn final_discrepancy(&self) -> Option<f64> {
        self.discrepancies.last().copied()
    }
}

/// A transferred trajectory and how it was obtained.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    /// Trajectory rebuilt by forward kinematics, with the demonstration's
    /// gripper events.
    pub trajectory: AugmentedTrajectory,
    /// Raw joint trajectory, one column per manipulator DOF.
    pub joint_trajectory: DMatrix<f64>,
    /// The driven arms.
    pub manipulator: Manipulator,
    /// Convergence record.
    pub diagnostics: TransferDiagnostics,
}
