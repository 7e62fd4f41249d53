//! Adapter between transfer strategies and the external trajectory solver.

use crate::request::{
    BasicInfo, ConstraintTerm, CostTerm, InitInfo, OptimizationRequest, RelPtsLambdasParams,
    RelPtsParams,
};
use crate::{ContactTrajectory, Kinematics, Manipulator, TransferError, TransferParams, TransferResult};
use nalgebra::{DMatrix, Vector3};
use std::f64::consts::PI;
use std::sync::Arc;
use tracing::{debug, warn};

/// Whether the solver met its tolerances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Tolerances met.
    Converged,
    /// Iteration or time budget exhausted; the trajectory is the best found.
    NotConverged,
}

/// What the solver returns for one request.
#[derive(Debug, Clone)]
pub struct SolverOutput {
    /// Joint trajectory, one row per timestep.
    pub trajectory: DMatrix<f64>,
    /// Final objective value.
    pub objective: f64,
    /// Convergence status.
    pub status: SolveStatus,
}

/// The external convex trajectory solver.
///
/// Calls block until the solver returns. Hard failures are errors;
/// running out of iterations is reported through [`SolveStatus`].
pub trait TrajectorySolver: Send + Sync {
    /// Solves one request.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Solver`] if no trajectory could be produced.
    fn solve(&self, request: &OptimizationRequest) -> TransferResult<SolverOutput>;
}

/// Builds optimization requests and checks solver output.
#[derive(Clone)]
pub struct TrajectoryOptimizer {
    kinematics: Arc<dyn Kinematics>,
    solver: Arc<dyn TrajectorySolver>,
    params: TransferParams,
}

impl std::fmt::Debug for TrajectoryOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrajectoryOptimizer")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl TrajectoryOptimizer {
    /// Creates an optimizer.
    ///
    /// # Errors
    ///
    /// Returns an error if `params` is invalid.
    pub fn new(
        kinematics: Arc<dyn Kinematics>,
        solver: Arc<dyn TrajectorySolver>,
        params: TransferParams,
    ) -> TransferResult<Self> {
        params.validate()?;
        Ok(Self {
            kinematics,
            solver,
            params,
        })
    }

    /// The transfer parameters in use.
    #[must_use]
    pub const fn params(&self) -> &TransferParams {
        &self.params
    }

    /// The kinematics collaborator.
    #[must_use]
    pub fn kinematics(&self) -> &dyn Kinematics {
        self.kinematics.as_ref()
    }

    /// Request with smoothness, collision and limit terms but no contact terms.
    ///
    /// With `start_fixed`, the first row of the guess is replaced by the
    /// current configuration, wrapping joints are unwrapped and the whole
    /// guess is shifted so it starts exactly at the current configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::DofMismatch`] if `init` does not have one
    /// column per manipulator DOF or the current configuration is missing a
    /// manipulator DOF, or an error for an empty guess.
    #[allow(clippy::cast_precision_loss)]
    pub fn base_request(
        &self,
        manip: &Manipulator,
        init: &DMatrix<f64>,
    ) -> TransferResult<OptimizationRequest> {
        let dof_indices = self.kinematics.dof_indices(manip);
        self.check_shape(manip, &dof_indices, init)?;
        let n_steps = init.nrows();
        if n_steps == 0 {
            return Err(TransferError::Trajectory(lfd_types::TrajectoryError::Empty));
        }

        let mut init = init.clone();
        if self.params.start_fixed {
            self.pin_start(manip, &dof_indices, &mut init)?;
        }

        let mut costs = vec![CostTerm::JointVel {
            coeffs: vec![self.params.gamma / (n_steps.max(2) - 1) as f64],
        }];
        if self.params.use_collision_cost {
            costs.push(CostTerm::Collision {
                continuous: true,
                coeffs: vec![self.params.collision.coeff],
                dist_pen: vec![self.params.collision.dist_pen],
            });
        }

        let mut constraints = Vec::new();
        if let Some(limits) = &self.params.joint_vel_limits {
            if limits.len() != dof_indices.len() {
                return Err(TransferError::InvalidParameter(format!(
                    "{} joint velocity limits for {} DOFs",
                    limits.len(),
                    dof_indices.len()
                )));
            }
            constraints.push(ConstraintTerm::JointVelLimits {
                vals: limits.clone(),
                first_step: 0,
                last_step: n_steps - 1,
            });
        }

        Ok(OptimizationRequest {
            basic_info: BasicInfo {
                n_steps,
                manip: manip.name(),
                start_fixed: self.params.start_fixed,
            },
            costs,
            constraints,
            init_info: InitInfo::given(&init),
        })
    }

    /// Contact-following cost terms, one per arm, finger and timestep.
    ///
    /// Without `lambdas`, plain [`CostTerm::RelPts`] terms weighted by
    /// `sqrt(beta_pos / n_steps)` are produced. With `lambdas` (flattened in
    /// contact order) the terms are [`CostTerm::RelPtsLambdas`] weighted by
    /// `beta_pos / n_steps`. The first timestep is skipped when the start
    /// is fixed.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::StepCountMismatch`] if `lambdas` does not
    /// have one entry per contact point.
    #[allow(clippy::cast_precision_loss)]
    pub fn contact_terms(
        &self,
        targets: &ContactTrajectory,
        lambdas: Option<&[Vector3<f64>]>,
    ) -> TransferResult<Vec<CostTerm>> {
        if let Some(l) = lambdas {
            if l.len() != targets.point_count() {
                return Err(TransferError::StepCountMismatch {
                    expected: targets.point_count(),
                    found: l.len(),
                });
            }
        }
        let n_steps = targets.n_steps();
        let weight = self.params.beta_pos / n_steps.max(1) as f64;
        let first = usize::from(self.params.start_fixed);

        let mut terms = Vec::with_capacity(targets.fingers().len() * n_steps);
        for (f, finger) in targets.fingers().iter().enumerate() {
            let link = self.kinematics.finger_link_name(finger.arm(), finger.finger());
            let rel_xyzs: Vec<[f64; 3]> = self
                .kinematics
                .relative_finger_points(finger.finger())
                .iter()
                .map(|v| [v.x, v.y, v.z])
                .collect();
            for (timestep, corners) in finger.points().iter().enumerate().skip(first) {
                let xyzs = corners.iter().map(|p| [p.x, p.y, p.z]).collect();
                let term = match lambdas {
                    None => CostTerm::RelPts(RelPtsParams {
                        xyzs,
                        rel_xyzs: rel_xyzs.clone(),
                        link: link.clone(),
                        timestep,
                        pos_coeffs: [weight.sqrt(); 3],
                    }),
                    Some(l) => {
                        let start = (f * n_steps + timestep) * 4;
                        CostTerm::RelPtsLambdas(RelPtsLambdasParams {
                            xyzs,
                            rel_xyzs: rel_xyzs.clone(),
                            link: link.clone(),
                            timestep,
                            lambdas: l[start..start + 4].iter().map(|v| [v.x, v.y, v.z]).collect(),
                            pos_coeffs: [weight; 3],
                        })
                    }
                };
                terms.push(term);
            }
        }
        Ok(terms)
    }

    /// Runs the solver and validates its output.
    ///
    /// # Errors
    ///
    /// Propagates solver failures, rejects trajectories whose shape differs
    /// from the request and reports non-finite output as
    /// [`TransferError::NumericalInstability`].
    pub fn run(&self, request: &OptimizationRequest, manip: &Manipulator) -> TransferResult<SolverOutput> {
        debug!(
            manip = %request.basic_info.manip,
            n_steps = request.basic_info.n_steps,
            costs = request.costs.len(),
            "solving trajectory"
        );
        let output = self.solver.solve(request)?;
        let dof_indices = self.kinematics.dof_indices(manip);
        self.check_shape(manip, &dof_indices, &output.trajectory)?;
        if output.trajectory.nrows() != request.basic_info.n_steps {
            return Err(TransferError::StepCountMismatch {
                expected: request.basic_info.n_steps,
                found: output.trajectory.nrows(),
            });
        }
        if output.trajectory.iter().any(|v| !v.is_finite()) {
            return Err(TransferError::NumericalInstability {
                stage: "trajectory solve",
            });
        }
        if output.status == SolveStatus::NotConverged {
            warn!(
                manip = %request.basic_info.manip,
                objective = output.objective,
                "trajectory solver did not converge"
            );
        }
        Ok(output)
    }

    fn check_shape(
        &self,
        manip: &Manipulator,
        dof_indices: &[usize],
        traj: &DMatrix<f64>,
    ) -> TransferResult<()> {
        let expected = manip.dof_count(self.kinematics.arm_dof_count());
        if dof_indices.len() != expected || traj.ncols() != expected {
            return Err(TransferError::DofMismatch {
                manip: manip.name(),
                expected,
                found: if dof_indices.len() == expected {
                    traj.ncols()
                } else {
                    dof_indices.len()
                },
            });
        }
        Ok(())
    }

    fn pin_start(
        &self,
        manip: &Manipulator,
        dof_indices: &[usize],
        init: &mut DMatrix<f64>,
    ) -> TransferResult<()> {
        let current = self.kinematics.current_dof_values();
        for (col, &dof) in dof_indices.iter().enumerate() {
            let value = *current.get(dof).ok_or_else(|| TransferError::DofMismatch {
                manip: manip.name(),
                expected: dof + 1,
                found: current.len(),
            })?;
            init[(0, col)] = value;
            if self.kinematics.is_wrapping_dof(dof) {
                unwrap_column(init, col);
            }
            let shift = value - init[(0, col)];
            init.column_mut(col).add_scalar_mut(shift);
        }
        Ok(())
    }
}

/// Removes 2π jumps between consecutive rows of one column.
pub fn unwrap_column(traj: &mut DMatrix<f64>, col: usize) {
    let mut offset = 0.0;
    for t in 1..traj.nrows() {
        let raw_prev = traj[(t - 1, col)] - offset;
        let raw = traj[(t, col)];
        let delta = raw - raw_prev;
        let wrapped = (delta + PI).rem_euclid(2.0 * PI) - PI;
        offset += wrapped - delta;
        traj[(t, col)] = raw + offset;
    }
}
