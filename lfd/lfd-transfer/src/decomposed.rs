//! Dual decomposition of joint registration and trajectory optimization.
//!
//! The warp and the trajectory are solved alternately and coupled through
//! one dual variable per demonstration contact point:
//!
//! 1. solve the trajectory against the warped contacts, with linear terms
//!    `−λ` on each contact;
//! 2. refit the warp with dual penalties `+λ` on the demonstration contacts;
//! 3. measure the discrepancy between achieved and warped contacts;
//! 4. take a dual ascent step `λ ← λ − step · (achieved − warped)`.
//!
//! The loop stops when the summed absolute discrepancy drops below
//! `threshold_per_entry · len(λ) · 3`, or after `max_iterations`.

use crate::prepare::{active_manipulator, initial_guess, resample_demo, to_augmented};
use crate::unified::require_contact_backend;
use crate::{
    ContactBackend, DecompositionParams, IterationReport, Registration, RegistrationFactory,
    SolveStatus, SolverFailurePolicy, Termination, TrajectoryOptimizer, TrajectoryTransferer,
    TransferDiagnostics, TransferError, TransferObserver, TransferOutcome, TransferParams,
    TransferResult, achieved_contacts, demo_contacts,
};
use lfd_types::{Demonstration, SceneState};
use lfd_warp::{DualConstraints, ThinPlateSpline};
use nalgebra::{Point3, Vector3};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The alternating registration-trajectory coordinator.
///
/// Each call owns its warp; the coordinator itself holds no per-transfer
/// state and can be shared between threads.
#[derive(Clone)]
pub struct DecomposedTransferer {
    factory: Arc<dyn RegistrationFactory>,
    backend: ContactBackend,
    optimizer: TrajectoryOptimizer,
    decomposition: DecompositionParams,
    warm_start: Option<Arc<dyn TrajectoryTransferer>>,
}

impl std::fmt::Debug for DecomposedTransferer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecomposedTransferer")
            .field("optimizer", &self.optimizer)
            .field("decomposition", &self.decomposition)
            .field("warm_start", &self.warm_start.is_some())
            .finish_non_exhaustive()
    }
}

impl DecomposedTransferer {
    /// Creates the coordinator from a spline factory and a contact-capable
    /// transferer, whose kinematics and solver are reused.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::IncompatibleConfiguration`] if the factory
    /// does not produce spline registrations or the transferer has no
    /// contact backend, and a parameter error if either parameter set is
    /// invalid.
    pub fn new(
        factory: Arc<dyn RegistrationFactory>,
        transferer: &dyn TrajectoryTransferer,
        params: TransferParams,
        decomposition: DecompositionParams,
    ) -> TransferResult<Self> {
        let backend = require_contact_backend(factory.as_ref(), transferer, "decomposed")?;
        decomposition.validate()?;
        let optimizer = TrajectoryOptimizer::new(
            Arc::clone(&backend.kinematics),
            Arc::clone(&backend.solver),
            params,
        )?;
        Ok(Self {
            factory,
            backend,
            optimizer,
            decomposition,
            warm_start: None,
        })
    }

    /// Uses `transferer`'s output as the initial trajectory guess.
    #[must_use]
    pub fn with_warm_start(mut self, transferer: Arc<dyn TrajectoryTransferer>) -> Self {
        self.warm_start = Some(transferer);
        self
    }

    /// Loop parameters.
    #[must_use]
    pub const fn decomposition(&self) -> &DecompositionParams {
        &self.decomposition
    }

    /// Registers and runs the loop, reporting checkpoints to `observer`.
    ///
    /// # Errors
    ///
    /// Propagates registration and loop errors.
    pub fn transfer_observed(
        &self,
        demo: &Demonstration,
        scene: &SceneState,
        observer: &mut dyn TransferObserver,
    ) -> TransferResult<TransferOutcome> {
        let registration = self.factory.register(demo, scene)?;
        observer.on_registration(&registration);
        let outcome = self.run(&registration, demo, observer)?;
        observer.on_finished(&outcome);
        Ok(outcome)
    }

    /// Runs the loop on an existing registration.
    ///
    /// Hitting the iteration cap is not an error; check
    /// [`TransferDiagnostics::converged`].
    ///
    /// # Errors
    ///
    /// Returns an error on invalid demonstrations, solver failures and
    /// [`TransferError::NumericalInstability`] when the discrepancy stops
    /// being finite.
    #[allow(clippy::too_many_lines)]
    pub fn run(
        &self,
        registration: &Registration,
        demo: &Demonstration,
        observer: &mut dyn TransferObserver,
    ) -> TransferResult<TransferOutcome> {
        let kinematics = self.backend.kinematics.as_ref();
        let params = self.optimizer.params();
        let manip = active_manipulator(demo, params)?;
        let resampled = resample_demo(demo, &manip, params)?;

        let tau = demo_contacts(kinematics, &resampled, &manip)?;
        let tau_flat = tau.flatten();
        let mut lambdas = vec![self.decomposition.initial_dual; tau_flat.len()];
        let mut warp = ThinPlateSpline::fit(
            &registration.source,
            &registration.target,
            &registration.params,
            Some(&DualConstraints::new(tau_flat.clone(), lambdas.clone())?),
        )?;

        let mut trajectory = initial_guess(
            kinematics,
            &manip,
            &resampled,
            params,
            self.warm_start.as_ref().map(|w| (w, registration, demo)),
        )?;
        let threshold = self.decomposition.convergence_threshold(tau_flat.len());
        info!(
            demo = %demo.name,
            manip = %manip.name(),
            steps = resampled.n_steps(),
            contacts = tau_flat.len(),
            threshold,
            "starting decomposed transfer"
        );

        let mut diagnostics = TransferDiagnostics {
            termination: Termination::MaxIterationsReached,
            iterations: 0,
            discrepancies: Vec::new(),
            warp_objectives: Vec::new(),
            solver_objective: f64::NAN,
            final_solve: SolveStatus::Converged,
            unconverged_solves: 0,
        };

        for iteration in 0..self.decomposition.max_iterations {
            diagnostics.iterations = iteration + 1;

            let targets = tau.with_flat(&warp.transform_points(&tau_flat))?;
            let offsets: Vec<Vector3<f64>> = lambdas.iter().map(|l| -l).collect();
            let mut request = self.optimizer.base_request(&manip, &trajectory)?;
            request
                .costs
                .extend(self.optimizer.contact_terms(&targets, Some(&offsets))?);
            let output = self.optimizer.run(&request, &manip)?;

            if output.status == SolveStatus::NotConverged {
                diagnostics.unconverged_solves += 1;
                if self.decomposition.solver_failure == SolverFailurePolicy::Abort {
                    warn!(demo = %demo.name, iteration, "aborting after unconverged solve");
                    diagnostics.termination = Termination::SolverAborted;
                    break;
                }
            }
            trajectory = output.trajectory;
            diagnostics.solver_objective = output.objective;
            diagnostics.final_solve = output.status;

            warp.refit(Some(&DualConstraints::new(
                tau_flat.clone(),
                lambdas.clone(),
            )?))?;
            let warped = warp.transform_points(&tau_flat);
            let achieved = achieved_contacts(kinematics, &manip, &trajectory)?.flatten();

            let diff: Vec<Vector3<f64>> = achieved
                .iter()
                .zip(&warped)
                .map(|(a, w): (&Point3<f64>, &Point3<f64>)| a - w)
                .collect();
            let discrepancy: f64 = diff.iter().map(|d| d.abs().sum()).sum();
            if !discrepancy.is_finite() {
                return Err(TransferError::NumericalInstability {
                    stage: "trajectory-warp discrepancy",
                });
            }
            for (lambda, d) in lambdas.iter_mut().zip(&diff) {
                *lambda -= d * self.decomposition.step_size;
            }

            let warp_objective = warp.objective();
            diagnostics.discrepancies.push(discrepancy);
            diagnostics.warp_objectives.push(warp_objective);
            debug!(
                iteration,
                discrepancy,
                warp_objective,
                solver_objective = output.objective,
                "decomposition iteration"
            );
            observer.on_iteration(&IterationReport {
                iteration,
                discrepancy,
                warp_objective,
                solve_status: output.status,
                warped_points: &warped,
                achieved_points: &achieved,
                lambdas: &lambdas,
            });

            if discrepancy < threshold {
                diagnostics.termination = Termination::Converged;
                break;
            }
        }

        match diagnostics.termination {
            Termination::Converged => info!(
                demo = %demo.name,
                iterations = diagnostics.iterations,
                "decomposed transfer converged"
            ),
            _ => warn!(
                demo = %demo.name,
                iterations = diagnostics.iterations,
                termination = ?diagnostics.termination,
                discrepancy = ?diagnostics.final_discrepancy(),
                "decomposed transfer stopped without converging"
            ),
        }

        let augmented = to_augmented(kinematics, &manip, &trajectory, &resampled)?;
        Ok(TransferOutcome {
            trajectory: augmented,
            joint_trajectory: trajectory,
            manipulator: manip,
            diagnostics,
        })
    }
}

impl TrajectoryTransferer for DecomposedTransferer {
    fn supports_registration(&self, kind: crate::RegistrationKind) -> bool {
        kind == crate::RegistrationKind::ThinPlateSpline
    }

    fn contact_backend(&self) -> Option<ContactBackend> {
        Some(self.backend.clone())
    }

    fn transfer(
        &self,
        registration: &Registration,
        demo: &Demonstration,
    ) -> TransferResult<TransferOutcome> {
        self.run(registration, demo, &mut crate::NoopObserver)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::testing::{
        IndexRegistration, PointRobot, RecordingObserver, TargetSolver, bent_scene, line_demo,
        shifted_scene,
    };
    use crate::{
        FingerTrajectoryTransferer, NoopObserver, OptimizationRequest, SolverOutput,
        TrajectorySolver, TwoStepTransferer,
    };
    use approx::assert_relative_eq;
    use lfd_types::ArmSide;
    use lfd_warp::TpsParams;

    fn offset() -> Vector3<f64> {
        Vector3::new(0.1, -0.05, 0.02)
    }

    fn params() -> TransferParams {
        TransferParams::new().with_collision_cost(false)
    }

    fn factory() -> Arc<dyn RegistrationFactory> {
        Arc::new(IndexRegistration::new(
            TpsParams::new().with_bend_coefs(0.1).with_rot_coefs(1e-3),
        ))
    }

    fn finger(solver: TargetSolver) -> FingerTrajectoryTransferer {
        finger_with(Arc::new(solver))
    }

    fn finger_with(solver: Arc<dyn TrajectorySolver>) -> FingerTrajectoryTransferer {
        FingerTrajectoryTransferer::new(Arc::new(PointRobot::new()), solver, params()).unwrap()
    }

    fn decomposed(solver: TargetSolver, decomposition: DecompositionParams) -> DecomposedTransferer {
        DecomposedTransferer::new(factory(), &finger(solver), params(), decomposition).unwrap()
    }

    #[test]
    fn test_translated_scene_converges_first_iteration() {
        let transferer = decomposed(TargetSolver::new(PointRobot::new()), DecompositionParams::new());
        let demo = line_demo("reach", ArmSide::Right);
        let mut observer = RecordingObserver::default();

        let outcome = transferer
            .transfer_observed(&demo, &shifted_scene(offset()), &mut observer)
            .unwrap();

        assert_eq!(outcome.diagnostics.termination, Termination::Converged);
        assert_eq!(outcome.diagnostics.iterations, 1);
        assert!(outcome.diagnostics.converged());
        assert_eq!(observer.registrations, 1);
        assert_eq!(observer.discrepancies.len(), 1);
        assert_eq!(observer.finished, 1);

        let track = outcome.trajectory.arm(ArmSide::Right).unwrap();
        let start = track.ee_poses[0].translation.vector;
        let end = track.ee_poses[track.len() - 1].translation.vector;
        assert_relative_eq!(start, Vector3::new(0.0, -0.1, 0.5) + offset(), epsilon = 0.05);
        assert_relative_eq!(end, Vector3::new(0.3, -0.1, 0.5) + offset(), epsilon = 0.05);
    }

    #[test]
    fn test_iteration_cap_is_not_an_error() {
        let transferer = decomposed(
            TargetSolver::new(PointRobot::new()),
            DecompositionParams::new()
                .with_threshold_per_entry(0.0)
                .with_max_iterations(3),
        );
        let demo = line_demo("reach", ArmSide::Right);

        let outcome = transferer
            .transfer_observed(&demo, &shifted_scene(offset()), &mut NoopObserver)
            .unwrap();

        assert_eq!(outcome.diagnostics.termination, Termination::MaxIterationsReached);
        assert_eq!(outcome.diagnostics.iterations, 3);
        assert_eq!(outcome.diagnostics.discrepancies.len(), 3);
        assert_eq!(outcome.diagnostics.warp_objectives.len(), 3);
        assert!(!outcome.diagnostics.converged());
        assert!(outcome.joint_trajectory.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_zero_duals_single_iteration_matches_two_step() {
        let demo = line_demo("reach", ArmSide::Right);
        let scene = shifted_scene(offset());

        let two_step = TwoStepTransferer::new(
            factory(),
            Arc::new(finger(TargetSolver::new(PointRobot::new()))),
        )
        .unwrap()
        .transfer_observed(&demo, &scene, &mut NoopObserver)
        .unwrap();
        let decomposed = decomposed(
            TargetSolver::new(PointRobot::new()),
            DecompositionParams::new()
                .with_initial_dual(Vector3::zeros())
                .with_max_iterations(1),
        )
        .transfer_observed(&demo, &scene, &mut NoopObserver)
        .unwrap();

        assert_eq!(decomposed.diagnostics.iterations, 1);
        assert_eq!(
            two_step.joint_trajectory.shape(),
            decomposed.joint_trajectory.shape()
        );
        assert_relative_eq!(
            two_step.joint_trajectory,
            decomposed.joint_trajectory,
            epsilon = 1e-6
        );
        let start = two_step.joint_trajectory.row(0);
        assert_relative_eq!(start[0], offset().x, epsilon = 1e-6);
        assert_relative_eq!(start[1], -0.1 + offset().y, epsilon = 1e-6);
        assert_relative_eq!(start[2], 0.5 + offset().z, epsilon = 1e-6);
    }

    /// Puts the gripper absurdly far from every contact target.
    struct RunawaySolver;

    impl TrajectorySolver for RunawaySolver {
        fn solve(&self, request: &OptimizationRequest) -> TransferResult<SolverOutput> {
            let mut traj = request
                .init_trajectory()
                .ok_or_else(|| TransferError::Solver("missing initial trajectory".to_string()))?;
            traj.columns_mut(0, 3).fill(1e300);
            Ok(SolverOutput {
                trajectory: traj,
                objective: 0.0,
                status: SolveStatus::Converged,
            })
        }
    }

    #[test]
    fn test_bent_scene_dual_ascent() {
        let transferer = decomposed(
            TargetSolver::new(PointRobot::new()),
            DecompositionParams::new()
                .with_threshold_per_entry(0.0)
                .with_max_iterations(6),
        );
        let demo = line_demo("reach", ArmSide::Right);
        let mut observer = RecordingObserver::default();

        let outcome = transferer
            .transfer_observed(&demo, &bent_scene(), &mut observer)
            .unwrap();

        assert_eq!(outcome.diagnostics.termination, Termination::MaxIterationsReached);
        assert_eq!(observer.discrepancies.len(), 6);
        assert!(observer.discrepancies[0] > 0.0);
        for pair in observer.discrepancies.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-12, "discrepancy rose: {pair:?}");
        }

        let first = &observer.warped[0];
        let last = &observer.warped[5];
        let moved = first
            .iter()
            .zip(last)
            .map(|(a, b)| (a - b).norm())
            .fold(0.0, f64::max);
        assert!(moved > 0.0);

        let bias = DecompositionParams::new().initial_dual;
        assert!(
            observer.lambdas[5]
                .iter()
                .any(|l| (l - bias).norm() > 0.0)
        );
    }

    #[test]
    fn test_zero_coefficients_single_iteration_matches_two_step() {
        let exact = || -> Arc<dyn RegistrationFactory> {
            Arc::new(IndexRegistration::new(
                TpsParams::new().with_bend_coefs(0.0).with_rot_coefs(0.0),
            ))
        };
        let demo = line_demo("reach", ArmSide::Right);
        let scene = bent_scene();

        let two_step = TwoStepTransferer::new(
            exact(),
            Arc::new(finger(TargetSolver::new(PointRobot::new()))),
        )
        .unwrap()
        .transfer_observed(&demo, &scene, &mut NoopObserver)
        .unwrap();
        let decomposed = DecomposedTransferer::new(
            exact(),
            &finger(TargetSolver::new(PointRobot::new())),
            params(),
            DecompositionParams::new()
                .with_initial_dual(Vector3::zeros())
                .with_max_iterations(1),
        )
        .unwrap()
        .transfer_observed(&demo, &scene, &mut NoopObserver)
        .unwrap();

        assert_eq!(decomposed.diagnostics.iterations, 1);
        assert_relative_eq!(
            two_step.joint_trajectory,
            decomposed.joint_trajectory,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_warp_failure_stops_transfer() {
        let transferer = DecomposedTransferer::new(
            factory(),
            &finger_with(Arc::new(RunawaySolver)),
            params(),
            DecompositionParams::new()
                .with_threshold_per_entry(0.0)
                .with_step_size(1e8),
        )
        .unwrap();
        let demo = line_demo("reach", ArmSide::Right);
        let mut observer = RecordingObserver::default();

        let err = transferer
            .transfer_observed(&demo, &shifted_scene(offset()), &mut observer)
            .unwrap_err();

        assert!(matches!(err, TransferError::Warp(lfd_warp::WarpError::NonFinite(_))));
        assert_eq!(observer.discrepancies.len(), 1);
        assert_eq!(observer.finished, 0);
    }

    #[test]
    fn test_abort_policy_stops_on_unconverged_solve() {
        let transferer = decomposed(
            TargetSolver::new(PointRobot::new()).with_status(SolveStatus::NotConverged),
            DecompositionParams::new().with_solver_failure(SolverFailurePolicy::Abort),
        );
        let demo = line_demo("reach", ArmSide::Right);

        let outcome = transferer
            .transfer_observed(&demo, &shifted_scene(offset()), &mut NoopObserver)
            .unwrap();

        assert_eq!(outcome.diagnostics.termination, Termination::SolverAborted);
        assert_eq!(outcome.diagnostics.iterations, 1);
        assert_eq!(outcome.diagnostics.unconverged_solves, 1);
        assert!(outcome.diagnostics.discrepancies.is_empty());
    }

    #[test]
    fn test_continue_policy_counts_unconverged_solves() {
        let transferer = decomposed(
            TargetSolver::new(PointRobot::new()).with_status(SolveStatus::NotConverged),
            DecompositionParams::new(),
        );
        let demo = line_demo("reach", ArmSide::Right);

        let outcome = transferer
            .transfer_observed(&demo, &shifted_scene(offset()), &mut NoopObserver)
            .unwrap();

        assert_eq!(outcome.diagnostics.termination, Termination::Converged);
        assert_eq!(outcome.diagnostics.unconverged_solves, 1);
        assert_eq!(outcome.diagnostics.final_solve, SolveStatus::NotConverged);
        assert!(!outcome.diagnostics.converged());
    }

    #[test]
    fn test_non_finite_solution_is_reported() {
        let transferer = decomposed(
            TargetSolver::new(PointRobot::new()).producing_nan(),
            DecompositionParams::new(),
        );
        let demo = line_demo("reach", ArmSide::Right);

        let err = transferer
            .transfer_observed(&demo, &shifted_scene(offset()), &mut NoopObserver)
            .unwrap_err();

        assert!(matches!(err, TransferError::NumericalInstability { .. }));
    }

    #[test]
    fn test_rigid_factory_rejected() {
        let err = DecomposedTransferer::new(
            Arc::new(IndexRegistration::rigid()),
            &finger(TargetSolver::new(PointRobot::new())),
            params(),
            DecompositionParams::new(),
        )
        .unwrap_err();

        assert!(matches!(err, TransferError::IncompatibleConfiguration(_)));
    }

    #[test]
    fn test_invalid_loop_params_rejected() {
        let err = DecomposedTransferer::new(
            factory(),
            &finger(TargetSolver::new(PointRobot::new())),
            params(),
            DecompositionParams::new().with_step_size(-1.0),
        )
        .unwrap_err();

        assert!(matches!(err, TransferError::InvalidParameter(_)));
    }

    #[test]
    fn test_registration_failure_propagates() {
        let transferer = decomposed(TargetSolver::new(PointRobot::new()), DecompositionParams::new());
        let demo = line_demo("reach", ArmSide::Right);
        let scene = SceneState::new(vec![Point3::origin(); 3]);

        let err = transferer
            .transfer_observed(&demo, &scene, &mut NoopObserver)
            .unwrap_err();

        assert!(matches!(err, TransferError::Registration(_)));
    }

    #[test]
    fn test_warm_start_from_unified() {
        let solver = Arc::new(TargetSolver::new(PointRobot::new()));
        let base = FingerTrajectoryTransferer::new(
            Arc::new(PointRobot::new()),
            Arc::clone(&solver) as Arc<dyn crate::TrajectorySolver>,
            params(),
        )
        .unwrap();
        let unified = crate::UnifiedTransferer::new(factory(), &base, params()).unwrap();
        let transferer = DecomposedTransferer::new(factory(), &base, params(), DecompositionParams::new())
            .unwrap()
            .with_warm_start(Arc::new(unified));
        let demo = line_demo("reach", ArmSide::Right);

        let outcome = transferer
            .transfer_observed(&demo, &shifted_scene(offset()), &mut NoopObserver)
            .unwrap();

        assert!(outcome.diagnostics.converged());
        // one warm-start solve plus one loop iteration
        assert_eq!(solver.calls(), 2);
    }
}
