//! The closed set of transfer strategies behind one entry point.

use crate::{
    DecomposedTransferer, DecompositionParams, NoopObserver, RegistrationFactory,
    TrajectoryTransferer, TransferObserver, TransferOutcome, TransferParams, TransferResult,
    TwoStepTransferer, UnifiedTransferer,
};
use lfd_types::{Demonstration, SceneState};
use std::fmt;
use std::sync::Arc;

/// Which strategy to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Register, then transfer once.
    TwoStep,
    /// One contact-following solve from the registered warp.
    Unified,
    /// Alternating warp and trajectory solves coupled by dual variables.
    Decomposed,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TwoStep => f.write_str("two_step"),
            Self::Unified => f.write_str("unified"),
            Self::Decomposed => f.write_str("decomposed"),
        }
    }
}

/// A configured transfer strategy.
///
/// Compatibility between the registration factory and the trajectory
/// transferer is checked when the strategy is built, never per call.
#[derive(Debug, Clone)]
pub enum TransferStrategy {
    /// See [`TwoStepTransferer`].
    TwoStep(TwoStepTransferer),
    /// See [`UnifiedTransferer`].
    Unified(UnifiedTransferer),
    /// See [`DecomposedTransferer`].
    Decomposed(DecomposedTransferer),
}

impl TransferStrategy {
    /// Builds the strategy selected by `kind`.
    ///
    /// `params` configures the unified and decomposed strategies (the
    /// two-step strategy uses the transferer as configured) and
    /// `decomposition` only the decomposed one.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::IncompatibleConfiguration`](crate::TransferError::IncompatibleConfiguration)
    /// if the factory and transferer do not fit the strategy, or a parameter
    /// error.
    pub fn build(
        kind: StrategyKind,
        factory: Arc<dyn RegistrationFactory>,
        transferer: Arc<dyn TrajectoryTransferer>,
        params: TransferParams,
        decomposition: DecompositionParams,
    ) -> TransferResult<Self> {
        Ok(match kind {
            StrategyKind::TwoStep => Self::TwoStep(TwoStepTransferer::new(factory, transferer)?),
            StrategyKind::Unified => {
                Self::Unified(UnifiedTransferer::new(factory, transferer.as_ref(), params)?)
            }
            StrategyKind::Decomposed => Self::Decomposed(DecomposedTransferer::new(
                factory,
                transferer.as_ref(),
                params,
                decomposition,
            )?),
        })
    }

    /// The strategy's kind.
    #[must_use]
    pub const fn kind(&self) -> StrategyKind {
        match self {
            Self::TwoStep(_) => StrategyKind::TwoStep,
            Self::Unified(_) => StrategyKind::Unified,
            Self::Decomposed(_) => StrategyKind::Decomposed,
        }
    }

    /// Transfers `demo` onto `scene`.
    ///
    /// # Errors
    ///
    /// Propagates registration and transfer errors.
    pub fn transfer(&self, demo: &Demonstration, scene: &SceneState) -> TransferResult<TransferOutcome> {
        self.transfer_observed(demo, scene, &mut NoopObserver)
    }

    /// Transfers `demo` onto `scene`, reporting checkpoints to `observer`.
    ///
    /// # Errors
    ///
    /// Propagates registration and transfer errors.
    pub fn transfer_observed(
        &self,
        demo: &Demonstration,
        scene: &SceneState,
        observer: &mut dyn TransferObserver,
    ) -> TransferResult<TransferOutcome> {
        match self {
            Self::TwoStep(s) => s.transfer_observed(demo, scene, observer),
            Self::Unified(s) => s.transfer_observed(demo, scene, observer),
            Self::Decomposed(s) => s.transfer_observed(demo, scene, observer),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::testing::{
        IndexRegistration, PointRobot, RecordingObserver, TargetSolver, line_demo, shifted_scene,
    };
    use crate::{
        ContactBackend, FingerTrajectoryTransferer, Registration, RegistrationKind, Termination,
        TransferError,
    };
    use lfd_types::ArmSide;
    use lfd_warp::TpsParams;
    use nalgebra::Vector3;

    /// Accepts any registration but exposes no contact backend.
    struct OpaqueTransferer;

    impl TrajectoryTransferer for OpaqueTransferer {
        fn supports_registration(&self, _kind: RegistrationKind) -> bool {
            true
        }

        fn contact_backend(&self) -> Option<ContactBackend> {
            None
        }

        fn transfer(
            &self,
            _registration: &Registration,
            _demo: &Demonstration,
        ) -> TransferResult<TransferOutcome> {
            Err(TransferError::Solver("not a solver".to_string()))
        }
    }

    fn params() -> TransferParams {
        TransferParams::new().with_collision_cost(false)
    }

    fn spline_factory() -> Arc<dyn RegistrationFactory> {
        Arc::new(IndexRegistration::new(TpsParams::new().with_bend_coefs(0.1)))
    }

    fn finger() -> Arc<dyn TrajectoryTransferer> {
        Arc::new(
            FingerTrajectoryTransferer::new(
                Arc::new(PointRobot::new()),
                Arc::new(TargetSolver::new(PointRobot::new())),
                params(),
            )
            .unwrap(),
        )
    }

    fn build(
        kind: StrategyKind,
        factory: Arc<dyn RegistrationFactory>,
        transferer: Arc<dyn TrajectoryTransferer>,
    ) -> TransferResult<TransferStrategy> {
        TransferStrategy::build(kind, factory, transferer, params(), DecompositionParams::new())
    }

    #[test]
    fn test_every_kind_transfers_translated_scene() {
        let demo = line_demo("reach", ArmSide::Right);
        let scene = shifted_scene(Vector3::new(0.05, 0.05, 0.0));

        for kind in [StrategyKind::TwoStep, StrategyKind::Unified, StrategyKind::Decomposed] {
            let strategy = build(kind, spline_factory(), finger()).unwrap();
            assert_eq!(strategy.kind(), kind);

            let mut observer = RecordingObserver::default();
            let outcome = strategy.transfer_observed(&demo, &scene, &mut observer).unwrap();

            assert!(outcome.diagnostics.converged(), "{kind} did not converge");
            assert_eq!(outcome.manipulator.arms(), &[ArmSide::Right]);
            assert_eq!(observer.registrations, 1);
            assert_eq!(observer.finished, 1);
            let expected_termination = match kind {
                StrategyKind::Decomposed => Termination::Converged,
                _ => Termination::SinglePass,
            };
            assert_eq!(outcome.diagnostics.termination, expected_termination);
        }
    }

    #[test]
    fn test_two_step_accepts_rigid_with_finger_transferer() {
        let strategy = build(
            StrategyKind::TwoStep,
            Arc::new(IndexRegistration::rigid()),
            finger(),
        );
        assert!(strategy.is_ok());
    }

    #[test]
    fn test_two_step_rejects_transferer_that_refuses_kind() {
        let finger = finger();
        let unified: Arc<dyn TrajectoryTransferer> = Arc::new(
            crate::UnifiedTransferer::new(spline_factory(), finger.as_ref(), params()).unwrap(),
        );

        let err = build(
            StrategyKind::TwoStep,
            Arc::new(IndexRegistration::rigid()),
            unified,
        )
        .unwrap_err();

        assert!(matches!(err, TransferError::IncompatibleConfiguration(_)));
    }

    #[test]
    fn test_contact_strategies_reject_rigid_registration() {
        for kind in [StrategyKind::Unified, StrategyKind::Decomposed] {
            let err = build(kind, Arc::new(IndexRegistration::rigid()), finger()).unwrap_err();
            assert!(matches!(err, TransferError::IncompatibleConfiguration(_)));
        }
    }

    #[test]
    fn test_contact_strategies_need_contact_backend() {
        for kind in [StrategyKind::Unified, StrategyKind::Decomposed] {
            let err = build(kind, spline_factory(), Arc::new(OpaqueTransferer)).unwrap_err();
            assert!(matches!(err, TransferError::IncompatibleConfiguration(_)));
        }
        // two-step only needs kind compatibility
        assert!(build(StrategyKind::TwoStep, spline_factory(), Arc::new(OpaqueTransferer)).is_ok());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(StrategyKind::TwoStep.to_string(), "two_step");
        assert_eq!(StrategyKind::Decomposed.to_string(), "decomposed");
    }
}
