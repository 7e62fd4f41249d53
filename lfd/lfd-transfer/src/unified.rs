//! Single-shot transfer built directly from the registered warp.

use crate::prepare::single_shot;
use crate::{
    ContactBackend, Registration, RegistrationFactory, RegistrationKind, TrajectoryOptimizer,
    TrajectoryTransferer, TransferError, TransferObserver, TransferOutcome, TransferParams,
    TransferResult,
};
use lfd_types::{Demonstration, SceneState};
use std::sync::Arc;
use tracing::info;

/// Builds one contact-following request from a spline registration.
///
/// Optionally starts from another transferer's trajectory. It is itself a
/// [`TrajectoryTransferer`], so it can serve as the warm start of the
/// decomposition loop.
#[derive(Clone)]
pub struct UnifiedTransferer {
    factory: Arc<dyn RegistrationFactory>,
    backend: ContactBackend,
    optimizer: TrajectoryOptimizer,
    warm_start: Option<Arc<dyn TrajectoryTransferer>>,
}

impl std::fmt::Debug for UnifiedTransferer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnifiedTransferer")
            .field("optimizer", &self.optimizer)
            .field("warm_start", &self.warm_start.is_some())
            .finish_non_exhaustive()
    }
}

impl UnifiedTransferer {
    /// Creates the strategy from a spline factory and a contact-capable
    /// transferer, whose kinematics and solver are reused.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::IncompatibleConfiguration`] if the factory
    /// does not produce spline registrations or the transferer has no
    /// contact backend, and a parameter error if `params` is invalid.
    pub fn new(
        factory: Arc<dyn RegistrationFactory>,
        transferer: &dyn TrajectoryTransferer,
        params: TransferParams,
    ) -> TransferResult<Self> {
        let backend = require_contact_backend(factory.as_ref(), transferer, "unified")?;
        let optimizer = TrajectoryOptimizer::new(
            Arc::clone(&backend.kinematics),
            Arc::clone(&backend.solver),
            params,
        )?;
        Ok(Self {
            factory,
            backend,
            optimizer,
            warm_start: None,
        })
    }

    /// Uses `transferer`'s output as the initial guess.
    #[must_use]
    pub fn with_warm_start(mut self, transferer: Arc<dyn TrajectoryTransferer>) -> Self {
        self.warm_start = Some(transferer);
        self
    }

    /// Registers and transfers, reporting checkpoints to `observer`.
    ///
    /// # Errors
    ///
    /// Propagates registration, warm-start and solver errors.
    pub fn transfer_observed(
        &self,
        demo: &Demonstration,
        scene: &SceneState,
        observer: &mut dyn TransferObserver,
    ) -> TransferResult<TransferOutcome> {
        let registration = self.factory.register(demo, scene)?;
        observer.on_registration(&registration);
        let outcome = self.transfer(&registration, demo)?;
        observer.on_finished(&outcome);
        Ok(outcome)
    }
}

impl TrajectoryTransferer for UnifiedTransferer {
    fn supports_registration(&self, kind: RegistrationKind) -> bool {
        kind == RegistrationKind::ThinPlateSpline
    }

    fn contact_backend(&self) -> Option<ContactBackend> {
        Some(self.backend.clone())
    }

    fn transfer(
        &self,
        registration: &Registration,
        demo: &Demonstration,
    ) -> TransferResult<TransferOutcome> {
        let outcome = single_shot(
            &self.optimizer,
            registration,
            demo,
            self.warm_start.as_ref(),
        )?;
        info!(
            demo = %demo.name,
            strategy = "unified",
            converged = outcome.diagnostics.converged(),
            "transfer finished"
        );
        Ok(outcome)
    }
}

/// Checks the preconditions shared by the unified and decomposed strategies.
pub(crate) fn require_contact_backend(
    factory: &dyn RegistrationFactory,
    transferer: &dyn TrajectoryTransferer,
    strategy: &str,
) -> TransferResult<ContactBackend> {
    let kind = factory.kind();
    if kind != RegistrationKind::ThinPlateSpline {
        return Err(TransferError::IncompatibleConfiguration(format!(
            "{strategy} transfer needs thin-plate-spline registrations, factory produces {kind:?}"
        )));
    }
    if !transferer.supports_registration(kind) {
        return Err(TransferError::IncompatibleConfiguration(format!(
            "{strategy} transfer: transferer does not accept {kind:?} registrations"
        )));
    }
    transferer.contact_backend().ok_or_else(|| {
        TransferError::IncompatibleConfiguration(format!(
            "{strategy} transfer needs a transferer that follows finger contact points"
        ))
    })
}
