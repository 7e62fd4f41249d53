//! Register once, then hand off to a trajectory transferer.

use crate::{
    RegistrationFactory, TrajectoryTransferer, TransferError, TransferObserver, TransferOutcome,
    TransferResult,
};
use lfd_types::{Demonstration, SceneState};
use std::sync::Arc;
use tracing::info;

/// Baseline strategy: one registration, one trajectory transfer, no duals.
#[derive(Clone)]
pub struct TwoStepTransferer {
    factory: Arc<dyn RegistrationFactory>,
    transferer: Arc<dyn TrajectoryTransferer>,
}

impl std::fmt::Debug for TwoStepTransferer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoStepTransferer")
            .field("registration", &self.factory.kind())
            .finish_non_exhaustive()
    }
}

impl TwoStepTransferer {
    /// Pairs a registration factory with a trajectory transferer.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::IncompatibleConfiguration`] if the
    /// transferer cannot consume the factory's registrations.
    pub fn new(
        factory: Arc<dyn RegistrationFactory>,
        transferer: Arc<dyn TrajectoryTransferer>,
    ) -> TransferResult<Self> {
        let kind = factory.kind();
        if !transferer.supports_registration(kind) {
            return Err(TransferError::IncompatibleConfiguration(format!(
                "trajectory transferer does not accept {kind:?} registrations"
            )));
        }
        Ok(Self {
            factory,
            transferer,
        })
    }

    /// Registers and transfers, reporting checkpoints to `observer`.
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
        let registration = self.factory.register(demo, scene)?;
        observer.on_registration(&registration);
        let outcome = self.transferer.transfer(&registration, demo)?;
        info!(demo = %demo.name, strategy = "two_step", "transfer finished");
        observer.on_finished(&outcome);
        Ok(outcome)
    }
}
