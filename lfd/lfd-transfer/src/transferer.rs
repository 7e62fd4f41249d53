//! Trajectory transferers: turn a registration into a robot trajectory.

use crate::prepare::single_shot;
use crate::{
    Kinematics, Registration, RegistrationKind, TrajectoryOptimizer, TrajectorySolver,
    TransferOutcome, TransferParams, TransferResult,
};
use lfd_types::Demonstration;
use std::sync::Arc;
use tracing::info;

/// Kinematics and solver of a transferer that works with contact points.
#[derive(Clone)]
pub struct ContactBackend {
    /// Robot kinematics.
    pub kinematics: Arc<dyn Kinematics>,
    /// Trajectory solver.
    pub solver: Arc<dyn TrajectorySolver>,
}

impl std::fmt::Debug for ContactBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactBackend").finish_non_exhaustive()
    }
}

/// Produces a trajectory for a demonstration given its registration.
pub trait TrajectoryTransferer: Send + Sync {
    /// Whether this transferer can consume registrations of `kind`.
    fn supports_registration(&self, kind: RegistrationKind) -> bool;

    /// Contact-point machinery, if the transferer follows finger contacts.
    fn contact_backend(&self) -> Option<ContactBackend>;

    /// Transfers `demo` using `registration`.
    ///
    /// # Errors
    ///
    /// Returns an error if the demonstration is unusable or the solver fails.
    fn transfer(
        &self,
        registration: &Registration,
        demo: &Demonstration,
    ) -> TransferResult<TransferOutcome>;
}

/// Follows the warped finger contact points of the demonstration with one
/// trajectory solve.
///
/// Accepts any registration kind, since only the fitted warp is used.
#[derive(Debug, Clone)]
pub struct FingerTrajectoryTransferer {
    optimizer: TrajectoryOptimizer,
    backend: ContactBackend,
}

impl FingerTrajectoryTransferer {
    /// Creates a transferer.
    ///
    /// # Errors
    ///
    /// Returns an error if `params` is invalid.
    pub fn new(
        kinematics: Arc<dyn Kinematics>,
        solver: Arc<dyn TrajectorySolver>,
        params: TransferParams,
    ) -> TransferResult<Self> {
        let backend = ContactBackend {
            kinematics: Arc::clone(&kinematics),
            solver: Arc::clone(&solver),
        };
        Ok(Self {
            optimizer: TrajectoryOptimizer::new(kinematics, solver, params)?,
            backend,
        })
    }

    /// The underlying optimizer.
    #[must_use]
    pub const fn optimizer(&self) -> &TrajectoryOptimizer {
        &self.optimizer
    }
}

impl TrajectoryTransferer for FingerTrajectoryTransferer {
    fn supports_registration(&self, _kind: RegistrationKind) -> bool {
        true
    }

    fn contact_backend(&self) -> Option<ContactBackend> {
        Some(self.backend.clone())
    }

    fn transfer(
        &self,
        registration: &Registration,
        demo: &Demonstration,
    ) -> TransferResult<TransferOutcome> {
        let outcome = single_shot(&self.optimizer, registration, demo, None)?;
        info!(
            demo = %demo.name,
            steps = outcome.joint_trajectory.nrows(),
            converged = outcome.diagnostics.converged(),
            "finger trajectory transfer finished"
        );
        Ok(outcome)
    }
}
