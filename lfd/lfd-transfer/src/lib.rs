//! Transfer of demonstrated manipulation trajectories onto new scenes.
//!
//! A demonstration is recorded in one scene; the robot then faces a test
//! scene with the same objects in different places or shapes. This crate
//! carries the demonstration over in one of three ways:
//!
//! - [`TwoStepTransferer`]: register the scenes, then hand the warp to a
//!   [`TrajectoryTransferer`] once.
//! - [`UnifiedTransferer`]: one trajectory solve that follows the warped
//!   finger contact points.
//! - [`DecomposedTransferer`]: alternate warp refits and trajectory solves,
//!   coupled by one dual variable per contact point, until the trajectory
//!   and the warp agree on where the fingers go.
//!
//! [`TransferStrategy`] selects among them and checks at construction that
//! the registration factory and transferer fit together.
//!
//! # Layer 0
//!
//! This is a Layer 0 crate. Robot kinematics, the trajectory solver and
//! scene registration are collaborators behind the [`Kinematics`],
//! [`TrajectorySolver`] and [`RegistrationFactory`] traits.
//!
//! # Quick Start
//!
//! ```
//! use lfd_transfer::{DecompositionParams, SolverFailurePolicy, TransferParams};
//!
//! let params = TransferParams::new()
//!     .with_beta_pos(1e5)
//!     .with_collision_cost(false);
//! let decomposition = DecompositionParams::new()
//!     .with_max_iterations(10)
//!     .with_solver_failure(SolverFailurePolicy::Abort);
//!
//! assert!(params.validate().is_ok());
//! assert!(decomposition.validate().is_ok());
//! ```
//!
//! Wiring a strategy needs the three collaborators:
//!
//! ```ignore
//! let transferer = Arc::new(FingerTrajectoryTransferer::new(kinematics, solver, params.clone())?);
//! let strategy = TransferStrategy::build(
//!     StrategyKind::Decomposed,
//!     factory,
//!     transferer,
//!     params,
//!     decomposition,
//! )?;
//! let outcome = strategy.transfer(&demo, &test_scene)?;
//! if !outcome.diagnostics.converged() {
//!     // the trajectory is still usable, but the warp and the
//!     // trajectory disagree by `final_discrepancy()`
//! }
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod contact;
mod decomposed;
mod error;
mod kinematics;
mod observer;
mod optimizer;
mod outcome;
mod params;
mod prepare;
mod registration;
pub mod request;
mod strategy;
mod transferer;
mod two_step;
mod unified;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use contact::{ContactTrajectory, FingerPointsTrajectory, achieved_contacts, demo_contacts};
pub use decomposed::DecomposedTransferer;
pub use error::{TransferError, TransferResult};
pub use kinematics::{Kinematics, Manipulator};
pub use observer::{IterationReport, NoopObserver, TransferObserver};
pub use optimizer::{SolveStatus, SolverOutput, TrajectoryOptimizer, TrajectorySolver, unwrap_column};
pub use outcome::{Termination, TransferDiagnostics, TransferOutcome};
pub use params::{CollisionParams, DecompositionParams, SolverFailurePolicy, TransferParams};
pub use registration::{Registration, RegistrationFactory, RegistrationKind};
pub use request::{
    BasicInfo, ConstraintTerm, CostTerm, InitInfo, OptimizationRequest, RelPtsLambdasParams,
    RelPtsParams,
};
pub use strategy::{StrategyKind, TransferStrategy};
pub use transferer::{ContactBackend, FingerTrajectoryTransferer, TrajectoryTransferer};
pub use two_step::TwoStepTransferer;
pub use unified::UnifiedTransferer;
