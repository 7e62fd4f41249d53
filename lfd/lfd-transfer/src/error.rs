//! Error types for trajectory transfer.

use lfd_types::{ArmSide, FingerSide, TrajectoryError};
use lfd_warp::WarpError;
use thiserror::Error;

/// Errors that can occur while transferring a demonstration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransferError {
    /// Registration factory and trajectory transferer cannot work together.
    #[error("incompatible configuration: {0}")]
    IncompatibleConfiguration(String),

    /// A finger's contact trajectory has a different length from the others.
    #[error(
        "{arm} arm {finger} finger contact trajectory has {found} steps, expected {expected}"
    )]
    ContactLengthMismatch {
        /// Arm of the offending finger.
        arm: ArmSide,
        /// The offending finger.
        finger: FingerSide,
        /// Steps of the first finger.
        expected: usize,
        /// Steps of this finger.
        found: usize,
    },

    /// No arm moves in the demonstration.
    #[error("demonstration {0} has no moving arm")]
    NoActiveArm(String),

    /// A joint trajectory or robot vector does not cover the manipulator's
    /// degrees of freedom.
    #[error("manipulator {manip} expects {expected} degrees of freedom, found {found}")]
    DofMismatch {
        /// Manipulator name.
        manip: String,
        /// Expected length.
        expected: usize,
        /// Actual length.
        found: usize,
    },

    /// A joint trajectory has the wrong number of timesteps.
    #[error("trajectory has {found} steps, expected {expected}")]
    StepCountMismatch {
        /// Expected step count.
        expected: usize,
        /// Actual step count.
        found: usize,
    },

    /// The warm-start transferer produced an unusable trajectory.
    #[error("warm start unusable: {0}")]
    WarmStartMismatch(String),

    /// The external registration primitive failed.
    #[error("registration failed: {0}")]
    Registration(String),

    /// The external trajectory solver failed outright.
    #[error("trajectory solver failed: {0}")]
    Solver(String),

    /// NaN or infinity appeared while iterating.
    #[error("numerical instability in {stage}")]
    NumericalInstability {
        /// Loop stage that produced the non-finite value.
        stage: &'static str,
    },

    /// A configuration parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Warp fitting failed.
    #[error(transparent)]
    Warp(#[from] WarpError),

    /// Demonstration data is inconsistent.
    #[error(transparent)]
    Trajectory(#[from] TrajectoryError),
}

/// Result type for transfer operations.
pub type TransferResult<T> = Result<T, TransferError>;
