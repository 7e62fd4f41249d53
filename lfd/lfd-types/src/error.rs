//! Error types for trajectory and scene data.

use crate::ArmSide;
use thiserror::Error;

/// Errors raised when constructing or resampling demonstration data.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TrajectoryError {
    /// A per-arm sequence does not have the arm's timestep count.
    #[error("{arm} arm {field} has {found} entries, expected {expected}")]
    SequenceLengthMismatch {
        /// Arm the sequence belongs to.
        arm: ArmSide,
        /// Name of the offending sequence.
        field: &'static str,
        /// Timestep count of the arm.
        expected: usize,
        /// Length of the offending sequence.
        found: usize,
    },

    /// Two arms of one trajectory have different timestep counts.
    #[error("{arm} arm has {found} timesteps, trajectory has {expected}")]
    ArmLengthMismatch {
        /// The arm with the inconsistent length.
        arm: ArmSide,
        /// Timestep count of the first arm.
        expected: usize,
        /// Timestep count of this arm.
        found: usize,
    },

    /// Joint vectors of one arm have inconsistent dimension.
    #[error("{arm} arm joint vector at step {step} has {found} joints, expected {expected}")]
    JointCountMismatch {
        /// The arm.
        arm: ArmSide,
        /// Timestep of the offending vector.
        step: usize,
        /// Joint count of the first vector.
        expected: usize,
        /// Joint count of this vector.
        found: usize,
    },

    /// The trajectory has no timesteps.
    #[error("trajectory is empty")]
    Empty,

    /// A resampling timestep lies outside the trajectory.
    #[error("timestep {timestep} outside trajectory range [0, {last}]")]
    TimestepOutOfRange {
        /// The requested fractional timestep.
        timestep: f64,
        /// Index of the last timestep.
        last: usize,
    },

    /// A scene color array does not match its cloud.
    #[error("scene has {points} points but {colors} colors")]
    ColorCountMismatch {
        /// Cloud size.
        points: usize,
        /// Color array size.
        colors: usize,
    },

    /// Resampling parameters are invalid.
    #[error("invalid resample parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for trajectory operations.
pub type TrajectoryResult<T> = Result<T, TrajectoryError>;
