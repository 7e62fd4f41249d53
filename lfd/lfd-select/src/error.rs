//! Error types for action selection.

use lfd_transfer::TransferError;
use thiserror::Error;

/// Errors raised while ranking or simulating actions.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SelectError {
    /// Search parameters are out of range.
    #[error("invalid selection parameter: {0}")]
    InvalidParameter(String),

    /// The cost oracle could not rank the actions.
    #[error("cost oracle failed: {0}")]
    Oracle(String),

    /// The simulator failed to spawn, execute or observe.
    #[error("simulator failed: {0}")]
    Simulator(String),

    /// Scene features and value weights have different lengths.
    #[error("scene features have length {found}, value weights {expected}")]
    FeatureDimension {
        /// Number of weights.
        expected: usize,
        /// Number of features produced.
        found: usize,
    },

    /// Transferring a demonstration failed.
    #[error(transparent)]
    Transfer(#[from] TransferError),
}

/// Result type for action selection.
pub type SelectResult<T> = Result<T, SelectError>;
