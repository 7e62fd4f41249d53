//! Error types for spline warp fitting.

use thiserror::Error;

/// Errors that can occur while fitting or refitting a warp.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WarpError {
    /// No correspondence points were provided.
    #[error("warp needs at least one correspondence")]
    EmptyCorrespondence,

    /// Two inputs that must be paired have different lengths.
    #[error("{what} has {found} entries, expected {expected}")]
    LengthMismatch {
        /// Name of the offending input.
        what: &'static str,
        /// Required length.
        expected: usize,
        /// Actual length.
        found: usize,
    },

    /// A regularization coefficient or weight is negative or not finite.
    #[error("invalid {name}: {value}")]
    InvalidCoefficient {
        /// Name of the coefficient.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// The reduced normal equations are not positive definite.
    #[error("spline system is degenerate: {0}")]
    DegenerateSystem(String),

    /// Inputs or fitted parameters contain NaN or infinity.
    #[error("non-finite values in {0}")]
    NonFinite(&'static str),

    /// The warp has no cached factorization to refit.
    #[error("warp was not fitted from correspondences")]
    NotFitted,
}

/// Result type for warp operations.
pub type WarpResult<T> = Result<T, WarpError>;
