//! Regularization and weighting parameters for spline fitting.

use crate::{WarpError, WarpResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A regularization coefficient, either shared by all output dimensions or
/// given per dimension.
///
/// # Examples
///
/// ```
/// use lfd_warp::RegCoefs;
///
/// assert_eq!(RegCoefs::from(0.1).per_dim(), [0.1, 0.1, 0.1]);
/// assert_eq!(RegCoefs::from([1.0, 2.0, 3.0]).per_dim(), [1.0, 2.0, 3.0]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum RegCoefs {
    /// Same value for x, y and z.
    Scalar(f64),
    /// One value per output dimension.
    PerDim([f64; 3]),
}

impl RegCoefs {
    /// Broadcasts to one value per dimension.
    #[must_use]
    pub const fn per_dim(&self) -> [f64; 3] {
        match *self {
            Self::Scalar(v) => [v, v, v],
            Self::PerDim(v) => v,
        }
    }

    fn validate(&self, name: &'static str) -> WarpResult<[f64; 3]> {
        let values = self.per_dim();
        if let Some(&value) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(WarpError::InvalidCoefficient { name, value });
        }
        Ok(values)
    }
}

impl Default for RegCoefs {
    fn default() -> Self {
        Self::Scalar(0.0)
    }
}

impl From<f64> for RegCoefs {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<[f64; 3]> for RegCoefs {
    fn from(value: [f64; 3]) -> Self {
        Self::PerDim(value)
    }
}

/// Per-correspondence weights on the residual term.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PointWeights {
    /// Every correspondence weighs one.
    #[default]
    Uniform,
    /// One weight per correspondence, shared by all dimensions.
    PerPoint(Vec<f64>),
    /// One weight per correspondence per dimension.
    PerDim(Vec<[f64; 3]>),
}

impl PointWeights {
    /// Expands to one weight per point per dimension.
    ///
    /// # Errors
    ///
    /// Returns an error if the weight count differs from `n` or a weight is
    /// negative or not finite.
    pub fn per_dim(&self, n: usize) -> WarpResult<Vec<[f64; 3]>> {
        let expanded = match self {
            Self::Uniform => vec![[1.0; 3]; n],
            Self::PerPoint(w) => w.iter().map(|&v| [v; 3]).collect(),
            Self::PerDim(w) => w.clone(),
        };
        if expanded.len() != n {
            return Err(WarpError::LengthMismatch {
                what: "weights",
                expected: n,
                found: expanded.len(),
            });
        }
        if let Some(&value) = expanded
            .iter()
            .flatten()
            .find(|v| !v.is_finite() || **v < 0.0)
        {
            return Err(WarpError::InvalidCoefficient {
                name: "weight",
                value,
            });
        }
        Ok(expanded)
    }
}

/// Parameters for fitting a [`ThinPlateSpline`](crate::ThinPlateSpline).
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TpsParams {
    /// Bending energy penalty (default: 0).
    pub bend_coefs: RegCoefs,
    /// Penalty on deviation of the linear part from identity (default: 0).
    pub rot_coefs: RegCoefs,
    /// Residual weights (default: uniform).
    pub weights: PointWeights,
}

impl TpsParams {
    /// Creates parameters with no regularization and uniform weights.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bending penalty.
    #[must_use]
    pub fn with_bend_coefs(mut self, coefs: impl Into<RegCoefs>) -> Self {
        self.bend_coefs = coefs.into();
        self
    }

    /// Sets the rotation penalty.
    #[must_use]
    pub fn with_rot_coefs(mut self, coefs: impl Into<RegCoefs>) -> Self {
        self.rot_coefs = coefs.into();
        self
    }

    /// Sets the residual weights.
    #[must_use]
    pub fn with_weights(mut self, weights: PointWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Normalizes the coefficients to per-dimension arrays.
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::InvalidCoefficient`] for negative or non-finite
    /// coefficients.
    pub fn normalized_coefs(&self) -> WarpResult<([f64; 3], [f64; 3])> {
        Ok((
            self.bend_coefs.validate("bend coefficient")?,
            self.rot_coefs.validate("rotation coefficient")?,
        ))
    }
}
