//! Linear value function over scene features.

use crate::{SelectError, SelectResult};
use lfd_types::SceneState;
use nalgebra::DVector;
use std::sync::Arc;

/// Extracts a fixed-length feature vector from a scene.
pub trait SceneFeatures: Send + Sync {
    /// Features of `scene`.
    fn features(&self, scene: &SceneState) -> DVector<f64>;
}

/// Scores scenes as `features(scene) · weights`.
#[derive(Clone)]
pub struct ValueFunction {
    features: Arc<dyn SceneFeatures>,
    weights: DVector<f64>,
}

impl std::fmt::Debug for ValueFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueFunction")
            .field("weights", &self.weights)
            .finish_non_exhaustive()
    }
}

impl ValueFunction {
    /// Creates a value function.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::InvalidParameter`] if a weight is not finite.
    pub fn new(features: Arc<dyn SceneFeatures>, weights: DVector<f64>) -> SelectResult<Self> {
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(SelectError::InvalidParameter(
                "value weights must be finite".to_string(),
            ));
        }
        Ok(Self { features, weights })
    }

    /// The weights.
    #[must_use]
    pub const fn weights(&self) -> &DVector<f64> {
        &self.weights
    }

    /// Value of `scene`.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::FeatureDimension`] if the feature vector does
    /// not match the weights.
    pub fn evaluate(&self, scene: &SceneState) -> SelectResult<f64> {
        let features = self.features.features(scene);
        if features.len() != self.weights.len() {
            return Err(SelectError::FeatureDimension {
                expected: self.weights.len(),
                found: features.len(),
            });
        }
        Ok(features.dot(&self.weights))
    }
}
