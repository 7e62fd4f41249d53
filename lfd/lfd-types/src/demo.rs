//! Recorded demonstrations.

use crate::{AugmentedTrajectory, SceneState};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A named demonstration: the scene it was recorded on and the motion.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Demonstration {
    /// Unique action name.
    pub name: String,
    /// Scene observed before the motion.
    pub scene: SceneState,
    /// Recorded motion.
    pub aug_traj: AugmentedTrajectory,
}

impl Demonstration {
    /// Creates a demonstration.
    #[must_use]
    pub fn new(name: impl Into<String>, scene: SceneState, aug_traj: AugmentedTrajectory) -> Self {
        Self {
            name: name.into(),
            scene,
            aug_traj,
        }
    }
}
