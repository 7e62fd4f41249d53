//! Observed scene state.

use crate::{TrajectoryError, TrajectoryResult};
use nalgebra::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A captured point cloud with optional per-point color.
///
/// Scene states are immutable once captured; the cloud is unordered.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SceneState {
    cloud: Vec<Point3<f64>>,
    color: Option<Vec<[f64; 3]>>,
}

impl SceneState {
    /// Creates an uncolored scene.
    #[must_use]
    pub const fn new(cloud: Vec<Point3<f64>>) -> Self {
        Self { cloud, color: None }
    }

    /// Creates a colored scene.
    ///
    /// # Errors
    ///
    /// Returns [`TrajectoryError::ColorCountMismatch`] if `color` does not
    /// have one entry per point.
    pub fn with_color(cloud: Vec<Point3<f64>>, color: Vec<[f64; 3]>) -> TrajectoryResult<Self> {
        if cloud.len() != color.len() {
            return Err(TrajectoryError::ColorCountMismatch {
                points: cloud.len(),
                colors: color.len(),
            });
        }
        Ok(Self {
            cloud,
            color: Some(color),
        })
    }

    /// The point cloud.
    #[must_use]
    pub fn cloud(&self) -> &[Point3<f64>] {
        &self.cloud
    }

    /// Per-point RGB color, if captured.
    #[must_use]
    pub fn color(&self) -> Option<&[[f64; 3]]> {
        self.color.as_deref()
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cloud.len()
    }

    /// Whether the cloud is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cloud.is_empty()
    }

    /// Centroid of the cloud, or `None` for an empty scene.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.cloud.is_empty() {
            return None;
        }
        let sum = self
            .cloud
            .iter()
            .fold(nalgebra::Vector3::zeros(), |acc, p| acc + p.coords);
        Some(Point3::from(sum / self.cloud.len() as f64))
    }
}
