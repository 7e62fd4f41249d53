//! Registration collaborator: correspondences plus the fitted warp.

use crate::TransferResult;
use lfd_types::{Demonstration, SceneState};
use lfd_warp::{ThinPlateSpline, TpsParams};
use nalgebra::Point3;

/// The family of warp a registration factory produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationKind {
    /// Thin-plate spline whose correspondences can be refitted.
    ThinPlateSpline,
    /// Rigid alignment only; the warp cannot be refitted.
    Rigid,
}

/// Output of the registration primitive for one demonstration and scene.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Name of the registered demonstration.
    pub demo_name: String,
    /// The scene registered onto.
    pub test_scene: SceneState,
    /// Correspondence source points (`x_na`).
    pub source: Vec<Point3<f64>>,
    /// Correspondence target points (`y_ng`).
    pub target: Vec<Point3<f64>>,
    /// Regularization and weights the warp was fitted with.
    pub params: TpsParams,
    /// The fitted warp.
    pub warp: ThinPlateSpline,
}

impl Registration {
    /// Fits a warp to the correspondences and wraps the result.
    ///
    /// # Errors
    ///
    /// Propagates warp fitting errors.
    pub fn fit(
        demo_name: impl Into<String>,
        test_scene: SceneState,
        source: Vec<Point3<f64>>,
        target: Vec<Point3<f64>>,
        params: TpsParams,
    ) -> TransferResult<Self> {
        let warp = ThinPlateSpline::fit(&source, &target, &params, None)?;
        Ok(Self {
            demo_name: demo_name.into(),
            test_scene,
            source,
            target,
            params,
            warp,
        })
    }
}

/// Registers demonstration scenes onto test scenes.
pub trait RegistrationFactory: Send + Sync {
    /// Warp family this factory produces.
    fn kind(&self) -> RegistrationKind;

    /// Registers `demo`'s scene onto `scene`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Registration`](crate::TransferError::Registration)
    /// if no registration can be found.
    fn register(&self, demo: &Demonstration, scene: &SceneState) -> TransferResult<Registration>;
}
