//! Thin-plate-spline warps for demonstration transfer.
//!
//! This crate fits the smooth spatial warp that carries demonstration
//! geometry onto a new scene. Beyond plain regularized fitting it supports
//! *dual soft constraints*: linear penalties `Σ λ_b · f(τ_b)` on the warped
//! position of extra points. Changing those penalties only changes the
//! right-hand side of the normal equations, so [`ThinPlateSpline::refit`]
//! reuses the factorization computed by [`ThinPlateSpline::fit`].
//!
//! # Layer 0
//!
//! This is a Layer 0 crate depending only on `nalgebra`.
//!
//! # Quick Start
//!
//! ```
//! use lfd_warp::{DualConstraints, ThinPlateSpline, TpsParams};
//! use nalgebra::{Point3, Vector3};
//!
//! let source = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//!     Point3::new(0.0, 0.0, 1.0),
//!     Point3::new(0.6, 0.7, 0.4),
//! ];
//! let target: Vec<_> = source.iter().map(|p| p * 1.5).collect();
//!
//! let params = TpsParams::new().with_bend_coefs(0.1).with_rot_coefs(1e-4);
//! let mut warp = ThinPlateSpline::fit(&source, &target, &params, None).unwrap();
//!
//! // Penalize the warped x coordinate of one extra point.
//! let duals = DualConstraints::new(
//!     vec![Point3::new(0.5, 0.5, 0.5)],
//!     vec![Vector3::new(0.01, 0.0, 0.0)],
//! )
//! .unwrap();
//! warp.refit(Some(&duals)).unwrap();
//! assert!(warp.is_finite());
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod dual;
mod error;
mod params;
mod tps;

pub use dual::DualConstraints;
pub use error::{WarpError, WarpResult};
pub use params::{PointWeights, RegCoefs, TpsParams};
pub use tps::{ThinPlateSpline, WarpObjective, tps_kernel};
