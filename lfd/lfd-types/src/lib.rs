//! Core data types for learning from demonstration.
//!
//! This crate provides the data model shared by the transfer and selection
//! crates:
//!
//! - [`SceneState`]: a captured point cloud with optional color
//! - [`ArmTrack`] / [`AugmentedTrajectory`]: per-arm joint motion, end-effector
//!   poses and gripper events over a shared timestep axis
//! - [`Demonstration`]: a named scene plus the motion recorded on it
//! - [`uniform_resample`] / [`demo_resample_timesteps`]: arc-length resampling
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with no robot or solver dependencies.
//!
//! # Quick Start
//!
//! ```
//! use lfd_types::{ArmSide, ArmTrack, AugmentedTrajectory};
//! use nalgebra::{DVector, Isometry3};
//!
//! let track = ArmTrack::new(
//!     vec![Isometry3::identity(), Isometry3::translation(0.1, 0.0, 0.0)],
//!     vec![DVector::zeros(7), DVector::from_element(7, 0.2)],
//!     vec![0.08, 0.0],
//! )
//! .with_events(vec![false, false], vec![false, true]);
//!
//! let traj = AugmentedTrajectory::single(ArmSide::Right, track).unwrap();
//! assert_eq!(traj.n_steps(), 2);
//! assert_eq!(traj.moved_arms(0.01), vec![ArmSide::Right]);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod demo;
mod error;
mod resample;
mod scene;
mod side;
mod trajectory;

pub use demo::Demonstration;
pub use error::{TrajectoryError, TrajectoryResult};
pub use resample::{ResampleParams, UniformResample, demo_resample_timesteps, uniform_resample};
pub use scene::SceneState;
pub use side::{ArmSide, FingerSide};
pub use trajectory::{ArmTrack, AugmentedTrajectory};
