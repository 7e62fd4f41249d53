//! Augmented trajectories: joint motion plus gripper events per arm.

use crate::{ArmSide, TrajectoryError, TrajectoryResult};
use nalgebra::{DVector, Isometry3, Translation3};
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Motion of one arm over a shared timestep axis.
///
/// Every sequence has one entry per timestep.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ArmTrack {
    /// End-effector pose at each timestep.
    pub ee_poses: Vec<Isometry3<f64>>,
    /// Arm joint values at each timestep.
    pub arm_joints: Vec<DVector<f64>>,
    /// Gripper finger joint at each timestep.
    pub finger_joints: Vec<f64>,
    /// Timesteps at which the gripper opens.
    pub open_finger: Vec<bool>,
    /// Timesteps at which the gripper closes.
    pub close_finger: Vec<bool>,
}

impl ArmTrack {
    /// Creates a track with no gripper events.
    #[must_use]
    pub fn new(
        ee_poses: Vec<Isometry3<f64>>,
        arm_joints: Vec<DVector<f64>>,
        finger_joints: Vec<f64>,
    ) -> Self {
        let n = ee_poses.len();
        Self {
            ee_poses,
            arm_joints,
            finger_joints,
            open_finger: vec![false; n],
            close_finger: vec![false; n],
        }
    }

    /// Replaces the gripper event sequences.
    #[must_use]
    pub fn with_events(mut self, open_finger: Vec<bool>, close_finger: Vec<bool>) -> Self {
        self.open_finger = open_finger;
        self.close_finger = close_finger;
        self
    }

    /// Number of timesteps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ee_poses.len()
    }

    /// Whether the track has no timesteps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ee_poses.is_empty()
    }

    /// Number of arm joints, taken from the first timestep.
    #[must_use]
    pub fn joint_count(&self) -> usize {
        self.arm_joints.first().map_or(0, DVector::len)
    }

    /// Checks that every sequence has the same length and joint dimension.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self, arm: ArmSide) -> TrajectoryResult<()> {
        let n = self.len();
        if n == 0 {
            return Err(TrajectoryError::Empty);
        }
        let lengths = [
            ("arm_joints", self.arm_joints.len()),
            ("finger_joints", self.finger_joints.len()),
            ("open_finger", self.open_finger.len()),
            ("close_finger", self.close_finger.len()),
        ];
        for (field, found) in lengths {
            if found != n {
                return Err(TrajectoryError::SequenceLengthMismatch {
                    arm,
                    field,
                    expected: n,
                    found,
                });
            }
        }
        let dof = self.joint_count();
        for (step, joints) in self.arm_joints.iter().enumerate() {
            if joints.len() != dof {
                return Err(TrajectoryError::JointCountMismatch {
                    arm,
                    step,
                    expected: dof,
                    found: joints.len(),
                });
            }
        }
        Ok(())
    }

    /// Whether any arm joint's range over the track exceeds `tolerance`.
    #[must_use]
    pub fn has_moved(&self, tolerance: f64) -> bool {
        (0..self.joint_count()).any(|j| {
            let (lo, hi) = self
                .arm_joints
                .iter()
                .map(|q| q[j])
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(v), hi.max(v))
                });
            hi - lo > tolerance
        })
    }

    fn resampled(&self, timesteps: &[f64]) -> Self {
        let n = self.len();
        let mut ee_poses = Vec::with_capacity(timesteps.len());
        let mut arm_joints = Vec::with_capacity(timesteps.len());
        let mut finger_joints = Vec::with_capacity(timesteps.len());

        for &t in timesteps {
            let (i, frac) = bracket(t, n);
            let j = (i + 1).min(n - 1);
            ee_poses.push(interpolate_pose(&self.ee_poses[i], &self.ee_poses[j], frac));
            arm_joints.push(self.arm_joints[i].lerp(&self.arm_joints[j], frac));
            finger_joints.push(
                self.finger_joints[i] + (self.finger_joints[j] - self.finger_joints[i]) * frac,
            );
        }

        Self {
            ee_poses,
            arm_joints,
            finger_joints,
            open_finger: move_events(&self.open_finger, timesteps),
            close_finger: move_events(&self.close_finger, timesteps),
        }
    }
}

/// Motion of every arm that takes part in a demonstration.
///
/// All present arms share one timestep count.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AugmentedTrajectory {
    arms: BTreeMap<ArmSide, ArmTrack>,
}

impl AugmentedTrajectory {
    /// Creates a trajectory after validating every track.
    ///
    /// # Errors
    ///
    /// Returns an error if a track is internally inconsistent or if two arms
    /// have different timestep counts.
    pub fn new(arms: BTreeMap<ArmSide, ArmTrack>) -> TrajectoryResult<Self> {
        let mut expected = None;
        for (&arm, track) in &arms {
            track.validate(arm)?;
            match expected {
                None => expected = Some(track.len()),
                Some(n) if n != track.len() => {
                    return Err(TrajectoryError::ArmLengthMismatch {
                        arm,
                        expected: n,
                        found: track.len(),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(Self { arms })
    }

    /// Creates a single-arm trajectory.
    ///
    /// # Errors
    ///
    /// Returns an error if the track is internally inconsistent.
    pub fn single(arm: ArmSide, track: ArmTrack) -> TrajectoryResult<Self> {
        Self::new(BTreeMap::from([(arm, track)]))
    }

    /// Track of one arm, if present.
    #[must_use]
    pub fn arm(&self, arm: ArmSide) -> Option<&ArmTrack> {
        self.arms.get(&arm)
    }

    /// Present arms and their tracks in canonical order.
    pub fn arms(&self) -> impl Iterator<Item = (ArmSide, &ArmTrack)> {
        self.arms.iter().map(|(&arm, track)| (arm, track))
    }

    /// Timestep count (zero when no arm is present).
    #[must_use]
    pub fn n_steps(&self) -> usize {
        self.arms.values().next().map_or(0, ArmTrack::len)
    }

    /// Arms whose joints move by more than `tolerance`.
    #[must_use]
    pub fn moved_arms(&self, tolerance: f64) -> Vec<ArmSide> {
        self.arms
            .iter()
            .filter(|(_, track)| track.has_moved(tolerance))
            .map(|(&arm, _)| arm)
            .collect()
    }

    /// Keeps only the listed arms.
    #[must_use]
    pub fn restricted_to(&self, arms: &[ArmSide]) -> Self {
        Self {
            arms: self
                .arms
                .iter()
                .filter(|(arm, _)| arms.contains(arm))
                .map(|(&arm, track)| (arm, track.clone()))
                .collect(),
        }
    }

    /// Samples the trajectory at fractional timesteps.
    ///
    /// Joints and end-effector translations are interpolated linearly and
    /// rotations spherically. Each gripper event moves to the output step
    /// whose timestep is closest to the event's original index.
    ///
    /// # Errors
    ///
    /// Returns [`TrajectoryError::TimestepOutOfRange`] if a timestep lies
    /// outside `[0, n_steps - 1]`, or [`TrajectoryError::Empty`] if the
    /// trajectory has no steps.
    pub fn resampled(&self, timesteps: &[f64]) -> TrajectoryResult<Self> {
        let n = self.n_steps();
        if n == 0 {
            return Err(TrajectoryError::Empty);
        }
        let last = n - 1;
        #[allow(clippy::cast_precision_loss)]
        let upper = last as f64 + 1e-9;
        if let Some(&bad) = timesteps
            .iter()
            .find(|&&t| !t.is_finite() || t < -1e-9 || t > upper)
        {
            return Err(TrajectoryError::TimestepOutOfRange {
                timestep: bad,
                last,
            });
        }
        Ok(Self {
            arms: self
                .arms
                .iter()
                .map(|(&arm, track)| (arm, track.resampled(timesteps)))
                .collect(),
        })
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn bracket(t: f64, n: usize) -> (usize, f64) {
    if n < 2 {
        return (0, 0.0);
    }
    let t = t.clamp(0.0, (n - 1) as f64);
    let i = (t.floor() as usize).min(n - 2);
    (i, t - i as f64)
}

fn interpolate_pose(a: &Isometry3<f64>, b: &Isometry3<f64>, frac: f64) -> Isometry3<f64> {
    let translation = a.translation.vector.lerp(&b.translation.vector, frac);
    let rotation = a
        .rotation
        .try_slerp(&b.rotation, frac, 1e-9)
        .unwrap_or(if frac < 0.5 { a.rotation } else { b.rotation });
    Isometry3::from_parts(Translation3::from(translation), rotation)
}

#[allow(clippy::cast_precision_loss)]
fn move_events(events: &[bool], timesteps: &[f64]) -> Vec<bool> {
    let mut moved = vec![false; timesteps.len()];
    for (index, _) in events.iter().enumerate().filter(|(_, e)| **e) {
        let target = index as f64;
        let nearest = timesteps
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (k, &t)| {
                let d = (t - target).abs();
                match best {
                    Some((_, bd)) if bd <= d => best,
                    _ => Some((k, d)),
                }
            });
        if let Some((k, _)) = nearest {
            moved[k] = true;
        }
    }
    moved
}
