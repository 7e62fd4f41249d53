//! Finger contact-point trajectories.
//!
//! A contact trajectory holds, for every finger of every active arm, the
//! four contact corners at each timestep. Flattened, the points are ordered
//! arm, then finger, then timestep, then corner; dual variables and
//! discrepancies use the same order.

use crate::{Kinematics, Manipulator, TransferError, TransferResult};
use lfd_types::{ArmSide, AugmentedTrajectory, FingerSide};
use lfd_warp::ThinPlateSpline;
use nalgebra::{DMatrix, Point3};

/// Contact corners of one finger over time.
#[derive(Debug, Clone, PartialEq)]
pub struct FingerPointsTrajectory {
    arm: ArmSide,
    finger: FingerSide,
    points: Vec<[Point3<f64>; 4]>,
}

impl FingerPointsTrajectory {
    /// Creates a finger trajectory.
    #[must_use]
    pub const fn new(arm: ArmSide, finger: FingerSide, points: Vec<[Point3<f64>; 4]>) -> Self {
        Self {
            arm,
            finger,
            points,
        }
    }

    /// The arm.
    #[must_use]
    pub const fn arm(&self) -> ArmSide {
        self.arm
    }

    /// The finger.
    #[must_use]
    pub const fn finger(&self) -> FingerSide {
        self.finger
    }

    /// Corners at each timestep.
    #[must_use]
    pub fn points(&self) -> &[[Point3<f64>; 4]] {
        &self.points
    }

    /// Number of timesteps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether there are no timesteps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Contact corners of every finger of every active arm.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactTrajectory {
    fingers: Vec<FingerPointsTrajectory>,
}

impl ContactTrajectory {
    /// Collects finger trajectories, ordering them by arm then finger.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::ContactLengthMismatch`] if the fingers do not
    /// all have the same number of timesteps.
    pub fn new(mut fingers: Vec<FingerPointsTrajectory>) -> TransferResult<Self> {
        fingers.sort_by_key(|f| (f.arm, f.finger));
        if let Some(first) = fingers.first() {
            let expected = first.len();
            if let Some(bad) = fingers.iter().find(|f| f.len() != expected) {
                return Err(TransferError::ContactLengthMismatch {
                    arm: bad.arm,
                    finger: bad.finger,
                    expected,
                    found: bad.len(),
                });
            }
        }
        Ok(Self { fingers })
    }

    /// Finger trajectories in flattening order.
    #[must_use]
    pub fn fingers(&self) -> &[FingerPointsTrajectory] {
        &self.fingers
    }

    /// Shared timestep count.
    #[must_use]
    pub fn n_steps(&self) -> usize {
        self.fingers.first().map_or(0, FingerPointsTrajectory::len)
    }

    /// Total number of contact points.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.fingers.len() * self.n_steps() * 4
    }

    /// All points in arm, finger, timestep, corner order.
    #[must_use]
    pub fn flatten(&self) -> Vec<Point3<f64>> {
        self.fingers
            .iter()
            .flat_map(|f| f.points.iter().flatten().copied())
            .collect()
    }

    /// A trajectory with the same layout holding `flat` points.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::StepCountMismatch`] if `flat` does not have
    /// [`ContactTrajectory::point_count`] points.
    pub fn with_flat(&self, flat: &[Point3<f64>]) -> TransferResult<Self> {
        if flat.len() != self.point_count() {
            return Err(TransferError::StepCountMismatch {
                expected: self.point_count(),
                found: flat.len(),
            });
        }
        let per_finger = self.n_steps() * 4;
        let fingers = self
            .fingers
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let chunk = &flat[i * per_finger..(i + 1) * per_finger];
                let points = chunk
                    .chunks_exact(4)
                    .map(|c| [c[0], c[1], c[2], c[3]])
                    .collect();
                FingerPointsTrajectory::new(f.arm, f.finger, points)
            })
            .collect();
        Ok(Self { fingers })
    }

    /// Maps every point through a warp.
    ///
    /// # Errors
    ///
    /// Propagates layout errors from [`ContactTrajectory::with_flat`].
    pub fn warped(&self, warp: &ThinPlateSpline) -> TransferResult<Self> {
        self.with_flat(&warp.transform_points(&self.flatten()))
    }
}

/// Contact points of a demonstration from its recorded end-effector poses.
///
/// # Errors
///
/// Returns an error if an arm of `manip` is missing from `traj` or the
/// fingers end up with different lengths.
pub fn demo_contacts(
    kinematics: &dyn Kinematics,
    traj: &AugmentedTrajectory,
    manip: &Manipulator,
) -> TransferResult<ContactTrajectory> {
    let mut fingers = Vec::with_capacity(manip.arms().len() * 2);
    for &arm in manip.arms() {
        let track = traj.arm(arm).ok_or_else(|| {
            TransferError::NoActiveArm(format!("{arm} arm missing from trajectory"))
        })?;
        for finger in FingerSide::BOTH {
            fingers.push(kinematics.finger_contact_points(
                arm,
                finger,
                &track.ee_poses,
                &track.finger_joints,
            )?);
        }
    }
    ContactTrajectory::new(fingers)
}

/// Contact points reached by a joint trajectory, via forward kinematics.
///
/// # Errors
///
/// Returns [`TransferError::DofMismatch`] if the trajectory does not have
/// the manipulator's column count.
pub fn achieved_contacts(
    kinematics: &dyn Kinematics,
    manip: &Manipulator,
    joint_traj: &DMatrix<f64>,
) -> TransferResult<ContactTrajectory> {
    let arm_dofs = kinematics.arm_dof_count();
    let expected = manip.dof_count(arm_dofs);
    if joint_traj.ncols() != expected {
        return Err(TransferError::DofMismatch {
            manip: manip.name(),
            expected,
            found: joint_traj.ncols(),
        });
    }

    let mut fingers = Vec::with_capacity(manip.arms().len() * 2);
    for (i, &arm) in manip.arms().iter().enumerate() {
        let offset = i * (arm_dofs + 1);
        let mut ee_poses = Vec::with_capacity(joint_traj.nrows());
        let mut finger_joints = Vec::with_capacity(joint_traj.nrows());
        for row in joint_traj.row_iter() {
            let joints: Vec<f64> = (0..arm_dofs).map(|j| row[offset + j]).collect();
            ee_poses.push(kinematics.end_effector_pose(arm, &joints));
            finger_joints.push(row[offset + arm_dofs]);
        }
        for finger in FingerSide::BOTH {
            fingers.push(kinematics.finger_contact_points(arm, finger, &ee_poses, &finger_joints)?);
        }
    }
    ContactTrajectory::new(fingers)
}
