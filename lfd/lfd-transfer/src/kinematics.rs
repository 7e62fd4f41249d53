//! Robot kinematics collaborator and manipulator groups.

use crate::{FingerPointsTrajectory, TransferError, TransferResult};
use lfd_types::{ArmSide, FingerSide};
use nalgebra::{DVector, Isometry3, Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The group of arms a trajectory drives.
///
/// Joint trajectories for a manipulator have one column per degree of
/// freedom: for each arm in order, its arm joints followed by its finger
/// joint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Manipulator {
    arms: Vec<ArmSide>,
}

impl Manipulator {
    /// Creates a manipulator over the given arms (sorted, duplicates removed).
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::NoActiveArm`] if `arms` is empty.
    pub fn new(arms: &[ArmSide]) -> TransferResult<Self> {
        let mut arms = arms.to_vec();
        arms.sort_unstable();
        arms.dedup();
        if arms.is_empty() {
            return Err(TransferError::NoActiveArm("manipulator".to_string()));
        }
        Ok(Self { arms })
    }

    /// A single-arm manipulator.
    #[must_use]
    pub fn single(arm: ArmSide) -> Self {
        Self { arms: vec![arm] }
    }

    /// Arms in column order.
    #[must_use]
    pub fn arms(&self) -> &[ArmSide] {
        &self.arms
    }

    /// Manipulator name, e.g. `rightarm+r_gripper_l_finger_joint`.
    #[must_use]
    pub fn name(&self) -> String {
        self.arms
            .iter()
            .map(|arm| format!("{}+{}_gripper_l_finger_joint", arm.arm_name(), arm.prefix()))
            .collect::<Vec<_>>()
            .join("+")
    }

    /// Total columns of a joint trajectory for this manipulator.
    #[must_use]
    pub fn dof_count(&self, arm_dofs: usize) -> usize {
        self.arms.len() * (arm_dofs + 1)
    }

    /// First column of `arm`'s block, if the arm is part of the group.
    #[must_use]
    pub fn arm_offset(&self, arm: ArmSide, arm_dofs: usize) -> Option<usize> {
        self.arms
            .iter()
            .position(|&a| a == arm)
            .map(|i| i * (arm_dofs + 1))
    }
}

/// Kinematic queries on the robot.
///
/// Degree-of-freedom indices refer to the robot's full joint vector;
/// [`Kinematics::dof_indices`] maps a manipulator's trajectory columns onto
/// them.
pub trait Kinematics: Send + Sync {
    /// Number of arm joints per arm, excluding the finger joint.
    fn arm_dof_count(&self) -> usize;

    /// Robot DOF index of every trajectory column of `manip`, in column order.
    fn dof_indices(&self, manip: &Manipulator) -> Vec<usize>;

    /// Current value of every robot DOF.
    fn current_dof_values(&self) -> DVector<f64>;

    /// Lower and upper limit of every robot DOF.
    fn dof_limits(&self) -> (DVector<f64>, DVector<f64>);

    /// Whether a robot DOF is a continuous (wrapping) joint.
    fn is_wrapping_dof(&self, dof: usize) -> bool;

    /// Robot DOF index of the arm's shoulder-lift joint.
    fn shoulder_lift_dof(&self, arm: ArmSide) -> usize;

    /// Forward kinematics of the end effector from the arm joints.
    fn end_effector_pose(&self, arm: ArmSide, arm_joints: &[f64]) -> Isometry3<f64>;

    /// Pose of a finger tip link given the end-effector pose and finger joint.
    fn finger_pose(
        &self,
        arm: ArmSide,
        finger: FingerSide,
        ee_pose: &Isometry3<f64>,
        finger_joint: f64,
    ) -> Isometry3<f64>;

    /// The four contact corners of a finger in its tip link frame.
    fn relative_finger_points(&self, finger: FingerSide) -> [Vector3<f64>; 4];

    /// Name of the finger tip link used in contact costs.
    fn finger_link_name(&self, arm: ArmSide, finger: FingerSide) -> String {
        format!(
            "{}_gripper_{}_finger_tip_link",
            arm.prefix(),
            finger.prefix()
        )
    }

    /// World positions of a finger's contact corners along a trajectory.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::ContactLengthMismatch`] if the pose and
    /// finger joint sequences differ in length.
    fn finger_contact_points(
        &self,
        arm: ArmSide,
        finger: FingerSide,
        ee_poses: &[Isometry3<f64>],
        finger_joints: &[f64],
    ) -> TransferResult<FingerPointsTrajectory> {
        if ee_poses.len() != finger_joints.len() {
            return Err(TransferError::ContactLengthMismatch {
                arm,
                finger,
                expected: ee_poses.len(),
                found: finger_joints.len(),
            });
        }
        let rel = self.relative_finger_points(finger);
        let points = ee_poses
            .iter()
            .zip(finger_joints)
            .map(|(ee, &joint)| {
                let pose = self.finger_pose(arm, finger, ee, joint);
                rel.map(|r| pose * Point3::from(r))
            })
            .collect();
        Ok(FingerPointsTrajectory::new(arm, finger, points))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_manipulator_name() {
        assert_eq!(
            Manipulator::single(ArmSide::Right).name(),
            "rightarm+r_gripper_l_finger_joint"
        );
        let both = Manipulator::new(&[ArmSide::Right, ArmSide::Left, ArmSide::Right]).unwrap();
        assert_eq!(both.arms(), &[ArmSide::Left, ArmSide::Right]);
        assert_eq!(
            both.name(),
            "leftarm+l_gripper_l_finger_joint+rightarm+r_gripper_l_finger_joint"
        );
    }

    #[test]
    fn test_column_layout() {
        let both = Manipulator::new(&ArmSide::BOTH).unwrap();
        assert_eq!(both.dof_count(7), 16);
        assert_eq!(both.arm_offset(ArmSide::Right, 7), Some(8));
        let right = Manipulator::single(ArmSide::Right);
        assert_eq!(right.arm_offset(ArmSide::Left, 7), None);
    }

    #[test]
    fn test_empty_manipulator() {
        assert!(matches!(
            Manipulator::new(&[]),
            Err(TransferError::NoActiveArm(_))
        ));
    }
}
