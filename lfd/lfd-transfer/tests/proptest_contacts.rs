//! Property-based tests for contact layouts and joint unwrapping.

#![allow(clippy::unwrap_used)]

use lfd_transfer::{ContactTrajectory, FingerPointsTrajectory, unwrap_column};
use lfd_types::{ArmSide, FingerSide};
use nalgebra::{DMatrix, Point3};
use proptest::prelude::*;
use std::f64::consts::PI;

fn corners() -> impl Strategy<Value = [Point3<f64>; 4]> {
    prop::array::uniform4(prop::array::uniform3(-1.0f64..1.0))
        .prop_map(|c| c.map(|p| Point3::new(p[0], p[1], p[2])))
}

fn contacts() -> impl Strategy<Value = ContactTrajectory> {
    (1usize..6, 1usize..5).prop_flat_map(|(steps, fingers)| {
        prop::collection::vec(prop::collection::vec(corners(), steps), fingers).prop_map(
            |per_finger| {
                let slots = [
                    (ArmSide::Right, FingerSide::Right),
                    (ArmSide::Left, FingerSide::Left),
                    (ArmSide::Right, FingerSide::Left),
                    (ArmSide::Left, FingerSide::Right),
                ];
                let fingers = per_finger
                    .into_iter()
                    .zip(slots)
                    .map(|(points, (arm, finger))| FingerPointsTrajectory::new(arm, finger, points))
                    .collect();
                ContactTrajectory::new(fingers).unwrap()
            },
        )
    })
}

proptest! {
    #[test]
    fn flat_layout_rebuilds_same_trajectory(traj in contacts()) {
        let flat = traj.flatten();
        prop_assert_eq!(flat.len(), traj.point_count());
        prop_assert_eq!(traj.with_flat(&flat).unwrap(), traj);
    }

    #[test]
    fn fingers_are_ordered_by_arm_then_finger(traj in contacts()) {
        let keys: Vec<_> = traj.fingers().iter().map(|f| (f.arm(), f.finger())).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        prop_assert_eq!(keys, sorted);
    }

    #[test]
    fn wrong_flat_length_is_rejected(traj in contacts()) {
        let mut flat = traj.flatten();
        flat.pop();
        prop_assert!(traj.with_flat(&flat).is_err());
    }

    #[test]
    fn unwrapped_column_has_no_jumps(values in prop::collection::vec(-PI..PI, 1..30)) {
        let original = DMatrix::from_column_slice(values.len(), 1, &values);
        let mut unwrapped = original.clone();
        unwrap_column(&mut unwrapped, 0);

        prop_assert!((unwrapped[(0, 0)] - original[(0, 0)]).abs() < 1e-12);
        for t in 1..values.len() {
            prop_assert!((unwrapped[(t, 0)] - unwrapped[(t - 1, 0)]).abs() <= PI + 1e-9);
            let turns = (unwrapped[(t, 0)] - original[(t, 0)]) / (2.0 * PI);
            prop_assert!((turns - turns.round()).abs() < 1e-9);
        }
    }
}
