//! End-to-end transfer through every strategy.

use approx::assert_relative_eq;
use lfd_transfer::testing::{
    IndexRegistration, PointRobot, TargetSolver, bimanual_demo, line_demo, shifted_scene,
};
use lfd_transfer::{
    DecompositionParams, FingerTrajectoryTransferer, RegistrationFactory, StrategyKind,
    Termination, TrajectoryTransferer, TransferParams, TransferStrategy,
};
use lfd_types::ArmSide;
use lfd_warp::TpsParams;
use nalgebra::Vector3;
use std::sync::Arc;

fn offset() -> Vector3<f64> {
    Vector3::new(0.08, 0.03, -0.02)
}

fn factory() -> Arc<dyn RegistrationFactory> {
    Arc::new(IndexRegistration::new(
        TpsParams::new().with_bend_coefs(0.1).with_rot_coefs(1e-3),
    ))
}

fn strategy(kind: StrategyKind, robot: PointRobot, params: TransferParams) -> TransferStrategy {
    let transferer: Arc<dyn TrajectoryTransferer> = Arc::new(
        FingerTrajectoryTransferer::new(
            Arc::new(robot.clone()),
            Arc::new(TargetSolver::new(robot)),
            params.clone(),
        )
        .unwrap(),
    );
    TransferStrategy::build(kind, factory(), transferer, params, DecompositionParams::new())
        .unwrap()
}

fn params() -> TransferParams {
    TransferParams::new().with_collision_cost(false)
}

#[test]
fn registration_maps_demo_scene_onto_test_scene() {
    let demo = line_demo("reach", ArmSide::Right);
    let scene = shifted_scene(offset());

    let registration = factory().register(&demo, &scene).unwrap();
    let warped = registration.warp.transform_points(demo.scene.cloud());

    for (w, s) in warped.iter().zip(scene.cloud()) {
        assert_relative_eq!(*w, *s, epsilon = 1e-6);
    }
}

#[test]
fn bimanual_decomposed_transfer_drives_both_arms() {
    let demo = bimanual_demo("both", false);
    let outcome = strategy(StrategyKind::Decomposed, PointRobot::new(), params())
        .transfer(&demo, &shifted_scene(offset()))
        .unwrap();

    assert_eq!(outcome.manipulator.arms(), &[ArmSide::Left, ArmSide::Right]);
    assert_eq!(outcome.diagnostics.termination, Termination::Converged);
    assert_eq!(outcome.joint_trajectory.ncols(), 8);

    for (arm, y) in [(ArmSide::Left, 0.1), (ArmSide::Right, -0.1)] {
        let track = outcome.trajectory.arm(arm).unwrap();
        let start = track.ee_poses[0].translation.vector;
        assert_relative_eq!(start, Vector3::new(0.0, y, 0.5) + offset(), epsilon = 0.05);
        assert!(track.close_finger.iter().any(|&c| c));
    }
}

#[test]
fn idle_arm_is_left_out() {
    let demo = bimanual_demo("right_only", true);
    for kind in [StrategyKind::TwoStep, StrategyKind::Unified, StrategyKind::Decomposed] {
        let outcome = strategy(kind, PointRobot::new(), params())
            .transfer(&demo, &shifted_scene(offset()))
            .unwrap();
        assert_eq!(outcome.manipulator.arms(), &[ArmSide::Right]);
        assert!(outcome.trajectory.arm(ArmSide::Left).is_none());
    }
}

#[test]
fn unified_matches_two_step_without_duals() {
    let demo = line_demo("reach", ArmSide::Right);
    let scene = shifted_scene(offset());

    let two_step = strategy(StrategyKind::TwoStep, PointRobot::new(), params())
        .transfer(&demo, &scene)
        .unwrap();
    let unified = strategy(StrategyKind::Unified, PointRobot::new(), params())
        .transfer(&demo, &scene)
        .unwrap();

    assert_relative_eq!(
        two_step.joint_trajectory,
        unified.joint_trajectory,
        epsilon = 1e-12
    );
}

#[test]
fn fixed_start_keeps_current_configuration() {
    let start = Vector3::new(0.0, -0.1, 0.5) + offset();
    let robot = PointRobot::new().with_current(vec![
        0.0, 0.0, 0.0, 0.08, start.x, start.y, start.z, 0.08,
    ]);
    let params = params().with_start_fixed(true);
    let demo = line_demo("reach", ArmSide::Right);

    for kind in [StrategyKind::Unified, StrategyKind::Decomposed] {
        let outcome = strategy(kind, robot.clone(), params.clone())
            .transfer(&demo, &shifted_scene(offset()))
            .unwrap();
        let first = outcome.joint_trajectory.row(0);
        assert_relative_eq!(first[0], start.x, epsilon = 1e-12);
        assert_relative_eq!(first[1], start.y, epsilon = 1e-12);
        assert_relative_eq!(first[2], start.z, epsilon = 1e-12);
        assert_relative_eq!(first[3], 0.08, epsilon = 1e-12);
    }
}
