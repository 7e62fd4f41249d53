//! Steps shared by every strategy: arm selection, resampling, initial
//! guesses and rebuilding augmented trajectories from joint trajectories.

use crate::{
    Kinematics, Manipulator, Registration, TrajectoryOptimizer, TrajectoryTransferer,
    TransferDiagnostics, TransferError, TransferOutcome, TransferParams, TransferResult,
    demo_contacts,
};
use lfd_types::{ArmTrack, AugmentedTrajectory, Demonstration, demo_resample_timesteps};
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Arms that move in the demonstration, as a manipulator.
pub(crate) fn active_manipulator(
    demo: &Demonstration,
    params: &TransferParams,
) -> TransferResult<Manipulator> {
    let arms = demo.aug_traj.moved_arms(params.arm_motion_tolerance);
    if arms.is_empty() {
        return Err(TransferError::NoActiveArm(demo.name.clone()));
    }
    Manipulator::new(&arms)
}

/// The demonstration restricted to `manip`'s arms and resampled uniformly.
pub(crate) fn resample_demo(
    demo: &Demonstration,
    manip: &Manipulator,
    params: &TransferParams,
) -> TransferResult<AugmentedTrajectory> {
    let restricted = demo.aug_traj.restricted_to(manip.arms());
    let timesteps = demo_resample_timesteps(&restricted, manip.arms(), &params.resample)?;
    let resampled = restricted.resampled(&timesteps)?;
    debug!(
        demo = %demo.name,
        original_steps = demo.aug_traj.n_steps(),
        resampled_steps = resampled.n_steps(),
        "resampled demonstration"
    );
    Ok(resampled)
}

/// Joint trajectory matrix of `traj` in `manip`'s column layout.
pub(crate) fn joint_trajectory(
    kinematics: &dyn Kinematics,
    manip: &Manipulator,
    traj: &AugmentedTrajectory,
) -> TransferResult<DMatrix<f64>> {
    let arm_dofs = kinematics.arm_dof_count();
    let n = traj.n_steps();
    let mut out = DMatrix::zeros(n, manip.dof_count(arm_dofs));
    for (i, &arm) in manip.arms().iter().enumerate() {
        let track = traj.arm(arm).ok_or_else(|| {
            TransferError::NoActiveArm(format!("{arm} arm missing from trajectory"))
        })?;
        if track.joint_count() != arm_dofs {
            return Err(TransferError::DofMismatch {
                manip: manip.name(),
                expected: arm_dofs,
                found: track.joint_count(),
            });
        }
        let offset = i * (arm_dofs + 1);
        for t in 0..n {
            for j in 0..arm_dofs {
                out[(t, offset + j)] = track.arm_joints[t][j];
            }
            out[(t, offset + arm_dofs)] = track.finger_joints[t];
        }
    }
    Ok(out)
}

/// Sets every shoulder-lift column to that joint's lower limit.
pub(crate) fn raise_shoulders(
    kinematics: &dyn Kinematics,
    manip: &Manipulator,
    traj: &mut DMatrix<f64>,
) -> TransferResult<()> {
    let dof_indices = kinematics.dof_indices(manip);
    let (lower, _) = kinematics.dof_limits();
    for &arm in manip.arms() {
        let dof = kinematics.shoulder_lift_dof(arm);
        if let Some(col) = dof_indices.iter().position(|&d| d == dof) {
            let limit = *lower.get(dof).ok_or_else(|| TransferError::DofMismatch {
                manip: manip.name(),
                expected: dof + 1,
                found: lower.len(),
            })?;
            traj.column_mut(col).fill(limit);
        }
    }
    Ok(())
}

/// Initial guess: a warm-start transfer if available, else the resampled
/// demonstration (optionally with raised shoulders).
pub(crate) fn initial_guess(
    kinematics: &dyn Kinematics,
    manip: &Manipulator,
    resampled: &AugmentedTrajectory,
    params: &TransferParams,
    warm_start: Option<(&Arc<dyn TrajectoryTransferer>, &Registration, &Demonstration)>,
) -> TransferResult<DMatrix<f64>> {
    if let Some((transferer, registration, demo)) = warm_start {
        let outcome = transferer.transfer(registration, demo)?;
        if outcome.manipulator != *manip {
            return Err(TransferError::WarmStartMismatch(format!(
                "warm start drives {}, expected {}",
                outcome.manipulator.name(),
                manip.name()
            )));
        }
        if outcome.joint_trajectory.nrows() != resampled.n_steps() {
            return Err(TransferError::WarmStartMismatch(format!(
                "warm start has {} steps, expected {}",
                outcome.joint_trajectory.nrows(),
                resampled.n_steps()
            )));
        }
        return Ok(outcome.joint_trajectory);
    }
    let mut guess = joint_trajectory(kinematics, manip, resampled)?;
    if params.raise_shoulder_init {
        raise_shoulders(kinematics, manip, &mut guess)?;
    }
    Ok(guess)
}

/// Rebuilds an augmented trajectory from joints, keeping `events`' gripper
/// open/close sequences.
pub(crate) fn to_augmented(
    kinematics: &dyn Kinematics,
    manip: &Manipulator,
    joint_traj: &DMatrix<f64>,
    events: &AugmentedTrajectory,
) -> TransferResult<AugmentedTrajectory> {
    let arm_dofs = kinematics.arm_dof_count();
    let n = joint_traj.nrows();
    if events.n_steps() != n {
        return Err(TransferError::StepCountMismatch {
            expected: events.n_steps(),
            found: n,
        });
    }
    let mut arms = BTreeMap::new();
    for (i, &arm) in manip.arms().iter().enumerate() {
        let source = events.arm(arm).ok_or_else(|| {
            TransferError::NoActiveArm(format!("{arm} arm missing from trajectory"))
        })?;
        let offset = i * (arm_dofs + 1);
        let arm_joints: Vec<DVector<f64>> = (0..n)
            .map(|t| {
                DVector::from_iterator(arm_dofs, (0..arm_dofs).map(|j| joint_traj[(t, offset + j)]))
            })
            .collect();
        let ee_poses = arm_joints
            .iter()
            .map(|q| kinematics.end_effector_pose(arm, q.as_slice()))
            .collect();
        let finger_joints = (0..n).map(|t| joint_traj[(t, offset + arm_dofs)]).collect();
        let track = ArmTrack::new(ee_poses, arm_joints, finger_joints)
            .with_events(source.open_finger.clone(), source.close_finger.clone());
        arms.insert(arm, track);
    }
    Ok(AugmentedTrajectory::new(arms)?)
}

/// One contact-following solve against a registration's warp.
pub(crate) fn single_shot(
    optimizer: &TrajectoryOptimizer,
    registration: &Registration,
    demo: &Demonstration,
    warm_start: Option<&Arc<dyn TrajectoryTransferer>>,
) -> TransferResult<TransferOutcome> {
    let kinematics = optimizer.kinematics();
    let params = optimizer.params();
    let manip = active_manipulator(demo, params)?;
    let resampled = resample_demo(demo, &manip, params)?;
    let init = initial_guess(
        kinematics,
        &manip,
        &resampled,
        params,
        warm_start.map(|w| (w, registration, demo)),
    )?;

    let targets = demo_contacts(kinematics, &resampled, &manip)?.warped(&registration.warp)?;
    let mut request = optimizer.base_request(&manip, &init)?;
    request.costs.extend(optimizer.contact_terms(&targets, None)?);
    let output = optimizer.run(&request, &manip)?;

    let trajectory = to_augmented(kinematics, &manip, &output.trajectory, &resampled)?;
    Ok(TransferOutcome {
        trajectory,
        joint_trajectory: output.trajectory,
        manipulator: manip,
        diagnostics: TransferDiagnostics::single_pass(output.objective, output.status),
    })
}
