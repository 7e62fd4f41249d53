//! Mock collaborators for tests.
//!
//! [`PointRobot`] is a gripper that translates freely: its three arm joints
//! are the end-effector position. [`TargetSolver`] solves contact-following
//! requests for that robot in closed form, so transfer results can be
//! predicted exactly.

#![allow(
    clippy::cast_precision_loss,
    clippy::missing_panics_doc,
    clippy::expect_used
)]

use crate::request::CostTerm;
use crate::{
    Kinematics, Manipulator, OptimizationRequest, Registration, RegistrationFactory,
    RegistrationKind, SolveStatus, SolverOutput, TrajectorySolver, TransferError,
    TransferObserver, TransferOutcome, TransferResult, IterationReport,
};
use lfd_types::{ArmSide, ArmTrack, AugmentedTrajectory, Demonstration, FingerSide, SceneState};
use lfd_warp::TpsParams;
use nalgebra::{DVector, Isometry3, Point3, Translation3, Vector3};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A robot whose arm joints are the gripper's xyz position.
#[derive(Debug, Clone)]
pub struct PointRobot {
    current: DVector<f64>,
    wrapping: Vec<usize>,
}

impl Default for PointRobot {
    fn default() -> Self {
        Self::new()
    }
}

impl PointRobot {
    /// Lower limit of every DOF.
    pub const LOWER_LIMIT: f64 = -2.0;
    /// Upper limit of every DOF.
    pub const UPPER_LIMIT: f64 = 2.0;
    /// Corner half-size of a finger pad.
    pub const PAD: f64 = 0.01;

    /// Robot at the origin with open grippers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: DVector::from_vec(vec![0.0, 0.0, 0.0, 0.08, 0.0, 0.0, 0.0, 0.08]),
            wrapping: Vec::new(),
        }
    }

    /// Sets the current configuration (8 DOFs: left xyz, left finger,
    /// right xyz, right finger). Joint limits cover the same DOFs.
    #[must_use]
    pub fn with_current(mut self, values: Vec<f64>) -> Self {
        self.current = DVector::from_vec(values);
        self
    }

    /// Marks a DOF as wrapping.
    #[must_use]
    pub fn with_wrapping(mut self, dof: usize) -> Self {
        self.wrapping.push(dof);
        self
    }

    /// Offset of a finger tip from the gripper for a finger opening.
    #[must_use]
    pub fn finger_offset(finger: FingerSide, finger_joint: f64) -> Vector3<f64> {
        match finger {
            FingerSide::Left => Vector3::new(0.0, finger_joint / 2.0, 0.0),
            FingerSide::Right => Vector3::new(0.0, -finger_joint / 2.0, 0.0),
        }
    }

    const fn base_dof(arm: ArmSide) -> usize {
        match arm {
            ArmSide::Left => 0,
            ArmSide::Right => 4,
        }
    }
}

impl Kinematics for PointRobot {
    fn arm_dof_count(&self) -> usize {
        3
    }

    fn dof_indices(&self, manip: &Manipulator) -> Vec<usize> {
        manip
            .arms()
            .iter()
            .flat_map(|&arm| {
                let base = Self::base_dof(arm);
                base..base + 4
            })
            .collect()
    }

    fn current_dof_values(&self) -> DVector<f64> {
        self.current.clone()
    }

    fn dof_limits(&self) -> (DVector<f64>, DVector<f64>) {
        (
            DVector::from_element(self.current.len(), Self::LOWER_LIMIT),
            DVector::from_element(self.current.len(), Self::UPPER_LIMIT),
        )
    }

    fn is_wrapping_dof(&self, dof: usize) -> bool {
        self.wrapping.contains(&dof)
    }

    fn shoulder_lift_dof(&self, arm: ArmSide) -> usize {
        Self::base_dof(arm) + 2
    }

    fn end_effector_pose(&self, _arm: ArmSide, arm_joints: &[f64]) -> Isometry3<f64> {
        Isometry3::translation(arm_joints[0], arm_joints[1], arm_joints[2])
    }

    fn finger_pose(
        &self,
        _arm: ArmSide,
        finger: FingerSide,
        ee_pose: &Isometry3<f64>,
        finger_joint: f64,
    ) -> Isometry3<f64> {
        ee_pose * Translation3::from(Self::finger_offset(finger, finger_joint))
    }

    fn relative_finger_points(&self, _finger: FingerSide) -> [Vector3<f64>; 4] {
        let p = Self::PAD;
        [
            Vector3::new(p, 0.0, p),
            Vector3::new(p, 0.0, -p),
            Vector3::new(-p, 0.0, p),
            Vector3::new(-p, 0.0, -p),
        ]
    }
}

/// Solves contact-following requests for [`PointRobot`] exactly.
///
/// Each timestep's gripper position is the mean of the positions that put
/// each contact corner on its target. Targets of dual terms are shifted by
/// `−λ / (2c)`, the minimizer of `c‖p − x‖² + λ·p`. Timesteps without
/// contact terms keep the initial guess.
#[derive(Debug)]
pub struct TargetSolver {
    robot: PointRobot,
    status: SolveStatus,
    produce_nan: bool,
    calls: AtomicUsize,
}

impl TargetSolver {
    /// A solver that always converges.
    #[must_use]
    pub const fn new(robot: PointRobot) -> Self {
        Self {
            robot,
            status: SolveStatus::Converged,
            produce_nan: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Reports `status` on every solve.
    #[must_use]
    pub const fn with_status(mut self, status: SolveStatus) -> Self {
        self.status = status;
        self
    }

    /// Corrupts every returned trajectory with a NaN.
    #[must_use]
    pub const fn producing_nan(mut self) -> Self {
        self.produce_nan = true;
        self
    }

    /// Number of solves so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn parse_link(link: &str) -> Option<(ArmSide, FingerSide)> {
    let mut parts = link.split('_');
    let arm = match parts.next()? {
        "l" => ArmSide::Left,
        "r" => ArmSide::Right,
        _ => return None,
    };
    let finger = match parts.nth(1)? {
        "l" => FingerSide::Left,
        "r" => FingerSide::Right,
        _ => return None,
    };
    Some((arm, finger))
}

impl TrajectorySolver for TargetSolver {
    fn solve(&self, request: &OptimizationRequest) -> TransferResult<SolverOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut traj = request
            .init_trajectory()
            .ok_or_else(|| TransferError::Solver("missing initial trajectory".to_string()))?;
        let arms: Vec<ArmSide> = request
            .basic_info
            .manip
            .split('+')
            .filter_map(|part| match part {
                "leftarm" => Some(ArmSide::Left),
                "rightarm" => Some(ArmSide::Right),
                _ => None,
            })
            .collect();

        let mut sums: BTreeMap<(ArmSide, usize), (Vector3<f64>, usize)> = BTreeMap::new();
        for cost in &request.costs {
            let (link, timestep, targets): (&str, usize, Vec<Vector3<f64>>) = match cost {
                CostTerm::RelPts(p) => (
                    p.link.as_str(),
                    p.timestep,
                    p.xyzs.iter().map(|x| Vector3::from(*x)).collect(),
                ),
                CostTerm::RelPtsLambdas(p) => (
                    p.link.as_str(),
                    p.timestep,
                    p.xyzs
                        .iter()
                        .zip(&p.lambdas)
                        .map(|(x, l)| {
                            Vector3::from_fn(|g, _| x[g] - l[g] / (2.0 * p.pos_coeffs[g]))
                        })
                        .collect(),
                ),
                _ => continue,
            };
            let (arm, finger) = parse_link(link)
                .ok_or_else(|| TransferError::Solver(format!("unknown link {link}")))?;
            let col = arms
                .iter()
                .position(|&a| a == arm)
                .map(|i| i * 4)
                .ok_or_else(|| TransferError::Solver(format!("link {link} not in manipulator")))?;
            if timestep >= traj.nrows() {
                return Err(TransferError::Solver(format!("timestep {timestep} out of range")));
            }
            let offset = PointRobot::finger_offset(finger, traj[(timestep, col + 3)]);
            let rel = self.robot.relative_finger_points(finger);
            let entry = sums
                .entry((arm, timestep))
                .or_insert((Vector3::zeros(), 0));
            for (target, r) in targets.iter().zip(rel) {
                entry.0 += target - r - offset;
                entry.1 += 1;
            }
        }

        for ((arm, t), (sum, count)) in sums {
            if let Some(i) = arms.iter().position(|&a| a == arm) {
                let ee = sum / count as f64;
                for g in 0..3 {
                    traj[(t, i * 4 + g)] = ee[g];
                }
            }
        }
        if self.produce_nan && traj.nrows() > 0 {
            let last = traj.nrows() - 1;
            traj[(last, 0)] = f64::NAN;
        }
        Ok(SolverOutput {
            trajectory: traj,
            objective: 0.0,
            status: self.status,
        })
    }
}

/// Registration that pairs demo and test scene points by index.
#[derive(Debug, Clone)]
pub struct IndexRegistration {
    kind: RegistrationKind,
    params: TpsParams,
}

impl IndexRegistration {
    /// A spline factory fitting with `params`.
    #[must_use]
    pub const fn new(params: TpsParams) -> Self {
        Self {
            kind: RegistrationKind::ThinPlateSpline,
            params,
        }
    }

    /// A factory that declares rigid registrations.
    #[must_use]
    pub fn rigid() -> Self {
        Self {
            kind: RegistrationKind::Rigid,
            params: TpsParams::new().with_bend_coefs(1e3),
        }
    }
}

impl RegistrationFactory for IndexRegistration {
    fn kind(&self) -> RegistrationKind {
        self.kind
    }

    fn register(&self, demo: &Demonstration, scene: &SceneState) -> TransferResult<Registration> {
        if demo.scene.len() != scene.len() {
            return Err(TransferError::Registration(format!(
                "demo scene has {} points, test scene {}",
                demo.scene.len(),
                scene.len()
            )));
        }
        Registration::fit(
            demo.name.clone(),
            scene.clone(),
            demo.scene.cloud().to_vec(),
            scene.cloud().to_vec(),
            self.params.clone(),
        )
    }
}

/// Observer that records every checkpoint.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    /// Registrations seen.
    pub registrations: usize,
    /// Discrepancy reported at each iteration.
    pub discrepancies: Vec<f64>,
    /// Warped demonstration contacts at each iteration.
    pub warped: Vec<Vec<Point3<f64>>>,
    /// Dual variables at each iteration.
    pub lambdas: Vec<Vec<Vector3<f64>>>,
    /// Outcomes seen.
    pub finished: usize,
}

impl TransferObserver for RecordingObserver {
    fn on_registration(&mut self, _registration: &Registration) {
        self.registrations += 1;
    }

    fn on_iteration(&mut self, report: &IterationReport<'_>) {
        assert_eq!(report.warped_points.len(), report.achieved_points.len());
        self.discrepancies.push(report.discrepancy);
        self.warped.push(report.warped_points.to_vec());
        self.lambdas.push(report.lambdas.to_vec());
    }

    fn on_finished(&mut self, _outcome: &TransferOutcome) {
        self.finished += 1;
    }
}

/// A small non-coplanar cloud around the demonstration workspace.
#[must_use]
pub fn demo_cloud() -> Vec<Point3<f64>> {
    let mut cloud = Vec::new();
    for x in [-0.1, 0.2, 0.5] {
        for y in [-0.2, 0.2] {
            for z in [0.3, 0.7] {
                cloud.push(Point3::new(x, y, z));
            }
        }
    }
    cloud.push(Point3::new(0.15, 0.05, 0.45));
    cloud.push(Point3::new(0.35, -0.05, 0.55));
    cloud
}

/// The demonstration cloud moved by `offset`.
#[must_use]
pub fn shifted_scene(offset: Vector3<f64>) -> SceneState {
    SceneState::new(demo_cloud().iter().map(|p| p + offset).collect())
}

/// The demonstration cloud under a smooth non-affine deformation.
#[must_use]
pub fn bent_scene() -> SceneState {
    SceneState::new(
        demo_cloud()
            .iter()
            .map(|p| {
                Point3::new(
                    p.x + 0.3 * p.y * p.y,
                    p.y + 0.2 * p.x * p.z,
                    p.z + 0.25 * p.x * p.x,
                )
            })
            .collect(),
    )
}

fn reach_track(y: f64, moving: bool) -> ArmTrack {
    let n = 7;
    let x = |t: usize| if moving { 0.05 * t as f64 } else { 0.0 };
    let joints: Vec<DVector<f64>> = (0..n)
        .map(|t| DVector::from_vec(vec![x(t), y, 0.5]))
        .collect();
    let ee = joints
        .iter()
        .map(|q| Isometry3::translation(q[0], q[1], q[2]))
        .collect();
    let fingers = (0..n)
        .map(|t| if moving && t >= 4 { 0.0 } else { 0.08 })
        .collect();
    let mut close = vec![false; n];
    if moving {
        close[4] = true;
    }
    ArmTrack::new(ee, joints, fingers).with_events(vec![false; n], close)
}

/// A demonstration where one arm reaches along x and closes its gripper.
#[must_use]
pub fn line_demo(name: &str, arm: ArmSide) -> Demonstration {
    let y = match arm {
        ArmSide::Left => 0.1,
        ArmSide::Right => -0.1,
    };
    let traj = AugmentedTrajectory::single(arm, reach_track(y, true))
        .expect("single-arm track is consistent");
    Demonstration::new(name, SceneState::new(demo_cloud()), traj)
}

/// A two-arm demonstration; the left arm stays still when `left_idle`.
#[must_use]
pub fn bimanual_demo(name: &str, left_idle: bool) -> Demonstration {
    let arms = BTreeMap::from([
        (ArmSide::Left, reach_track(0.1, !left_idle)),
        (ArmSide::Right, reach_track(-0.1, true)),
    ]);
    let traj = AugmentedTrajectory::new(arms).expect("bimanual tracks are consistent");
    Demonstration::new(name, SceneState::new(demo_cloud()), traj)
}
