//! Shared fixtures for cross-crate tests.
//!
//! [`TableSim`] is a tabletop where every arm that closes its gripper drags
//! the whole object cloud along with the gripper's net displacement. It is
//! enough to check that selection and transfer compose; it is not a physics
//! model.

#![allow(clippy::missing_panics_doc)]

use lfd_select::{CostOracle, SceneFeatures, SelectResult, Simulator, SimulatorFactory};
use lfd_transfer::testing::demo_cloud;
use lfd_types::{AugmentedTrajectory, Demonstration, SceneState};
use nalgebra::{DVector, Point3, Vector3};

/// A tabletop simulator over a point cloud.
#[derive(Debug, Clone)]
pub struct TableSim {
    cloud: Vec<Point3<f64>>,
    goal_x: f64,
    executed: usize,
}

impl TableSim {
    /// Number of trajectories executed.
    #[must_use]
    pub const fn executed(&self) -> usize {
        self.executed
    }
}

impl Simulator for TableSim {
    type State = Vec<Point3<f64>>;

    fn state(&self) -> Self::State {
        self.cloud.clone()
    }

    fn execute(&mut self, trajectory: &AugmentedTrajectory) -> SelectResult<()> {
        let mut shift = Vector3::zeros();
        for (_, track) in trajectory.arms() {
            if !track.close_finger.iter().any(|&c| c) {
                continue;
            }
            if let (Some(first), Some(last)) = (track.ee_poses.first(), track.ee_poses.last()) {
                shift += last.translation.vector - first.translation.vector;
            }
        }
        for p in &mut self.cloud {
            *p += shift;
        }
        self.executed += 1;
        Ok(())
    }

    fn reset_arms(&mut self) -> SelectResult<()> {
        Ok(())
    }

    fn observe_scene(&self) -> SelectResult<SceneState> {
        Ok(SceneState::new(self.cloud.clone()))
    }

    fn goal_reached(&self, scene: &SceneState) -> bool {
        scene.centroid().is_some_and(|c| c.x >= self.goal_x)
    }
}

/// Spawns [`TableSim`]s starting from the demonstration cloud.
#[derive(Debug, Clone)]
pub struct TableSims {
    start: Vec<Point3<f64>>,
    goal_x: f64,
}

impl TableSims {
    /// Simulators whose goal is dragging the cloud centroid at least
    /// `advance` along x.
    #[must_use]
    pub fn new(advance: f64) -> Self {
        let start = demo_cloud();
        let start_x = SceneState::new(start.clone()).centroid().map_or(0.0, |c| c.x);
        Self {
            start,
            goal_x: start_x + advance,
        }
    }

    /// The initial scene.
    #[must_use]
    pub fn start_scene(&self) -> SceneState {
        SceneState::new(self.start.clone())
    }
}

impl SimulatorFactory for TableSims {
    type Sim = TableSim;

    fn spawn(&self, state: Option<&Vec<Point3<f64>>>) -> SelectResult<TableSim> {
        Ok(TableSim {
            cloud: state.cloned().unwrap_or_else(|| self.start.clone()),
            goal_x: self.goal_x,
            executed: 0,
        })
    }
}

/// Features `[centroid x]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CentroidX;

impl SceneFeatures for CentroidX {
    fn features(&self, scene: &SceneState) -> DVector<f64> {
        DVector::from_element(1, scene.centroid().map_or(0.0, |c| c.x))
    }
}

/// Costs demonstrations by the distance between scene centroids.
#[derive(Debug, Clone)]
pub struct CentroidDistance {
    demos: Vec<Demonstration>,
}

impl CentroidDistance {
    /// An oracle over `demos`.
    #[must_use]
    pub const fn new(demos: Vec<Demonstration>) -> Self {
        Self { demos }
    }
}

impl CostOracle for CentroidDistance {
    fn batch_cost(&self, scene: &SceneState) -> SelectResult<Vec<(String, f64)>> {
        let target = scene.centroid().unwrap_or_else(Point3::origin);
        Ok(self
            .demos
            .iter()
            .map(|d| {
                let source = d.scene.centroid().unwrap_or_else(Point3::origin);
                (d.name.clone(), (target - source).norm())
            })
            .collect())
    }
}

/// `demo` recorded in a scene moved by `offset`, renamed to `name`.
#[must_use]
pub fn relocated(demo: &Demonstration, name: &str, offset: Vector3<f64>) -> Demonstration {
    let cloud = demo.scene.cloud().iter().map(|p| p + offset).collect();
    Demonstration::new(name, SceneState::new(cloud), demo.aug_traj.clone())
}
