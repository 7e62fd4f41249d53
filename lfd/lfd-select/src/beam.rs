//! Multi-step lookahead by beam search over simulated transfers.
//!
//! At each depth every surviving plan is extended by every demonstration:
//! the demonstration is transferred onto the plan's scene, executed in a
//! fresh simulator spawned from the plan's snapshot, and the resulting scene
//! is scored by the value function. The `width` plans with the highest
//! cumulative value survive. Expansions are independent and run on the
//! rayon pool when `parallel` is set; survivors are chosen by a stable sort,
//! so ties keep parent order, then action order, in both modes.

use crate::{
    ActionSelection, Agenda, DemoTransfer, SelectError, SelectResult, Simulator,
    SimulatorFactory, ValueFunction,
};
use lfd_types::{Demonstration, SceneState};
use rayon::prelude::*;
use tracing::{debug, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Beam search settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BeamSearchParams {
    /// Plans kept per depth (default: 3).
    pub width: usize,
    /// Maximum plan length (default: 2).
    pub depth: usize,
    /// Expand branches on the rayon pool (default: true).
    pub parallel: bool,
}

impl Default for BeamSearchParams {
    fn default() -> Self {
        Self {
            width: 3,
            depth: 2,
            parallel: true,
        }
    }
}

impl BeamSearchParams {
    /// Creates parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the beam width.
    #[must_use]
    pub const fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Sets the search depth.
    #[must_use]
    pub const fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Enables or disables parallel expansion.
    #[must_use]
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Checks the settings.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::InvalidParameter`] if width or depth is zero.
    pub fn validate(&self) -> SelectResult<()> {
        if self.width == 0 {
            return Err(SelectError::InvalidParameter(
                "beam width must be at least 1".to_string(),
            ));
        }
        if self.depth == 0 {
            return Err(SelectError::InvalidParameter(
                "search depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// The best plan found by [`BeamSearch::search`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BeamPlan {
    /// Demonstration names in execution order.
    pub actions: Vec<String>,
    /// Value of the scene after each action.
    pub values: Vec<f64>,
    /// Sum of `values`.
    pub score: f64,
    /// Whether the final scene achieves the task.
    pub goal_reached: bool,
}

#[derive(Debug, Clone)]
struct Branch<S> {
    actions: Vec<String>,
    values: Vec<f64>,
    score: f64,
    state: Option<S>,
    scene: SceneState,
    goal_reached: bool,
}

impl<S> Branch<S> {
    fn into_plan(self) -> BeamPlan {
        BeamPlan {
            actions: self.actions,
            values: self.values,
            score: self.score,
            goal_reached: self.goal_reached,
        }
    }
}

/// Value-guided lookahead over candidate demonstrations.
pub struct BeamSearch<F, T> {
    demos: Vec<Demonstration>,
    transfer: T,
    factory: F,
    value: ValueFunction,
    params: BeamSearchParams,
}

impl<F, T> std::fmt::Debug for BeamSearch<F, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeamSearch")
            .field("demos", &self.demos.len())
            .field("value", &self.value)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl<F, T> BeamSearch<F, T>
where
    F: SimulatorFactory,
    T: DemoTransfer,
{
    /// Creates a search over `demos`, in their given order.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::InvalidParameter`] if `params` is invalid.
    pub fn new(
        demos: Vec<Demonstration>,
        transfer: T,
        factory: F,
        value: ValueFunction,
        params: BeamSearchParams,
    ) -> SelectResult<Self> {
        params.validate()?;
        Ok(Self {
            demos,
            transfer,
            factory,
            value,
            params,
        })
    }

    /// Search settings.
    #[must_use]
    pub const fn params(&self) -> &BeamSearchParams {
        &self.params
    }

    /// Searches for the best plan starting from `scene`.
    ///
    /// Failed expansions are pruned. If every expansion at some depth fails,
    /// the best plan of the previous depth is returned, which is the empty
    /// plan at the first depth.
    ///
    /// # Errors
    ///
    /// Returns an error only if no root simulator observing `scene` can be
    /// spawned (see [`SimulatorFactory::spawn_at`]).
    pub fn search(&self, scene: &SceneState) -> SelectResult<BeamPlan> {
        let root = self.factory.spawn_at(scene)?;
        let mut beam = vec![Branch {
            actions: Vec::new(),
            values: Vec::new(),
            score: 0.0,
            state: Some(root.state()),
            scene: scene.clone(),
            goal_reached: root.goal_reached(scene),
        }];
        if beam[0].goal_reached || self.demos.is_empty() {
            return Ok(beam.swap_remove(0).into_plan());
        }

        for depth in 0..self.params.depth {
            let jobs: Vec<(usize, usize)> = (0..beam.len())
                .flat_map(|p| (0..self.demos.len()).map(move |a| (p, a)))
                .collect();
            let expand = |&(p, a): &(usize, usize)| self.expand(&beam[p], &self.demos[a]);
            let results: Vec<SelectResult<Branch<_>>> = if self.params.parallel {
                jobs.par_iter().map(expand).collect()
            } else {
                jobs.iter().map(expand).collect()
            };

            let mut children = Vec::with_capacity(results.len());
            for (&(_, a), result) in jobs.iter().zip(results) {
                match result {
                    Ok(child) => children.push(child),
                    Err(err) => warn!(
                        depth,
                        demo = %self.demos[a].name,
                        error = %err,
                        "pruning failed branch"
                    ),
                }
            }
            if children.is_empty() {
                warn!(depth, "every branch failed, keeping best plan so far");
                break;
            }

            children.sort_by(|x, y| y.score.total_cmp(&x.score));
            if let Some(i) = children.iter().position(|c| c.goal_reached) {
                let goal = children.swap_remove(i);
                info!(depth, actions = ?goal.actions, score = goal.score, "goal reached");
                return Ok(goal.into_plan());
            }
            children.truncate(self.params.width);
            debug!(
                depth,
                expansions = jobs.len(),
                best = children[0].score,
                "beam depth complete"
            );
            beam = children;
        }

        let best = beam.swap_remove(0);
        info!(actions = ?best.actions, score = best.score, "beam search finished");
        Ok(best.into_plan())
    }

    fn expand(
        &self,
        parent: &Branch<<F::Sim as Simulator>::State>,
        demo: &Demonstration,
    ) -> SelectResult<Branch<<F::Sim as Simulator>::State>> {
        let mut sim = self.factory.spawn(parent.state.as_ref())?;
        let trajectory = self.transfer.transfer_demo(demo, &parent.scene)?;
        sim.execute(&trajectory)?;
        sim.reset_arms()?;
        let scene = sim.observe_scene()?;
        let value = self.value.evaluate(&scene)?;

        let mut actions = parent.actions.clone();
        actions.push(demo.name.clone());
        let mut values = parent.values.clone();
        values.push(value);
        Ok(Branch {
            actions,
            values,
            score: parent.score + value,
            state: Some(sim.state()),
            goal_reached: sim.goal_reached(&scene),
            scene,
        })
    }
}

impl<F, T> ActionSelection for BeamSearch<F, T>
where
    F: SimulatorFactory,
    T: DemoTransfer,
{
    fn plan_agenda(&self, scene: &SceneState) -> SelectResult<Agenda> {
        let plan = self.search(scene)?;
        Ok(Agenda {
            actions: plan.actions,
            values: plan.values,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::SceneFeatures;
    use lfd_types::{ArmSide, ArmTrack, AugmentedTrajectory};
    use nalgebra::{DVector, Isometry3, Point3};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TARGET: f64 = 1.3;

    /// Moves a single point along x by each trajectory's first gripper x.
    struct LineSim {
        x: f64,
    }

    impl Simulator for LineSim {
        type State = f64;

        fn state(&self) -> f64 {
            self.x
        }

        fn execute(&mut self, trajectory: &AugmentedTrajectory) -> SelectResult<()> {
            let track = trajectory
                .arm(ArmSide::Right)
                .ok_or_else(|| SelectError::Simulator("no right arm".to_string()))?;
            self.x += track.ee_poses[0].translation.x;
            Ok(())
        }

        fn reset_arms(&mut self) -> SelectResult<()> {
            Ok(())
        }

        fn observe_scene(&self) -> SelectResult<SceneState> {
            Ok(SceneState::new(vec![Point3::new(self.x, 0.0, 0.0)]))
        }

        fn goal_reached(&self, _scene: &SceneState) -> bool {
            (self.x - TARGET).abs() < 1e-9
        }
    }

    #[derive(Default)]
    struct LineSims {
        spawned: AtomicUsize,
    }

    impl SimulatorFactory for LineSims {
        type Sim = LineSim;

        fn spawn(&self, state: Option<&f64>) -> SelectResult<LineSim> {
            self.spawned.fetch_add(1, Ordering::SeqCst);
            Ok(LineSim {
                x: state.copied().unwrap_or(0.0),
            })
        }
    }

    /// Replays demonstrations, failing for the one named "broken".
    struct Replay;

    impl DemoTransfer for Replay {
        fn transfer_demo(
            &self,
            demo: &Demonstration,
            _scene: &SceneState,
        ) -> SelectResult<AugmentedTrajectory> {
            if demo.name == "broken" {
                return Err(SelectError::Simulator("transfer diverged".to_string()));
            }
            Ok(demo.aug_traj.clone())
        }
    }

    struct DistanceToTarget;

    impl SceneFeatures for DistanceToTarget {
        fn features(&self, scene: &SceneState) -> DVector<f64> {
            let x = scene.cloud()[0].x;
            DVector::from_vec(vec![-(x - TARGET).powi(2)])
        }
    }

    fn demo(name: &str, shift: f64) -> Demonstration {
        let track = ArmTrack::new(
            vec![Isometry3::translation(shift, 0.0, 0.0); 2],
            vec![DVector::zeros(1); 2],
            vec![0.0; 2],
        );
        Demonstration::new(
            name,
            SceneState::new(Vec::new()),
            AugmentedTrajectory::single(ArmSide::Right, track).unwrap(),
        )
    }

    fn demos() -> Vec<Demonstration> {
        vec![demo("a", 1.0), demo("b", 0.5), demo("c", -0.3)]
    }

    fn value() -> ValueFunction {
        ValueFunction::new(Arc::new(DistanceToTarget), DVector::from_vec(vec![1.0])).unwrap()
    }

    fn search(demos: Vec<Demonstration>, params: BeamSearchParams) -> BeamPlan {
        BeamSearch::new(demos, Replay, LineSims::default(), value(), params)
            .unwrap()
            .search(&SceneState::new(vec![Point3::origin()]))
            .unwrap()
    }

    fn origin_scene() -> SceneState {
        SceneState::new(vec![Point3::origin()])
    }

    #[test]
    fn test_width_one_is_greedy_walk() {
        let demos = demos();
        let plan = search(
            demos.clone(),
            BeamSearchParams::new().with_width(1).with_depth(3),
        );

        let mut x = 0.0;
        let mut walk = Vec::new();
        for _ in 0..3 {
            let mut best: Option<(&str, f64, f64)> = None;
            for d in &demos {
                let next = x + d.aug_traj.arm(ArmSide::Right).unwrap().ee_poses[0].translation.x;
                let v = -(next - TARGET).powi(2);
                if best.is_none_or(|(_, bv, _)| v > bv) {
                    best = Some((d.name.as_str(), v, next));
                }
            }
            let (name, _, next) = best.unwrap();
            walk.push(name.to_string());
            x = next;
        }

        assert_eq!(plan.actions, walk);
        assert_eq!(plan.actions, ["a", "b", "c"]);
        assert!(!plan.goal_reached);
        assert!((plan.score - plan.values.iter().sum::<f64>()).abs() < 1e-12);
    }

    #[test]
    fn test_stops_at_goal() {
        let plan = search(
            vec![demo("far", 2.0), demo("exact", TARGET), demo("near", 1.0)],
            BeamSearchParams::new().with_width(2).with_depth(4),
        );
        assert_eq!(plan.actions, ["exact"]);
        assert!(plan.goal_reached);
    }

    #[test]
    fn test_wider_beam_finds_better_plan() {
        // greedy takes "a" first and overshoots on the second step
        let demos = vec![demo("a", 1.0), demo("b", 0.65)];
        let narrow = search(demos.clone(), BeamSearchParams::new().with_width(1).with_depth(2));
        let wide = search(demos, BeamSearchParams::new().with_width(2).with_depth(2));

        assert_eq!(narrow.actions, ["a", "b"]);
        assert!(!narrow.goal_reached);
        assert!(wide.goal_reached);
        assert_eq!(wide.actions, ["b", "b"]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut demos = demos();
        demos.push(demo("d", 0.2));
        let params = BeamSearchParams::new().with_width(3).with_depth(3);

        let sequential = search(demos.clone(), params.with_parallel(false));
        let parallel = search(demos, params.with_parallel(true));

        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_failed_branches_are_pruned() {
        let mut demos = demos();
        demos.insert(0, demo("broken", 1.3));
        let plan = search(demos, BeamSearchParams::new().with_width(1).with_depth(3));
        assert!(plan.actions.iter().all(|a| a != "broken"));
        assert_eq!(plan.actions, ["a", "b", "c"]);
    }

    #[test]
    fn test_all_failures_return_empty_plan() {
        let plan = search(
            vec![demo("broken", 1.0)],
            BeamSearchParams::new().with_depth(2),
        );
        assert!(plan.actions.is_empty());
        assert_eq!(plan.score, 0.0);
    }

    #[test]
    fn test_root_must_observe_search_scene() {
        let beam = BeamSearch::new(
            demos(),
            Replay,
            LineSims::default(),
            value(),
            BeamSearchParams::new(),
        )
        .unwrap();

        let err = beam
            .search(&SceneState::new(vec![Point3::new(0.7, 0.0, 0.0)]))
            .unwrap_err();

        assert!(matches!(err, SelectError::Simulator(_)));
    }

    #[test]
    fn test_plan_agenda_reports_values() {
        let beam = BeamSearch::new(
            demos(),
            Replay,
            LineSims::default(),
            value(),
            BeamSearchParams::new().with_width(1).with_depth(1),
        )
        .unwrap();
        let agenda = beam.plan_agenda(&origin_scene()).unwrap();
        assert_eq!(agenda.actions, ["a"]);
        assert!((agenda.values[0] + 0.09).abs() < 1e-12);
    }

    #[test]
    fn test_zero_width_rejected() {
        let err = BeamSearch::new(
            demos(),
            Replay,
            LineSims::default(),
            value(),
            BeamSearchParams::new().with_width(0),
        )
        .unwrap_err();
        assert!(matches!(err, SelectError::InvalidParameter(_)));
    }
}
