//! Simulation collaborators used by lookahead search.

use crate::{SelectError, SelectResult};
use lfd_transfer::TransferStrategy;
use lfd_types::{AugmentedTrajectory, Demonstration, SceneState};
use tracing::debug;

/// A simulated workcell that executes transferred trajectories.
///
/// Simulators hold mutable physical state and are never shared; the search
/// spawns one per expansion from a snapshot of the parent branch.
pub trait Simulator {
    /// Snapshot from which an identical simulator can be spawned.
    type State: Clone + Send + Sync;

    /// Snapshot of the current state.
    fn state(&self) -> Self::State;

    /// Executes a trajectory.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::Simulator`](crate::SelectError::Simulator) if
    /// execution fails.
    fn execute(&mut self, trajectory: &AugmentedTrajectory) -> SelectResult<()>;

    /// Moves the arms out of the workspace.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::Simulator`](crate::SelectError::Simulator) if
    /// the arms cannot be moved.
    fn reset_arms(&mut self) -> SelectResult<()>;

    /// Observes the current scene.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::Simulator`](crate::SelectError::Simulator) if
    /// no observation is available.
    fn observe_scene(&self) -> SelectResult<SceneState>;

    /// Whether `scene` achieves the task.
    fn goal_reached(&self, scene: &SceneState) -> bool;
}

/// Creates independent simulators.
pub trait SimulatorFactory: Send + Sync {
    /// The simulator type produced.
    type Sim: Simulator;

    /// A simulator in `state`, or in the initial state for `None`.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::Simulator`](crate::SelectError::Simulator) if
    /// the simulator cannot be created.
    fn spawn(&self, state: Option<&<Self::Sim as Simulator>::State>) -> SelectResult<Self::Sim>;

    /// A simulator whose observation is `scene`, used as the search root.
    ///
    /// The default spawns the initial state and checks that it observes
    /// exactly `scene`. Override it when a simulator can be set up from an
    /// observed scene.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::Simulator`] if the initial state observes a
    /// different scene, or any error from spawning or observing.
    fn spawn_at(&self, scene: &SceneState) -> SelectResult<Self::Sim> {
        let sim = self.spawn(None)?;
        if sim.observe_scene()? != *scene {
            return Err(SelectError::Simulator(
                "initial simulator state does not match the search scene".to_string(),
            ));
        }
        Ok(sim)
    }
}

/// Turns a demonstration into an executable trajectory for a scene.
pub trait DemoTransfer: Send + Sync {
    /// Transfers `demo` onto `scene`.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::Transfer`](crate::SelectError::Transfer) if
    /// the transfer fails.
    fn transfer_demo(
        &self,
        demo: &Demonstration,
        scene: &SceneState,
    ) -> SelectResult<AugmentedTrajectory>;
}

impl DemoTransfer for TransferStrategy {
    fn transfer_demo(
        &self,
        demo: &Demonstration,
        scene: &SceneState,
    ) -> SelectResult<AugmentedTrajectory> {
        let outcome = self.transfer(demo, scene)?;
        if !outcome.diagnostics.converged() {
            debug!(
                demo = %demo.name,
                strategy = %self.kind(),
                termination = ?outcome.diagnostics.termination,
                "using unconverged transfer"
            );
        }
        Ok(outcome.trajectory)
    }
}
