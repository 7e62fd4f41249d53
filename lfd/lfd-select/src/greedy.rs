//! Single-step selection by registration cost.

use crate::{Agenda, SelectResult};
use lfd_types::SceneState;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Chooses the demonstrations to apply to a scene.
pub trait ActionSelection {
    /// Ranks demonstrations for `scene`.
    ///
    /// # Errors
    ///
    /// Returns an error if a collaborator fails.
    fn plan_agenda(&self, scene: &SceneState) -> SelectResult<Agenda>;
}

/// Prices every candidate demonstration against a scene in one batch,
/// typically by registration cost.
pub trait CostOracle: Send + Sync {
    /// `(action, cost)` for every candidate action, in any order.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::Oracle`](crate::SelectError::Oracle) if the
    /// costs cannot be computed.
    fn batch_cost(&self, scene: &SceneState) -> SelectResult<Vec<(String, f64)>>;
}

/// Ranks actions by ascending cost, with ties broken by action name.
///
/// ```
/// use lfd_select::{ActionSelection, CostOracle, GreedySelection, SelectResult};
/// use lfd_types::SceneState;
/// use std::sync::Arc;
///
/// struct Fixed;
/// impl CostOracle for Fixed {
///     fn batch_cost(&self, _scene: &SceneState) -> SelectResult<Vec<(String, f64)>> {
///         Ok(vec![("tie".into(), 2.0), ("loop".into(), 0.5)])
///     }
/// }
///
/// let agenda = GreedySelection::new(Arc::new(Fixed))
///     .plan_agenda(&SceneState::new(Vec::new()))
///     .unwrap();
/// assert_eq!(agenda.actions, ["loop", "tie"]);
/// ```
#[derive(Clone)]
pub struct GreedySelection {
    oracle: Arc<dyn CostOracle>,
}

impl std::fmt::Debug for GreedySelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GreedySelection").finish_non_exhaustive()
    }
}

impl GreedySelection {
    /// Creates a greedy selector over `oracle`.
    #[must_use]
    pub fn new(oracle: Arc<dyn CostOracle>) -> Self {
        Self { oracle }
    }
}

/// Ascending cost, then action name.
fn cost_order(a: &(String, f64), b: &(String, f64)) -> Ordering {
    a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0))
}

impl ActionSelection for GreedySelection {
    fn plan_agenda(&self, scene: &SceneState) -> SelectResult<Agenda> {
        let mut costs = self.oracle.batch_cost(scene)?;
        costs.sort_by(cost_order);
        debug!(
            actions = costs.len(),
            best = costs.first().map(|(name, _)| name.as_str()),
            "greedy agenda"
        );
        Ok(Agenda::from_pairs(costs))
    }
}
