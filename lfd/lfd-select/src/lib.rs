//! Choosing which demonstration to transfer next.
//!
//! Two selectors implement [`ActionSelection`]:
//!
//! - [`GreedySelection`] ranks every demonstration by a batch cost, usually
//!   the registration cost against the current scene. No lookahead.
//! - [`BeamSearch`] simulates transfers several steps ahead and keeps the
//!   plans with the best cumulative [`ValueFunction`] score.
//!
//! The simulator, scene features and cost oracle are collaborators behind
//! traits. [`DemoTransfer`] is implemented for
//! [`TransferStrategy`](lfd_transfer::TransferStrategy), so any configured
//! transfer strategy can drive the search.
//!
//! # Layer 0
//!
//! This is a Layer 0 crate. Beam expansions run on the `rayon` pool.
//!
//! # Quick Start
//!
//! ```
//! use lfd_select::{ActionSelection, CostOracle, GreedySelection, SelectResult};
//! use lfd_types::SceneState;
//! use std::sync::Arc;
//!
//! struct ByName;
//! impl CostOracle for ByName {
//!     fn batch_cost(&self, _scene: &SceneState) -> SelectResult<Vec<(String, f64)>> {
//!         Ok(vec![("overhand".into(), 1.5), ("figure_eight".into(), 0.3)])
//!     }
//! }
//!
//! let agenda = GreedySelection::new(Arc::new(ByName))
//!     .plan_agenda(&SceneState::new(Vec::new()))
//!     .unwrap();
//! assert_eq!(agenda.first(), Some(("figure_eight", 0.3)));
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod agenda;
mod beam;
mod error;
mod greedy;
mod simulate;
mod value;

pub use agenda::Agenda;
pub use beam::{BeamPlan, BeamSearch, BeamSearchParams};
pub use error::{SelectError, SelectResult};
pub use greedy::{ActionSelection, CostOracle, GreedySelection};
pub use simulate::{DemoTransfer, Simulator, SimulatorFactory};
pub use value::{SceneFeatures, ValueFunction};
