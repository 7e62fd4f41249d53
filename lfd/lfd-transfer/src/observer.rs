//! Checkpoint callbacks for visualization and logging.

use crate::{Registration, SolveStatus, TransferOutcome};
use nalgebra::{Point3, Vector3};

/// State of the decomposition loop after one iteration.
#[derive(Debug, Clone, Copy)]
pub struct IterationReport<'a> {
    /// Zero-based iteration index.
    pub iteration: usize,
    /// Sum of absolute trajectory-vs-warp differences.
    pub discrepancy: f64,
    /// Warp objective after the refit.
    pub warp_objective: f64,
    /// Status of this iteration's solve.
    pub solve_status: SolveStatus,
    /// Demonstration contacts under the refitted warp.
    pub warped_points: &'a [Point3<f64>],
    /// Contacts reached by the trajectory.
    pub achieved_points: &'a [Point3<f64>],
    /// Dual variables after the ascent step.
    pub lambdas: &'a [Vector3<f64>],
}

/// Receives transfer checkpoints. Every method defaults to doing nothing.
pub trait TransferObserver {
    /// Called once registration has produced a warp.
    fn on_registration(&mut self, _registration: &Registration) {}

    /// Called after every decomposition iteration.
    fn on_iteration(&mut self, _report: &IterationReport<'_>) {}

    /// Called with the final outcome.
    fn on_finished(&mut self, _outcome: &TransferOutcome) {}
}

/// Observer that ignores every checkpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl TransferObserver for NoopObserver {}
