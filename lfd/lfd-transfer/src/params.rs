//! Transfer and decomposition parameters.

use crate::{TransferError, TransferResult};
use lfd_types::ResampleParams;
use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Continuous collision cost settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CollisionParams {
    /// Penalty coefficient (default: 1000).
    pub coeff: f64,
    /// Safety distance in metres (default: 0.025).
    pub dist_pen: f64,
}

impl Default for CollisionParams {
    fn default() -> Self {
        Self {
            coeff: 1000.0,
            dist_pen: 0.025,
        }
    }
}

/// Settings shared by every transfer strategy.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TransferParams {
    /// Weight of the contact-following cost (default: 1e6).
    pub beta_pos: f64,
    /// Weight of the joint velocity cost (default: 1000).
    pub gamma: f64,
    /// Whether to add the continuous collision cost (default: true).
    pub use_collision_cost: bool,
    /// Collision cost settings.
    pub collision: CollisionParams,
    /// Demonstration resampling scales.
    pub resample: ResampleParams,
    /// Joint range below which an arm counts as idle (default: 0.01).
    pub arm_motion_tolerance: f64,
    /// Pin the first step to the robot's current configuration (default: false).
    pub start_fixed: bool,
    /// Start shoulder-lift joints at their lower limit when there is no
    /// warm start (default: true).
    pub raise_shoulder_init: bool,
    /// Optional per-column joint velocity limits.
    pub joint_vel_limits: Option<Vec<f64>>,
}

impl Default for TransferParams {
    fn default() -> Self {
        Self {
            beta_pos: 1e6,
            gamma: 1000.0,
            use_collision_cost: true,
            collision: CollisionParams::default(),
            resample: ResampleParams::default(),
            arm_motion_tolerance: 0.01,
            start_fixed: false,
            raise_shoulder_init: true,
            joint_vel_limits: None,
        }
    }
}

impl TransferParams {
    /// Creates parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the contact-following weight.
    #[must_use]
    pub const fn with_beta_pos(mut self, beta_pos: f64) -> Self {
        self.beta_pos = beta_pos;
        self
    }

    /// Sets the joint velocity weight.
    #[must_use]
    pub const fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Enables or disables the collision cost.
    #[must_use]
    pub const fn with_collision_cost(mut self, enabled: bool) -> Self {
        self.use_collision_cost = enabled;
        self
    }

    /// Sets the collision cost settings.
    #[must_use]
    pub const fn with_collision(mut self, collision: CollisionParams) -> Self {
        self.collision = collision;
        self
    }

    /// Sets the resampling scales.
    #[must_use]
    pub const fn with_resample(mut self, resample: ResampleParams) -> Self {
        self.resample = resample;
        self
    }

    /// Pins the first step to the current configuration.
    #[must_use]
    pub const fn with_start_fixed(mut self, start_fixed: bool) -> Self {
        self.start_fixed = start_fixed;
        self
    }

    /// Enables or disables the shoulder-lift initialization.
    #[must_use]
    pub const fn with_raise_shoulder_init(mut self, enabled: bool) -> Self {
        self.raise_shoulder_init = enabled;
        self
    }

    /// Adds a joint velocity limit constraint.
    #[must_use]
    pub fn with_joint_vel_limits(mut self, limits: Vec<f64>) -> Self {
        self.joint_vel_limits = Some(limits);
        self
    }

    /// Checks that weights are finite and non-negative.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidParameter`] naming the bad field.
    pub fn validate(&self) -> TransferResult<()> {
        let fields = [
            ("beta_pos", self.beta_pos),
            ("gamma", self.gamma),
            ("collision.coeff", self.collision.coeff),
            ("collision.dist_pen", self.collision.dist_pen),
            ("arm_motion_tolerance", self.arm_motion_tolerance),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(TransferError::InvalidParameter(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if self.beta_pos == 0.0 {
            return Err(TransferError::InvalidParameter(
                "beta_pos must be positive".to_string(),
            ));
        }
        if let Some(limits) = &self.joint_vel_limits {
            if limits.iter().any(|v| !v.is_finite() || *v <= 0.0) {
                return Err(TransferError::InvalidParameter(
                    "joint velocity limits must be positive".to_string(),
                ));
            }
        }
        self.resample.validate()?;
        Ok(())
    }
}

/// What the decomposition loop does when the solver reports non-convergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SolverFailurePolicy {
    /// Keep the returned trajectory and continue iterating.
    #[default]
    Continue,
    /// Stop and return the last trajectory from a converged solve.
    Abort,
}

/// Parameters of the dual-decomposition loop.
///
/// # Example
///
/// ```
/// use lfd_transfer::DecompositionParams;
///
/// let params = DecompositionParams::new()
///     .with_max_iterations(5)
///     .with_step_size(1e-2);
/// assert!(params.validate().is_ok());
/// assert!((params.convergence_threshold(10) - 0.3).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DecompositionParams {
    /// Dual ascent step size (default: 1e-3).
    pub step_size: f64,
    /// Allowed absolute discrepancy per dual entry (default: 1e-2).
    pub threshold_per_entry: f64,
    /// Iteration cap (default: 20).
    pub max_iterations: usize,
    /// Starting value of every dual variable (default: `[1e-3, 0, 0]`).
    pub initial_dual: Vector3<f64>,
    /// Reaction to solver non-convergence (default: continue).
    pub solver_failure: SolverFailurePolicy,
}

impl Default for DecompositionParams {
    fn default() -> Self {
        Self {
            step_size: 1e-3,
            threshold_per_entry: 1e-2,
            max_iterations: 20,
            initial_dual: Vector3::new(1e-3, 0.0, 0.0),
            solver_failure: SolverFailurePolicy::Continue,
        }
    }
}

impl DecompositionParams {
    /// Creates parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the dual ascent step size.
    #[must_use]
    pub const fn with_step_size(mut self, step_size: f64) -> Self {
        self.step_size = step_size;
        self
    }

    /// Sets the per-entry convergence threshold.
    #[must_use]
    pub const fn with_threshold_per_entry(mut self, threshold: f64) -> Self {
        self.threshold_per_entry = threshold;
        self
    }

    /// Sets the iteration cap.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the initial dual bias.
    #[must_use]
    pub const fn with_initial_dual(mut self, initial_dual: Vector3<f64>) -> Self {
        self.initial_dual = initial_dual;
        self
    }

    /// Sets the solver failure policy.
    #[must_use]
    pub const fn with_solver_failure(mut self, policy: SolverFailurePolicy) -> Self {
        self.solver_failure = policy;
        self
    }

    /// Total discrepancy below which the loop stops, for `samples` contact points.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn convergence_threshold(&self, samples: usize) -> f64 {
        self.threshold_per_entry * (3 * samples) as f64
    }

    /// Checks the loop settings.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidParameter`] naming the bad field.
    pub fn validate(&self) -> TransferResult<()> {
        if !self.step_size.is_finite() || self.step_size < 0.0 {
            return Err(TransferError::InvalidParameter(format!(
                "step_size must be finite and non-negative, got {}",
                self.step_size
            )));
        }
        if !self.threshold_per_entry.is_finite() || self.threshold_per_entry < 0.0 {
            return Err(TransferError::InvalidParameter(format!(
                "threshold_per_entry must be finite and non-negative, got {}",
                self.threshold_per_entry
            )));
        }
        if self.max_iterations == 0 {
            return Err(TransferError::InvalidParameter(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.initial_dual.iter().any(|v| !v.is_finite()) {
            return Err(TransferError::InvalidParameter(
                "initial_dual must be finite".to_string(),
            ));
        }
        Ok(())
    }
}
