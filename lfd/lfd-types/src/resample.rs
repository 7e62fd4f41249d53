//! Uniform arc-length resampling of demonstrations.
//!
//! Recorded demonstrations are sampled at sensor rate, so consecutive steps
//! can be nearly identical or far apart. Transfer works on a resampled copy
//! whose steps are evenly spaced in a scaled joint space.

use crate::{ArmSide, AugmentedTrajectory, TrajectoryError, TrajectoryResult};
use nalgebra::DVector;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Scaling used when measuring arc length in joint space.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResampleParams {
    /// Arm joint travel (rad) that counts as one step (default: 0.1).
    pub joint_length_per_step: f64,
    /// Finger joint travel that counts as one step (default: 0.1).
    pub finger_close_rate: f64,
}

impl Default for ResampleParams {
    fn default() -> Self {
        Self {
            joint_length_per_step: 0.1,
            finger_close_rate: 0.1,
        }
    }
}

impl ResampleParams {
    /// Creates parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the joint travel per step.
    #[must_use]
    pub const fn with_joint_length_per_step(mut self, length: f64) -> Self {
        self.joint_length_per_step = length;
        self
    }

    /// Sets the finger travel per step.
    #[must_use]
    pub const fn with_finger_close_rate(mut self, rate: f64) -> Self {
        self.finger_close_rate = rate;
        self
    }

    /// Checks that both scales are positive and finite.
    ///
    /// # Errors
    ///
    /// Returns [`TrajectoryError::InvalidParameter`] naming the bad field.
    pub fn validate(&self) -> TrajectoryResult<()> {
        if !(self.joint_length_per_step.is_finite() && self.joint_length_per_step > 0.0) {
            return Err(TrajectoryError::InvalidParameter(format!(
                "joint_length_per_step must be positive, got {}",
                self.joint_length_per_step
            )));
        }
        if !(self.finger_close_rate.is_finite() && self.finger_close_rate > 0.0) {
            return Err(TrajectoryError::InvalidParameter(format!(
                "finger_close_rate must be positive, got {}",
                self.finger_close_rate
            )));
        }
        Ok(())
    }
}

/// Output of [`uniform_resample`].
#[derive(Debug, Clone, PartialEq)]
pub struct UniformResample {
    /// Resampled points, evenly spaced in arc length.
    pub points: Vec<DVector<f64>>,
    /// Fractional source timestep of each resampled point.
    pub timesteps: Vec<f64>,
}

/// Resamples a polyline so consecutive samples are evenly spaced.
///
/// The number of output samples is `max(ceil(L / max_step), 2)` where `L` is
/// the total arc length. Polylines with fewer than two samples or zero length
/// are returned unchanged with integer timesteps.
///
/// # Errors
///
/// Returns [`TrajectoryError::InvalidParameter`] if `max_step` is not
/// positive or the samples have different dimensions.
///
/// # Example
///
/// ```
/// use lfd_types::uniform_resample;
/// use nalgebra::DVector;
///
/// let samples = vec![
///     DVector::from_vec(vec![0.0]),
///     DVector::from_vec(vec![0.5]),
///     DVector::from_vec(vec![4.0]),
/// ];
/// let rs = uniform_resample(&samples, 1.0).unwrap();
/// assert_eq!(rs.points.len(), 4);
/// assert!((rs.points[1][0] - 4.0 / 3.0).abs() < 1e-12);
/// ```
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn uniform_resample(samples: &[DVector<f64>], max_step: f64) -> TrajectoryResult<UniformResample> {
    if !(max_step.is_finite() && max_step > 0.0) {
        return Err(TrajectoryError::InvalidParameter(format!(
            "max_step must be positive, got {max_step}"
        )));
    }
    let n = samples.len();
    if let Some(first) = samples.first() {
        if samples.iter().any(|s| s.len() != first.len()) {
            return Err(TrajectoryError::InvalidParameter(
                "samples have different dimensions".to_string(),
            ));
        }
    }
    let unchanged = || UniformResample {
        points: samples.to_vec(),
        timesteps: (0..n).map(|i| i as f64).collect(),
    };
    if n < 2 {
        return Ok(unchanged());
    }

    let mut cumulative = Vec::with_capacity(n);
    let mut total = 0.0;
    cumulative.push(total);
    for pair in samples.windows(2) {
        total += (&pair[1] - &pair[0]).norm();
        cumulative.push(total);
    }
    if total <= f64::EPSILON {
        return Ok(unchanged());
    }

    let nsteps = ((total / max_step).ceil() as usize).max(2);
    let mut points = Vec::with_capacity(nsteps);
    let mut timesteps = Vec::with_capacity(nsteps);
    let mut seg = 0;
    for k in 0..nsteps {
        let u = total * k as f64 / (nsteps - 1) as f64;
        while seg + 2 < n && cumulative[seg + 1] < u {
            seg += 1;
        }
        let len = cumulative[seg + 1] - cumulative[seg];
        let frac = if len > 0.0 {
            ((u - cumulative[seg]) / len).clamp(0.0, 1.0)
        } else {
            0.0
        };
        timesteps.push(seg as f64 + frac);
        points.push(samples[seg].lerp(&samples[seg + 1], frac));
    }

    Ok(UniformResample { points, timesteps })
}

/// Fractional timesteps that resample a demonstration uniformly.
///
/// Each step's feature row concatenates, over `arms`, the arm joints divided
/// by `joint_length_per_step` and the finger joint divided by
/// `finger_close_rate`. One unit of travel in that space is one output step.
///
/// # Errors
///
/// Returns an error if the parameters are invalid or an arm is missing from
/// the trajectory.
pub fn demo_resample_timesteps(
    traj: &AugmentedTrajectory,
    arms: &[ArmSide],
    params: &ResampleParams,
) -> TrajectoryResult<Vec<f64>> {
    params.validate()?;
    let n = traj.n_steps();
    if n == 0 {
        return Err(TrajectoryError::Empty);
    }
    let mut tracks = Vec::with_capacity(arms.len());
    for &arm in arms {
        let track = traj.arm(arm).ok_or_else(|| {
            TrajectoryError::InvalidParameter(format!("{arm} arm is not part of the trajectory"))
        })?;
        tracks.push(track);
    }

    let rows: Vec<DVector<f64>> = (0..n)
        .map(|t| {
            let values = tracks.iter().flat_map(|track| {
                track.arm_joints[t]
                    .iter()
                    .map(|q| q / params.joint_length_per_step)
                    .chain(std::iter::once(
                        track.finger_joints[t] / params.finger_close_rate,
                    ))
            });
            DVector::from_iterator(
                tracks.iter().map(|track| track.joint_count() + 1).sum(),
                values,
            )
        })
        .collect();

    Ok(uniform_resample(&rows, 1.0)?.timesteps)
}
