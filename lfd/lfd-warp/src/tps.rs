//! Thin-plate-spline warps in three dimensions.
//!
//! A warp maps points by
//!
//! ```text
//! f(p) = t + A p + Σ_i w_i φ(|p − x_i|),   φ(r) = −r
//! ```
//!
//! with the kernel weights constrained to `Σ w_i = 0` and `Σ w_i x_iᵀ = 0`.
//! Each output dimension is fitted independently by minimizing weighted
//! residuals, bending energy, deviation of `A` from identity and the linear
//! dual penalties of [`DualConstraints`]. The affine constraint is removed by
//! a null-space basis and the reduced normal matrix is Cholesky-factored
//! once, so [`ThinPlateSpline::refit`] with new duals is a back-substitution.

use crate::{DualConstraints, TpsParams, WarpError, WarpResult};
use nalgebra::{
    Cholesky, DMatrix, DVector, Dyn, Isometry3, Matrix3, Point3, Rotation3, SymmetricEigen,
    Translation3, UnitQuaternion, Vector3,
};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Radial kernel of the 3-D thin-plate spline.
#[must_use]
pub fn tps_kernel(r: f64) -> f64 {
    -r
}

/// Breakdown of the fitting objective at the current parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WarpObjective {
    /// Weighted squared residual at the correspondences.
    pub residual: f64,
    /// Bending energy `Σ_g bend_g w_gᵀ K w_g`.
    pub bending: f64,
    /// Penalty on the linear part's deviation from identity.
    pub rotation: f64,
    /// Dual penalty `Σ_b λ_b · f(τ_b)`.
    pub dual: f64,
}

impl WarpObjective {
    /// Sum of all terms.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.residual + self.bending + self.rotation + self.dual
    }
}

/// A fitted thin-plate-spline warp.
///
/// Parameters are stored as a `(4 + n) × 3` matrix: one translation row,
/// three linear rows and one kernel row per centre. Column `g` holds the
/// coefficients of output dimension `g`.
///
/// # Example
///
/// ```
/// use lfd_warp::{ThinPlateSpline, TpsParams};
/// use nalgebra::{Point3, Vector3};
///
/// let source = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
///     Point3::new(0.0, 0.0, 1.0),
///     Point3::new(1.0, 1.0, 1.0),
/// ];
/// let offset = Vector3::new(0.5, -0.2, 0.1);
/// let target: Vec<_> = source.iter().map(|p| p + offset).collect();
///
/// let params = TpsParams::new().with_bend_coefs(0.01);
/// let warp = ThinPlateSpline::fit(&source, &target, &params, None).unwrap();
/// let moved = warp.transform_point(&Point3::new(0.5, 0.5, 0.5));
/// assert!((moved - Point3::new(1.0, 0.3, 0.6)).norm() < 1e-8);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ThinPlateSpline {
    centers: Vec<Point3<f64>>,
    theta: DMatrix<f64>,
    #[cfg_attr(feature = "serde", serde(skip))]
    state: Option<FitState>,
}

/// Everything needed to re-solve after the dual penalties change.
#[derive(Debug, Clone)]
struct FitState {
    target: Vec<Point3<f64>>,
    weights: Vec<[f64; 3]>,
    bend: [f64; 3],
    rot: [f64; 3],
    null_basis: DMatrix<f64>,
    factors: Vec<Cholesky<f64, Dyn>>,
    base_rhs: Vec<DVector<f64>>,
    duals: Option<DualConstraints>,
}

impl ThinPlateSpline {
    /// The identity warp. It has no centres and cannot be refitted.
    #[must_use]
    pub fn identity() -> Self {
        let mut theta = DMatrix::zeros(4, 3);
        for g in 0..3 {
            theta[(1 + g, g)] = 1.0;
        }
        Self {
            centers: Vec::new(),
            theta,
            state: None,
        }
    }

    /// Fits a warp mapping `source[i]` towards `target[i]`.
    ///
    /// `duals`, when given, adds the penalty `Σ_b λ_b · f(τ_b)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the inputs are empty, mismatched or non-finite,
    /// if a coefficient is invalid, or if the reduced system is not
    /// positive definite.
    pub fn fit(
        source: &[Point3<f64>],
        target: &[Point3<f64>],
        params: &TpsParams,
        duals: Option<&DualConstraints>,
    ) -> WarpResult<Self> {
        let n = source.len();
        if n == 0 {
            return Err(WarpError::EmptyCorrespondence);
        }
        if target.len() != n {
            return Err(WarpError::LengthMismatch {
                what: "target points",
                expected: n,
                found: target.len(),
            });
        }
        if !all_finite(source) || !all_finite(target) {
            return Err(WarpError::NonFinite("correspondence points"));
        }
        let (bend, rot) = params.normalized_coefs()?;
        let weights = params.weights.per_dim(n)?;

        let q = basis_matrix(source, source);
        let null_basis = constraint_null_basis(source)?;
        let null_t = null_basis.transpose();

        let mut factors = Vec::with_capacity(3);
        let mut base_rhs = Vec::with_capacity(3);
        for g in 0..3 {
            let mut weighted = q.clone();
            for (i, w) in weights.iter().enumerate() {
                weighted.row_mut(i).scale_mut(w[g]);
            }
            let mut h = q.transpose() * &weighted;
            if bend[g] > 0.0 {
                for i in 0..n {
                    for j in 0..n {
                        h[(4 + i, 4 + j)] += bend[g] * q[(i, 4 + j)];
                    }
                }
            }
            for (a, r) in rot.iter().enumerate() {
                h[(1 + a, 1 + a)] += r;
            }

            let wy = DVector::from_iterator(
                n,
                weights.iter().zip(target).map(|(w, y)| w[g] * y[g]),
            );
            let mut f = -(q.transpose() * wy);
            f[1 + g] -= rot[g];

            let reduced = &null_t * h * &null_basis;
            let chol = Cholesky::new(reduced).ok_or_else(|| {
                WarpError::DegenerateSystem(format!(
                    "reduced normal matrix for dimension {g} is not positive definite"
                ))
            })?;
            factors.push(chol);
            base_rhs.push(-(&null_t * f));
        }

        let mut warp = Self {
            centers: source.to_vec(),
            theta: DMatrix::zeros(4 + n, 3),
            state: Some(FitState {
                target: target.to_vec(),
                weights,
                bend,
                rot,
                null_basis,
                factors,
                base_rhs,
                duals: None,
            }),
        };
        warp.refit(duals)?;

        debug!(
            centers = n,
            null_dim = warp.state.as_ref().map_or(0, |s| s.null_basis.ncols()),
            "fitted thin-plate spline"
        );
        Ok(warp)
    }

    /// Re-solves with new dual penalties, reusing the cached factorization.
    ///
    /// On error the previous parameters are kept.
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::NotFitted`] for warps built without
    /// correspondences and [`WarpError::NonFinite`] if the solution is not
    /// finite.
    pub fn refit(&mut self, duals: Option<&DualConstraints>) -> WarpResult<()> {
        let state = self.state.as_mut().ok_or(WarpError::NotFitted)?;
        let n = self.centers.len();
        let duals = duals.filter(|d| !d.is_empty());
        let dual_basis = duals.map(|d| basis_matrix(d.points(), &self.centers));

        let mut theta = DMatrix::zeros(4 + n, 3);
        for g in 0..3 {
            let mut rhs = state.base_rhs[g].clone();
            if let (Some(d), Some(q_tau)) = (duals, dual_basis.as_ref()) {
                let lambda = DVector::from_iterator(d.len(), d.lambdas().iter().map(|l| l[g]));
                let linear = q_tau.transpose() * lambda;
                rhs -= state.null_basis.tr_mul(&linear) * 0.5;
            }
            let z = state.factors[g].solve(&rhs);
            theta.set_column(g, &(&state.null_basis * z));
        }
        if theta.iter().any(|v| !v.is_finite()) {
            return Err(WarpError::NonFinite("warp parameters"));
        }

        self.theta = theta;
        state.duals = duals.cloned();
        Ok(())
    }

    /// Kernel centres (the fitted source points).
    #[must_use]
    pub fn centers(&self) -> &[Point3<f64>] {
        &self.centers
    }

    /// Raw parameter matrix.
    #[must_use]
    pub const fn theta(&self) -> &DMatrix<f64> {
        &self.theta
    }

    /// Translation part `t`.
    #[must_use]
    pub fn translation(&self) -> Vector3<f64> {
        Vector3::new(self.theta[(0, 0)], self.theta[(0, 1)], self.theta[(0, 2)])
    }

    /// Linear part `A`, so the affine component is `t + A p`.
    #[must_use]
    pub fn linear(&self) -> Matrix3<f64> {
        Matrix3::from_fn(|g, a| self.theta[(1 + a, g)])
    }

    /// Whether every parameter is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.theta.iter().all(|v| v.is_finite())
    }

    /// Maps one point.
    #[must_use]
    pub fn transform_point(&self, p: &Point3<f64>) -> Point3<f64> {
        let mut out = self.translation() + self.linear() * p.coords;
        for (i, c) in self.centers.iter().enumerate() {
            let k = tps_kernel((p - c).norm());
            for g in 0..3 {
                out[g] += k * self.theta[(4 + i, g)];
            }
        }
        Point3::from(out)
    }

    /// Maps a batch of points.
    #[must_use]
    pub fn transform_points(&self, points: &[Point3<f64>]) -> Vec<Point3<f64>> {
        points.iter().map(|p| self.transform_point(p)).collect()
    }

    /// Jacobian `∂f/∂p` at `p`.
    #[must_use]
    pub fn jacobian(&self, p: &Point3<f64>) -> Matrix3<f64> {
        let mut jac = self.linear();
        for (i, c) in self.centers.iter().enumerate() {
            let d = p - c;
            let r = d.norm();
            if r < 1e-12 {
                continue;
            }
            let grad = -d / r;
            for g in 0..3 {
                let w = self.theta[(4 + i, g)];
                for a in 0..3 {
                    jac[(g, a)] += w * grad[a];
                }
            }
        }
        jac
    }

    /// Maps rigid poses: positions through the warp, orientations through
    /// the closest rotation to `J · R`.
    #[must_use]
    pub fn transform_hmats(&self, poses: &[Isometry3<f64>]) -> Vec<Isometry3<f64>> {
        poses
            .iter()
            .map(|pose| {
                let origin = Point3::from(pose.translation.vector);
                let warped = self.transform_point(&origin);
                let m = self.jacobian(&origin) * pose.rotation.to_rotation_matrix().matrix();
                let rot = Rotation3::from_matrix(&m);
                Isometry3::from_parts(
                    Translation3::from(warped.coords),
                    UnitQuaternion::from_rotation_matrix(&rot),
                )
            })
            .collect()
    }

    /// Current value of the fitting objective, term by term.
    ///
    /// The identity warp reports all zeros.
    #[must_use]
    pub fn objective_terms(&self) -> WarpObjective {
        let Some(state) = &self.state else {
            return WarpObjective::default();
        };
        let n = self.centers.len();

        let residual = self
            .centers
            .iter()
            .zip(&state.target)
            .zip(&state.weights)
            .map(|((x, y), w)| {
                let d = self.transform_point(x) - y;
                (0..3).map(|g| w[g] * d[g] * d[g]).sum::<f64>()
            })
            .sum::<f64>();

        let mut bending = 0.0;
        for g in 0..3 {
            if state.bend[g] == 0.0 {
                continue;
            }
            let mut energy = 0.0;
            for i in 0..n {
                for j in 0..n {
                    let k = tps_kernel((self.centers[i] - self.centers[j]).norm());
                    energy += self.theta[(4 + i, g)] * k * self.theta[(4 + j, g)];
                }
            }
            bending += state.bend[g] * energy;
        }

        let mut rotation = 0.0;
        for a in 0..3 {
            for g in 0..3 {
                let target = if a == g { 1.0 } else { 0.0 };
                let d = self.theta[(1 + a, g)] - target;
                rotation += state.rot[a] * d * d;
            }
        }

        let dual = state.duals.as_ref().map_or(0.0, |d| {
            d.points()
                .iter()
                .zip(d.lambdas())
                .map(|(p, l)| l.dot(&self.transform_point(p).coords))
                .sum()
        });

        WarpObjective {
            residual,
            bending,
            rotation,
            dual,
        }
    }

    /// Current value of the fitting objective.
    #[must_use]
    pub fn objective(&self) -> f64 {
        self.objective_terms().total()
    }
}

fn all_finite(points: &[Point3<f64>]) -> bool {
    points.iter().all(|p| p.iter().all(|v| v.is_finite()))
}

/// Rows `[1, p, φ(|p − c_j|)…]` for each point.
fn basis_matrix(points: &[Point3<f64>], centers: &[Point3<f64>]) -> DMatrix<f64> {
    let n = centers.len();
    DMatrix::from_fn(points.len(), 4 + n, |i, j| match j {
        0 => 1.0,
        1..=3 => points[i][j - 1],
        _ => tps_kernel((points[i] - centers[j - 4]).norm()),
    })
}

/// Basis of `{θ : Pᵀ w = 0}` with `P = [1 X]`, as a `(4 + n) × (4 + m)`
/// block-diagonal matrix.
#[allow(clippy::cast_precision_loss)]
fn constraint_null_basis(source: &[Point3<f64>]) -> WarpResult<DMatrix<f64>> {
    let n = source.len();
    let p = DMatrix::from_fn(n, 4, |i, j| if j == 0 { 1.0 } else { source[i][j - 1] });
    let svd = p.svd(true, false);
    let u = svd
        .u
        .ok_or_else(|| WarpError::DegenerateSystem("SVD of affine constraint failed".into()))?;
    let tol = svd.singular_values.max() * 1e-10 * n.max(4) as f64;

    let mut projector = DMatrix::<f64>::identity(n, n);
    for (k, sigma) in svd.singular_values.iter().enumerate() {
        if *sigma > tol {
            let col = u.column(k);
            projector -= &col * col.transpose();
        }
    }
    let eig = SymmetricEigen::new(projector);
    let kept: Vec<usize> = (0..n).filter(|&k| eig.eigenvalues[k] > 0.5).collect();

    let mut basis = DMatrix::zeros(4 + n, 4 + kept.len());
    for a in 0..4 {
        basis[(a, a)] = 1.0;
    }
    for (c, &k) in kept.iter().enumerate() {
        for i in 0..n {
            basis[(4 + i, 4 + c)] = eig.eigenvectors[(i, k)];
        }
    }
    Ok(basis)
}
