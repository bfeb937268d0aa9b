use fishtrack_core::Real;
use nalgebra::{DMatrix, DVector};

/// Non-linear least squares problem with dense parameter and residual vectors.
pub trait NllsProblem {
    /// Number of parameters in the optimization vector.
    fn num_params(&self) -> usize;
    /// Number of residual rows.
    fn num_residuals(&self) -> usize;

    /// Residuals for the given parameters.
    fn residuals(&self, x: &DVector<Real>) -> DVector<Real>;

    /// Jacobian of [`NllsProblem::residuals`].
    ///
    /// Defaults to central finite differences with a step relative to the
    /// magnitude of each parameter.
    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real> {
        let mut j = DMatrix::zeros(self.num_residuals(), x.len());
        let mut x_pert = x.clone();
        for k in 0..x.len() {
            let h = FD_STEP * x[k].abs().max(1.0);
            x_pert[k] = x[k] + h;
            let r_plus = self.residuals(&x_pert);
            x_pert[k] = x[k] - h;
            let r_minus = self.residuals(&x_pert);
            x_pert[k] = x[k];
            j.set_column(k, &((r_plus - r_minus) / (2.0 * h)));
        }
        j
    }
}

const FD_STEP: Real = 1e-6;

#[derive(Debug, Clone, Copy)]
pub struct SolveOptions {
    /// Evaluation budget, interpreted MINPACK-style as `max_iters * (n + 1)`.
    pub max_iters: usize,
    /// Relative tolerance on the cost reduction.
    pub ftol: Real,
    /// Orthogonality/gradient tolerance.
    pub gtol: Real,
    /// Relative tolerance on parameter updates.
    pub xtol: Real,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 100,
            ftol: 1e-12,
            gtol: 1e-12,
            xtol: 1e-12,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolveReport {
    pub evaluations: usize,
    /// `0.5 * ||r||^2` at the solution.
    pub final_cost: Real,
    pub converged: bool,
    pub termination: String,
}

pub trait NllsSolverBackend {
    fn solve<P: NllsProblem>(
        &self,
        problem: &P,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport);
}

/// Root-mean-square pixel reprojection error from stacked `(du, dv)` residuals.
pub fn rms_from_residuals(r: &DVector<Real>) -> Real {
    let n_points = r.len() / 2;
    if n_points == 0 {
        return 0.0;
    }
    (r.norm_squared() / n_points as Real).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quadratic;

    impl NllsProblem for Quadratic {
        fn num_params(&self) -> usize {
            2
        }
        fn num_residuals(&self) -> usize {
            2
        }
        fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
            DVector::from_vec(vec![x[0] * x[0], 3.0 * x[0] * x[1]])
        }
    }

    #[test]
    fn finite_difference_jacobian_matches_analytic() {
        let x = DVector::from_vec(vec![2.0, -1.5]);
        let j = Quadratic.jacobian(&x);
        let expected = DMatrix::from_row_slice(2, 2, &[4.0, 0.0, -4.5, 6.0]);
        assert!((j - expected).norm() < 1e-6);
    }

    #[test]
    fn rms_counts_points_not_rows() {
        let r = DVector::from_vec(vec![3.0, 4.0, 0.0, 0.0]);
        assert!((rms_from_residuals(&r) - (25.0_f64 / 2.0).sqrt()).abs() < 1e-12);
    }
}
