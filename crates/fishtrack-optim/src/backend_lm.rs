use crate::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
use fishtrack_core::Real;
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};

struct LmWrapper<'a, P: NllsProblem> {
    problem: &'a P,
    params: DVector<Real>,
}

impl<P: NllsProblem> LeastSquaresProblem<Real, Dyn, Dyn> for LmWrapper<'_, P> {
    type ResidualStorage = Owned<Real, Dyn>;
    type JacobianStorage = Owned<Real, Dyn, Dyn>;
    type ParameterStorage = Owned<Real, Dyn>;

    fn set_params(&mut self, x: &DVector<Real>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<Real> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<Real>> {
        Some(self.problem.residuals(&self.params))
    }

    fn jacobian(&self) -> Option<DMatrix<Real>> {
        Some(self.problem.jacobian(&self.params))
    }
}

/// Dense Levenberg-Marquardt backed by the `levenberg-marquardt` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct LmBackend;

impl NllsSolverBackend for LmBackend {
    fn solve<P: NllsProblem>(
        &self,
        problem: &P,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport) {
        let lm = LevenbergMarquardt::new()
            .with_ftol(opts.ftol)
            .with_xtol(opts.xtol)
            .with_gtol(opts.gtol)
            .with_patience(opts.max_iters.max(1));

        let wrapper = LmWrapper {
            problem,
            params: x0,
        };

        // Tolerances tighter than machine precision end in NoImprovementPossible,
        // which is still a stationary point.
        let (wrapper, report) = lm.minimize(wrapper);
        log::debug!(
            "lm finished after {} evaluations: {:?}, cost {:.6e}",
            report.number_of_evaluations,
            report.termination,
            report.objective_function
        );

        (
            wrapper.params,
            SolveReport {
                evaluations: report.number_of_evaluations,
                final_cost: report.objective_function,
                converged: report.termination.was_successful()
                    || matches!(report.termination, TerminationReason::NoImprovementPossible(_)),
                termination: format!("{:?}", report.termination),
            },
        )
    }
}
