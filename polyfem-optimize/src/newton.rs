use crate::line_search::{BacktrackingLineSearch, LineSearch};
use crate::linear_solver::{LinearSolver, LinearSolverSettings};
use crate::minimize::{descent_loop, MinimizeError, MinimizeOutput, Minimizer, StopCriteria};
use crate::problem::Problem;
use crate::Real;
use log::debug;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(serialize = "T: Serialize", deserialize = "T: Real + Deserialize<'de>"))]
pub struct NewtonSettings<T> {
    pub stop_criteria: StopCriteria<T>,
    pub line_search: BacktrackingLineSearch<T>,
    pub linear_solver: LinearSolverSettings<T>,
    /// Whether to fall back to the steepest descent direction if the Newton system cannot be
    /// solved or does not produce a descent direction.
    pub gradient_fallback: bool,
}

impl<T: Real> Default for NewtonSettings<T> {
    fn default() -> Self {
        Self {
            stop_criteria: StopCriteria::default(),
            line_search: BacktrackingLineSearch::default(),
            linear_solver: LinearSolverSettings::default(),
            gradient_fallback: true,
        }
    }
}

/// Newton's method for minimizing a [`Problem`].
///
/// Each iteration solves $H \Delta x = - \nabla f$ and hands the direction to a line search.
pub struct NewtonMinimizer<T: Real, L = BacktrackingLineSearch<T>> {
    stop_criteria: StopCriteria<T>,
    line_search: L,
    linear_solver: Box<dyn LinearSolver<T>>,
    gradient_fallback: bool,
}

impl<T: Real> NewtonMinimizer<T> {
    pub fn new(settings: NewtonSettings<T>) -> Self {
        Self {
            stop_criteria: settings.stop_criteria,
            line_search: settings.line_search,
            linear_solver: settings.linear_solver.build(),
            gradient_fallback: settings.gradient_fallback,
        }
    }
}

impl<T: Real> Default for NewtonMinimizer<T> {
    fn default() -> Self {
        Self::new(NewtonSettings::default())
    }
}

impl<T: Real, L> NewtonMinimizer<T, L> {
    pub fn with_line_search<L2: LineSearch<T>>(self, line_search: L2) -> NewtonMinimizer<T, L2> {
        NewtonMinimizer {
            stop_criteria: self.stop_criteria,
            line_search,
            linear_solver: self.linear_solver,
            gradient_fallback: self.gradient_fallback,
        }
    }

    pub fn with_linear_solver(self, linear_solver: Box<dyn LinearSolver<T>>) -> Self {
        Self { linear_solver, ..self }
    }
}

/// Computes the Newton direction, falling back to steepest descent if allowed.
fn newton_direction<T: Real>(
    linear_solver: &mut dyn LinearSolver<T>,
    hessian: &nalgebra_sparse::CooMatrix<T>,
    gradient: &DVector<T>,
    gradient_fallback: bool,
) -> Result<DVector<T>, MinimizeError> {
    let direction = linear_solver
        .factorize(hessian)
        .and_then(|_| linear_solver.solve(gradient))
        .map(|minus_dx| -minus_dx);

    match direction {
        Ok(dx) if dx.dot(gradient) < T::zero() => Ok(dx),
        Ok(_) if gradient_fallback => {
            debug!("Newton direction is not a descent direction, falling back to gradient descent");
            Ok(-gradient)
        }
        Err(err) if gradient_fallback => {
            debug!("Failed to solve Newton system ({}), falling back to gradient descent", err);
            Ok(-gradient)
        }
        // Let the line search report the bad direction
        Ok(dx) => Ok(dx),
        Err(err) => Err(MinimizeError::LinearSolveFailed(err)),
    }
}

impl<T, L> Minimizer<T> for NewtonMinimizer<T, L>
where
    T: Real,
    L: LineSearch<T>,
{
    fn minimize<P>(&mut self, problem: &mut P, x: &mut DVector<T>) -> Result<MinimizeOutput<T>, MinimizeError>
    where
        P: ?Sized + Problem<T>,
    {
        let linear_solver = &mut *self.linear_solver;
        let gradient_fallback = self.gradient_fallback;
        let result = descent_loop(
            problem,
            x,
            &self.stop_criteria,
            &mut self.line_search,
            |problem, x, gradient| {
                let hessian = problem.hessian(x);
                newton_direction(linear_solver, &hessian, gradient, gradient_fallback)
            },
        );
        match &result {
            Ok(output) => debug!(
                "Newton converged in {} iterations (gradient norm {})",
                output.iterations, output.grad_norm
            ),
            Err(err) => debug!("Newton failed: {}", err),
        }
        result
    }

    fn stop_criteria(&self) -> &StopCriteria<T> {
        &self.stop_criteria
    }

    fn stop_criteria_mut(&mut self) -> &mut StopCriteria<T> {
        &mut self.stop_criteria
    }
}
