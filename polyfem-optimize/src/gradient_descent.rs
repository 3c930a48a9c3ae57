use crate::line_search::{BacktrackingLineSearch, LineSearch};
use crate::minimize::{descent_loop, MinimizeError, MinimizeOutput, Minimizer, StopCriteria};
use crate::problem::Problem;
use crate::Real;
use nalgebra::DVector;

/// Steepest descent with a line search.
///
/// Mostly useful as a robust (if slow) reference for [`NewtonMinimizer`](crate::newton::NewtonMinimizer).
#[derive(Debug, Clone)]
pub struct GradientDescent<T, L = BacktrackingLineSearch<T>> {
    stop_criteria: StopCriteria<T>,
    line_search: L,
}

impl<T: Real> GradientDescent<T> {
    pub fn new(stop_criteria: StopCriteria<T>) -> Self {
        Self {
            stop_criteria,
            line_search: BacktrackingLineSearch::default(),
        }
    }
}

impl<T: Real, L> GradientDescent<T, L> {
    pub fn with_line_search<L2: LineSearch<T>>(self, line_search: L2) -> GradientDescent<T, L2> {
        GradientDescent {
            stop_criteria: self.stop_criteria,
            line_search,
        }
    }
}

impl<T, L> Minimizer<T> for GradientDescent<T, L>
where
    T: Real,
    L: LineSearch<T>,
{
    fn minimize<P>(&mut self, problem: &mut P, x: &mut DVector<T>) -> Result<MinimizeOutput<T>, MinimizeError>
    where
        P: ?Sized + Problem<T>,
    {
        descent_loop(problem, x, &self.stop_criteria, &mut self.line_search, |_, _, gradient| {
            Ok(-gradient)
        })
    }

    fn stop_criteria(&self) -> &StopCriteria<T> {
        &self.stop_criteria
    }

    fn stop_criteria_mut(&mut self) -> &mut StopCriteria<T> {
        &mut self.stop_criteria
    }
}
