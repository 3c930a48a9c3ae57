use crate::Real;
use nalgebra::DVector;
use nalgebra_sparse::CooMatrix;

/// An objective function $f: \mathbb{R}^n \rightarrow \mathbb{R}$ together with the hooks a
/// minimizer calls while iterating.
///
/// Only the value and its first two derivatives are required. The remaining methods let the
/// objective veto trial points (e.g. inverted elements or interpenetrating geometry), bound the
/// step length and observe the progress of the solve. Their defaults accept every step.
pub trait Problem<T: Real> {
    fn value(&mut self, x: &DVector<T>) -> T;

    fn gradient(&mut self, x: &DVector<T>) -> DVector<T>;

    /// The Hessian as a list of triplets. Duplicate entries are summed.
    fn hessian(&mut self, x: &DVector<T>) -> CooMatrix<T>;

    fn is_step_valid(&mut self, _x0: &DVector<T>, _x1: &DVector<T>) -> bool {
        true
    }

    fn is_step_collision_free(&mut self, _x0: &DVector<T>, _x1: &DVector<T>) -> bool {
        true
    }

    /// The largest fraction of the step from `x0` to `x1` that can safely be taken.
    fn max_step_size(&mut self, _x0: &DVector<T>, _x1: &DVector<T>) -> T {
        T::one()
    }

    fn line_search_begin(&mut self, _x0: &DVector<T>, _x1: &DVector<T>) {}

    fn line_search_end(&mut self) {}

    /// Called whenever the minimizer accepts a new iterate.
    fn solution_changed(&mut self, _x: &DVector<T>) {}

    fn post_step(&mut self, _iteration: usize, _x: &DVector<T>) {}

    /// Lets the problem request an early, successful exit.
    fn stop(&mut self, _x: &DVector<T>) -> bool {
        false
    }
}

impl<T, P> Problem<T> for &mut P
where
    T: Real,
    P: ?Sized + Problem<T>,
{
    fn value(&mut self, x: &DVector<T>) -> T {
        P::value(self, x)
    }

    fn gradient(&mut self, x: &DVector<T>) -> DVector<T> {
        P::gradient(self, x)
    }

    fn hessian(&mut self, x: &DVector<T>) -> CooMatrix<T> {
        P::hessian(self, x)
    }

    fn is_step_valid(&mut self, x0: &DVector<T>, x1: &DVector<T>) -> bool {
        P::is_step_valid(self, x0, x1)
    }

    fn is_step_collision_free(&mut self, x0: &DVector<T>, x1: &DVector<T>) -> bool {
        P::is_step_collision_free(self, x0, x1)
    }

    fn max_step_size(&mut self, x0: &DVector<T>, x1: &DVector<T>) -> T {
        P::max_step_size(self, x0, x1)
    }

    fn line_search_begin(&mut self, x0: &DVector<T>, x1: &DVector<T>) {
        P::line_search_begin(self, x0, x1)
    }

    fn line_search_end(&mut self) {
        P::line_search_end(self)
    }

    fn solution_changed(&mut self, x: &DVector<T>) {
        P::solution_changed(self, x)
    }

    fn post_step(&mut self, iteration: usize, x: &DVector<T>) {
        P::post_step(self, iteration, x)
    }

    fn stop(&mut self, x: &DVector<T>) -> bool {
        P::stop(self, x)
    }
}
