//! Energy terms ("forms") that are summed to build a nonlinear problem.
//!
//! Every form is evaluated on *full* vectors. Restricting derivatives to the free degrees of
//! freedom is the job of [`NLProblem`](crate::solver::nl_problem::NLProblem).
use crate::Real;
use nalgebra::DVector;
use nalgebra_sparse::CooMatrix;

mod bc_lagrangian;
mod bc_penalty;
mod quadratic;

pub use bc_lagrangian::BcLagrangianForm;
pub use bc_penalty::BcPenaltyForm;
pub use quadratic::QuadraticForm;

pub trait Form<T: Real> {
    fn value_unweighted(&self, x: &DVector<T>) -> T;

    fn gradient_unweighted(&self, x: &DVector<T>) -> DVector<T>;

    fn hessian_unweighted(&self, x: &DVector<T>) -> CooMatrix<T>;

    fn weight(&self) -> T {
        T::one()
    }

    /// Disabled forms do not contribute to the value or its derivatives.
    fn is_enabled(&self) -> bool {
        true
    }

    fn value(&self, x: &DVector<T>) -> T {
        self.weight() * self.value_unweighted(x)
    }

    /// Called once before each minimization, with the starting point.
    fn init(&mut self, _x: &DVector<T>) {}

    fn is_step_valid(&self, _x0: &DVector<T>, _x1: &DVector<T>) -> bool {
        true
    }

    fn is_step_collision_free(&self, _x0: &DVector<T>, _x1: &DVector<T>) -> bool {
        true
    }

    fn max_step_size(&self, _x0: &DVector<T>, _x1: &DVector<T>) -> T {
        T::one()
    }

    fn line_search_begin(&mut self, _x0: &DVector<T>, _x1: &DVector<T>) {}

    fn line_search_end(&mut self) {}

    fn solution_changed(&mut self, _x: &DVector<T>) {}
}

/// The quadratic penalty term of an augmented Lagrangian.
pub trait PenaltyForm<T: Real> {
    fn enable(&mut self);

    fn disable(&mut self);

    fn set_weight(&mut self, weight: T);

    /// The squared constraint violation at `x`. Always non-negative.
    fn compute_error(&self, x: &DVector<T>) -> T;
}

/// The multiplier term of an augmented Lagrangian.
pub trait LagrangianMultiplierForm<T: Real> {
    fn enable(&mut self);

    fn disable(&mut self);

    /// First-order multiplier update at `x` for the penalty weight `weight`.
    fn update_lagrangian(&mut self, x: &DVector<T>, weight: T);
}
