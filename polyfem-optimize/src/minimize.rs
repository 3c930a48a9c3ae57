use crate::line_search::{LineSearch, LineSearchError};
use crate::linear_solver::LinearSolveError;
use crate::problem::Problem;
use crate::Real;
use log::debug;
use nalgebra::DVector;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// Criteria that terminate a minimization.
///
/// A minimization is considered converged once the gradient norm drops below `grad_norm`.
/// It fails if convergence has not been reached after `iterations` iterations.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(serialize = "T: Serialize", deserialize = "T: Real + Deserialize<'de>"))]
pub struct StopCriteria<T> {
    pub iterations: usize,
    pub grad_norm: T,
}

impl<T: Real> Default for StopCriteria<T> {
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn default() -> Self {
        Self {
            iterations: 500,
            grad_norm: 1e-8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinimizeOutput<T> {
    pub iterations: usize,
    pub grad_norm: T,
}

#[derive(Debug)]
pub enum MinimizeError {
    /// The procedure failed because the maximum number of iterations was reached.
    MaximumIterationsReached(usize),
    /// The objective, its gradient or its Hessian evaluated to a non-finite value.
    NonFiniteValue { iteration: usize },
    /// The line search failed to produce an acceptable step.
    LineSearchFailed(LineSearchError),
    /// Solving the linear system for the search direction failed and no fallback was possible.
    LinearSolveFailed(LinearSolveError),
}

impl Display for MinimizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            &MinimizeError::MaximumIterationsReached(maxit) => {
                write!(f, "Failed to converge within maximum number of iterations ({}).", maxit)
            }
            &MinimizeError::NonFiniteValue { iteration } => {
                write!(f, "Encountered non-finite objective at iteration {}.", iteration)
            }
            &MinimizeError::LineSearchFailed(ref err) => {
                write!(f, "Line search failed to produce an acceptable step. Error: {}", err)
            }
            &MinimizeError::LinearSolveFailed(ref err) => {
                write!(f, "Failed to solve for the search direction. Error: {}", err)
            }
        }
    }
}

impl Error for MinimizeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MinimizeError::LineSearchFailed(err) => Some(err),
            MinimizeError::LinearSolveFailed(err) => Some(err),
            _ => None,
        }
    }
}

/// A method that minimizes a [`Problem`] starting from a given point.
pub trait Minimizer<T: Real> {
    /// Minimizes `problem` starting from `x`.
    ///
    /// On success `x` holds the minimizer. On failure `x` holds the last accepted iterate,
    /// so that callers can continue from whatever progress was made.
    fn minimize<P>(&mut self, problem: &mut P, x: &mut DVector<T>) -> Result<MinimizeOutput<T>, MinimizeError>
    where
        P: ?Sized + Problem<T>;

    fn stop_criteria(&self) -> &StopCriteria<T>;

    fn stop_criteria_mut(&mut self) -> &mut StopCriteria<T>;
}

impl<T, M> Minimizer<T> for &mut M
where
    T: Real,
    M: Minimizer<T>,
{
    fn minimize<P>(&mut self, problem: &mut P, x: &mut DVector<T>) -> Result<MinimizeOutput<T>, MinimizeError>
    where
        P: ?Sized + Problem<T>,
    {
        M::minimize(self, problem, x)
    }

    fn stop_criteria(&self) -> &StopCriteria<T> {
        M::stop_criteria(self)
    }

    fn stop_criteria_mut(&mut self) -> &mut StopCriteria<T> {
        M::stop_criteria_mut(self)
    }
}

/// Shared descent loop: repeatedly computes a direction, lets the line search pick a step and
/// checks the stopping criteria.
///
/// `direction` computes the search direction from the current point and gradient.
pub(crate) fn descent_loop<T, P, L, D>(
    problem: &mut P,
    x: &mut DVector<T>,
    criteria: &StopCriteria<T>,
    line_search: &mut L,
    mut direction: D,
) -> Result<MinimizeOutput<T>, MinimizeError>
where
    T: Real,
    P: ?Sized + Problem<T>,
    L: LineSearch<T>,
    D: FnMut(&mut P, &DVector<T>, &DVector<T>) -> Result<DVector<T>, MinimizeError>,
{
    let mut value = problem.value(x);
    if !value.is_finite() {
        return Err(MinimizeError::NonFiniteValue { iteration: 0 });
    }
    let mut gradient = problem.gradient(x);
    let mut iter = 0;

    loop {
        let grad_norm = gradient.norm();
        if !grad_norm.is_finite() {
            return Err(MinimizeError::NonFiniteValue { iteration: iter });
        }
        if grad_norm <= criteria.grad_norm || problem.stop(x) {
            return Ok(MinimizeOutput {
                iterations: iter,
                grad_norm,
            });
        }
        if iter >= criteria.iterations {
            return Err(MinimizeError::MaximumIterationsReached(iter));
        }

        let p = direction(problem, x, &gradient)?;
        let step_length = line_search
            .search(problem, x, &p, value, &gradient)
            .map_err(MinimizeError::LineSearchFailed)?;
        debug!(
            "Step length at iter {}: {}, gradient norm: {}",
            iter, step_length, grad_norm
        );

        problem.solution_changed(x);
        value = problem.value(x);
        gradient = problem.gradient(x);
        iter += 1;
        problem.post_step(iter, x);
    }
}
