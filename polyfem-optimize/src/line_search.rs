use crate::problem::Problem;
use crate::Real;
use log::trace;
use nalgebra::DVector;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum LineSearchError {
    /// The search direction does not decrease the objective to first order.
    NotDescentDirection,
    /// No acceptable step was found before the step length fell below its minimum.
    StepTooSmall { trials: usize },
}

impl fmt::Display for LineSearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDescentDirection => write!(f, "Search direction is not a descent direction."),
            Self::StepTooSmall { trials } => write!(
                f,
                "Failed to produce valid step. Step fell below its minimum after {} trials.",
                trials
            ),
        }
    }
}

impl Error for LineSearchError {}

/// Selects a step length along a search direction and moves `x` accordingly.
pub trait LineSearch<T: Real> {
    /// Takes a step from `x` along `direction`, overwriting `x` with the accepted point.
    ///
    /// `value` and `gradient` are the objective value and gradient at `x`. Returns the accepted
    /// step length. On failure `x` is left unchanged.
    fn search<P>(
        &mut self,
        problem: &mut P,
        x: &mut DVector<T>,
        direction: &DVector<T>,
        value: T,
        gradient: &DVector<T>,
    ) -> Result<T, LineSearchError>
    where
        P: ?Sized + Problem<T>;
}

/// Trivial implementation of line search. Equivalent to always taking the full step.
#[derive(Clone, Debug, Default)]
pub struct NoLineSearch;

impl<T: Real> LineSearch<T> for NoLineSearch {
    fn search<P>(
        &mut self,
        problem: &mut P,
        x: &mut DVector<T>,
        direction: &DVector<T>,
        _value: T,
        _gradient: &DVector<T>,
    ) -> Result<T, LineSearchError>
    where
        P: ?Sized + Problem<T>,
    {
        let x1 = &*x + direction;
        problem.line_search_begin(x, &x1);
        x.copy_from(&x1);
        problem.line_search_end();
        Ok(T::one())
    }
}

/// Backtracking line search using the Armijo condition.
///
/// A trial point is only accepted if the objective is finite there and the problem considers
/// the step both valid and collision free. The initial step is additionally bounded by
/// [`Problem::max_step_size`].
///
/// See Jorge & Nocedal (2006), Numerical Optimization, Chapter 3.1.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(serialize = "T: Serialize", deserialize = "T: Real + Deserialize<'de>"))]
pub struct BacktrackingLineSearch<T> {
    /// Sufficient decrease parameter in (0, 1).
    pub c: T,
    /// Factor in (0, 1) by which the step is shortened after a rejected trial.
    pub shrink_factor: T,
    pub initial_step: T,
    pub min_step: T,
}

impl<T: Real> Default for BacktrackingLineSearch<T> {
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn default() -> Self {
        Self {
            c: 1e-4,
            shrink_factor: 0.5,
            initial_step: 1.0,
            min_step: 1e-10,
        }
    }
}

impl<T: Real> LineSearch<T> for BacktrackingLineSearch<T> {
    fn search<P>(
        &mut self,
        problem: &mut P,
        x: &mut DVector<T>,
        direction: &DVector<T>,
        value: T,
        gradient: &DVector<T>,
    ) -> Result<T, LineSearchError>
    where
        P: ?Sized + Problem<T>,
    {
        let x0 = x.clone();
        let x1 = &x0 + direction;
        problem.line_search_begin(&x0, &x1);
        let result = self.backtrack(problem, &x0, &x1, direction, value, gradient);
        problem.line_search_end();

        let (step, accepted) = result?;
        x.copy_from(&accepted);
        Ok(step)
    }
}

impl<T: Real> BacktrackingLineSearch<T> {
    fn backtrack<P>(
        &self,
        problem: &mut P,
        x0: &DVector<T>,
        x1: &DVector<T>,
        direction: &DVector<T>,
        value: T,
        gradient: &DVector<T>,
    ) -> Result<(T, DVector<T>), LineSearchError>
    where
        P: ?Sized + Problem<T>,
    {
        // Sufficient decrease condition
        //  f(x + alpha * p) <= f(x) + c * alpha * grad f^T p
        // up to the round-off in f(x)
        let slope = gradient.dot(direction);
        let round_off = T::default_epsilon() * value.abs();
        if slope >= T::zero() {
            return Err(LineSearchError::NotDescentDirection);
        }

        let mut alpha = T::min(self.initial_step, problem.max_step_size(x0, x1));
        let mut trials = 0;
        loop {
            trials += 1;
            let trial = x0 + direction * alpha;
            if problem.is_step_valid(x0, &trial) && problem.is_step_collision_free(x0, &trial) {
                let trial_value = problem.value(&trial);
                if trial_value.is_finite()
                    && trial_value <= value + self.c * alpha * slope + round_off
                {
                    return Ok((alpha, trial));
                }
                trace!("Rejected step {}: insufficient decrease ({} vs {})", alpha, trial_value, value);
            } else {
                trace!("Rejected step {}: invalid or colliding", alpha);
            }

            if alpha < self.min_step {
                return Err(LineSearchError::StepTooSmall { trials });
            }
            alpha *= self.shrink_factor;
        }
    }
}
