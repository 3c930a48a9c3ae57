//! Augmented Lagrangian enforcement of Dirichlet boundary conditions.
//!
//! Prescribing boundary values directly can produce an invalid configuration, for example
//! inverted elements or interpenetrating geometry. [`AlSolver`] instead starts from the current
//! (valid) solution and drives the boundary degrees of freedom towards their targets with a
//! penalty and a Lagrange multiplier estimate. Once the boundary conditions can be applied
//! exactly without producing an invalid configuration, the remaining problem is solved over the
//! free degrees of freedom only.
use crate::solver::nl_problem::ConstrainedProblem;
use crate::Real;
use eyre::eyre;
use log::{debug, error, info, warn};
use nalgebra::DVector;
use numeric_literals::replace_float_literals;
use polyfem_optimize::minimize::{MinimizeError, Minimizer};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// Parameters of the augmented Lagrangian outer loop.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(serialize = "T: Serialize", deserialize = "T: Real + Deserialize<'de>"))]
pub struct AlSettings<T> {
    /// Penalty weight used for the first constrained solve.
    pub initial_weight: T,
    /// Factor by which the weight grows after insufficient progress.
    pub scaling: T,
    /// The weight never exceeds this value.
    pub max_weight: T,
    /// Progress ratio below which the weight grows instead of updating the multipliers.
    pub eta_tol: T,
    /// Iteration budget of each constrained solve. Uses the minimizer's own budget if `None`.
    pub inner_max_iterations: Option<usize>,
    /// Number of outer iterations after which the solve gives up. Unbounded if `None`.
    pub max_outer_iterations: Option<usize>,
}

impl<T: Real> Default for AlSettings<T> {
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn default() -> Self {
        Self {
            initial_weight: 1e6,
            scaling: 2.0,
            max_weight: 1e11,
            eta_tol: 0.99,
            inner_max_iterations: None,
            max_outer_iterations: None,
        }
    }
}

impl<T: Real> AlSettings<T> {
    pub fn validate(&self) -> eyre::Result<()> {
        if !(self.initial_weight > T::zero()) {
            return Err(eyre!("Initial AL weight must be positive, got {}", self.initial_weight));
        }
        if !(self.scaling > T::one()) {
            return Err(eyre!("AL weight scaling must be greater than one, got {}", self.scaling));
        }
        if !(self.max_weight >= self.initial_weight) {
            return Err(eyre!(
                "Maximum AL weight ({}) must not be smaller than the initial weight ({})",
                self.max_weight,
                self.initial_weight
            ));
        }
        if !(self.eta_tol > T::zero() && self.eta_tol < T::one()) {
            return Err(eyre!("AL eta tolerance must lie in (0, 1), got {}", self.eta_tol));
        }
        if self.inner_max_iterations == Some(0) {
            return Err(eyre!("Inner iteration budget must be positive"));
        }
        Ok(())
    }
}

/// How the boundary conditions are currently treated.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum AlMode<T> {
    /// Boundary degrees of freedom are eliminated and take their prescribed values.
    Reduced,
    /// All degrees of freedom are unknowns. The boundary conditions are enforced weakly by the
    /// augmented Lagrangian forms, with penalty weight `weight`.
    Constrained { weight: T },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlSolveOutput<T> {
    /// Number of constrained solves that were performed.
    pub outer_iterations: usize,
    /// The penalty weight at exit.
    pub al_weight: T,
    pub multiplier_updates: usize,
}

#[derive(Debug)]
pub enum AlSolveError {
    /// The boundary conditions cannot be applied exactly without producing an invalid point.
    BoundaryConditionsNotApplied,
    Minimization(MinimizeError),
    /// The outer loop did not reach a point where the boundary conditions can be applied.
    OuterIterationsExceeded(usize),
}

impl Display for AlSolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            &AlSolveError::BoundaryConditionsNotApplied => write!(
                f,
                "Failed to apply boundary conditions; solve with augmented lagrangian first!"
            ),
            &AlSolveError::Minimization(ref err) => {
                write!(f, "Minimization failed. Error: {}", err)
            }
            &AlSolveError::OuterIterationsExceeded(iters) => write!(
                f,
                "Failed to apply boundary conditions within {} augmented Lagrangian iterations.",
                iters
            ),
        }
    }
}

impl Error for AlSolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AlSolveError::Minimization(err) => Some(err),
            _ => None,
        }
    }
}

/// The result of a single inner minimization. Both outcomes carry the last accepted iterate.
enum SubsolveOutcome<T> {
    Converged(DVector<T>),
    Failed(DVector<T>, MinimizeError),
}

/// Relative progress $1 - \sqrt{e / e_0}$ of the constraint error $e$ with respect to the
/// initial error $e_0$.
///
/// Returns zero when the error did not change (including $e = e_0 = 0$) and a negative value
/// when the error grew.
pub fn compute_eta<T: Real>(initial_error: T, current_error: T) -> T {
    if current_error == initial_error {
        T::zero()
    } else {
        T::one() - (current_error / initial_error).sqrt()
    }
}

/// Solves a [`ConstrainedProblem`] with an augmented Lagrangian outer loop followed by a solve
/// in the reduced space.
pub struct AlSolver<'a, T: Real> {
    settings: AlSettings<T>,
    mode: AlMode<T>,
    update_barrier_stiffness: Box<dyn FnMut(&DVector<T>) + 'a>,
    post_subsolve: Box<dyn FnMut(T) + 'a>,
}

impl<'a, T: Real> AlSolver<'a, T> {
    /// `update_barrier_stiffness` is called with the full solution before every minimization.
    pub fn new(
        settings: AlSettings<T>,
        update_barrier_stiffness: impl FnMut(&DVector<T>) + 'a,
    ) -> eyre::Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            mode: AlMode::Reduced,
            update_barrier_stiffness: Box::new(update_barrier_stiffness),
            post_subsolve: Box::new(|_| {}),
        })
    }

    /// Registers a hook that is called after every outer iteration with the current weight,
    /// and with zero after a successful reduced solve.
    pub fn with_post_subsolve(mut self, post_subsolve: impl FnMut(T) + 'a) -> Self {
        self.post_subsolve = Box::new(post_subsolve);
        self
    }

    pub fn settings(&self) -> &AlSettings<T> {
        &self.settings
    }

    pub fn mode(&self) -> AlMode<T> {
        self.mode
    }

    /// Switches the problem between constrained solves with weight `weight > 0` and reduced
    /// solves (`weight <= 0`).
    ///
    /// Does nothing if the problem has no augmented Lagrangian forms.
    pub fn set_al_weight<P>(&mut self, problem: &mut P, x: &DVector<T>, weight: T)
    where
        P: ?Sized + ConstrainedProblem<T>,
    {
        if weight > T::zero() {
            self.enter_constrained(problem, x, weight);
        } else {
            self.enter_reduced(problem, x);
        }
    }

    fn enter_constrained<P>(&mut self, problem: &mut P, x: &DVector<T>, weight: T)
    where
        P: ?Sized + ConstrainedProblem<T>,
    {
        match problem.al_forms() {
            Some(forms) => {
                forms.penalty.enable();
                forms.lagrangian.enable();
                forms.penalty.set_weight(weight);
            }
            None => return,
        }
        problem.use_full_size();
        problem.set_apply_dbc(x, false);
        self.mode = AlMode::Constrained { weight };
    }

    fn enter_reduced<P>(&mut self, problem: &mut P, x: &DVector<T>)
    where
        P: ?Sized + ConstrainedProblem<T>,
    {
        match problem.al_forms() {
            Some(forms) => {
                forms.penalty.disable();
                forms.lagrangian.disable();
            }
            None => return,
        }
        problem.use_reduced_size();
        problem.set_apply_dbc(x, true);
        self.mode = AlMode::Reduced;
    }

    /// Applies the boundary conditions with the augmented Lagrangian method and then solves
    /// the problem in the reduced space.
    pub fn solve<M, P>(
        &mut self,
        minimizer: &mut M,
        problem: &mut P,
        solution: &mut DVector<T>,
    ) -> Result<AlSolveOutput<T>, AlSolveError>
    where
        M: ?Sized + Minimizer<T>,
        P: ?Sized + ConstrainedProblem<T>,
    {
        let output = self.solve_with_augmented_lagrangian(minimizer, problem, solution)?;
        self.solve_in_reduced_space(minimizer, problem, solution)?;
        Ok(output)
    }

    /// Moves the full solution `solution` until the boundary conditions can be applied exactly.
    ///
    /// Returns immediately if this is already the case. Failures of the inner minimizations are
    /// not errors: the outer loop continues from the last accepted iterate. The problem is in
    /// reduced size with boundary conditions applied whenever this method returns.
    ///
    /// Fails without touching `solution` if the boundary conditions cannot be applied and the
    /// problem has no augmented Lagrangian forms.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn solve_with_augmented_lagrangian<M, P>(
        &mut self,
        minimizer: &mut M,
        problem: &mut P,
        solution: &mut DVector<T>,
    ) -> Result<AlSolveOutput<T>, AlSolveError>
    where
        M: ?Sized + Minimizer<T>,
        P: ?Sized + ConstrainedProblem<T>,
    {
        assert_eq!(solution.len(), problem.full_size());

        let initial_solution = solution.clone();
        let mut reduced = problem.full_to_reduced(solution);
        assert_eq!(reduced.len(), problem.reduced_size());

        let mut al_weight = self.settings.initial_weight;
        let mut outer_iterations = 0;
        let mut multiplier_updates = 0;
        let mut saturation_reported = false;

        let iterations = minimizer.stop_criteria().iterations;
        let initial_error = constraint_error(problem, solution);

        problem.line_search_begin(solution, &reduced);
        while !is_valid_point(problem, solution, &reduced) {
            problem.line_search_end();

            if problem.al_forms().is_none() {
                minimizer.stop_criteria_mut().iterations = iterations;
                error!("{}", AlSolveError::BoundaryConditionsNotApplied);
                return Err(AlSolveError::BoundaryConditionsNotApplied);
            }

            if let Some(max_outer) = self.settings.max_outer_iterations {
                if outer_iterations >= max_outer {
                    minimizer.stop_criteria_mut().iterations = iterations;
                    error!(
                        "Failed to apply boundary conditions within {} AL iterations",
                        outer_iterations
                    );
                    return Err(AlSolveError::OuterIterationsExceeded(outer_iterations));
                }
            }

            self.set_al_weight(problem, solution, al_weight);
            debug!("Solving AL problem with weight {}", al_weight);

            problem.init(solution);
            (self.update_barrier_stiffness)(solution);
            if let Some(inner_iterations) = self.settings.inner_max_iterations {
                minimizer.stop_criteria_mut().iterations = inner_iterations;
            }

            match subsolve(minimizer, problem, solution.clone()) {
                SubsolveOutcome::Converged(x) => *solution = x,
                SubsolveOutcome::Failed(x, err) => {
                    debug!("AL inner solve failed, continuing from last iterate: {}", err);
                    *solution = x;
                }
            }

            self.set_al_weight(problem, solution, -1.0);

            let current_error = constraint_error(problem, solution);
            let eta = compute_eta(initial_error, current_error);
            debug!("Current eta = {}", eta);

            if eta < 0.0 {
                debug!("Higher energy boundary conditions, resetting to initial solution");
                solution.copy_from(&initial_solution);
            }

            reduced = problem.full_to_reduced(solution);
            problem.line_search_begin(solution, &reduced);

            if eta < self.settings.eta_tol && al_weight < self.settings.max_weight {
                al_weight = (al_weight * self.settings.scaling).min(self.settings.max_weight);
            } else {
                if let Some(forms) = problem.al_forms() {
                    forms.lagrangian.update_lagrangian(solution, al_weight);
                    multiplier_updates += 1;
                }
                if eta < self.settings.eta_tol && !saturation_reported {
                    warn!(
                        "AL weight reached its maximum ({}), relying on multiplier updates",
                        al_weight
                    );
                    saturation_reported = true;
                }
            }

            (self.post_subsolve)(al_weight);
            outer_iterations += 1;
        }
        problem.line_search_end();
        minimizer.stop_criteria_mut().iterations = iterations;

        info!(
            "Boundary conditions applied after {} AL iterations (weight {})",
            outer_iterations, al_weight
        );
        Ok(AlSolveOutput {
            outer_iterations,
            al_weight,
            multiplier_updates,
        })
    }

    /// Minimizes over the free degrees of freedom, with the boundary conditions applied exactly.
    ///
    /// Fails without touching `solution` if applying the boundary conditions yields an invalid
    /// point. If the minimization fails, `solution` holds the last accepted iterate.
    pub fn solve_in_reduced_space<M, P>(
        &mut self,
        minimizer: &mut M,
        problem: &mut P,
        solution: &mut DVector<T>,
    ) -> Result<(), AlSolveError>
    where
        M: ?Sized + Minimizer<T>,
        P: ?Sized + ConstrainedProblem<T>,
    {
        assert_eq!(solution.len(), problem.full_size());

        let reduced = problem.full_to_reduced(solution);
        problem.line_search_begin(solution, &reduced);
        let valid = is_valid_point(problem, solution, &reduced);
        problem.line_search_end();
        if !valid {
            error!("{}", AlSolveError::BoundaryConditionsNotApplied);
            return Err(AlSolveError::BoundaryConditionsNotApplied);
        }

        problem.init(solution);
        (self.update_barrier_stiffness)(solution);

        match subsolve(minimizer, problem, reduced) {
            SubsolveOutcome::Converged(x) => {
                *solution = problem.reduced_to_full(&x);
                (self.post_subsolve)(T::zero());
                Ok(())
            }
            SubsolveOutcome::Failed(x, err) => {
                *solution = problem.reduced_to_full(&x);
                Err(AlSolveError::Minimization(err))
            }
        }
    }
}

fn subsolve<T, M, P>(minimizer: &mut M, problem: &mut P, mut x: DVector<T>) -> SubsolveOutcome<T>
where
    T: Real,
    M: ?Sized + Minimizer<T>,
    P: ?Sized + ConstrainedProblem<T>,
{
    match minimizer.minimize(problem, &mut x) {
        Ok(output) => {
            debug!(
                "Inner solve converged after {} iterations (gradient norm {})",
                output.iterations, output.grad_norm
            );
            SubsolveOutcome::Converged(x)
        }
        Err(err) => SubsolveOutcome::Failed(x, err),
    }
}

/// Whether applying the boundary conditions, i.e. moving from `full` to `reduced`, yields a
/// finite, valid and collision-free point.
fn is_valid_point<T, P>(problem: &mut P, full: &DVector<T>, reduced: &DVector<T>) -> bool
where
    T: Real,
    P: ?Sized + ConstrainedProblem<T>,
{
    problem.value(reduced).is_finite()
        && problem.is_step_valid(full, reduced)
        && problem.is_step_collision_free(full, reduced)
}

fn constraint_error<T, P>(problem: &mut P, x: &DVector<T>) -> T
where
    T: Real,
    P: ?Sized + ConstrainedProblem<T>,
{
    problem
        .al_forms()
        .map(|forms| forms.penalty.compute_error(x))
        .unwrap_or_else(T::zero)
}
