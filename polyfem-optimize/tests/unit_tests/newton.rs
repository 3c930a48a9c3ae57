use super::QuadraticProblem;
use matrixcompare::assert_matrix_eq;
use nalgebra::DVector;
use polyfem_optimize::linear_solver::{ConjugateGradientSolver, LinearSolverSettings};
use polyfem_optimize::minimize::{MinimizeError, Minimizer, StopCriteria};
use polyfem_optimize::newton::*;

#[test]
fn newton_converges_in_single_iteration_for_quadratic() {
    let mut problem = QuadraticProblem::new();
    let mut x = DVector::zeros(3);
    let mut newton = NewtonMinimizer::default();

    let output = newton
        .minimize(&mut problem, &mut x)
        .expect("Newton iterations must succeed");

    assert_matrix_eq!(x, QuadraticProblem::expected_solution(), comp = abs, tol = 1e-6);
    assert_eq!(output.iterations, 1);
    assert!(output.grad_norm <= 1e-8);
    assert_eq!(problem.solution_changes, 1);
}

#[test]
fn newton_with_conjugate_gradient_converges() {
    let settings = NewtonSettings {
        linear_solver: LinearSolverSettings::conjugate_gradient(),
        ..NewtonSettings::default()
    };
    let mut problem = QuadraticProblem::new();
    let mut x = DVector::from_column_slice(&[1.0, 1.0, 1.0]);

    NewtonMinimizer::new(settings).minimize(&mut problem, &mut x).unwrap();

    assert_matrix_eq!(x, QuadraticProblem::expected_solution(), comp = abs, tol = 1e-6);
}

#[test]
fn newton_takes_several_iterations_when_steps_are_bounded() {
    let mut problem = QuadraticProblem::new();
    problem.max_step = 0.5;
    let mut x = DVector::zeros(3);

    let output = NewtonMinimizer::default().minimize(&mut problem, &mut x).unwrap();

    assert!(output.iterations > 1);
    assert_matrix_eq!(x, QuadraticProblem::expected_solution(), comp = abs, tol = 1e-6);
}

#[test]
fn newton_reports_exhausted_iteration_budget() {
    let mut problem = QuadraticProblem::new();
    let mut x = DVector::from_column_slice(&[1.0, 2.0, 3.0]);
    let mut newton = NewtonMinimizer::default();
    newton.stop_criteria_mut().iterations = 0;

    let result = newton.minimize(&mut problem, &mut x);

    assert!(matches!(result, Err(MinimizeError::MaximumIterationsReached(0))));
    assert_eq!(x, DVector::from_column_slice(&[1.0, 2.0, 3.0]));
}

#[test]
fn newton_leaves_last_iterate_on_line_search_failure() {
    let mut problem = QuadraticProblem::new();
    // Every trial point reachable from the origin collides
    problem.collision_bound = Some(-1.0);
    let mut x = DVector::from_column_slice(&[0.0, 0.0, 0.0]);

    let result = NewtonMinimizer::default().minimize(&mut problem, &mut x);

    assert!(matches!(result, Err(MinimizeError::LineSearchFailed(_))));
    assert_eq!(x, DVector::zeros(3));
}

#[test]
fn newton_falls_back_to_gradient_when_linear_solve_fails() {
    let mut problem = QuadraticProblem::new();
    let mut x = DVector::zeros(3);
    // A single CG iteration cannot solve the 3x3 system, so every direction falls back to -grad
    let mut newton = NewtonMinimizer::default().with_linear_solver(Box::new(ConjugateGradientSolver::new(1, 1e-14)));
    newton.stop_criteria_mut().iterations = 10_000;

    newton.minimize(&mut problem, &mut x).unwrap();

    assert_matrix_eq!(x, QuadraticProblem::expected_solution(), comp = abs, tol = 1e-6);
}

#[test]
fn newton_without_fallback_propagates_linear_solve_error() {
    let settings = NewtonSettings {
        linear_solver: LinearSolverSettings::ConjugateGradient {
            max_iterations: 1,
            tolerance: 1e-14,
        },
        gradient_fallback: false,
        ..NewtonSettings::default()
    };
    let mut problem = QuadraticProblem::new();
    let mut x = DVector::zeros(3);

    let result = NewtonMinimizer::new(settings).minimize(&mut problem, &mut x);

    assert!(matches!(result, Err(MinimizeError::LinearSolveFailed(_))));
}

#[test]
fn newton_settings_deserialize_with_defaults() {
    let settings: NewtonSettings<f64> = serde_json::from_str(
        r#"{
            "stop_criteria": { "iterations": 20 },
            "linear_solver": { "solver": "conjugate_gradient", "max_iterations": 50, "tolerance": 1e-6 }
        }"#,
    )
    .unwrap();

    assert_eq!(
        settings.stop_criteria,
        StopCriteria {
            iterations: 20,
            grad_norm: 1e-8
        }
    );
    assert_eq!(
        settings.linear_solver,
        LinearSolverSettings::ConjugateGradient {
            max_iterations: 50,
            tolerance: 1e-6
        }
    );
    assert!(settings.gradient_fallback);
    assert_eq!(settings.line_search, NewtonSettings::<f64>::default().line_search);
}
