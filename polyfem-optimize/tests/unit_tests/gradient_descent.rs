use super::QuadraticProblem;
use matrixcompare::assert_matrix_eq;
use nalgebra::DVector;
use polyfem_optimize::gradient_descent::GradientDescent;
use polyfem_optimize::minimize::{MinimizeError, Minimizer, StopCriteria};

#[test]
fn gradient_descent_converges_on_quadratic() {
    let mut problem = QuadraticProblem::new();
    let mut x = DVector::zeros(3);
    let mut solver = GradientDescent::new(StopCriteria {
        iterations: 10_000,
        grad_norm: 1e-6,
    });

    let output = solver.minimize(&mut problem, &mut x).unwrap();

    assert!(output.iterations > 1);
    assert!(output.grad_norm <= 1e-6);
    assert_matrix_eq!(x, QuadraticProblem::expected_solution(), comp = abs, tol = 1e-5);
}

#[test]
fn gradient_descent_reports_exhausted_iteration_budget() {
    let mut problem = QuadraticProblem::new();
    let mut x = DVector::zeros(3);
    let mut solver = GradientDescent::new(StopCriteria {
        iterations: 2,
        grad_norm: 1e-10,
    });

    let result = solver.minimize(&mut problem, &mut x);

    assert!(matches!(result, Err(MinimizeError::MaximumIterationsReached(2))));
    // Progress made before failing is kept
    assert_ne!(x, DVector::zeros(3));
}
