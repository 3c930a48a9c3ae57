use super::QuadraticProblem;
use nalgebra::DVector;
use nalgebra_sparse::CooMatrix;
use polyfem_optimize::line_search::{BacktrackingLineSearch, LineSearch, LineSearchError, NoLineSearch};
use polyfem_optimize::problem::Problem;

fn search(
    problem: &mut QuadraticProblem,
    line_search: &mut impl LineSearch<f64>,
    x: &mut DVector<f64>,
    direction: &DVector<f64>,
) -> Result<f64, LineSearchError> {
    let value = problem.value(x);
    let gradient = problem.gradient(x);
    line_search.search(problem, x, direction, value, &gradient)
}

#[test]
fn backtracking_accepts_full_newton_step_on_quadratic() {
    let mut problem = QuadraticProblem::new();
    let mut x = DVector::zeros(3);
    let direction = QuadraticProblem::expected_solution();

    let step = search(&mut problem, &mut BacktrackingLineSearch::default(), &mut x, &direction).unwrap();

    assert_eq!(step, 1.0);
    assert_eq!(x, direction);
    assert_eq!(problem.line_searches, 1);
}

#[test]
fn backtracking_rejects_colliding_steps() {
    let mut problem = QuadraticProblem::new();
    problem.collision_bound = Some(0.3);
    let mut x = DVector::zeros(3);
    let direction = DVector::from_column_slice(&[1.0, 0.0, 0.0]);

    // f(t e_0) = 2.5 t^2 - t, minimized at t = 0.2. Steps 1.0 and 0.5 collide.
    let step = search(&mut problem, &mut BacktrackingLineSearch::default(), &mut x, &direction).unwrap();

    assert_eq!(step, 0.25);
    assert_eq!(x[0], 0.25);
}

#[test]
fn backtracking_respects_max_step_size() {
    let mut problem = QuadraticProblem::new();
    problem.max_step = 0.1;
    let mut x = DVector::zeros(3);
    let direction = QuadraticProblem::expected_solution();

    let step = search(&mut problem, &mut BacktrackingLineSearch::default(), &mut x, &direction).unwrap();

    assert_eq!(step, 0.1);
}

#[test]
fn backtracking_rejects_ascent_direction() {
    let mut problem = QuadraticProblem::new();
    let mut x = DVector::zeros(3);
    let direction = -QuadraticProblem::expected_solution();

    let result = search(&mut problem, &mut BacktrackingLineSearch::default(), &mut x, &direction);

    assert_eq!(result, Err(LineSearchError::NotDescentDirection));
    assert_eq!(x, DVector::zeros(3));
    // The problem must still see a balanced begin/end pair
    assert_eq!(problem.line_searches, 1);
}

#[test]
fn backtracking_fails_when_every_step_collides() {
    let mut problem = QuadraticProblem::new();
    problem.collision_bound = Some(-1.0);
    let mut x = DVector::zeros(3);
    let direction = DVector::from_column_slice(&[1.0, 0.0, 0.0]);

    let result = search(&mut problem, &mut BacktrackingLineSearch::default(), &mut x, &direction);

    assert!(matches!(result, Err(LineSearchError::StepTooSmall { .. })));
    assert_eq!(x, DVector::zeros(3));
}

#[test]
fn no_line_search_takes_full_step() {
    let mut problem = QuadraticProblem::new();
    problem.collision_bound = Some(-1.0);
    let mut x = DVector::zeros(3);
    let direction = DVector::from_column_slice(&[1.0, 2.0, 3.0]);

    let step = search(&mut problem, &mut NoLineSearch, &mut x, &direction).unwrap();

    assert_eq!(step, 1.0);
    assert_eq!(x, direction);
}

/// f(x) = 1 + 1/2 |x|^2, whose value is dominated by the constant near the minimum.
struct OffsetProblem;

impl Problem<f64> for OffsetProblem {
    fn value(&mut self, x: &DVector<f64>) -> f64 {
        1.0 + 0.5 * x.norm_squared()
    }

    fn gradient(&mut self, x: &DVector<f64>) -> DVector<f64> {
        x.clone()
    }

    fn hessian(&mut self, x: &DVector<f64>) -> CooMatrix<f64> {
        let mut hessian = CooMatrix::new(x.len(), x.len());
        for i in 0..x.len() {
            hessian.push(i, i, 1.0);
        }
        hessian
    }
}

#[test]
fn backtracking_tolerates_round_off_in_objective() {
    let mut problem = OffsetProblem;
    let mut x = DVector::from_element(1, 1e-9);
    let direction = DVector::from_element(1, -1e-9);
    let gradient = problem.gradient(&x);
    // The exact decrease is far below the resolution of f, so the value at the start is only
    // known up to round-off
    let value = 1.0 - f64::EPSILON / 2.0;

    let step = BacktrackingLineSearch::default()
        .search(&mut problem, &mut x, &direction, value, &gradient)
        .unwrap();

    assert_eq!(step, 1.0);
    assert_eq!(x, DVector::zeros(1));
}
