use super::{spring_chain_stiffness, CountingForm, HookCounts, StepLimitForm};
use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CooMatrix;
use polyfem::optimize::calculus::{gradient_error_fd, hessian_error_fd};
use polyfem::optimize::problem::Problem;
use polyfem::solver::boundary::DirichletBoundary;
use polyfem::solver::forms::{Form, PenaltyForm, QuadraticForm};
use polyfem::solver::nl_problem::{ConstrainedProblem, NLProblem, SpaceSize};

/// Five nodes connected by springs, with the ends pulled to 0 and 1.
fn spring_chain_problem() -> NLProblem<f64> {
    let boundary =
        DirichletBoundary::new(5, vec![0, 4], DVector::from_column_slice(&[0.0, 1.0])).unwrap();
    let load = DVector::from_column_slice(&[0.0, 0.5, -0.25, 1.0, 0.0]);
    let quadratic = QuadraticForm::new(spring_chain_stiffness(5), load).unwrap();
    let forms: Vec<Box<dyn Form<f64>>> = vec![Box::new(quadratic)];
    NLProblem::new(boundary, forms).with_augmented_lagrangian()
}

fn dense(coo: &CooMatrix<f64>) -> DMatrix<f64> {
    let mut matrix = DMatrix::zeros(coo.nrows(), coo.ncols());
    for (i, j, v) in coo.triplet_iter() {
        matrix[(i, j)] += *v;
    }
    matrix
}

fn enable_al_forms(problem: &mut NLProblem<f64>, weight: f64) {
    let forms = problem.al_forms().unwrap();
    forms.penalty.enable();
    forms.penalty.set_weight(weight);
    forms.lagrangian.enable();
}

#[test]
fn nl_problem_starts_in_reduced_size_with_dbc_applied() {
    let problem = spring_chain_problem();

    assert_eq!(problem.size(), SpaceSize::Reduced);
    assert!(problem.applies_dbc());
    assert_eq!(problem.full_size(), 5);
    assert_eq!(problem.reduced_size(), 3);
    assert_eq!(problem.current_size(), 3);
    // The augmented Lagrangian forms are kept apart from the user forms
    assert_eq!(problem.forms().len(), 1);
    assert!(problem.forms()[0].is_enabled());
}

#[test]
fn nl_problem_size_conversions() {
    let mut problem = spring_chain_problem();
    let x = DVector::from_column_slice(&[0.5, 1.0, 2.0, 3.0, 0.25]);

    let reduced = problem.full_to_reduced(&x);
    assert_eq!(reduced, DVector::from_column_slice(&[1.0, 2.0, 3.0]));
    assert_eq!(
        problem.reduced_to_full(&reduced),
        DVector::from_column_slice(&[0.0, 1.0, 2.0, 3.0, 1.0])
    );
    assert_eq!(problem.reduced_to_full(&x), x);

    problem.use_full_size();
    assert_eq!(problem.current_size(), 5);
    assert_eq!(problem.full_to_reduced(&x), x);
}

#[test]
fn nl_problem_holds_boundary_values_while_dbc_is_disabled() {
    let mut problem = spring_chain_problem();
    let x = DVector::from_column_slice(&[0.5, 1.0, 2.0, 3.0, 0.25]);
    let reduced = DVector::from_column_slice(&[7.0, 8.0, 9.0]);

    problem.set_apply_dbc(&x, false);
    assert!(!problem.applies_dbc());
    assert_eq!(
        problem.reduced_to_full(&reduced),
        DVector::from_column_slice(&[0.5, 7.0, 8.0, 9.0, 0.25])
    );

    problem.set_apply_dbc(&x, true);
    assert_eq!(
        problem.reduced_to_full(&reduced),
        DVector::from_column_slice(&[0.0, 7.0, 8.0, 9.0, 1.0])
    );
}

#[test]
fn nl_problem_reduced_derivatives_are_restrictions_of_full_derivatives() {
    let mut problem = spring_chain_problem();
    let x = DVector::from_column_slice(&[0.0, 0.3, -0.2, 0.9, 1.0]);
    let reduced = problem.full_to_reduced(&x);

    let reduced_gradient = problem.gradient(&reduced);
    let reduced_hessian = dense(&problem.hessian(&reduced));

    problem.use_full_size();
    let full_gradient = problem.gradient(&x);
    let full_hessian = dense(&problem.hessian(&x));

    assert_eq!(reduced_gradient, full_gradient.rows(1, 3).clone_owned());
    let interior = full_hessian.view((1, 1), (3, 3)).clone_owned();
    assert_matrix_eq!(reduced_hessian, interior, comp = abs, tol = 1e-12);
    assert_eq!(problem.value(&x), problem.value(&reduced));
}

#[test]
fn nl_problem_derivatives_match_finite_differences() {
    let mut problem = spring_chain_problem();
    let x = DVector::from_column_slice(&[0.1, 0.3, -0.2, 0.9, 1.3]);

    let reduced = problem.full_to_reduced(&x);
    assert!(gradient_error_fd(&mut problem, &reduced, 1e-6) < 1e-6);
    assert!(hessian_error_fd(&mut problem, &reduced, 1e-6) < 1e-6);

    problem.use_full_size();
    problem.set_apply_dbc(&x, false);
    enable_al_forms(&mut problem, 100.0);
    let al_forms = problem.al_forms().unwrap();
    al_forms.lagrangian.update_lagrangian(&x, 100.0);

    assert!(gradient_error_fd(&mut problem, &x, 1e-6) < 1e-5);
    assert!(hessian_error_fd(&mut problem, &x, 1e-6) < 1e-4);
}

#[test]
fn nl_problem_sums_enabled_forms_only() {
    let mut problem = spring_chain_problem();
    let x = DVector::from_column_slice(&[0.5, 0.0, 0.0, 0.0, 0.0]);
    problem.use_full_size();

    let without_penalty = problem.value(&x);
    enable_al_forms(&mut problem, 4.0);
    let with_penalty = problem.value(&x);

    // Residual (0.5, -1) weighted by 4
    assert!((with_penalty - without_penalty - 0.5 * 4.0 * 1.25).abs() < 1e-12);
}

#[test]
fn nl_problem_lifts_trial_points_before_checking_collisions() {
    let boundary = DirichletBoundary::new(3, vec![2], DVector::from_element(1, 1.0)).unwrap();
    let forms: Vec<Box<dyn Form<f64>>> = vec![Box::new(StepLimitForm { max_displacement: 0.5 })];
    let mut problem = NLProblem::new(boundary, forms);

    let x = DVector::zeros(3);
    let reduced = problem.full_to_reduced(&x);

    // Applying the boundary condition moves the last dof by 1
    assert!(!problem.is_step_collision_free(&x, &reduced));
    assert!(problem.is_step_collision_free(&reduced, &reduced));
    assert!(problem.is_step_valid(&x, &reduced));
}

#[test]
fn nl_problem_forwards_hooks_to_forms() {
    let counts = HookCounts::default();
    let forms: Vec<Box<dyn Form<f64>>> = vec![Box::new(CountingForm {
        counts: counts.clone(),
    })];
    let mut problem = NLProblem::new(DirichletBoundary::empty(2), forms);
    let x = DVector::zeros(2);

    problem.init(&x);
    problem.line_search_begin(&x, &x);
    problem.line_search_end();

    assert_eq!(counts.inits.get(), 1);
    assert_eq!(counts.line_search_begins.get(), 1);
    assert_eq!(counts.line_search_ends.get(), 1);
}

#[test]
fn nl_problem_without_al_forms_exposes_none() {
    let mut problem = NLProblem::new(DirichletBoundary::<f64>::empty(2), Vec::new());
    assert!(problem.al_forms().is_none());
    assert!(problem.penalty_form().is_none());
    assert!(problem.lagrangian_form().is_none());
}

#[test]
fn nl_problem_update_boundary_values_resets_multipliers() {
    let mut problem = spring_chain_problem();
    let x = DVector::from_column_slice(&[0.5, 0.0, 0.0, 0.0, 0.0]);
    problem.al_forms().unwrap().lagrangian.update_lagrangian(&x, 2.0);
    assert!(problem.lagrangian_form().unwrap().multipliers().amax() > 0.0);

    problem
        .update_boundary_values(DVector::from_column_slice(&[0.0, 2.0]))
        .unwrap();

    assert_eq!(problem.lagrangian_form().unwrap().multipliers(), &DVector::zeros(2));
    assert_eq!(problem.boundary().values(), &DVector::from_column_slice(&[0.0, 2.0]));
    assert_eq!(problem.penalty_form().unwrap().compute_error(&x), 0.25 + 4.0);
}

#[test]
fn nl_problem_refuses_boundary_update_during_constrained_solve() {
    let mut problem = spring_chain_problem();
    let x = DVector::zeros(5);
    problem.set_apply_dbc(&x, false);

    assert!(problem
        .update_boundary_values(DVector::from_column_slice(&[0.0, 2.0]))
        .is_err());
    assert_eq!(problem.boundary().values(), &DVector::from_column_slice(&[0.0, 1.0]));
}
