use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use nalgebra_sparse::CooMatrix;
use polyfem_optimize::problem::Problem;

mod gradient_descent;
mod line_search;
mod newton;

/// The quadratic f(x) = 1/2 x^T A x - b^T x with a fixed SPD matrix A.
///
/// Optionally rejects every trial point whose first coordinate exceeds `collision_bound`.
pub struct QuadraticProblem {
    pub a: DMatrix<f64>,
    pub b: DVector<f64>,
    pub collision_bound: Option<f64>,
    pub max_step: f64,
    pub line_searches: usize,
    pub solution_changes: usize,
}

impl QuadraticProblem {
    pub fn new() -> Self {
        #[rustfmt::skip]
        let a = Matrix3::new(5.0, 1.0, 2.0,
                             1.0, 4.0, 2.0,
                             2.0, 2.0, 4.0);
        let b = Vector3::new(1.0, 2.0, 3.0);
        Self {
            a: DMatrix::from_iterator(3, 3, a.iter().copied()),
            b: DVector::from_column_slice(b.as_slice()),
            collision_bound: None,
            max_step: 1.0,
            line_searches: 0,
            solution_changes: 0,
        }
    }

    pub fn expected_solution() -> DVector<f64> {
        DVector::from_column_slice(&[-0.125, 0.16666667, 0.72916667])
    }
}

impl Problem<f64> for QuadraticProblem {
    fn value(&mut self, x: &DVector<f64>) -> f64 {
        0.5 * x.dot(&(&self.a * x)) - self.b.dot(x)
    }

    fn gradient(&mut self, x: &DVector<f64>) -> DVector<f64> {
        &self.a * x - &self.b
    }

    fn hessian(&mut self, _x: &DVector<f64>) -> CooMatrix<f64> {
        CooMatrix::from(&self.a)
    }

    fn is_step_collision_free(&mut self, _x0: &DVector<f64>, x1: &DVector<f64>) -> bool {
        self.collision_bound.map(|bound| x1[0] <= bound).unwrap_or(true)
    }

    fn max_step_size(&mut self, _x0: &DVector<f64>, _x1: &DVector<f64>) -> f64 {
        self.max_step
    }

    fn line_search_begin(&mut self, _x0: &DVector<f64>, _x1: &DVector<f64>) {
        self.line_searches += 1;
    }

    fn solution_changed(&mut self, _x: &DVector<f64>) {
        self.solution_changes += 1;
    }
}
