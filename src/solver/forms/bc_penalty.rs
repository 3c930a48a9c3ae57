use super::{Form, PenaltyForm};
use crate::solver::boundary::DirichletBoundary;
use crate::Real;
use nalgebra::DVector;
use nalgebra_sparse::CooMatrix;
use numeric_literals::replace_float_literals;

/// Quadratic penalty $\frac{1}{2} \norm{x_D - \bar x_D}^2$ on the Dirichlet degrees of freedom.
///
/// The augmented Lagrangian weight is the form's weight. The form starts out disabled.
#[derive(Debug, Clone)]
pub struct BcPenaltyForm<T: Real> {
    boundary: DirichletBoundary<T>,
    weight: T,
    enabled: bool,
}

impl<T: Real> BcPenaltyForm<T> {
    pub fn new(boundary: DirichletBoundary<T>) -> Self {
        Self {
            boundary,
            weight: T::one(),
            enabled: false,
        }
    }

    pub fn boundary(&self) -> &DirichletBoundary<T> {
        &self.boundary
    }

    pub(crate) fn set_boundary(&mut self, boundary: DirichletBoundary<T>) {
        self.boundary = boundary;
    }
}

impl<T: Real> Form<T> for BcPenaltyForm<T> {
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn value_unweighted(&self, x: &DVector<T>) -> T {
        0.5 * self.boundary.residual(x).norm_squared()
    }

    fn gradient_unweighted(&self, x: &DVector<T>) -> DVector<T> {
        let mut gradient = DVector::zeros(x.len());
        let residual = self.boundary.residual(x);
        for (&dof, &r) in self.boundary.dofs().iter().zip(residual.iter()) {
            gradient[dof] = r;
        }
        gradient
    }

    fn hessian_unweighted(&self, x: &DVector<T>) -> CooMatrix<T> {
        let mut hessian = CooMatrix::new(x.len(), x.len());
        for &dof in self.boundary.dofs() {
            hessian.push(dof, dof, T::one());
        }
        hessian
    }

    fn weight(&self) -> T {
        self.weight
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl<T: Real> PenaltyForm<T> for BcPenaltyForm<T> {
    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn set_weight(&mut self, weight: T) {
        self.weight = weight;
    }

    fn compute_error(&self, x: &DVector<T>) -> T {
        self.boundary.residual(x).norm_squared()
    }
}
