use super::{Form, LagrangianMultiplierForm};
use crate::solver::boundary::DirichletBoundary;
use crate::Real;
use nalgebra::DVector;
use nalgebra_sparse::CooMatrix;

/// Multiplier term $-\lambda^T (x_D - \bar x_D)$ of the augmented Lagrangian for Dirichlet
/// boundary conditions.
///
/// Together with [`BcPenaltyForm`](super::BcPenaltyForm) weighted by $k$, stationarity of the
/// total energy gives the update $\lambda \leftarrow \lambda - k (x_D - \bar x_D)$.
#[derive(Debug, Clone)]
pub struct BcLagrangianForm<T: Real> {
    boundary: DirichletBoundary<T>,
    multipliers: DVector<T>,
    enabled: bool,
}

impl<T: Real> BcLagrangianForm<T> {
    pub fn new(boundary: DirichletBoundary<T>) -> Self {
        let multipliers = DVector::zeros(boundary.dofs().len());
        Self {
            boundary,
            multipliers,
            enabled: false,
        }
    }

    pub fn multipliers(&self) -> &DVector<T> {
        &self.multipliers
    }

    /// Retargets the form. Multipliers estimated for the old targets are discarded.
    pub(crate) fn set_boundary(&mut self, boundary: DirichletBoundary<T>) {
        self.multipliers = DVector::zeros(boundary.dofs().len());
        self.boundary = boundary;
    }
}

impl<T: Real> Form<T> for BcLagrangianForm<T> {
    fn value_unweighted(&self, x: &DVector<T>) -> T {
        -self.multipliers.dot(&self.boundary.residual(x))
    }

    fn gradient_unweighted(&self, x: &DVector<T>) -> DVector<T> {
        let mut gradient = DVector::zeros(x.len());
        for (&dof, &lambda) in self.boundary.dofs().iter().zip(self.multipliers.iter()) {
            gradient[dof] = -lambda;
        }
        gradient
    }

    fn hessian_unweighted(&self, x: &DVector<T>) -> CooMatrix<T> {
        CooMatrix::new(x.len(), x.len())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl<T: Real> LagrangianMultiplierForm<T> for BcLagrangianForm<T> {
    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn update_lagrangian(&mut self, x: &DVector<T>, weight: T) {
        let residual = self.boundary.residual(x);
        self.multipliers.axpy(-weight, &residual, T::one());
    }
}
