use crate::solver::boundary::DirichletBoundary;
use crate::solver::forms::{
    BcLagrangianForm, BcPenaltyForm, Form, LagrangianMultiplierForm, PenaltyForm,
};
use crate::Real;
use eyre::eyre;
use nalgebra::DVector;
use nalgebra_sparse::CooMatrix;
use polyfem_optimize::problem::Problem;

/// Mutable access to the two augmented Lagrangian forms of a problem.
pub struct AlForms<'a, T> {
    pub lagrangian: &'a mut dyn LagrangianMultiplierForm<T>,
    pub penalty: &'a mut dyn PenaltyForm<T>,
}

/// A [`Problem`] whose unknowns are subject to Dirichlet boundary conditions.
///
/// The problem is either posed over all degrees of freedom (*full* size) or only over the free
/// ones (*reduced* size), and can convert between the two representations. Full-size vectors are
/// accepted everywhere a vector of the current size is expected.
pub trait ConstrainedProblem<T: Real>: Problem<T> {
    fn full_size(&self) -> usize;

    fn reduced_size(&self) -> usize;

    /// The dimension of the vectors the minimizer currently operates on.
    fn current_size(&self) -> usize;

    /// Maps a full vector to the current representation.
    fn full_to_reduced(&self, full: &DVector<T>) -> DVector<T>;

    /// Maps a vector of the current (or full) size to a full vector.
    fn reduced_to_full(&self, reduced: &DVector<T>) -> DVector<T>;

    /// Prepares the problem for a minimization starting at the full vector `x`.
    fn init(&mut self, x: &DVector<T>);

    fn use_full_size(&mut self);

    fn use_reduced_size(&mut self);

    /// Selects whether prescribed values or the values of `x` fill the boundary degrees of freedom
    /// when lifting reduced vectors.
    fn set_apply_dbc(&mut self, x: &DVector<T>, apply: bool);

    /// The augmented Lagrangian forms, if the problem has them.
    fn al_forms(&mut self) -> Option<AlForms<'_, T>>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SpaceSize {
    Full,
    Reduced,
}

/// A sum of forms over a displacement-like unknown constrained by Dirichlet conditions.
///
/// Starts out in reduced size with the boundary conditions applied.
pub struct NLProblem<T: Real> {
    boundary: DirichletBoundary<T>,
    forms: Vec<Box<dyn Form<T>>>,
    penalty: Option<BcPenaltyForm<T>>,
    lagrangian: Option<BcLagrangianForm<T>>,
    size: SpaceSize,
    apply_dbc: bool,
    /// Fill for the boundary degrees of freedom while the boundary conditions are not applied.
    held_boundary_values: DVector<T>,
}

impl<T: Real> NLProblem<T> {
    pub fn new(boundary: DirichletBoundary<T>, forms: Vec<Box<dyn Form<T>>>) -> Self {
        let held_boundary_values = boundary.values().clone();
        Self {
            boundary,
            forms,
            penalty: None,
            lagrangian: None,
            size: SpaceSize::Reduced,
            apply_dbc: true,
            held_boundary_values,
        }
    }

    /// Adds the (initially disabled) penalty and multiplier forms enforcing the boundary
    /// conditions weakly.
    pub fn with_augmented_lagrangian(mut self) -> Self {
        self.penalty = Some(BcPenaltyForm::new(self.boundary.clone()));
        self.lagrangian = Some(BcLagrangianForm::new(self.boundary.clone()));
        self
    }

    pub fn boundary(&self) -> &DirichletBoundary<T> {
        &self.boundary
    }

    pub fn forms(&self) -> &[Box<dyn Form<T>>] {
        &self.forms
    }

    pub fn penalty_form(&self) -> Option<&BcPenaltyForm<T>> {
        self.penalty.as_ref()
    }

    pub fn lagrangian_form(&self) -> Option<&BcLagrangianForm<T>> {
        self.lagrangian.as_ref()
    }

    pub fn size(&self) -> SpaceSize {
        self.size
    }

    pub fn applies_dbc(&self) -> bool {
        self.apply_dbc
    }

    /// Prescribes new target values, e.g. at the start of a load step.
    ///
    /// The multipliers of the augmented Lagrangian are reset.
    pub fn update_boundary_values(&mut self, values: DVector<T>) -> eyre::Result<()> {
        if !self.apply_dbc {
            return Err(eyre!(
                "Cannot update boundary values while boundary conditions are not applied"
            ));
        }
        self.boundary.set_values(values)?;
        self.held_boundary_values = self.boundary.values().clone();
        if let Some(penalty) = &mut self.penalty {
            penalty.set_boundary(self.boundary.clone());
        }
        if let Some(lagrangian) = &mut self.lagrangian {
            lagrangian.set_boundary(self.boundary.clone());
        }
        Ok(())
    }

    fn active_forms(&self) -> impl Iterator<Item = &dyn Form<T>> {
        self.forms
            .iter()
            .map(|form| form.as_ref())
            .chain(self.penalty.iter().map(|form| form as &dyn Form<T>))
            .chain(self.lagrangian.iter().map(|form| form as &dyn Form<T>))
            .filter(|form| form.is_enabled())
    }

    fn full_gradient_to_current(&self, gradient: DVector<T>) -> DVector<T> {
        match self.size {
            SpaceSize::Full => gradient,
            SpaceSize::Reduced => self.boundary.restrict(&gradient),
        }
    }
}

impl<T: Real> Problem<T> for NLProblem<T> {
    fn value(&mut self, x: &DVector<T>) -> T {
        let x = self.reduced_to_full(x);
        self.active_forms()
            .map(|form| form.value(&x))
            .fold(T::zero(), |acc, v| acc + v)
    }

    fn gradient(&mut self, x: &DVector<T>) -> DVector<T> {
        let x = self.reduced_to_full(x);
        let mut gradient = DVector::zeros(x.len());
        for form in self.active_forms() {
            gradient.axpy(form.weight(), &form.gradient_unweighted(&x), T::one());
        }
        self.full_gradient_to_current(gradient)
    }

    fn hessian(&mut self, x: &DVector<T>) -> CooMatrix<T> {
        let x = self.reduced_to_full(x);
        let n = self.current_size();
        let mut hessian = CooMatrix::new(n, n);
        for form in self.active_forms() {
            let weight = form.weight();
            let form_hessian = form.hessian_unweighted(&x);
            for (i, j, &v) in form_hessian.triplet_iter() {
                match self.size {
                    SpaceSize::Full => hessian.push(i, j, weight * v),
                    SpaceSize::Reduced => {
                        let ri = self.boundary.reduced_index(i);
                        let rj = self.boundary.reduced_index(j);
                        if let (Some(ri), Some(rj)) = (ri, rj) {
                            hessian.push(ri, rj, weight * v);
                        }
                    }
                }
            }
        }
        hessian
    }

    fn is_step_valid(&mut self, x0: &DVector<T>, x1: &DVector<T>) -> bool {
        let (x0, x1) = (self.reduced_to_full(x0), self.reduced_to_full(x1));
        self.forms.iter().all(|form| form.is_step_valid(&x0, &x1))
    }

    fn is_step_collision_free(&mut self, x0: &DVector<T>, x1: &DVector<T>) -> bool {
        let (x0, x1) = (self.reduced_to_full(x0), self.reduced_to_full(x1));
        self.forms
            .iter()
            .all(|form| form.is_step_collision_free(&x0, &x1))
    }

    fn max_step_size(&mut self, x0: &DVector<T>, x1: &DVector<T>) -> T {
        let (x0, x1) = (self.reduced_to_full(x0), self.reduced_to_full(x1));
        self.forms
            .iter()
            .map(|form| form.max_step_size(&x0, &x1))
            .fold(T::one(), |acc, step| acc.min(step))
    }

    fn line_search_begin(&mut self, x0: &DVector<T>, x1: &DVector<T>) {
        let (x0, x1) = (self.reduced_to_full(x0), self.reduced_to_full(x1));
        for form in &mut self.forms {
            form.line_search_begin(&x0, &x1);
        }
    }

    fn line_search_end(&mut self) {
        for form in &mut self.forms {
            form.line_search_end();
        }
    }

    fn solution_changed(&mut self, x: &DVector<T>) {
        let x = self.reduced_to_full(x);
        for form in &mut self.forms {
            form.solution_changed(&x);
        }
    }
}

impl<T: Real> ConstrainedProblem<T> for NLProblem<T> {
    fn full_size(&self) -> usize {
        self.boundary.full_size()
    }

    fn reduced_size(&self) -> usize {
        self.boundary.reduced_size()
    }

    fn current_size(&self) -> usize {
        match self.size {
            SpaceSize::Full => self.full_size(),
            SpaceSize::Reduced => self.reduced_size(),
        }
    }

    fn full_to_reduced(&self, full: &DVector<T>) -> DVector<T> {
        assert_eq!(full.len(), self.full_size());
        match self.size {
            SpaceSize::Full => full.clone(),
            SpaceSize::Reduced => self.boundary.restrict(full),
        }
    }

    fn reduced_to_full(&self, reduced: &DVector<T>) -> DVector<T> {
        if reduced.len() == self.full_size() {
            return reduced.clone();
        }
        let boundary_values = if self.apply_dbc {
            self.boundary.values()
        } else {
            &self.held_boundary_values
        };
        self.boundary.extend(reduced, boundary_values)
    }

    fn init(&mut self, x: &DVector<T>) {
        let x = self.reduced_to_full(x);
        for form in &mut self.forms {
            form.init(&x);
        }
    }

    fn use_full_size(&mut self) {
        self.size = SpaceSize::Full;
    }

    fn use_reduced_size(&mut self) {
        self.size = SpaceSize::Reduced;
    }

    fn set_apply_dbc(&mut self, x: &DVector<T>, apply: bool) {
        self.apply_dbc = apply;
        if !apply {
            self.held_boundary_values = self.boundary.boundary_values_of(&self.reduced_to_full(x));
        }
    }

    fn al_forms(&mut self) -> Option<AlForms<'_, T>> {
        match (&mut self.lagrangian, &mut self.penalty) {
            (Some(lagrangian), Some(penalty)) => Some(AlForms { lagrangian, penalty }),
            _ => None,
        }
    }
}
