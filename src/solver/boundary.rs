//! Dirichlet boundary conditions and the map between full and reduced degrees of freedom.
use crate::Real;
use eyre::eyre;
use itertools::Itertools;
use nalgebra::DVector;

/// A set of prescribed degrees of freedom together with their target values.
///
/// The *full* space contains every degree of freedom, the *reduced* space only the free ones.
/// Free degrees of freedom keep their relative order in the reduced space.
#[derive(Debug, Clone, PartialEq)]
pub struct DirichletBoundary<T: Real> {
    full_size: usize,
    /// Sorted, unique.
    dofs: Vec<usize>,
    values: DVector<T>,
    free_dofs: Vec<usize>,
    reduced_index: Vec<Option<usize>>,
}

impl<T: Real> DirichletBoundary<T> {
    /// Prescribes `values[i]` for the degree of freedom `dofs[i]`.
    ///
    /// The degrees of freedom may be given in any order, but must be unique and smaller than
    /// `full_size`.
    pub fn new(full_size: usize, dofs: Vec<usize>, values: DVector<T>) -> eyre::Result<Self> {
        if dofs.len() != values.len() {
            return Err(eyre!(
                "Number of boundary values ({}) does not match number of boundary dofs ({})",
                values.len(),
                dofs.len()
            ));
        }
        if let Some(&dof) = dofs.iter().find(|&&dof| dof >= full_size) {
            return Err(eyre!("Boundary dof {} is out of bounds for {} dofs", dof, full_size));
        }

        let (dofs, values): (Vec<usize>, Vec<T>) = dofs
            .into_iter()
            .zip(values.iter().copied())
            .sorted_by_key(|(dof, _)| *dof)
            .unzip();
        if let Some((dof, _)) = dofs.iter().tuple_windows().find(|(a, b)| a == b) {
            return Err(eyre!("Boundary dof {} is prescribed more than once", dof));
        }

        let mut reduced_index = vec![None; full_size];
        let mut free_dofs = Vec::with_capacity(full_size - dofs.len());
        let mut boundary = dofs.iter().peekable();
        for dof in 0..full_size {
            if boundary.peek() == Some(&&dof) {
                boundary.next();
            } else {
                reduced_index[dof] = Some(free_dofs.len());
                free_dofs.push(dof);
            }
        }

        Ok(Self {
            full_size,
            dofs,
            values: DVector::from_vec(values),
            free_dofs,
            reduced_index,
        })
    }

    /// Prescribes zero for every given degree of freedom.
    pub fn homogeneous(full_size: usize, dofs: Vec<usize>) -> eyre::Result<Self> {
        let n = dofs.len();
        Self::new(full_size, dofs, DVector::zeros(n))
    }

    /// A boundary without any prescribed degrees of freedom.
    pub fn empty(full_size: usize) -> Self {
        Self {
            full_size,
            dofs: Vec::new(),
            values: DVector::zeros(0),
            free_dofs: (0..full_size).collect(),
            reduced_index: (0..full_size).map(Some).collect(),
        }
    }

    pub fn full_size(&self) -> usize {
        self.full_size
    }

    pub fn reduced_size(&self) -> usize {
        self.free_dofs.len()
    }

    pub fn dofs(&self) -> &[usize] {
        &self.dofs
    }

    pub fn free_dofs(&self) -> &[usize] {
        &self.free_dofs
    }

    /// Target values, ordered like [`dofs`](Self::dofs).
    pub fn values(&self) -> &DVector<T> {
        &self.values
    }

    /// The index of `dof` in the reduced space, or `None` if it is prescribed.
    pub fn reduced_index(&self, dof: usize) -> Option<usize> {
        self.reduced_index[dof]
    }

    /// Replaces the target values, e.g. for the next load step.
    pub fn set_values(&mut self, values: DVector<T>) -> eyre::Result<()> {
        if values.len() != self.dofs.len() {
            return Err(eyre!(
                "Expected {} boundary values, got {}",
                self.dofs.len(),
                values.len()
            ));
        }
        self.values = values;
        Ok(())
    }

    /// The values of the prescribed degrees of freedom in the full vector `x`.
    pub fn boundary_values_of(&self, x: &DVector<T>) -> DVector<T> {
        assert_eq!(x.len(), self.full_size);
        x.select_rows(self.dofs.iter())
    }

    /// The constraint residual `x[dofs] - values`.
    pub fn residual(&self, x: &DVector<T>) -> DVector<T> {
        self.boundary_values_of(x) - &self.values
    }

    /// Removes the prescribed degrees of freedom from the full vector `x`.
    pub fn restrict(&self, x: &DVector<T>) -> DVector<T> {
        assert_eq!(x.len(), self.full_size);
        x.select_rows(self.free_dofs.iter())
    }

    /// Builds a full vector from the free values `reduced` and the given values for the
    /// prescribed degrees of freedom.
    pub fn extend(&self, reduced: &DVector<T>, boundary_values: &DVector<T>) -> DVector<T> {
        assert_eq!(reduced.len(), self.reduced_size());
        assert_eq!(boundary_values.len(), self.dofs.len());
        let mut full = DVector::zeros(self.full_size);
        for (&dof, &value) in self.free_dofs.iter().zip(reduced.iter()) {
            full[dof] = value;
        }
        for (&dof, &value) in self.dofs.iter().zip(boundary_values.iter()) {
            full[dof] = value;
        }
        full
    }
}
