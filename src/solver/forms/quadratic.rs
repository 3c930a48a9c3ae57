use super::Form;
use crate::Real;
use eyre::eyre;
use nalgebra::DVector;
use nalgebra_sparse::ops::serial::spmm_csr_dense;
use nalgebra_sparse::ops::Op;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use numeric_literals::replace_float_literals;

/// The energy $\frac{1}{2} x^T K x - f^T x$ of a linear system with a fixed (e.g. previously
/// assembled) symmetric stiffness matrix $K$ and load $f$.
#[derive(Debug, Clone)]
pub struct QuadraticForm<T: Real> {
    stiffness: CsrMatrix<T>,
    load: DVector<T>,
}

impl<T: Real> QuadraticForm<T> {
    pub fn new(stiffness: CsrMatrix<T>, load: DVector<T>) -> eyre::Result<Self> {
        if stiffness.nrows() != stiffness.ncols() {
            return Err(eyre!(
                "Stiffness matrix must be square, but has dimensions {} x {}",
                stiffness.nrows(),
                stiffness.ncols()
            ));
        }
        if load.len() != stiffness.nrows() {
            return Err(eyre!(
                "Load vector has length {}, expected {}",
                load.len(),
                stiffness.nrows()
            ));
        }
        Ok(Self { stiffness, load })
    }

    /// A form without external load.
    pub fn from_stiffness(stiffness: CsrMatrix<T>) -> eyre::Result<Self> {
        let n = stiffness.nrows();
        Self::new(stiffness, DVector::zeros(n))
    }

    pub fn stiffness(&self) -> &CsrMatrix<T> {
        &self.stiffness
    }

    pub fn load(&self) -> &DVector<T> {
        &self.load
    }

    /// y = Kx
    fn apply_stiffness(&self, x: &DVector<T>) -> DVector<T> {
        let mut y = DVector::zeros(x.len());
        spmm_csr_dense(T::zero(), &mut y, T::one(), Op::NoOp(&self.stiffness), Op::NoOp(x));
        y
    }
}

impl<T: Real> Form<T> for QuadraticForm<T> {
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn value_unweighted(&self, x: &DVector<T>) -> T {
        0.5 * x.dot(&self.apply_stiffness(x)) - self.load.dot(x)
    }

    fn gradient_unweighted(&self, x: &DVector<T>) -> DVector<T> {
        self.apply_stiffness(x) - &self.load
    }

    fn hessian_unweighted(&self, _x: &DVector<T>) -> CooMatrix<T> {
        let n = self.stiffness.nrows();
        let mut hessian = CooMatrix::new(n, n);
        for (i, j, v) in self.stiffness.triplet_iter() {
            hessian.push(i, j, *v);
        }
        hessian
    }
}
