//! Sparse linear solvers.
//!
//! Solvers follow a factorize/solve split so that a factorization can be reused for several
//! right-hand sides.
use crate::Real;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::ops::serial::spmm_csr_dense;
use nalgebra_sparse::ops::Op;
use nalgebra_sparse::{CooMatrix, CscMatrix, CsrMatrix};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum LinearSolveError {
    /// `solve` was called before a successful `factorize`.
    NotFactorized,
    NonSquareMatrix { nrows: usize, ncols: usize },
    DimensionMismatch { expected: usize, actual: usize },
    /// The factorization or iteration detected a matrix that is not positive definite.
    IndefiniteMatrix,
    MaxIterationsReached { max_iter: usize },
}

impl fmt::Display for LinearSolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFactorized => write!(f, "Linear solver used before factorization."),
            Self::NonSquareMatrix { nrows, ncols } => {
                write!(f, "Matrix must be square, but has dimensions {} x {}.", nrows, ncols)
            }
            Self::DimensionMismatch { expected, actual } => {
                write!(f, "Right-hand side has length {}, expected {}.", actual, expected)
            }
            Self::IndefiniteMatrix => write!(f, "Matrix appears to be indefinite."),
            Self::MaxIterationsReached { max_iter } => {
                write!(f, "Max iterations ({}) reached.", max_iter)
            }
        }
    }
}

impl Error for LinearSolveError {}

pub trait LinearSolver<T: Real> {
    fn factorize(&mut self, matrix: &CooMatrix<T>) -> Result<(), LinearSolveError>;

    fn solve(&mut self, rhs: &DVector<T>) -> Result<DVector<T>, LinearSolveError>;
}

fn check_square<T>(matrix: &CooMatrix<T>) -> Result<(), LinearSolveError> {
    if matrix.nrows() != matrix.ncols() {
        Err(LinearSolveError::NonSquareMatrix {
            nrows: matrix.nrows(),
            ncols: matrix.ncols(),
        })
    } else {
        Ok(())
    }
}

/// Direct solver based on a sparse Cholesky factorization.
///
/// Only applicable to symmetric positive definite matrices.
pub struct CholeskySolver<T: Real> {
    factorization: Option<CscCholesky<T>>,
    dim: usize,
}

impl<T: Real> CholeskySolver<T> {
    pub fn new() -> Self {
        Self {
            factorization: None,
            dim: 0,
        }
    }
}

impl<T: Real> Default for CholeskySolver<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Real> LinearSolver<T> for CholeskySolver<T> {
    fn factorize(&mut self, matrix: &CooMatrix<T>) -> Result<(), LinearSolveError> {
        check_square(matrix)?;
        self.factorization = None;
        let csc = CscMatrix::from(matrix);
        let factorization = CscCholesky::factor(&csc).map_err(|_| LinearSolveError::IndefiniteMatrix)?;
        self.factorization = Some(factorization);
        self.dim = matrix.nrows();
        Ok(())
    }

    fn solve(&mut self, rhs: &DVector<T>) -> Result<DVector<T>, LinearSolveError> {
        let factorization = self
            .factorization
            .as_ref()
            .ok_or(LinearSolveError::NotFactorized)?;
        if rhs.len() != self.dim {
            return Err(LinearSolveError::DimensionMismatch {
                expected: self.dim,
                actual: rhs.len(),
            });
        }
        let b = DMatrix::from_column_slice(rhs.len(), 1, rhs.as_slice());
        let solution = factorization.solve(&b);
        Ok(DVector::from_column_slice(solution.as_slice()))
    }
}

/// Jacobi-preconditioned Conjugate Gradient.
///
/// Convergence is declared once the approximate residual satisfies `||r|| <= tolerance * ||b||`.
pub struct ConjugateGradientSolver<T: Real> {
    max_iterations: usize,
    tolerance: T,
    operator: Option<CsrMatrix<T>>,
    inverse_diagonal: DVector<T>,
}

impl<T: Real> ConjugateGradientSolver<T> {
    pub fn new(max_iterations: usize, tolerance: T) -> Self {
        Self {
            max_iterations,
            tolerance,
            operator: None,
            inverse_diagonal: DVector::zeros(0),
        }
    }
}

impl<T: Real> LinearSolver<T> for ConjugateGradientSolver<T> {
    fn factorize(&mut self, matrix: &CooMatrix<T>) -> Result<(), LinearSolveError> {
        check_square(matrix)?;
        let csr = CsrMatrix::from(matrix);
        let mut diagonal = DVector::zeros(csr.nrows());
        for (i, j, v) in csr.triplet_iter() {
            if i == j {
                diagonal[i] += *v;
            }
        }
        // Zero or negative diagonal entries cannot be used for Jacobi scaling
        self.inverse_diagonal = diagonal.map(|d| if d > T::zero() { T::one() / d } else { T::one() });
        self.operator = Some(csr);
        Ok(())
    }

    #[allow(non_snake_case)]
    fn solve(&mut self, b: &DVector<T>) -> Result<DVector<T>, LinearSolveError> {
        let a = self.operator.as_ref().ok_or(LinearSolveError::NotFactorized)?;
        if b.len() != a.nrows() {
            return Err(LinearSolveError::DimensionMismatch {
                expected: a.nrows(),
                actual: b.len(),
            });
        }

        let n = b.len();
        let b_norm = b.norm();
        let mut x = DVector::zeros(n);
        if b_norm == T::zero() {
            return Ok(x);
        }

        // r = b - Ax with x = 0
        let mut r = b.clone();
        let mut z = r.component_mul(&self.inverse_diagonal);
        let mut p = z.clone();
        let mut Ap = DVector::zeros(n);
        let mut rz = r.dot(&z);

        for _ in 0..self.max_iterations {
            if r.norm() <= self.tolerance * b_norm {
                return Ok(x);
            }

            spmm_csr_dense(T::zero(), &mut Ap, T::one(), Op::NoOp(a), Op::NoOp(&p));
            let pAp = p.dot(&Ap);
            if pAp <= T::zero() {
                return Err(LinearSolveError::IndefiniteMatrix);
            }

            let alpha = rz / pAp;
            x.axpy(alpha, &p, T::one());
            r.axpy(-alpha, &Ap, T::one());
            z = r.component_mul(&self.inverse_diagonal);

            let rz_next = r.dot(&z);
            let beta = rz_next / rz;
            rz = rz_next;
            // p = z + beta * p
            p.axpy(T::one(), &z, beta);
        }

        if r.norm() <= self.tolerance * b_norm {
            Ok(x)
        } else {
            Err(LinearSolveError::MaxIterationsReached {
                max_iter: self.max_iterations,
            })
        }
    }
}

/// Configuration selecting one of the available linear solvers.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "solver", rename_all = "snake_case")]
pub enum LinearSolverSettings<T> {
    Cholesky,
    ConjugateGradient { max_iterations: usize, tolerance: T },
}

impl<T> Default for LinearSolverSettings<T> {
    fn default() -> Self {
        LinearSolverSettings::Cholesky
    }
}

impl<T: Real> LinearSolverSettings<T> {
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn conjugate_gradient() -> Self {
        LinearSolverSettings::ConjugateGradient {
            max_iterations: 1000,
            tolerance: 1e-10,
        }
    }

    pub fn build(&self) -> Box<dyn LinearSolver<T>> {
        match *self {
            LinearSolverSettings::Cholesky => Box::new(CholeskySolver::new()),
            LinearSolverSettings::ConjugateGradient {
                max_iterations,
                tolerance,
            } => Box::new(ConjugateGradientSolver::new(max_iterations, tolerance)),
        }
    }
}
