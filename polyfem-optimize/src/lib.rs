use nalgebra::RealField;

pub use nalgebra;
pub use nalgebra_sparse;

/// Scalar types supported by the minimizers.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

/// Finite difference helpers for verifying derivatives
pub mod calculus;
/// Steepest descent minimizer
pub mod gradient_descent;
/// Step length selection for descent methods
pub mod line_search;
/// Sparse linear solvers used to compute Newton directions
pub mod linear_solver;
/// The minimizer protocol shared by all nonlinear solvers
pub mod minimize;
/// Newton's method for minimization
pub mod newton;
/// The objective protocol consumed by the minimizers
pub mod problem;
