//! Nonlinear solves subject to Dirichlet boundary conditions.
pub mod al_solver;
pub mod boundary;
pub mod forms;
pub mod nl_problem;

pub use al_solver::*;
pub use boundary::DirichletBoundary;
pub use nl_problem::*;
