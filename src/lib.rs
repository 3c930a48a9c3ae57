pub mod solver;

pub mod optimize {
    pub use polyfem_optimize::*;
}

pub use polyfem_optimize::Real;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
