//! Collection of algorithms.
//!
//! Currently, the only algorithm is [Broyden's method](broyden), a
//! quasi-Newton method that needs only an initial approximation of the
//! Jacobian matrix.

pub mod broyden;

pub use broyden::{Broyden, BroydenError};
