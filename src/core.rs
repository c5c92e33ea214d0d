//! Core abstractions and types.
//!
//! *Users* are mainly interested in implementing the [`System`] trait and
//! optionally passing [extra arguments](ExtraArgs) to it.
//!
//! Algorithms *developers* are interested in implementing the [`Solver`] trait
//! and using tools in [linalg](crate::linalg) and
//! [derivatives](crate::derivatives) modules.

mod base;
mod solver;
mod system;

pub use base::*;
pub use solver::*;
pub use system::*;
