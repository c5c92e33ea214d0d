#![allow(clippy::many_single_char_names)]
#![allow(clippy::type_complexity)]
#![warn(missing_docs)]

//! # Broyden
//!
//! A pure Rust implementation of Broyden's quasi-Newton method for solving
//! nonlinear systems of equations.
//!
//! Newton's method needs the Jacobian matrix of the system in every
//! iteration. Broyden's method starts with an initial approximation of it
//! (the identity matrix, a finite difference approximation or a matrix
//! supplied by the user) and refines it by a cheap rank-one update after each
//! step, so the system is evaluated only once per iteration.
//!
//! ## Problem
//!
//! The problem of solving systems of nonlinear equations (multidimensional root
//! finding) is about finding values of *n* variables given *n* equations that
//! have to be satisfied. Mathematically, the problem is formulated as
//!
//! ```text
//! F(x) = 0,
//!
//! where F(x) = { f1(x), ..., fn(x) }
//! and x = { x1, ..., xn }
//! ```
//!
//! When it comes to code, the problem is any type that implements the
//! [`System`] and [`Problem`] traits.
//!
//! ```rust
//! // Broyden is based on `nalgebra` crate.
//! use broyden::nalgebra as na;
//! use broyden::{Problem, ProblemError, System};
//! use na::{Dyn, IsContiguous};
//!
//! // A problem is represented by a type.
//! struct Rosenbrock {
//!     a: f64,
//!     b: f64,
//! }
//!
//! impl Problem for Rosenbrock {
//!     // The numeric type. Usually f64 or f32.
//!     type Field = f64;
//!
//!     // The number of variables and equations.
//!     fn dim(&self) -> usize {
//!         2
//!     }
//! }
//!
//! impl System for Rosenbrock {
//!     // Evaluate trial values of variables to the system.
//!     fn eval<Sx, Sfx>(
//!         &self,
//!         x: &na::Vector<Self::Field, Dyn, Sx>,
//!         fx: &mut na::Vector<Self::Field, Dyn, Sfx>,
//!     ) -> Result<(), ProblemError>
//!     where
//!         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//!         Sfx: na::storage::StorageMut<Self::Field, Dyn>,
//!     {
//!         // Compute the residuals of all equations.
//!         fx[0] = self.b * (x[1] - x[0].powi(2));
//!         fx[1] = self.a - x[0];
//!
//!         Ok(())
//!     }
//! }
//! ```
//!
//! And that's it. There is no need for defining the Jacobian matrix. For quick
//! experiments, a closure can be used instead of a type, see [`FnSystem`].
//!
//! ## Solving
//!
//! When you have your system available, you can use the [`SolverDriver`] to run
//! the iteration process until the step size drops below the tolerances or the
//! maximum number of iterations is reached.
//!
//! ```rust
//! use broyden::driver::JacobianInit;
//! use broyden::SolverDriver;
//! # use broyden::nalgebra as na;
//! # use broyden::{Problem, ProblemError, System};
//! # use na::{Dyn, IsContiguous};
//! #
//! # struct Rosenbrock {
//! #     a: f64,
//! #     b: f64,
//! # }
//! #
//! # impl Problem for Rosenbrock {
//! #     type Field = f64;
//! #
//! #     fn dim(&self) -> usize {
//! #         2
//! #     }
//! # }
//! #
//! # impl System for Rosenbrock {
//! #     fn eval<Sx, Sfx>(
//! #         &self,
//! #         x: &na::Vector<Self::Field, Dyn, Sx>,
//! #         fx: &mut na::Vector<Self::Field, Dyn, Sfx>,
//! #     ) -> Result<(), ProblemError>
//! #     where
//! #         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//! #         Sfx: na::storage::StorageMut<Self::Field, Dyn>,
//! #     {
//! #         fx[0] = self.b * (x[1] - x[0].powi(2));
//! #         fx[1] = self.a - x[0];
//! #         Ok(())
//! #     }
//! # }
//!
//! let f = Rosenbrock { a: 1.0, b: 10.0 };
//! let mut solver = SolverDriver::builder(&f)
//!     .with_initial(vec![-1.2, 1.0])
//!     .with_jacobian(JacobianInit::FiniteDifference)
//!     .build()
//!     .expect("invalid inputs");
//!
//! let solution = solver.run().expect("solver encountered an error");
//!
//! if solution.converged() {
//!     println!("solved in {} iterations: {}", solution.iters(), solution.x());
//! } else {
//!     println!("maximum number of iteration exceeded");
//! }
//! ```
//!
//! ## License
//!
//! Licensed under MIT.

pub mod algo;
mod core;
pub mod derivatives;
pub mod driver;
pub mod linalg;

pub use core::*;
pub use driver::{solve, Solution, SolverDriver, SolverOptions};

#[cfg(feature = "testing")]
pub mod testing;

#[cfg(not(feature = "testing"))]
pub(crate) mod testing;

pub use nalgebra;
