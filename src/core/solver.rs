use nalgebra::{storage::StorageMut, Dyn, IsContiguous, Vector};

use super::system::System;

/// Interface of a solver.
///
/// A solver is an iterative algorithm which takes a point _x_ and computes the
/// next step in the solving process. Repeated calls to the next step should
/// eventually converge into a solution _x'_ in successful cases.
///
/// ## Implementing a solver
///
/// Here is an implementation of a naive fixed-point "solver" which subtracts
/// the residuals from the variables. It converges only for systems that are
/// close to the identity.
///
/// ```rust
/// use broyden::nalgebra as na;
/// use broyden::{ProblemError, Solver, System};
/// use na::{storage::StorageMut, Dyn, IsContiguous, Vector};
///
/// struct FixedPoint;
///
/// impl<F: System> Solver<F> for FixedPoint {
///     const NAME: &'static str = "Fixed point";
///     type Error = ProblemError;
///
///     fn solve_next<Sx, Sfx>(
///         &mut self,
///         f: &F,
///         x: &mut Vector<F::Field, Dyn, Sx>,
///         fx: &mut Vector<F::Field, Dyn, Sfx>,
///     ) -> Result<(), Self::Error>
///     where
///         Sx: StorageMut<F::Field, Dyn> + IsContiguous,
///         Sfx: StorageMut<F::Field, Dyn>,
///     {
///         *x -= &*fx;
///
///         // We must compute the residuals.
///         f.eval(x, fx)
///     }
/// }
/// ```
pub trait Solver<F: System> {
    /// Name of the solver.
    const NAME: &'static str;

    /// Error while computing the next step.
    type Error;

    /// Computes the next step in the solving process.
    ///
    /// The value of `x` is the current point and `fx` holds its residuals.
    /// After the method returns, `x` should hold the variable values of the
    /// performed step and `fx` _must_ contain residuals of that step as
    /// computed by [`System::eval`].
    ///
    /// The implementations _can_ assume that subsequent calls to `solve_next`
    /// pass the value of `x` as was returned in the previous iteration.
    fn solve_next<Sx, Sfx>(
        &mut self,
        f: &F,
        x: &mut Vector<F::Field, Dyn, Sx>,
        fx: &mut Vector<F::Field, Dyn, Sfx>,
    ) -> Result<(), Self::Error>
    where
        Sx: StorageMut<F::Field, Dyn> + IsContiguous,
        Sfx: StorageMut<F::Field, Dyn>;
}
