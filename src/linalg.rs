//! Dense linear solvers for computing the step direction.
//!
//! Each iteration of a quasi-Newton method solves a square linear system
//! `B s = -F(x)` with the current Jacobian approximation `B`. The solvers in
//! this module signal failure explicitly instead of returning NaN or infinite
//! values.

use nalgebra::{storage::StorageMut, DMatrix, Dyn, RealField, Vector};
use thiserror::Error;

/// Error when solving a linear system.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinearSolveError {
    /// The matrix is not square.
    #[error("matrix is not square ({rows}x{cols})")]
    NotSquare {
        /// Number of rows.
        rows: usize,
        /// Number of columns.
        cols: usize,
    },
    /// The right-hand side does not match the matrix.
    #[error("right-hand side has {actual} elements, expected {expected}")]
    DimensionMismatch {
        /// Number of rows of the matrix.
        expected: usize,
        /// Number of elements of the right-hand side.
        actual: usize,
    },
    /// The matrix is singular.
    #[error("matrix is singular")]
    Singular,
    /// The solution contains NaN or infinite values.
    #[error("solution is not finite")]
    NonFinite,
}

/// Interface of a dense linear solver.
pub trait LinearSolver<T: RealField + Copy> {
    /// Name of the solver.
    const NAME: &'static str;

    /// Solves the system `a x = b`, overwriting `b` with the solution.
    ///
    /// On error, the content of `b` is unspecified.
    fn solve_mut<S>(
        &mut self,
        a: &DMatrix<T>,
        b: &mut Vector<T, Dyn, S>,
    ) -> Result<(), LinearSolveError>
    where
        S: StorageMut<T, Dyn>;
}

/// LU decomposition with partial pivoting.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lu;

impl<T: RealField + Copy> LinearSolver<T> for Lu {
    const NAME: &'static str = "LU";

    fn solve_mut<S>(
        &mut self,
        a: &DMatrix<T>,
        b: &mut Vector<T, Dyn, S>,
    ) -> Result<(), LinearSolveError>
    where
        S: StorageMut<T, Dyn>,
    {
        check(a, b)?;

        if !a.clone().lu().solve_mut(b) {
            return Err(LinearSolveError::Singular);
        }

        finite(b)
    }
}

/// Householder QR decomposition.
///
/// Slower than [`Lu`], but numerically more stable for badly scaled matrices.
#[derive(Debug, Clone, Copy, Default)]
pub struct Qr;

impl<T: RealField + Copy> LinearSolver<T> for Qr {
    const NAME: &'static str = "QR";

    fn solve_mut<S>(
        &mut self,
        a: &DMatrix<T>,
        b: &mut Vector<T, Dyn, S>,
    ) -> Result<(), LinearSolveError>
    where
        S: StorageMut<T, Dyn>,
    {
        check(a, b)?;

        if !a.clone().qr().solve_mut(b) {
            return Err(LinearSolveError::Singular);
        }

        finite(b)
    }
}

fn check<T, S>(a: &DMatrix<T>, b: &Vector<T, Dyn, S>) -> Result<(), LinearSolveError>
where
    T: RealField + Copy,
    S: StorageMut<T, Dyn>,
{
    if !a.is_square() {
        return Err(LinearSolveError::NotSquare {
            rows: a.nrows(),
            cols: a.ncols(),
        });
    }

    if a.nrows() != b.nrows() {
        return Err(LinearSolveError::DimensionMismatch {
            expected: a.nrows(),
            actual: b.nrows(),
        });
    }

    Ok(())
}

fn finite<T, S>(b: &Vector<T, Dyn, S>) -> Result<(), LinearSolveError>
where
    T: RealField + Copy,
    S: StorageMut<T, Dyn>,
{
    if b.iter().all(|bi| bi.is_finite()) {
        Ok(())
    } else {
        Err(LinearSolveError::NonFinite)
    }
}
