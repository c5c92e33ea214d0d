//! Tools for derivative-based methods.
//!
//! Broyden's method needs only an initial approximation of the Jacobian
//! matrix. A finite difference approximation in the initial point is usually
//! a much better start than the identity matrix.

use std::ops::Deref;

use nalgebra::{
    convert,
    storage::{Storage, StorageMut},
    ComplexField, DMatrix, Dyn, IsContiguous, RealField, Vector,
};
use num_traits::One;

use crate::core::{Problem, ProblemError, System};

/// Square root of double precision machine epsilon. This value is a standard
/// constant for epsilons in approximating first-order derivate-based concepts.
pub const EPSILON_SQRT: f64 = 0.000000014901161193847656;

/// Jacobian matrix of a system.
#[derive(Debug, Clone)]
pub struct Jacobian<F: Problem> {
    jac: DMatrix<F::Field>,
}

impl<F: Problem> Jacobian<F> {
    /// Initializes the Jacobian matrix with zeros.
    pub fn zeros(f: &F) -> Self {
        Self {
            jac: DMatrix::zeros(f.dim(), f.dim()),
        }
    }

    /// Unwraps the underlying matrix.
    pub fn into_inner(self) -> DMatrix<F::Field> {
        self.jac
    }
}

impl<F: System> Jacobian<F> {
    /// Compute the Jacobian matrix of the system in given point. See
    /// [`compute`](Jacobian::compute) for more details.
    pub fn new<Sx, Sfx>(
        f: &F,
        x: &mut Vector<F::Field, Dyn, Sx>,
        fx: &Vector<F::Field, Dyn, Sfx>,
    ) -> Result<Self, ProblemError>
    where
        Sx: StorageMut<F::Field, Dyn> + IsContiguous,
        Sfx: Storage<F::Field, Dyn>,
    {
        let mut jac = Self::zeros(f);
        jac.compute(f, x, fx)?;
        Ok(jac)
    }

    /// Compute the Jacobian matrix of the system in given point using forward
    /// differences. The value `fx` must be the residuals of the system in `x`.
    ///
    /// The parameter `x` is mutable to allow temporary mutations avoiding
    /// unnecessary allocations, but after this method ends, the content of the
    /// vector is exactly the same as before.
    pub fn compute<Sx, Sfx>(
        &mut self,
        f: &F,
        x: &mut Vector<F::Field, Dyn, Sx>,
        fx: &Vector<F::Field, Dyn, Sfx>,
    ) -> Result<&mut Self, ProblemError>
    where
        Sx: StorageMut<F::Field, Dyn> + IsContiguous,
        Sfx: Storage<F::Field, Dyn>,
    {
        let eps: F::Field = convert(EPSILON_SQRT);

        for (j, mut col) in self.jac.column_iter_mut().enumerate() {
            let xj = x[j];

            // Compute the step size. We would like to have the step as small as
            // possible (to be as close to the real derivative as possible).
            // But at the same time, very small step could cause
            // F(x + e_j * step_j) ~= F(x) with very small number of good
            // digits.
            //
            // A reasonable way to balance these competing needs is to scale
            // each component by x_j itself. To avoid problems when x_j is close
            // to zero, it is modified to take unit magnitude instead.
            let step = eps * xj.abs().max(F::Field::one()) * F::Field::one().copysign(xj);

            // Update the point.
            x[j] = xj + step;
            let result = f.eval(x, &mut col);

            // Restore the original value before possibly bailing out.
            x[j] = xj;
            result?;

            // Compute the derivative approximation: J[i, j] = (F(x + e_j * step_j) - F(x)) / step_j.
            col -= fx;
            col /= step;
        }

        Ok(self)
    }
}

impl<F: Problem> Deref for Jacobian<F> {
    type Target = DMatrix<F::Field>;

    fn deref(&self) -> &Self::Target {
        &self.jac
    }
}
