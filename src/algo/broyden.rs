//! Broyden's method.
//!
//! [Broyden's method](https://en.wikipedia.org/wiki/Broyden%27s_method) is a
//! quasi-Newton method for solving systems of nonlinear equations. Instead of
//! computing the Jacobian matrix in every iteration, it starts with an initial
//! approximation and refines it by a rank-one update after each step.
//!
//! In each iteration, the step _s_ is computed by solving the linear system
//!
//! ```text
//! B s = -F(x)
//! ```
//!
//! and the approximation is updated by the "good" Broyden formula
//!
//! ```text
//! B' = B + (y - B s) s^T / (s^T s),    where y = F(x + s) - F(x)
//! ```
//!
//! which satisfies the secant equation `B' s = y` while making the smallest
//! change of `B` in Frobenius norm.
//!
//! The quality of the initial approximation matters. The identity matrix
//! works for mildly nonlinear problems close to the solution, a [finite
//! difference](crate::derivatives::Jacobian) approximation in the initial
//! point is more robust.
//!
//! # References
//!
//! \[1\] [A Class of Methods for Solving Nonlinear Simultaneous
//! Equations](https://www.ams.org/journals/mcom/1965-19-092/S0025-5718-1965-0198670-6/)
//!
//! \[2\] [Scientific Computing: An Introductory
//! Survey](https://heath.cs.illinois.edu/scicomp/notes/chap05.pdf), chapter 5
//!
//! \[3\] [Numerical Methods for Unconstrained Optimization and Nonlinear
//! Equations](https://epubs.siam.org/doi/book/10.1137/1.9781611971200)

use log::debug;
use nalgebra::{
    storage::StorageMut, ComplexField, DMatrix, DVector, Dyn, IsContiguous, RealField, Vector,
};
use num_traits::{One, Zero};
use thiserror::Error;

use crate::{
    core::{Problem, ProblemError, Solver, System},
    linalg::{LinearSolveError, LinearSolver, Lu},
};

/// Broyden solver. See [module](self) documentation for more details.
///
/// The solver owns its Jacobian approximation. It is initialized from a copy
/// of the caller's matrix and can be obtained back by
/// [`into_jacobian`](Broyden::into_jacobian).
#[derive(Debug, Clone)]
pub struct Broyden<F: Problem, L = Lu> {
    jac: DMatrix<F::Field>,
    step: DVector<F::Field>,
    temp: DVector<F::Field>,
    dir: DVector<F::Field>,
    linear: L,
}

impl<F: Problem> Broyden<F> {
    /// Initializes Broyden solver with given initial approximation of the
    /// Jacobian matrix and LU decomposition as the linear solver.
    ///
    /// # Panics
    ///
    /// Panics if the matrix is not square with the dimension of the problem.
    pub fn new(f: &F, jac: DMatrix<F::Field>) -> Self {
        Self::with_linear_solver(f, jac, Lu)
    }

    /// Initializes Broyden solver with the identity matrix as the initial
    /// approximation of the Jacobian matrix.
    pub fn identity(f: &F) -> Self {
        Self::new(f, DMatrix::identity(f.dim(), f.dim()))
    }
}

impl<F: Problem, L> Broyden<F, L> {
    /// Initializes Broyden solver with given initial approximation of the
    /// Jacobian matrix and given linear solver.
    ///
    /// # Panics
    ///
    /// Panics if the matrix is not square with the dimension of the problem.
    pub fn with_linear_solver(f: &F, jac: DMatrix<F::Field>, linear: L) -> Self {
        let n = f.dim();
        assert!(
            jac.nrows() == n && jac.ncols() == n,
            "jacobian has invalid dimension"
        );

        Self {
            jac,
            step: DVector::zeros(n),
            temp: DVector::zeros(n),
            dir: DVector::zeros(n),
            linear,
        }
    }

    /// Returns the current approximation of the Jacobian matrix.
    pub fn jacobian(&self) -> &DMatrix<F::Field> {
        &self.jac
    }

    /// Returns the last computed step.
    pub fn step(&self) -> &DVector<F::Field> {
        &self.step
    }

    /// Unwraps the current approximation of the Jacobian matrix.
    pub fn into_jacobian(self) -> DMatrix<F::Field> {
        self.jac
    }

    /// Resets the internal state of the solver with a new initial
    /// approximation of the Jacobian matrix.
    ///
    /// # Panics
    ///
    /// Panics if the matrix has a different shape than the current one.
    pub fn reset(&mut self, jac: DMatrix<F::Field>) {
        assert!(
            jac.shape() == self.jac.shape(),
            "jacobian has invalid dimension"
        );

        self.jac = jac;
        self.step.fill(F::Field::zero());
        self.temp.fill(F::Field::zero());
        self.dir.fill(F::Field::zero());
    }
}

/// Error returned from [`Broyden`] solver.
#[derive(Debug, Error)]
pub enum BroydenError {
    /// Solving the linear system for the step failed.
    #[error("linear solve failed: {0}")]
    LinearSolve(#[from] LinearSolveError),
    /// Shapes of the inputs or the residuals are not compatible.
    #[error("dimension mismatch in {what} (expected {expected}, got {actual})")]
    DimensionMismatch {
        /// The mismatched quantity.
        what: &'static str,
        /// Expected size.
        expected: usize,
        /// Actual size.
        actual: usize,
    },
    /// The computed step is zero, the Jacobian update is undefined.
    #[error("step is zero")]
    ZeroStep,
    /// Invalid solver options.
    #[error("invalid options: {0}")]
    InvalidOptions(&'static str),
    /// Error that occurred when evaluating the system.
    #[error("{0}")]
    Problem(ProblemError),
}

impl From<ProblemError> for BroydenError {
    fn from(error: ProblemError) -> Self {
        match error {
            ProblemError::InvalidDimensionality { expected, actual } => {
                BroydenError::DimensionMismatch {
                    what: "residuals",
                    expected,
                    actual,
                }
            }
            error => BroydenError::Problem(error),
        }
    }
}

impl<F: System, L: LinearSolver<F::Field>> Solver<F> for Broyden<F, L> {
    const NAME: &'static str = "Broyden";

    type Error = BroydenError;

    fn solve_next<Sx, Sfx>(
        &mut self,
        f: &F,
        x: &mut Vector<F::Field, Dyn, Sx>,
        fx: &mut Vector<F::Field, Dyn, Sfx>,
    ) -> Result<(), Self::Error>
    where
        Sx: StorageMut<F::Field, Dyn> + IsContiguous,
        Sfx: StorageMut<F::Field, Dyn>,
    {
        let Self {
            jac,
            step,
            temp,
            dir,
            linear,
        } = self;

        // Solve B s = -F(x).
        step.copy_from(fx);
        step.neg_mut();
        linear.solve_mut(jac, step)?;

        // The largest magnitude of the step is used for scaling s^T s, which
        // would underflow or overflow otherwise.
        let scale = step
            .iter()
            .fold(F::Field::zero(), |acc, si| acc.max(si.abs()));

        if scale == F::Field::zero() {
            // The update would divide by zero. Leave the state untouched and
            // let the caller decide.
            return Err(BroydenError::ZeroStep);
        }

        // Keep x and F(x) for restoring and computing the difference.
        dir.copy_from(x);
        temp.copy_from(fx);

        // Do the step and compute F(x + s).
        *x += &*step;
        let result = match f.eval(x, fx) {
            Ok(()) if fx.iter().all(|fxi| fxi.is_finite()) => Ok(()),
            Ok(()) => Err(BroydenError::Problem(ProblemError::InvalidValue)),
            Err(error) => Err(BroydenError::from(error)),
        };

        if let Err(error) = result {
            x.copy_from(dir);
            fx.copy_from(temp);
            return Err(error);
        }

        // Compute y = F(x + s) - F(x).
        temp.neg_mut();
        *temp += &*fx;

        // Compute y - B s.
        temp.gemv(-F::Field::one(), jac, step, F::Field::one());

        // Rank-one update B' = B + (y - B s) s^T / (s^T s), computed with the
        // scaled step u = s / scale as B' = B + ((y - B s) / scale) u^T / (u^T u).
        dir.copy_from(step);
        *dir /= scale;
        *temp /= scale;
        let dir_norm_squared = dir.norm_squared();
        jac.ger(F::Field::one() / dir_norm_squared, temp, dir, F::Field::one());

        debug!(
            "Broyden step: || s || = {}, || fx || = {}",
            scale * dir_norm_squared.sqrt(),
            fx.norm()
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{core::FnSystem, linalg::Qr, testing::*};

    use approx::assert_abs_diff_eq;
    use nalgebra::{convert, dmatrix, dvector};

    #[test]
    fn secant_equation_holds() {
        let f = CircleHyperbola;
        let mut solver = Broyden::identity(&f);

        let mut x = dvector![2.0, 0.5];
        let mut fx = dvector![0.0, 0.0];
        f.eval(&x, &mut fx).unwrap();

        for _ in 0..3 {
            let fx_prev = fx.clone();
            solver.solve_next(&f, &mut x, &mut fx).unwrap();

            let y = &fx - &fx_prev;
            let bs = solver.jacobian() * solver.step();
            assert_abs_diff_eq!(bs, y, epsilon = 1e-12);
        }
    }

    #[test]
    fn first_iteration() {
        // F(2, 0.5) = (0.25, 0), so with B = I the step is (-0.25, 0).
        let f = CircleHyperbola;
        let mut solver = Broyden::identity(&f);

        let mut x = dvector![2.0, 0.5];
        let mut fx = dvector![0.0, 0.0];
        f.eval(&x, &mut fx).unwrap();
        solver.solve_next(&f, &mut x, &mut fx).unwrap();

        assert_abs_diff_eq!(x, dvector![1.75, 0.5], epsilon = 1e-15);
        assert_abs_diff_eq!(fx, dvector![-0.6875, -0.125], epsilon = 1e-15);
        assert_abs_diff_eq!(solver.step(), &dvector![-0.25, 0.0], epsilon = 1e-15);

        // y = (-0.9375, -0.125), B s = (-0.25, 0), s^T s = 0.0625.
        let expected = dmatrix![3.75, 0.0; 0.5, 1.0];
        assert_abs_diff_eq!(solver.jacobian(), &expected, epsilon = 1e-12);
    }

    #[test]
    fn exact_jacobian_of_affine_system_is_kept() {
        let f = Affine::default();
        let mut solver = Broyden::new(&f, f.matrix().clone());

        let mut x = dvector![0.0, 0.0];
        let mut fx = dvector![0.0, 0.0];
        f.eval(&x, &mut fx).unwrap();
        solver.solve_next(&f, &mut x, &mut fx).unwrap();

        assert!(f.is_root(&x, convert(1e-12)));
        assert_abs_diff_eq!(solver.jacobian(), f.matrix(), epsilon = 1e-12);
    }

    #[test]
    fn zero_step_leaves_state_untouched() {
        let f = CircleHyperbola;
        let root = f.roots()[0].clone();
        let mut solver = Broyden::identity(&f);

        // Residuals exactly zero.
        let mut x = root.clone();
        let mut fx = dvector![0.0, 0.0];

        assert!(matches!(
            solver.solve_next(&f, &mut x, &mut fx),
            Err(BroydenError::ZeroStep)
        ));
        assert_eq!(x, root);
        assert_eq!(solver.jacobian(), &DMatrix::identity(2, 2));
    }

    #[test]
    fn non_finite_residuals_leave_state_untouched() {
        // The first step from x = 1 lands on x = -4 outside the domain of ln.
        let f = FnSystem::new(1, |x: &DVector<f64>, _: Option<&[f64]>| {
            dvector![x[0].ln() + 5.0]
        });
        let mut solver = Broyden::identity(&f);

        let mut x = dvector![1.0];
        let mut fx = dvector![0.0];
        f.eval(&x, &mut fx).unwrap();

        assert!(matches!(
            solver.solve_next(&f, &mut x, &mut fx),
            Err(BroydenError::Problem(ProblemError::InvalidValue))
        ));
        assert_eq!(x, dvector![1.0]);
        assert_eq!(fx, dvector![5.0]);
        assert_eq!(solver.jacobian(), &DMatrix::identity(1, 1));
    }

    #[test]
    fn tiny_step_is_not_zero() {
        // s^T s underflows to zero.
        let f = FnSystem::new(1, |x: &DVector<f64>, _: Option<&[f64]>| {
            dvector![x[0] - 1e-170]
        });
        let mut solver = Broyden::identity(&f);

        let mut x = dvector![0.0];
        let mut fx = dvector![0.0];
        f.eval(&x, &mut fx).unwrap();
        solver.solve_next(&f, &mut x, &mut fx).unwrap();

        assert_eq!(x, dvector![1e-170]);
        assert_eq!(fx, dvector![0.0]);
        assert_eq!(solver.jacobian(), &DMatrix::identity(1, 1));
    }

    #[test]
    fn huge_step_updates_jacobian() {
        // s^T s overflows to infinity.
        let f = FnSystem::new(1, |x: &DVector<f64>, _: Option<&[f64]>| dvector![2.0 * x[0]]);
        let mut solver = Broyden::identity(&f);

        let mut x = dvector![1e160];
        let mut fx = dvector![0.0];
        f.eval(&x, &mut fx).unwrap();

        let fx_prev = fx.clone();
        solver.solve_next(&f, &mut x, &mut fx).unwrap();

        assert_eq!(x, dvector![-1e160]);
        assert_abs_diff_eq!(solver.jacobian(), &dmatrix![2.0], epsilon = 1e-12);

        let y = &fx - &fx_prev;
        let bs = solver.jacobian() * solver.step();
        assert_abs_diff_eq!(bs, y, epsilon = 1e148);
    }

    #[test]
    fn reset_and_into_jacobian() {
        let f = CircleHyperbola;
        let mut solver = Broyden::identity(&f);

        let mut x = dvector![2.0, 0.5];
        let mut fx = dvector![0.0, 0.0];
        f.eval(&x, &mut fx).unwrap();
        solver.solve_next(&f, &mut x, &mut fx).unwrap();
        assert_ne!(solver.jacobian(), &DMatrix::identity(2, 2));

        let jac0 = dmatrix![4.0, 1.0; 0.5, 2.0];
        solver.reset(jac0.clone());
        assert_eq!(solver.step(), &DVector::zeros(2));

        solver.solve_next(&f, &mut x, &mut fx).unwrap();
        let jac = solver.into_jacobian();
        assert_ne!(jac, jac0);
        assert_eq!(jac.shape(), (2, 2));
    }

    #[test]
    #[should_panic(expected = "jacobian has invalid dimension")]
    fn reset_with_invalid_dimension() {
        let mut solver = Broyden::identity(&CircleHyperbola);
        solver.reset(DMatrix::identity(3, 3));
    }

    #[test]
    fn singular_jacobian() {
        let f = CircleHyperbola;
        let mut solver = Broyden::new(&f, dmatrix![1.0, 0.0; 2.0, 0.0]);

        let mut x = dvector![2.0, 0.5];
        let mut fx = dvector![0.0, 0.0];
        f.eval(&x, &mut fx).unwrap();

        assert!(matches!(
            solver.solve_next(&f, &mut x, &mut fx),
            Err(BroydenError::LinearSolve(LinearSolveError::Singular))
        ));
    }

    #[test]
    fn qr_linear_solver() {
        let f = CircleHyperbola;
        let eps = convert(1e-10);

        for x in f.initials() {
            let solver = Broyden::with_linear_solver(&f, DMatrix::identity(2, 2), Qr);
            let root = solve(&f, solver, x, 20, eps).unwrap();
            assert!(f.is_root(&root, eps));
        }
    }

    #[test]
    fn residuals_dimension_mismatch() {
        let error = BroydenError::from(ProblemError::InvalidDimensionality {
            expected: 2,
            actual: 3,
        });

        assert!(matches!(
            error,
            BroydenError::DimensionMismatch {
                what: "residuals",
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    #[should_panic(expected = "jacobian has invalid dimension")]
    fn invalid_jacobian_dimension() {
        Broyden::new(&CircleHyperbola, DMatrix::identity(3, 3));
    }
}
