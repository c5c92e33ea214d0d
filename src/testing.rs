//! Testing systems and utilities useful for benchmarking, debugging and smoke
//! testing.
//!
//! [`CircleHyperbola`] and [`ExtendedRosenbrock`] are recommended for first
//! tests. [`Affine`] is solved exactly when the initial approximation of the
//! Jacobian matrix equals its matrix. [`SquareRoots`] takes extra arguments
//! and records how it was evaluated.
//!
//! # References
//!
//! \[1\] [A Literature Survey of Benchmark Functions For Global Optimization
//! Problems](https://arxiv.org/abs/1308.4008)
//!
//! \[2\] [Numerical Methods for Unconstrained Optimization and Nonlinear
//! Equations](https://epubs.siam.org/doi/book/10.1137/1.9781611971200)
//!
//! \[3\] [HOMPACK: A Suite of Codes for Globally Convergent Homotopy
//! Algorithms](https://dl.acm.org/doi/10.1145/29380.214343)

#![allow(unused)]

use std::cell::{Cell, RefCell};
use std::error::Error as StdError;

use nalgebra::{
    dmatrix, dvector,
    storage::{Storage, StorageMut},
    DMatrix, DVector, Dyn, IsContiguous, OVector, Vector,
};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use thiserror::Error;

use crate::core::{Problem, ProblemError, Solver, System};

/// Extension of the [`Problem`] trait that provides additional information that
/// is useful for testing solvers.
pub trait TestProblem: Problem {
    /// Standard initial values for the problem. Using the same initial values is
    /// essential for fair comparison of methods.
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>>;
}

/// Extension of the [`System`] trait that provides additional information that
/// is useful for testing solvers.
pub trait TestSystem: System + TestProblem {
    /// A set of roots (if known and finite). This is mostly just for
    /// information, for example to know how close a solver got even if it
    /// failed. For testing if a given point is root, [`TestSystem::is_root`]
    /// should be used.
    fn roots(&self) -> Vec<OVector<Self::Field, Dyn>> {
        Vec::new()
    }

    /// Test if given point is a root of the system, given the tolerance `eps`.
    fn is_root<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>, eps: Self::Field) -> bool
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        let mut fx = x.clone_owned();
        match self.eval(x, &mut fx) {
            Ok(()) => fx.norm() <= eps,
            Err(_) => false,
        }
    }
}

/// Affine system `A x + c`.
///
/// The Jacobian matrix is constant, so Broyden's method initialized with `A`
/// reaches the root in the first iteration.
#[derive(Debug, Clone)]
pub struct Affine {
    a: DMatrix<f64>,
    c: DVector<f64>,
}

impl Affine {
    /// Initializes the system with given matrix and constant vector.
    pub fn new(a: DMatrix<f64>, c: DVector<f64>) -> Self {
        assert!(a.is_square(), "matrix must be square");
        assert!(a.nrows() == c.nrows(), "c has invalid dimension");
        assert!(a.nrows() > 0, "empty system");
        Self { a, c }
    }

    /// Returns the matrix of the system.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.a
    }
}

impl Default for Affine {
    fn default() -> Self {
        // Root is (1, 2).
        Self::new(dmatrix![3.0, 1.0; 1.0, 2.0], dvector![-5.0, -5.0])
    }
}

impl Problem for Affine {
    type Field = f64;

    fn dim(&self) -> usize {
        self.a.nrows()
    }
}

impl System for Affine {
    fn eval<Sx, Sfx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        fx: &mut Vector<Self::Field, Dyn, Sfx>,
    ) -> Result<(), ProblemError>
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sfx: StorageMut<Self::Field, Dyn>,
    {
        fx.copy_from(&self.c);
        fx.gemv(1.0, &self.a, x, 1.0);
        Ok(())
    }
}

impl TestProblem for Affine {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![DVector::zeros(self.dim())]
    }
}

impl TestSystem for Affine {
    fn roots(&self) -> Vec<OVector<Self::Field, Dyn>> {
        let mut root = -self.c.clone();
        if self.a.clone().lu().solve_mut(&mut root) {
            vec![root]
        } else {
            Vec::new()
        }
    }
}

/// Intersection of a circle of radius 2 and the hyperbola `x y = 1`.
///
/// ```text
/// x^2 + y^2 - 4 = 0
/// x y - 1 = 0
/// ```
///
/// The root in the first quadrant with `x > y` is `x = sqrt(2 + sqrt(3))`,
/// `y = 1 / x`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CircleHyperbola;

impl Problem for CircleHyperbola {
    type Field = f64;

    fn dim(&self) -> usize {
        2
    }
}

impl System for CircleHyperbola {
    fn eval<Sx, Sfx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        fx: &mut Vector<Self::Field, Dyn, Sfx>,
    ) -> Result<(), ProblemError>
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sfx: StorageMut<Self::Field, Dyn>,
    {
        fx[0] = x[0] * x[0] + x[1] * x[1] - 4.0;
        fx[1] = x[0] * x[1] - 1.0;
        Ok(())
    }
}

impl TestProblem for CircleHyperbola {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![dvector![2.0, 0.5], dvector![1.9, 0.5], dvector![2.0, 0.6]]
    }
}

impl TestSystem for CircleHyperbola {
    fn roots(&self) -> Vec<OVector<Self::Field, Dyn>> {
        let x = (2.0 + 3f64.sqrt()).sqrt();
        vec![dvector![x, 1.0 / x]]
    }
}

/// [Extended Rosenbrock
/// function](https://en.wikipedia.org/wiki/Rosenbrock_function) \[1,2\] (also
/// known as Rosenbrock's valley or banana function).
///
/// The global minimum is inside a long, narrow, parabolic shaped flat valley.
/// The challenge is to find the solution inside the valley.
#[derive(Debug, Clone, Copy)]
pub struct ExtendedRosenbrock {
    n: usize,
}

impl ExtendedRosenbrock {
    /// Initializes the system with given dimension.
    ///
    /// The dimension **must** be a multiplier of 2.
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "n must be greater than zero");
        assert!(n % 2 == 0, "n must be a multiple of 2");
        Self { n }
    }
}

impl Default for ExtendedRosenbrock {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Problem for ExtendedRosenbrock {
    type Field = f64;

    fn dim(&self) -> usize {
        self.n
    }
}

impl System for ExtendedRosenbrock {
    fn eval<Sx, Sfx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        fx: &mut Vector<Self::Field, Dyn, Sfx>,
    ) -> Result<(), ProblemError>
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sfx: StorageMut<Self::Field, Dyn>,
    {
        for i in 0..(self.n / 2) {
            let i1 = 2 * i;
            let i2 = 2 * i + 1;

            fx[i1] = 10.0 * (x[i2] - x[i1] * x[i1]);
            fx[i2] = 1.0 - x[i1];
        }

        Ok(())
    }
}

impl TestProblem for ExtendedRosenbrock {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        let init1 = DVector::from_iterator(
            self.n,
            (0..self.n).map(|i| if i % 2 == 0 { -1.2 } else { 1.0 }),
        );

        let init2 = DVector::from_iterator(
            self.n,
            (0..self.n).map(|i| if i % 2 == 0 { 6.39 } else { -0.221 }),
        );

        vec![init1, init2]
    }
}

impl TestSystem for ExtendedRosenbrock {
    fn roots(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![DVector::from_element(self.n, 1.0)]
    }
}

/// A function whose zero path in [Homotopy continuation
/// methods](http://homepages.math.uic.edu/~jan/srvart/node4.html) has several
/// sharp turns \[3\].
#[derive(Debug, Clone, Copy)]
pub struct Exponential {
    n: usize,
}

impl Exponential {
    /// Initializes the system with given dimension.
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "n must be greater than zero");
        Self { n }
    }
}

impl Default for Exponential {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Problem for Exponential {
    type Field = f64;

    fn dim(&self) -> usize {
        self.n
    }
}

impl System for Exponential {
    fn eval<Sx, Sfx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        fx: &mut Vector<Self::Field, Dyn, Sfx>,
    ) -> Result<(), ProblemError>
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sfx: StorageMut<Self::Field, Dyn>,
    {
        let x_sum = x.sum();

        for (i, xi) in x.iter().copied().enumerate() {
            fx[i] = xi - (((i + 1) as f64) * x_sum).cos().exp();
        }

        Ok(())
    }
}

impl TestProblem for Exponential {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![DVector::zeros(self.n)]
    }
}

impl TestSystem for Exponential {}

/// System `x_i^2 - a_i` with the values `a_i` passed as extra arguments.
///
/// Without extra arguments, `a_i = 2` for all `i`. All evaluations are
/// recorded, see [`SquareRoots::calls`].
#[derive(Debug, Clone)]
pub struct SquareRoots {
    n: usize,
    calls: RefCell<Vec<Option<Vec<f64>>>>,
}

impl SquareRoots {
    /// Initializes the system with given dimension.
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "n must be greater than zero");
        Self {
            n,
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Returns the extra arguments of all evaluations so far. `None` means
    /// that the system was evaluated without extra arguments.
    pub fn calls(&self) -> Vec<Option<Vec<f64>>> {
        self.calls.borrow().clone()
    }

    fn residuals<Sx, Sfx>(
        &self,
        x: &Vector<f64, Dyn, Sx>,
        args: Option<&[f64]>,
        fx: &mut Vector<f64, Dyn, Sfx>,
    ) -> Result<(), ProblemError>
    where
        Sx: Storage<f64, Dyn> + IsContiguous,
        Sfx: StorageMut<f64, Dyn>,
    {
        self.calls.borrow_mut().push(args.map(<[f64]>::to_vec));

        if let Some(args) = args {
            if args.len() != self.n {
                return Err(ProblemError::Custom(
                    format!("expected {} arguments, got {}", self.n, args.len()).into(),
                ));
            }
        }

        for i in 0..self.n {
            let a = args.map_or(2.0, |args| args[i]);
            fx[i] = x[i] * x[i] - a;
        }

        Ok(())
    }
}

impl Problem for SquareRoots {
    type Field = f64;

    fn dim(&self) -> usize {
        self.n
    }
}

impl System for SquareRoots {
    fn eval<Sx, Sfx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        fx: &mut Vector<Self::Field, Dyn, Sfx>,
    ) -> Result<(), ProblemError>
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sfx: StorageMut<Self::Field, Dyn>,
    {
        self.residuals(x, None, fx)
    }

    fn eval_with_args<Sx, Sfx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        args: &[Self::Field],
        fx: &mut Vector<Self::Field, Dyn, Sfx>,
    ) -> Result<(), ProblemError>
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sfx: StorageMut<Self::Field, Dyn>,
    {
        self.residuals(x, Some(args), fx)
    }
}

impl TestProblem for SquareRoots {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![DVector::from_element(self.n, 1.0)]
    }
}

impl TestSystem for SquareRoots {
    fn roots(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![DVector::from_element(self.n, 2f64.sqrt())]
    }
}

/// Wrapper counting the evaluations of the inner system.
#[derive(Debug)]
pub struct Counting<F> {
    f: F,
    evals: Cell<usize>,
}

impl<F> Counting<F> {
    /// Wraps the system.
    pub fn new(f: F) -> Self {
        Self {
            f,
            evals: Cell::new(0),
        }
    }

    /// Returns the number of evaluations so far.
    pub fn evals(&self) -> usize {
        self.evals.get()
    }
}

impl<F: Problem> Problem for Counting<F> {
    type Field = F::Field;

    fn dim(&self) -> usize {
        self.f.dim()
    }
}

impl<F: System> System for Counting<F> {
    fn eval<Sx, Sfx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        fx: &mut Vector<Self::Field, Dyn, Sfx>,
    ) -> Result<(), ProblemError>
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sfx: StorageMut<Self::Field, Dyn>,
    {
        self.evals.set(self.evals.get() + 1);
        self.f.eval(x, fx)
    }

    fn eval_with_args<Sx, Sfx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        args: &[Self::Field],
        fx: &mut Vector<Self::Field, Dyn, Sfx>,
    ) -> Result<(), ProblemError>
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sfx: StorageMut<Self::Field, Dyn>,
    {
        self.evals.set(self.evals.get() + 1);
        self.f.eval_with_args(x, args, fx)
    }
}

impl<F: TestProblem> TestProblem for Counting<F> {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        self.f.initials()
    }
}

impl<F: TestSystem> TestSystem for Counting<F> {
    fn roots(&self) -> Vec<OVector<Self::Field, Dyn>> {
        self.f.roots()
    }
}

/// Generates `count` initial points by perturbing given point with normally
/// distributed noise of standard deviation `sigma`. The same `seed` gives
/// the same points.
pub fn perturbed_initials(
    x: &DVector<f64>,
    sigma: f64,
    count: usize,
    seed: u64,
) -> Vec<DVector<f64>> {
    assert!(sigma > 0.0, "sigma must be positive");

    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, sigma).expect("valid normal distribution");

    (0..count)
        .map(|_| x.map(|xi| xi + noise.sample(&mut rng)))
        .collect()
}

/// Solving error of the testing solver driver (see [`solve`]).
#[derive(Debug, Error)]
pub enum TestingError<E: StdError + 'static> {
    /// Error of the solver used.
    #[error("{0}")]
    Inner(#[from] E),
    /// Solver did not terminate.
    #[error("solver did not terminate")]
    Termination,
}

/// A simple solver driver that can be used in tests. It stops when the
/// residuals norm drops to `tolerance`, independently of the step size.
pub fn solve<F: TestSystem, S: Solver<F>>(
    f: &F,
    mut solver: S,
    mut x: OVector<F::Field, Dyn>,
    max_iters: usize,
    tolerance: F::Field,
) -> Result<OVector<F::Field, Dyn>, TestingError<S::Error>>
where
    S::Error: StdError + 'static,
{
    let mut fx = x.clone_owned();
    f.eval(&x, &mut fx).map_err(|_| TestingError::Termination)?;

    let mut iter = 0;

    loop {
        if fx.norm() <= tolerance {
            return Ok(x);
        }

        if iter == max_iters {
            return Err(TestingError::Termination);
        } else {
            iter += 1;
        }

        solver.solve_next(f, &mut x, &mut fx)?;
    }
}
