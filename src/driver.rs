//! High-level API for solving.
//!
//! The driver encapsulates all internal state of the iterative process:
//! current iterate and residuals, the approximation of the Jacobian matrix,
//! iteration counter and the convergence test. The simplest way of using it is
//! to initialize it with the defaults and run it to the end:
//!
//! ```rust
//! use broyden::nalgebra::{dvector, DVector};
//! use broyden::{FnSystem, SolverDriver};
//!
//! let f = FnSystem::new(2, |x: &DVector<f64>, _: Option<&[f64]>| {
//!     dvector![x[0].powi(2) + x[1].powi(2) - 4.0, x[0] * x[1] - 1.0]
//! });
//!
//! let mut solver = SolverDriver::builder(&f)
//!     .with_initial(vec![2.0, 0.5])
//!     .build()
//!     .expect("valid inputs");
//!
//! let solution = solver.run().expect("no solver error");
//! assert!(solution.converged());
//! ```
//!
//! If you need to specify additional settings, use the builder methods:
//!
//! ```rust
//! use broyden::driver::{JacobianInit, SolverOptions};
//! use broyden::nalgebra::{dvector, DVector};
//! use broyden::{linalg::Qr, FnSystem, SolverDriver};
//!
//! let f = FnSystem::new(2, |x: &DVector<f64>, _: Option<&[f64]>| {
//!     dvector![10.0 * (x[1] - x[0].powi(2)), 1.0 - x[0]]
//! });
//!
//! let mut options = SolverOptions::default();
//! options.set_max_iters(50).set_warn_on_no_convergence(true);
//!
//! let mut solver = SolverDriver::builder(&f)
//!     .with_initial(vec![-1.2, 1.0])
//!     .with_jacobian(JacobianInit::FiniteDifference)
//!     .with_options(options)
//!     .with_linear_solver(Qr)
//!     .build()
//!     .expect("valid inputs");
//! ```
//!
//! If you need more control over the iteration process, you can do the
//! iterations manually:
//!
//! ```rust
//! # use broyden::nalgebra::{dvector, DVector};
//! # use broyden::{FnSystem, SolverDriver};
//! use broyden::driver::Status;
//! #
//! # let f = FnSystem::new(2, |x: &DVector<f64>, _: Option<&[f64]>| {
//! #     dvector![x[0].powi(2) + x[1].powi(2) - 4.0, x[0] * x[1] - 1.0]
//! # });
//! # let mut solver = SolverDriver::builder(&f)
//! #     .with_initial(vec![2.0, 0.5])
//! #     .build()
//! #     .expect("valid inputs");
//!
//! while solver.next().expect("no solver error") == Status::Running {
//!     println!("iter = {}\t|| fx || = {}", solver.iter(), solver.norm());
//! }
//! ```
//!
//! For the one-shot use, there is [`solve`] function.

use approx::AbsDiffEq;
use getset::{CopyGetters, Getters, Setters};
use log::{debug, warn};
use nalgebra::{convert, ComplexField, DMatrix, DVector, RealField};
use num_traits::Zero;

use crate::{
    algo::{Broyden, BroydenError},
    core::{BoundSystem, ExtraArgs, Problem, ProblemError, Solver, System},
    derivatives::Jacobian,
    linalg::{LinearSolver, Lu},
};

/// Options for the [`SolverDriver`].
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct SolverOptions<T: RealField + Copy> {
    /// Threshold on the largest absolute change of a variable in one step.
    /// Default: `1e-10`.
    tol_abs: T,
    /// Threshold on the largest change of a variable in one step relative to
    /// its new magnitude. Default: `1e-10`.
    tol_rel: T,
    /// Maximum number of iterations. Default: `100`.
    max_iters: usize,
    /// Emit a warning if the iteration limit is reached without convergence.
    /// Default: `false`.
    warn_on_no_convergence: bool,
}

impl<T: RealField + Copy> Default for SolverOptions<T> {
    fn default() -> Self {
        Self {
            tol_abs: convert(1e-10),
            tol_rel: convert(1e-10),
            max_iters: 100,
            warn_on_no_convergence: false,
        }
    }
}

impl<T: RealField + Copy> SolverOptions<T> {
    fn validate(&self) -> Result<(), BroydenError> {
        if self.max_iters == 0 {
            return Err(BroydenError::InvalidOptions(
                "maximum number of iterations must be positive",
            ));
        }

        // Negated comparisons reject NaN too.
        if !(self.tol_abs >= T::zero()) {
            return Err(BroydenError::InvalidOptions(
                "absolute tolerance must be non-negative",
            ));
        }

        if !(self.tol_rel >= T::zero()) {
            return Err(BroydenError::InvalidOptions(
                "relative tolerance must be non-negative",
            ));
        }

        Ok(())
    }

    /// A zero step has both absolute and relative change equal to zero.
    fn accepts_zero_step(&self) -> bool {
        self.tol_abs > T::zero() || self.tol_rel > T::zero()
    }
}

/// Initial approximation of the Jacobian matrix.
#[derive(Debug, Clone)]
pub enum JacobianInit<T> {
    /// Identity matrix.
    Identity,
    /// Forward difference approximation in the initial point. Costs `n`
    /// additional evaluations of the system.
    FiniteDifference,
    /// Given matrix. It must be square with the dimension of the system.
    Given(DMatrix<T>),
}

impl<T> Default for JacobianInit<T> {
    fn default() -> Self {
        Self::Identity
    }
}

/// Status of the iterative process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The tolerances were not met yet and there are iterations left.
    Running,
    /// The step size dropped below the tolerances.
    Converged,
    /// The maximum number of iterations was reached without convergence.
    Exhausted,
}

impl Status {
    /// Determines whether the process has finished.
    pub fn is_done(&self) -> bool {
        !matches!(self, Status::Running)
    }
}

/// Result of the solving process.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct Solution<T: RealField + Copy> {
    /// The final point.
    #[getset(get = "pub")]
    x: DVector<T>,
    /// Residuals in the final point.
    #[getset(get = "pub")]
    fx: DVector<T>,
    /// The final approximation of the Jacobian matrix.
    #[getset(get = "pub")]
    jac: DMatrix<T>,
    /// Number of iterations done.
    #[getset(get_copy = "pub")]
    iters: usize,
    /// Whether the tolerances were met.
    #[getset(get_copy = "pub")]
    converged: bool,
}

impl<T: RealField + Copy> Solution<T> {
    /// Returns the final point, the final approximation of the Jacobian matrix
    /// and the number of iterations.
    pub fn into_parts(self) -> (DVector<T>, DMatrix<T>, usize) {
        (self.x, self.jac, self.iters)
    }
}

/// Builder for the [`SolverDriver`].
pub struct SolverBuilder<'a, F: Problem, L = Lu> {
    f: &'a F,
    x0: Vec<F::Field>,
    jac: JacobianInit<F::Field>,
    args: ExtraArgs<F::Field>,
    options: SolverOptions<F::Field>,
    linear: L,
}

impl<'a, F: Problem, L> SolverBuilder<'a, F, L> {
    /// Sets the initial point from which the iterative process starts.
    /// Default: zeros.
    pub fn with_initial(mut self, x0: Vec<F::Field>) -> Self {
        self.x0 = x0;
        self
    }

    /// Sets the initial approximation of the Jacobian matrix.
    pub fn with_jacobian(mut self, jac: JacobianInit<F::Field>) -> Self {
        self.jac = jac;
        self
    }

    /// Sets extra arguments forwarded to every evaluation of the system.
    pub fn with_args<A: Into<ExtraArgs<F::Field>>>(mut self, args: A) -> Self {
        self.args = args.into();
        self
    }

    /// Sets the options.
    pub fn with_options(mut self, options: SolverOptions<F::Field>) -> Self {
        self.options = options;
        self
    }

    /// Sets the linear solver used for computing the steps.
    pub fn with_linear_solver<L2>(self, linear: L2) -> SolverBuilder<'a, F, L2> {
        SolverBuilder {
            f: self.f,
            x0: self.x0,
            jac: self.jac,
            args: self.args,
            options: self.options,
            linear,
        }
    }
}

impl<'a, F: System, L: LinearSolver<F::Field>> SolverBuilder<'a, F, L> {
    /// Builds the [`SolverDriver`].
    ///
    /// The inputs are validated and the system is evaluated in the initial
    /// point (and around it for [`JacobianInit::FiniteDifference`]).
    pub fn build(self) -> Result<SolverDriver<'a, F, L>, BroydenError> {
        let Self {
            f,
            x0,
            jac,
            args,
            options,
            linear,
        } = self;

        options.validate()?;

        let n = f.dim();

        if n == 0 {
            return Err(BroydenError::DimensionMismatch {
                what: "system",
                expected: 1,
                actual: 0,
            });
        }

        if x0.len() != n {
            return Err(BroydenError::DimensionMismatch {
                what: "initial point",
                expected: n,
                actual: x0.len(),
            });
        }

        if let JacobianInit::Given(jac) = &jac {
            if jac.shape() != (n, n) {
                let actual = if jac.nrows() != n {
                    jac.nrows()
                } else {
                    jac.ncols()
                };

                return Err(BroydenError::DimensionMismatch {
                    what: "jacobian",
                    expected: n,
                    actual,
                });
            }
        }

        let f = args.bind(f);

        let mut x = DVector::from_vec(x0);
        let mut fx = DVector::zeros(n);
        f.eval(&x, &mut fx)?;

        if fx.iter().any(|fxi| !fxi.is_finite()) {
            return Err(BroydenError::Problem(ProblemError::InvalidValue));
        }

        let jac = match jac {
            JacobianInit::Identity => DMatrix::identity(n, n),
            JacobianInit::FiniteDifference => Jacobian::new(&f, &mut x, &fx)?.into_inner(),
            JacobianInit::Given(jac) => jac,
        };

        let algo = Broyden::with_linear_solver(&f, jac, linear);

        debug!(
            "{} solver ({}) started: n = {}, || fx || = {}, extra args = {}",
            <Broyden<BoundSystem<'a, F>, L> as Solver<BoundSystem<'a, F>>>::NAME,
            L::NAME,
            n,
            fx.norm(),
            f.args().map_or(0, <[F::Field]>::len)
        );

        Ok(SolverDriver {
            x_prev: x.clone(),
            f,
            algo,
            options,
            x,
            fx,
            iter: 0,
            status: Status::Running,
        })
    }
}

/// The driver for the process of solving a system of equations.
///
/// Use [`SolverDriver::builder`] to create it. For the usage of the driver,
/// see [module](self) documentation.
pub struct SolverDriver<'a, F: Problem, L = Lu> {
    f: BoundSystem<'a, F>,
    algo: Broyden<BoundSystem<'a, F>, L>,
    options: SolverOptions<F::Field>,
    x: DVector<F::Field>,
    x_prev: DVector<F::Field>,
    fx: DVector<F::Field>,
    iter: usize,
    status: Status,
}

impl<'a, F: Problem> SolverDriver<'a, F, Lu> {
    /// Returns the builder for specifying the settings.
    pub fn builder(f: &'a F) -> SolverBuilder<'a, F, Lu> {
        SolverBuilder {
            f,
            x0: vec![F::Field::zero(); f.dim()],
            jac: JacobianInit::default(),
            args: ExtraArgs::default(),
            options: SolverOptions::default(),
            linear: Lu,
        }
    }
}

impl<'a, F: Problem, L> SolverDriver<'a, F, L> {
    /// Returns reference to the current point.
    pub fn x(&self) -> &[F::Field] {
        self.x.as_slice()
    }

    /// Returns reference to the current residuals.
    pub fn fx(&self) -> &[F::Field] {
        self.fx.as_slice()
    }

    /// Returns norm of the residuals.
    pub fn norm(&self) -> F::Field {
        self.fx.norm()
    }

    /// Returns the current approximation of the Jacobian matrix.
    pub fn jacobian(&self) -> &DMatrix<F::Field> {
        self.algo.jacobian()
    }

    /// Returns the number of iterations done.
    pub fn iter(&self) -> usize {
        self.iter
    }

    /// Returns the status of the process.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Returns the options.
    pub fn options(&self) -> &SolverOptions<F::Field> {
        &self.options
    }

    /// Returns the current state as a solution.
    pub fn solution(&self) -> Solution<F::Field> {
        Solution {
            x: self.x.clone(),
            fx: self.fx.clone(),
            jac: self.algo.jacobian().clone(),
            iters: self.iter,
            converged: self.status == Status::Converged,
        }
    }
}

impl<'a, F: System, L: LinearSolver<F::Field>> SolverDriver<'a, F, L> {
    /// Does one iteration of the process, returning the status after it.
    ///
    /// If the process has already finished, no work is done and the final
    /// status is returned.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Status, BroydenError> {
        if self.status.is_done() {
            return Ok(self.status);
        }

        self.iter += 1;
        self.x_prev.copy_from(&self.x);

        match self.algo.solve_next(&self.f, &mut self.x, &mut self.fx) {
            Ok(()) => {}
            Err(BroydenError::ZeroStep) if self.options.accepts_zero_step() => {
                debug!("iter = {}: zero step, already at the root", self.iter);
                self.status = Status::Converged;
                return Ok(self.status);
            }
            Err(error) => return Err(error),
        }

        let eps: F::Field = F::Field::default_epsilon();
        let mut test = F::Field::zero();
        let mut test_rel = F::Field::zero();

        for (xi, xi_prev) in self.x.iter().copied().zip(self.x_prev.iter().copied()) {
            let diff = (xi - xi_prev).abs();
            test = test.max(diff);
            test_rel = test_rel.max(diff / (xi.abs() + eps));
        }

        debug!(
            "iter = {}\t|| fx || = {}\tmax |dx| = {}\tmax |dx| / |x| = {}",
            self.iter,
            self.fx.norm(),
            test,
            test_rel
        );

        if test_rel < self.options.tol_rel || test < self.options.tol_abs {
            self.status = Status::Converged;
        } else if self.iter >= self.options.max_iters {
            self.status = Status::Exhausted;

            if self.options.warn_on_no_convergence {
                warn!(
                    "{} did not converge in {} iterations (max |dx| = {}, max |dx| / |x| = {})",
                    self.name(),
                    self.iter,
                    test,
                    test_rel
                );
            }
        }

        Ok(self.status)
    }

    /// Runs the iterative process until convergence or until the maximum
    /// number of iterations is reached.
    ///
    /// Not reaching the convergence is not an error, see
    /// [`Solution::converged`].
    pub fn run(&mut self) -> Result<Solution<F::Field>, BroydenError> {
        while !self.next()?.is_done() {}
        Ok(self.solution())
    }

    /// Returns the name of the used solver.
    pub fn name(&self) -> &str {
        <Broyden<BoundSystem<'a, F>, L> as Solver<BoundSystem<'a, F>>>::NAME
    }
}

/// Finds a root of the system using Broyden's method starting in `x0` with
/// `jac0` as the initial approximation of the Jacobian matrix.
///
/// Neither `x0` nor `jac0` is modified, the solver works on copies.
///
/// ```rust
/// use broyden::driver::{solve, SolverOptions};
/// use broyden::nalgebra::{dvector, DMatrix, DVector};
/// use broyden::{ExtraArgs, FnSystem};
///
/// // Intersection of a circle with radius given as extra argument and the
/// // hyperbola x y = 1.
/// let f = FnSystem::new(2, |x: &DVector<f64>, args: Option<&[f64]>| {
///     let r = args.map_or(2.0, |args| args[0]);
///     dvector![x[0].powi(2) + x[1].powi(2) - r * r, x[0] * x[1] - 1.0]
/// });
/// let jac0 = DMatrix::identity(2, 2);
///
/// let solution = solve(&f, &[2.0, 0.5], &jac0, &SolverOptions::default(), ExtraArgs::NoArgs)
///     .expect("no solver error");
///
/// let (x, _, iters) = solution.into_parts();
/// assert!((x[0] * x[1] - 1.0).abs() < 1e-8);
/// assert!(iters < 50);
/// ```
pub fn solve<F: System>(
    f: &F,
    x0: &[F::Field],
    jac0: &DMatrix<F::Field>,
    options: &SolverOptions<F::Field>,
    args: ExtraArgs<F::Field>,
) -> Result<Solution<F::Field>, BroydenError> {
    SolverDriver::builder(f)
        .with_initial(x0.to_vec())
        .with_jacobian(JacobianInit::Given(jac0.clone()))
        .with_args(args)
        .with_options(options.clone())
        .build()?
        .run()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        core::FnSystem,
        linalg::{LinearSolveError, Qr},
        testing::{
            perturbed_initials, Affine, CircleHyperbola, Counting, Exponential,
            ExtendedRosenbrock, SquareRoots, TestProblem, TestSystem,
        },
    };

    use approx::assert_abs_diff_eq;
    use nalgebra::{dmatrix, dvector};

    fn zero_tolerances() -> SolverOptions<f64> {
        let mut options = SolverOptions::default();
        options.set_tol_abs(0.0).set_tol_rel(0.0);
        options
    }

    #[test]
    fn circle_hyperbola() {
        let f = CircleHyperbola;
        let root = f.roots()[0].clone();

        for x0 in f.initials() {
            let solution = solve(
                &f,
                x0.as_slice(),
                &DMatrix::identity(2, 2),
                &SolverOptions::default(),
                ExtraArgs::NoArgs,
            )
            .unwrap();

            assert!(solution.converged());
            assert!(solution.iters() < 50);
            assert_abs_diff_eq!(solution.x(), &root, epsilon = 1e-8);
        }
    }

    #[test]
    fn exact_linear_case() {
        let f = Affine::default();
        let root = f.roots()[0].clone();

        let mut options = SolverOptions::default();
        options.set_max_iters(1);

        let solution = solve(&f, &[0.0, 0.0], f.matrix(), &options, ExtraArgs::NoArgs).unwrap();

        assert_eq!(solution.iters(), 1);
        assert!(!solution.converged());
        assert_abs_diff_eq!(solution.x(), &root, epsilon = 1e-12);
        assert_abs_diff_eq!(solution.jac(), f.matrix(), epsilon = 1e-12);

        // The step from the root is (almost) zero.
        let solution = solve(
            &f,
            &[0.0, 0.0],
            f.matrix(),
            &SolverOptions::default(),
            ExtraArgs::NoArgs,
        )
        .unwrap();

        assert!(solution.converged());
        assert_eq!(solution.iters(), 2);
        assert_abs_diff_eq!(solution.x(), &root, epsilon = 1e-12);
    }

    #[test]
    fn zero_step_at_root_converges() {
        // The residuals are exactly zero in (1, 2).
        let f = Affine::default();

        let solution = solve(
            &f,
            &[1.0, 2.0],
            &DMatrix::identity(2, 2),
            &SolverOptions::default(),
            ExtraArgs::NoArgs,
        )
        .unwrap();

        assert!(solution.converged());
        assert_eq!(solution.iters(), 1);
        assert_eq!(solution.x(), &dvector![1.0, 2.0]);
        assert_eq!(solution.jac(), &DMatrix::identity(2, 2));
    }

    #[test]
    fn zero_step_with_zero_tolerances() {
        let f = Affine::default();

        let result = solve(
            &f,
            &[1.0, 2.0],
            &DMatrix::identity(2, 2),
            &zero_tolerances(),
            ExtraArgs::NoArgs,
        );

        assert!(matches!(result, Err(BroydenError::ZeroStep)));
    }

    #[test]
    fn iteration_limit() {
        let f = Counting::new(CircleHyperbola);

        let mut options = zero_tolerances();
        options.set_max_iters(3).set_warn_on_no_convergence(true);

        let mut solver = SolverDriver::builder(&f)
            .with_initial(vec![2.0, 0.5])
            .with_options(options)
            .build()
            .unwrap();

        let solution = solver.run().unwrap();

        assert_eq!(solution.iters(), 3);
        assert!(!solution.converged());
        assert_eq!(solver.status(), Status::Exhausted);
        // One evaluation in the initial point and one per iteration.
        assert_eq!(f.evals(), 4);
    }

    #[test]
    fn no_root() {
        // The secant iterations oscillate.
        let f = FnSystem::new(1, |x: &DVector<f64>, _: Option<&[f64]>| {
            dvector![x[0] * x[0] + 1.0]
        });

        let mut options = SolverOptions::default();
        options.set_max_iters(30).set_warn_on_no_convergence(true);

        let solution = solve(
            &f,
            &[0.5],
            &DMatrix::identity(1, 1),
            &options,
            ExtraArgs::NoArgs,
        )
        .unwrap();

        assert_eq!(solution.iters(), 30);
        assert!(!solution.converged());
    }

    #[test]
    fn finished_driver_does_nothing() {
        let f = CircleHyperbola;

        let mut options = SolverOptions::default();
        options.set_max_iters(2);

        let mut solver = SolverDriver::builder(&f)
            .with_initial(vec![2.0, 0.5])
            .with_options(options)
            .build()
            .unwrap();

        assert_eq!(solver.next().unwrap(), Status::Running);
        assert_eq!(solver.next().unwrap(), Status::Exhausted);

        let x = solver.x().to_vec();
        assert_eq!(solver.next().unwrap(), Status::Exhausted);
        assert_eq!(solver.iter(), 2);
        assert_eq!(solver.x(), x.as_slice());
    }

    #[test]
    fn converged_in_last_iteration() {
        let f = CircleHyperbola;

        let iters = solve(
            &f,
            &[2.0, 0.5],
            &DMatrix::identity(2, 2),
            &SolverOptions::default(),
            ExtraArgs::NoArgs,
        )
        .unwrap()
        .iters();

        // Convergence takes precedence over exhausting the iterations, no
        // warning is emitted. The warning itself is only visible in the log,
        // `Solution::converged` carries the same outcome.
        let mut options = SolverOptions::default();
        options
            .set_max_iters(iters)
            .set_warn_on_no_convergence(true);

        let mut solver = SolverDriver::builder(&f)
            .with_initial(vec![2.0, 0.5])
            .with_options(options)
            .build()
            .unwrap();

        let solution = solver.run().unwrap();

        assert_eq!(solution.iters(), iters);
        assert!(solution.converged());
        assert_eq!(solver.status(), Status::Converged);
    }

    #[test]
    fn inputs_are_not_modified() {
        let f = CircleHyperbola;
        let x0 = vec![2.0, 0.5];
        let jac0 = dmatrix![4.0, 1.0; 0.5, 2.0];

        let solution = solve(
            &f,
            &x0,
            &jac0,
            &SolverOptions::default(),
            ExtraArgs::NoArgs,
        )
        .unwrap();

        assert!(solution.converged());
        assert_eq!(x0, vec![2.0, 0.5]);
        assert_eq!(jac0, dmatrix![4.0, 1.0; 0.5, 2.0]);
        assert_ne!(solution.jac(), &jac0);
    }

    #[test]
    fn extra_args_are_forwarded() {
        let f = SquareRoots::new(2);

        let mut solver = SolverDriver::builder(&f)
            .with_initial(vec![1.0, 1.0])
            .with_jacobian(JacobianInit::FiniteDifference)
            .with_args(vec![4.0, 9.0])
            .build()
            .unwrap();

        let solution = solver.run().unwrap();

        assert!(solution.converged());
        assert_abs_diff_eq!(solution.x(), &dvector![2.0, 3.0], epsilon = 1e-8);

        let calls = f.calls();
        // Initial point, finite differences and iterations.
        assert_eq!(calls.len(), 1 + 2 + solution.iters());
        assert!(calls.iter().all(|args| args == &Some(vec![4.0, 9.0])));
    }

    #[test]
    fn no_args_are_not_forwarded() {
        let f = SquareRoots::new(2);

        let mut solver = SolverDriver::builder(&f)
            .with_initial(vec![1.0, 1.0])
            .with_jacobian(JacobianInit::FiniteDifference)
            .with_args(Vec::<f64>::new())
            .build()
            .unwrap();

        let solution = solver.run().unwrap();

        assert!(solution.converged());
        assert!(f.is_root(solution.x(), 1e-8));
        assert!(f.calls().iter().all(Option::is_none));
    }

    #[test]
    fn unsupported_args() {
        let f = Affine::default();

        let result = SolverDriver::builder(&f)
            .with_args(vec![1.0])
            .build();

        assert!(matches!(
            result,
            Err(BroydenError::Problem(ProblemError::UnsupportedArgs))
        ));
    }

    #[test]
    fn invalid_initial_residuals() {
        let f = FnSystem::new(1, |x: &DVector<f64>, _: Option<&[f64]>| dvector![x[0].ln()]);

        let result = solve(
            &f,
            &[-1.0],
            &DMatrix::identity(1, 1),
            &SolverOptions::default(),
            ExtraArgs::NoArgs,
        );

        assert!(matches!(
            result,
            Err(BroydenError::Problem(ProblemError::InvalidValue))
        ));
    }

    #[test]
    fn invalid_residuals_during_iteration() {
        // The first step from x = 1 lands on x = -4 outside the domain of ln.
        let f = FnSystem::new(1, |x: &DVector<f64>, _: Option<&[f64]>| {
            dvector![x[0].ln() + 5.0]
        });

        let mut options = SolverOptions::default();
        options.set_max_iters(1);

        for options in [options, SolverOptions::default()] {
            let result = solve(
                &f,
                &[1.0],
                &DMatrix::identity(1, 1),
                &options,
                ExtraArgs::NoArgs,
            );

            assert!(matches!(
                result,
                Err(BroydenError::Problem(ProblemError::InvalidValue))
            ));
        }

        let mut solver = SolverDriver::builder(&f)
            .with_initial(vec![1.0])
            .build()
            .unwrap();

        assert!(solver.next().is_err());
        assert_eq!(solver.x(), &[1.0][..]);
        assert_eq!(solver.fx(), &[5.0][..]);
    }

    #[test]
    fn closure_system() {
        let f = FnSystem::new(2, |x: &DVector<f64>, args: Option<&[f64]>| {
            let r = args.map_or(1.0, |args| args[0]);
            dvector![x[0] * x[0] + x[1] * x[1] - r * r, x[0] - x[1]]
        });

        let solution = solve(
            &f,
            &[1.0, 0.5],
            &dmatrix![2.0, 1.0; 1.0, -1.0],
            &SolverOptions::default(),
            ExtraArgs::from(vec![2.0]),
        )
        .unwrap();

        let expected = 2f64.sqrt();
        assert!(solution.converged());
        assert_abs_diff_eq!(solution.x(), &dvector![expected, expected], epsilon = 1e-8);
    }

    #[test]
    fn finite_difference_jacobian() {
        let f = ExtendedRosenbrock::new(2);

        for x0 in f.initials() {
            let mut solver = SolverDriver::builder(&f)
                .with_initial(x0.as_slice().to_vec())
                .with_jacobian(JacobianInit::FiniteDifference)
                .build()
                .unwrap();

            let solution = solver.run().unwrap();

            assert!(solution.converged());
            assert!(f.is_root(solution.x(), 1e-8));
        }
    }

    #[test]
    fn exponential() {
        let f = Exponential::new(2);

        let mut solver = SolverDriver::builder(&f).build().unwrap();
        let solution = solver.run().unwrap();

        assert!(solution.converged());
        assert!(f.is_root(solution.x(), 1e-8));
    }

    #[test]
    fn perturbed_starts() {
        let f = CircleHyperbola;
        let root = f.roots()[0].clone();

        for x0 in perturbed_initials(&root, 0.05, 10, 3) {
            let mut solver = SolverDriver::builder(&f)
                .with_initial(x0.as_slice().to_vec())
                .with_jacobian(JacobianInit::FiniteDifference)
                .with_linear_solver(Qr)
                .build()
                .unwrap();

            let solution = solver.run().unwrap();

            assert!(solution.converged());
            assert!(f.is_root(solution.x(), 1e-8));
        }
    }

    #[test]
    fn singular_initial_jacobian() {
        let f = CircleHyperbola;

        let result = solve(
            &f,
            &[2.0, 0.5],
            &dmatrix![1.0, 0.0; 2.0, 0.0],
            &SolverOptions::default(),
            ExtraArgs::NoArgs,
        );

        assert!(matches!(
            result,
            Err(BroydenError::LinearSolve(LinearSolveError::Singular))
        ));
    }

    #[test]
    fn dimension_mismatch() {
        let f = CircleHyperbola;
        let options = SolverOptions::default();

        let result = solve(&f, &[2.0], &DMatrix::identity(2, 2), &options, ExtraArgs::NoArgs);
        assert!(matches!(
            result,
            Err(BroydenError::DimensionMismatch {
                what: "initial point",
                expected: 2,
                actual: 1
            })
        ));

        let result = solve(
            &f,
            &[2.0, 0.5],
            &DMatrix::identity(3, 3),
            &options,
            ExtraArgs::NoArgs,
        );
        assert!(matches!(
            result,
            Err(BroydenError::DimensionMismatch {
                what: "jacobian",
                expected: 2,
                actual: 3
            })
        ));

        let f = FnSystem::new(2, |x: &DVector<f64>, _: Option<&[f64]>| dvector![x[0]]);
        let result = solve(&f, &[2.0, 0.5], &DMatrix::identity(2, 2), &options, ExtraArgs::NoArgs);
        assert!(matches!(
            result,
            Err(BroydenError::DimensionMismatch {
                what: "residuals",
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn invalid_options() {
        let f = CircleHyperbola;

        let mut options = SolverOptions::default();
        options.set_max_iters(0);
        assert!(matches!(
            SolverDriver::builder(&f).with_options(options).build(),
            Err(BroydenError::InvalidOptions(_))
        ));

        let mut options = SolverOptions::default();
        options.set_tol_abs(-1.0);
        assert!(matches!(
            SolverDriver::builder(&f).with_options(options).build(),
            Err(BroydenError::InvalidOptions(_))
        ));

        let mut options = SolverOptions::default();
        options.set_tol_rel(f64::NAN);
        assert!(matches!(
            SolverDriver::builder(&f).with_options(options).build(),
            Err(BroydenError::InvalidOptions(_))
        ));
    }

    #[test]
    fn driver_accessors() {
        let f = CircleHyperbola;
        let solver = SolverDriver::builder(&f)
            .with_initial(vec![2.0, 0.5])
            .with_linear_solver(Qr)
            .build()
            .unwrap();

        assert_eq!(solver.name(), "Broyden");
        assert_eq!(solver.iter(), 0);
        assert_eq!(solver.status(), Status::Running);
        assert_eq!(solver.x(), &[2.0, 0.5]);
        assert_abs_diff_eq!(solver.fx()[0], 0.25, epsilon = 1e-15);
        assert_eq!(solver.jacobian(), &DMatrix::identity(2, 2));
    }
}
