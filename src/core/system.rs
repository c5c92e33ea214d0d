//! Abstractions and types for defining equation systems.
//!
//! # Defining a system
//!
//! A system is any type that implements [`System`] and [`Problem`] traits.
//! There is one required associated type (field type) and two required
//! methods: [`eval`](System::eval) and [`dim`](Problem::dim).
//!
//! ```rust
//! use broyden::nalgebra as na;
//! use broyden::{Problem, ProblemError, System};
//! use na::{Dyn, IsContiguous};
//!
//! // A problem is represented by a type.
//! struct Circle {
//!     radius: f64,
//! }
//!
//! impl Problem for Circle {
//!     // The numeric type. Usually f64 or f32.
//!     type Field = f64;
//!
//!     // The number of variables and equations.
//!     fn dim(&self) -> usize {
//!         2
//!     }
//! }
//!
//! impl System for Circle {
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
//!         fx[0] = x[0].powi(2) + x[1].powi(2) - self.radius.powi(2);
//!         fx[1] = x[0] - x[1];
//!
//!         Ok(())
//!     }
//! }
//! ```
//!
//! Systems parametrized by values known only at the call site can accept
//! [extra arguments](ExtraArgs) by overriding
//! [`eval_with_args`](System::eval_with_args). For quick experiments, a
//! closure can be turned into a system with [`FnSystem`].

use std::marker::PhantomData;

use nalgebra::{
    storage::{Storage, StorageMut},
    DVector, Dyn, IsContiguous, RealField, Vector,
};

use super::base::{Problem, ProblemError};

/// The trait for defining equations systems.
pub trait System: Problem {
    /// Calculate the residuals of the system given values of the variables.
    fn eval<Sx, Sfx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        fx: &mut Vector<Self::Field, Dyn, Sfx>,
    ) -> Result<(), ProblemError>
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sfx: StorageMut<Self::Field, Dyn>;

    /// Calculate the residuals of the system given values of the variables
    /// and extra arguments forwarded unchanged from the caller.
    ///
    /// If not overridden, extra arguments are rejected with
    /// [`ProblemError::UnsupportedArgs`].
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
        let _ = (x, args, fx);
        Err(ProblemError::UnsupportedArgs)
    }
}

/// Extra positional arguments forwarded to every evaluation of a system.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtraArgs<T> {
    /// The system is evaluated with the variables only
    /// ([`System::eval`]).
    NoArgs,
    /// The system is evaluated with the variables and given arguments
    /// ([`System::eval_with_args`]).
    Args(Vec<T>),
}

impl<T> ExtraArgs<T> {
    /// Creates the arguments from a sequence. An empty sequence means no
    /// arguments.
    pub fn new(args: Vec<T>) -> Self {
        if args.is_empty() {
            Self::NoArgs
        } else {
            Self::Args(args)
        }
    }

    /// Returns the arguments, or `None` if there are none.
    pub fn as_slice(&self) -> Option<&[T]> {
        match self {
            Self::Args(args) if !args.is_empty() => Some(args.as_slice()),
            _ => None,
        }
    }

    /// Returns the number of arguments.
    pub fn len(&self) -> usize {
        self.as_slice().map_or(0, <[T]>::len)
    }

    /// Determines whether there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: RealField + Copy> ExtraArgs<T> {
    /// Binds the arguments to the system, resolving the form of evaluation
    /// once for all subsequent calls.
    pub fn bind<F>(self, f: &F) -> BoundSystem<'_, F>
    where
        F: System<Field = T>,
    {
        let args = match self {
            Self::Args(args) if !args.is_empty() => Some(args),
            _ => None,
        };

        BoundSystem { f, args }
    }
}

impl<T> Default for ExtraArgs<T> {
    fn default() -> Self {
        Self::NoArgs
    }
}

impl<T> From<Vec<T>> for ExtraArgs<T> {
    fn from(args: Vec<T>) -> Self {
        Self::new(args)
    }
}

impl<T> From<Option<Vec<T>>> for ExtraArgs<T> {
    fn from(args: Option<Vec<T>>) -> Self {
        args.map_or(Self::NoArgs, Self::new)
    }
}

/// A system with its [extra arguments](ExtraArgs) resolved.
///
/// Evaluating the bound system calls [`System::eval`] of the inner system if
/// there are no arguments, and [`System::eval_with_args`] otherwise.
#[derive(Debug)]
pub struct BoundSystem<'f, F: Problem> {
    f: &'f F,
    args: Option<Vec<F::Field>>,
}

impl<'f, F: Problem> BoundSystem<'f, F> {
    /// Returns the inner system.
    pub fn inner(&self) -> &'f F {
        self.f
    }

    /// Returns the bound arguments, if any.
    pub fn args(&self) -> Option<&[F::Field]> {
        self.args.as_deref()
    }
}

impl<'f, F: Problem> Problem for BoundSystem<'f, F> {
    type Field = F::Field;

    fn dim(&self) -> usize {
        self.f.dim()
    }
}

impl<'f, F: System> System for BoundSystem<'f, F> {
    fn eval<Sx, Sfx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        fx: &mut Vector<Self::Field, Dyn, Sfx>,
    ) -> Result<(), ProblemError>
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sfx: StorageMut<Self::Field, Dyn>,
    {
        match &self.args {
            Some(args) => self.f.eval_with_args(x, args, fx),
            None => self.f.eval(x, fx),
        }
    }
}

/// A system defined by a closure.
///
/// The closure receives the variables and the extra arguments (`None` when
/// evaluated without them) and returns the residuals.
///
/// ```rust
/// use broyden::nalgebra::{dvector, DVector};
/// use broyden::FnSystem;
///
/// let f = FnSystem::new(2, |x: &DVector<f64>, args: Option<&[f64]>| {
///     let r = args.map_or(1.0, |args| args[0]);
///     dvector![x[0].powi(2) + x[1].powi(2) - r * r, x[0] - x[1]]
/// });
/// ```
pub struct FnSystem<T, E> {
    dim: usize,
    func: E,
    _phantom: PhantomData<T>,
}

impl<T, E> FnSystem<T, E>
where
    T: RealField + Copy,
    E: Fn(&DVector<T>, Option<&[T]>) -> DVector<T>,
{
    /// Wraps the closure into a system of given dimension.
    pub fn new(dim: usize, func: E) -> Self {
        assert!(dim > 0, "empty system");

        Self {
            dim,
            func,
            _phantom: PhantomData,
        }
    }

    fn call<Sx, Sfx>(
        &self,
        x: &Vector<T, Dyn, Sx>,
        args: Option<&[T]>,
        fx: &mut Vector<T, Dyn, Sfx>,
    ) -> Result<(), ProblemError>
    where
        Sx: Storage<T, Dyn> + IsContiguous,
        Sfx: StorageMut<T, Dyn>,
    {
        let rx = (self.func)(&x.clone_owned(), args);

        if rx.len() != fx.len() {
            return Err(ProblemError::InvalidDimensionality {
                expected: fx.len(),
                actual: rx.len(),
            });
        }

        fx.copy_from(&rx);
        Ok(())
    }
}

impl<T, E> Problem for FnSystem<T, E>
where
    T: RealField + Copy,
    E: Fn(&DVector<T>, Option<&[T]>) -> DVector<T>,
{
    type Field = T;

    fn dim(&self) -> usize {
        self.dim
    }
}

impl<T, E> System for FnSystem<T, E>
where
    T: RealField + Copy,
    E: Fn(&DVector<T>, Option<&[T]>) -> DVector<T>,
{
    fn eval<Sx, Sfx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        fx: &mut Vector<Self::Field, Dyn, Sfx>,
    ) -> Result<(), ProblemError>
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sfx: StorageMut<Self::Field, Dyn>,
    {
        self.call(x, None, fx)
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
        self.call(x, Some(args), fx)
    }
}
