use nalgebra::RealField;
use thiserror::Error;

/// The base trait for [`System`](super::system::System).
pub trait Problem {
    /// Type of the field, usually f64 or f32.
    type Field: RealField + Copy;

    /// Return the dimension of the problem, that is, the number of variables
    /// and the number of equations.
    fn dim(&self) -> usize;
}

/// Error encountered while evaluating the system.
#[derive(Debug, Error)]
pub enum ProblemError {
    /// The number of residuals does not match the dimensionality
    /// ([`Problem::dim`]) of the problem.
    #[error("invalid dimensionality (expected {expected}, got {actual})")]
    InvalidDimensionality {
        /// Expected number of elements.
        expected: usize,
        /// Actual number of elements.
        actual: usize,
    },
    /// Extra arguments were passed to a system that does not accept them.
    #[error("system does not accept extra arguments")]
    UnsupportedArgs,
    /// An invalid value (NaN, positive or negative infinity) of a residual
    /// occurred.
    #[error("invalid value encountered")]
    InvalidValue,
    /// A custom error specific to the system.
    #[error("{0}")]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}
