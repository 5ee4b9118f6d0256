//! Error types for gradtrace.

use thiserror::Error;

/// Result type alias using gradtrace's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while evaluating or differentiating a function.
///
/// Contract violations (a declared arity of zero, a function body returning
/// the wrong number of outputs, or combining operands from different tapes)
/// are programming errors and panic instead of returning a variant here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A mathematically invalid argument for an elementary function,
    /// e.g. the logarithm of a non-positive number.
    #[error("argument {arg} is outside the domain of '{op}'")]
    Domain {
        /// Name of the offending elementary function.
        op: &'static str,
        /// The rejected argument value.
        arg: f64,
    },

    /// A point or direction whose length does not match the function's
    /// declared number of inputs.
    #[error("dimension mismatch: expected {expected} coordinate(s), got {got}")]
    DimensionMismatch {
        /// The declared number of inputs.
        expected: usize,
        /// The number of coordinates actually supplied.
        got: usize,
    },
}
