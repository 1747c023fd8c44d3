use std::time::Duration;

use thiserror::Error;

macro_rules! shape_error {
    ($msg:expr) => {
        crate::Error::Shape($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Shape(format!($fmt, $($arg)*))
    };
}

macro_rules! op_error {
    ($msg:expr) => {
        crate::Error::Operation($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Operation(format!($fmt, $($arg)*))
    };
}

macro_rules! value_error {
    ($msg:expr) => {
        crate::Error::Value($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Value(format!($fmt, $($arg)*))
    };
}

macro_rules! unsupported {
    ($backend:expr, $msg:expr) => {
        crate::Error::Unsupported {
            backend: $backend,
            reason: $msg.to_string(),
        }
    };
    ($backend:expr, $fmt:expr, $($arg:tt)*) => {
        crate::Error::Unsupported {
            backend: $backend,
            reason: format!($fmt, $($arg)*),
        }
    };
}

/// The error type for every fallible operation in this crate.
///
/// # Error Categories
///
/// ## Construction Errors
/// - [`Error::Shape`] - bit-length or sort mismatch between operands
/// - [`Error::Value`] - malformed literal (width out of range, byte length mismatch)
/// - [`Error::Operation`] - an operation that is not defined for the given node
///
/// ## Solving Errors
/// - [`Error::Unsupported`] - a backend cannot represent the query; try the next one
/// - [`Error::Timeout`] - the query ran out of time before an answer was found
/// - [`Error::Unsat`] - the constraint set has no model
/// - [`Error::Lock`] - a shared registry lock was poisoned
///
/// `Shape`, `Value` and `Operation` are fatal to the operation that raised them.
/// `Unsupported` and `Timeout` are recoverable, and `Timeout` is never reported as `Unsat`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Operands disagree on bit-length or sort, or an operation received the wrong arity.
    #[error("Shape mismatch: {0}")]
    Shape(String),

    /// The operation is not defined for its input.
    ///
    /// Truth-testing an expression natively (instead of asking a backend) ends up here.
    #[error("Invalid operation: {0}")]
    Operation(String),

    /// The backend cannot represent or decide the given expression.
    ///
    /// Callers walking a list of backends treat this as "try the next one".
    ///
    /// # Fields
    ///
    /// * `backend` - Name of the backend that gave up
    /// * `reason` - Human readable explanation
    #[error("Backend {backend} cannot handle this: {reason}")]
    Unsupported {
        /// Name of the backend that raised the error
        backend: &'static str,
        /// Why the backend gave up
        reason: String,
    },

    /// The query exceeded its time budget.
    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    /// A literal could not be constructed from the given value.
    #[error("Invalid value: {0}")]
    Value(String),

    /// The constraints have no satisfying assignment.
    #[error("Constraints are unsatisfiable")]
    Unsat,

    /// Failed to lock a shared resource.
    #[error("Failed to lock {0}")]
    Lock(&'static str),
}

/// A specialized [`Result`](std::result::Result) type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns true if another backend may still be able to answer.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Unsupported { .. })
    }
}
