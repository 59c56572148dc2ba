//! Error types for the linear algebra kernel.

use thiserror::Error;

/// Errors reported by dense matrix and factorization routines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinalgError {
    /// Operand shapes are incompatible for the requested operation.
    #[error("dimension mismatch in {op}: {lhs:?} vs {rhs:?}")]
    DimensionMismatch {
        /// Operation that was attempted.
        op: &'static str,
        /// Shape `(rows, cols)` of the left operand.
        lhs: (usize, usize),
        /// Shape `(rows, cols)` of the right operand.
        rhs: (usize, usize),
    },

    /// A factorization met a non-positive pivot.
    #[error("matrix is not positive definite (pivot {pivot} = {value:e})")]
    NotPositiveDefinite {
        /// Row of the failing pivot.
        pivot: usize,
        /// Value of the pivot.
        value: f64,
    },

    /// An incremental factorization ran out of preallocated rows.
    #[error("factorization capacity {capacity} exceeded")]
    CapacityExceeded {
        /// Maximum number of rows the buffer was sized for.
        capacity: usize,
    },

    /// Row index outside the current factorization.
    #[error("index {index} out of range for size {len}")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Current size.
        len: usize,
    },

    /// Mass parameters are not physically valid.
    #[error("invalid mass: {0}")]
    InvalidMass(String),
}

/// Result type for linear algebra operations.
pub type Result<T> = std::result::Result<T, LinalgError>;
