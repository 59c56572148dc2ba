//! Error types for tree construction and refit.

use thiserror::Error;

/// Errors that can occur while building or refitting a tree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BvhError {
    /// No primitives were supplied.
    #[error("cannot build a tree over zero primitives")]
    Empty,

    /// A primitive bound is NaN or infinite.
    #[error("primitive {index} has non-finite bounds")]
    NonFiniteBounds {
        /// Index of the offending primitive.
        index: usize,
    },

    /// Refit received a different number of primitives than the tree was built with.
    #[error("expected {expected} primitive bounds, got {actual}")]
    PrimitiveCountMismatch {
        /// Primitive count at build time.
        expected: usize,
        /// Primitive count supplied.
        actual: usize,
    },

    /// Leaf size must be at least one.
    #[error("leaf size must be at least 1")]
    InvalidLeafSize,
}

/// Result type for tree operations.
pub type Result<T> = std::result::Result<T, BvhError>;
