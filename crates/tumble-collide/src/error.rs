//! Error types for shape construction.

use thiserror::Error;
use tumble_bvh::BvhError;

/// Errors that can occur while building collision shapes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollideError {
    /// Shape dimensions are zero, negative or not finite.
    #[error("degenerate shape: {0}")]
    DegenerateShape(String),

    /// Mesh buffers are empty or reference missing vertices.
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    /// Building or refitting the mesh tree failed.
    #[error("mesh tree error: {0}")]
    Tree(#[from] BvhError),
}

/// Result type for shape operations.
pub type Result<T> = std::result::Result<T, CollideError>;
