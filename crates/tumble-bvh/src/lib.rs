#![warn(missing_docs)]

//! Bounding volumes for the tumble physics engine.
//!
//! [`Aabb`] is the world-space box every geom reports, and [`AabbTree`] is
//! the bounding-volume tree used both by the broad phase (one tree over all
//! finite geoms) and by triangle meshes (one tree over triangles).

pub mod aabb;
pub mod error;
pub mod tree;

pub use aabb::Aabb;
pub use error::{BvhError, Result};
pub use tree::{AabbTree, Node, NodeKind, SplitStrategy, TreeConfig};
