//! Error types for the dynamics world.

use thiserror::Error;
use tumble_collide::CollideError;
use tumble_math::LinalgError;

use crate::body::BodyId;

/// Errors reported by the world API and the stepper.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhysicsError {
    /// A body without mass properties was stepped.
    #[error("Body {0:?} has no mass assigned")]
    MissingMass(BodyId),

    /// Mass properties are not physically valid.
    #[error("Invalid mass: {0}")]
    InvalidMass(String),

    /// Body handle does not refer to a live body.
    #[error("Body handle is stale or was never issued")]
    StaleBody,

    /// Geom handle does not refer to a live geom.
    #[error("Geom handle is stale or was never issued")]
    StaleGeom,

    /// Joint handle does not refer to a live joint.
    #[error("Joint handle is stale or was never issued")]
    StaleJoint,

    /// Both ends of a joint are the same body.
    #[error("Joint attaches a body to itself")]
    SelfAttachment,

    /// Invalid joint configuration.
    #[error("Invalid joint configuration: {0}")]
    InvalidJoint(String),

    /// Invalid world or body configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Step size is not a positive finite number.
    #[error("Invalid timestep: {0}")]
    InvalidTimestep(f64),

    /// Snapshot could not be encoded, decoded or applied.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Shape construction failed.
    #[error("Shape error: {0}")]
    Shape(#[from] CollideError),

    /// Linear algebra failure surfaced at the API boundary.
    #[error("Linear algebra error: {0}")]
    Linalg(#[from] LinalgError),
}

/// Result type for dynamics operations.
pub type Result<T> = std::result::Result<T, PhysicsError>;
