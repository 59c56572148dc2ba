#![warn(missing_docs)]

//! Collision geometry and narrow phase for the tumble physics engine.
//!
//! Shapes are placed in the world by a [`Pose`](tumble_math::Pose). The
//! [`collide`] entry point turns a pair of placed shapes into
//! [`ContactGeom`]s whose normals point from the first shape into the
//! second; [`cast_ray`] finds the first surface along a ray.
//!
//! # Example
//!
//! ```
//! use tumble_collide::{collide, Shape};
//! use tumble_math::{Pose, Vec3};
//!
//! let ball = Shape::sphere(0.5).unwrap();
//! let ground = Shape::plane(Vec3::z(), 0.0).unwrap();
//! let mut contacts = Vec::new();
//! let n = collide(&ball, &Pose::translation(0.0, 0.0, 0.4), &ground, &Pose::identity(), 4, &mut contacts);
//! assert_eq!(n, 1);
//! assert!((contacts[0].depth - 0.1).abs() < 1e-12);
//! ```

pub mod contact;
pub mod error;
pub mod mesh;
pub mod narrow;
pub mod ray;
pub mod shape;

pub use contact::{reduce_contacts, ContactGeom, ContactLimits};
pub use error::{CollideError, Result};
pub use mesh::{TriMesh, Triangle};
pub use narrow::{collide, collide_reusing, collide_with, NarrowScratch};
pub use ray::{cast_ray, Ray, RayHit};
pub use shape::{Capsule, Cuboid, Plane, Shape, ShapeKind, Sphere};
