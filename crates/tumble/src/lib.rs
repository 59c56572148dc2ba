#![warn(missing_docs)]

//! tumble: rigid-body physics in Rust.
//!
//! Facade over the engine crates. Most programs only need the types
//! re-exported at the crate root; the sub-crates are available for the
//! math kernel, the bounding-volume tree and the raw narrow phase.
//!
//! # Example
//!
//! ```
//! use tumble::{Mass, Point3, Pose, Shape, Vec3, World, WorldConfig};
//!
//! let mut world = World::with_config(WorldConfig::default()).unwrap();
//! world.add_static_geom(Shape::plane(Vec3::z(), 0.0).unwrap(), Pose::identity()).unwrap();
//!
//! let crate_box = world.add_body(Point3::new(0.0, 0.0, 2.0)).unwrap();
//! world.set_body_mass(crate_box, Mass::box_total(5.0, 1.0, 1.0, 1.0)).unwrap();
//! world.add_geom(crate_box, Shape::cuboid(1.0, 1.0, 1.0).unwrap(), Pose::identity()).unwrap();
//!
//! for _ in 0..300 {
//!     world.step_default().unwrap();
//! }
//! let z = world.body(crate_box).unwrap().position().z;
//! assert!((z - 0.5).abs() < 0.01);
//! ```

pub use tumble_bvh;
pub use tumble_collide;
pub use tumble_dynamics;
pub use tumble_math;

pub use tumble_collide::{ContactGeom, Ray, RayHit, Shape, TriMesh};
pub use tumble_dynamics::{
    AxisFrame, Body, BodyId, Bounce, Contact, Geom, GeomHit, GeomId, Joint, JointFeedback, JointId,
    JointKind, JointParam, PhysicsError, Result, RotationMode, SolverMethod, SolverPath, StepStats,
    SurfaceParams, World, WorldConfig, WorldSnapshot,
};
pub use tumble_math::{Mass, Point3, Pose, Quat, Vec3};
