#![warn(missing_docs)]

//! Rigid-body dynamics for the tumble physics engine.
//!
//! A [`World`] owns bodies, collision geoms and joints in generation-checked
//! arenas. Each [`World::step`] finds contacts, turns joints and contacts
//! into [`ConstraintRow`]s, solves them together and integrates the bodies.
//!
//! # Features
//!
//! - Ball, hinge, slider, fixed and universal joints, plus angular and
//!   linear motors with stops
//! - Coulomb friction, restitution and contact softness per surface
//! - Direct, regularized, active-set and projected Gauss-Seidel solves
//! - Auto-disable of idle bodies, joint force feedback, state snapshots
//!
//! # Example
//!
//! ```
//! use tumble_collide::Shape;
//! use tumble_dynamics::World;
//! use tumble_math::{Mass, Point3, Pose, Vec3};
//!
//! let mut world = World::new();
//! world.add_static_geom(Shape::plane(Vec3::z(), 0.0).unwrap(), Pose::identity()).unwrap();
//!
//! let ball = world.add_body(Point3::new(0.0, 0.0, 1.0)).unwrap();
//! world.set_body_mass(ball, Mass::sphere_total(1.0, 0.25)).unwrap();
//! world.add_geom(ball, Shape::sphere(0.25).unwrap(), Pose::identity()).unwrap();
//!
//! for _ in 0..200 {
//!     world.step(0.01).unwrap();
//! }
//! let z = world.body(ball).unwrap().position().z;
//! assert!((z - 0.25).abs() < 0.01);
//! ```

mod body;
mod broad;
mod config;
mod contact;
mod error;
mod geom;
pub mod joint;
pub mod row;
mod snapshot;
pub mod solver;
mod stepper;
mod surface;
mod world;

pub use body::{Body, BodyId, RotationMode};
pub use config::{AutoDisableConfig, ContactConfig, SolverConfig, SolverMethod, WorldConfig};
pub use contact::Contact;
pub use error::{PhysicsError, Result};
pub use geom::{Geom, GeomId};
pub use joint::{
    AngularMotor, AxisFrame, BallJoint, FixedJoint, HingeJoint, Joint, JointFeedback, JointId, JointKind,
    JointParam, LimitMotor, LimitState, LinearMotor, MotorAxis, SliderJoint, UniversalJoint, MAX_MOTOR_AXES,
};
pub use row::ConstraintRow;
pub use snapshot::{BodySnapshot, WorldSnapshot};
pub use solver::{SolverPath, Solution};
pub use stepper::{StepStats, StepTimings};
pub use surface::{Bounce, SurfaceParams};
pub use world::{ErrorHook, GeomHit, World};
