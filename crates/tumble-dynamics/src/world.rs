//! The simulation world: arenas of bodies, geoms and joints, the stepper
//! and the error hook.
//!
//! Handles are generation-checked: once a body, geom or joint is removed its
//! handle stops resolving, and every API call taking it returns the matching
//! `Stale*` error.

use std::fmt;

use slotmap::SlotMap;
use tracing::{debug, info};
use tumble_collide::{cast_ray, CollideError, Ray, RayHit, Shape};
use tumble_math::{is_finite_pose, is_finite_vec, Mass, Point3, Pose, Quat, Vec3};

use crate::body::{Body, BodyId, RotationMode};
use crate::config::WorldConfig;
use crate::contact::Contact;
use crate::error::{PhysicsError, Result};
use crate::geom::{Geom, GeomId};
use crate::joint::frame::JointBodies;
use crate::joint::{
    AngularMotor, AxisFrame, BallJoint, FixedJoint, HingeJoint, Joint, JointFeedback, JointId, JointKind,
    JointParam, LinearMotor, MotorAxis, SliderJoint, UniversalJoint, MAX_MOTOR_AXES,
};
use crate::stepper::{StepStats, Stepper};
use crate::surface::SurfaceParams;

/// Callback receiving every error the world reports.
pub type ErrorHook = Box<dyn FnMut(&PhysicsError) + Send>;

/// Arenas plus creation order, which fixes iteration order everywhere.
#[derive(Debug, Clone, Default)]
pub(crate) struct Store {
    pub bodies: SlotMap<BodyId, Body>,
    pub geoms: SlotMap<GeomId, Geom>,
    pub joints: SlotMap<JointId, Joint>,
    pub body_order: Vec<BodyId>,
    pub geom_order: Vec<GeomId>,
    pub joint_order: Vec<JointId>,
}

/// Closest geom along a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeomHit {
    /// Geom hit.
    pub geom: GeomId,
    /// Point, normal and distance.
    pub hit: RayHit,
}

/// A rigid-body world.
///
/// A world is single-threaded: [`step`](World::step) runs the whole
/// pipeline and returns with every body advanced. Independent worlds share
/// nothing and may run on different threads.
pub struct World {
    pub(crate) store: Store,
    config: WorldConfig,
    stepper: Stepper,
    error_hook: Option<ErrorHook>,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("bodies", &self.store.bodies.len())
            .field("geoms", &self.store.geoms.len())
            .field("joints", &self.store.joints.len())
            .field("config", &self.config)
            .field("error_hook", &self.error_hook.is_some())
            .finish()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Empty world with the default configuration.
    pub fn new() -> Self {
        Self {
            store: Store::default(),
            config: WorldConfig::default(),
            stepper: Stepper::default(),
            error_hook: None,
        }
    }

    /// Empty world with `config`.
    pub fn with_config(config: WorldConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    /// Current configuration.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Replace the configuration. Takes effect at the next step.
    pub fn set_config(&mut self, config: WorldConfig) -> Result<()> {
        if let Err(e) = config.validate() {
            return Err(self.fail(e));
        }
        self.config = config;
        Ok(())
    }

    /// Set gravity.
    pub fn set_gravity(&mut self, gravity: Vec3) -> Result<()> {
        let config = self.config.with_gravity(gravity);
        self.set_config(config)
    }

    /// Install a callback that sees every error before it is returned.
    pub fn set_error_hook(&mut self, hook: ErrorHook) {
        self.error_hook = Some(hook);
    }

    /// Remove the error callback.
    pub fn clear_error_hook(&mut self) {
        self.error_hook = None;
    }

    /// Pass `e` to the hook and hand it back for returning.
    fn fail(&mut self, e: PhysicsError) -> PhysicsError {
        if let Some(hook) = self.error_hook.as_mut() {
            hook(&e);
        }
        e
    }

    // ---- stepping -------------------------------------------------------

    /// Advance the world by `dt` seconds.
    pub fn step(&mut self, dt: f64) -> Result<()> {
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(self.fail(PhysicsError::InvalidTimestep(dt)));
        }
        let config = self.config;
        match self.stepper.step(&mut self.store, &config, dt) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Advance the world by the configured timestep.
    pub fn step_default(&mut self) -> Result<()> {
        self.step(self.config.timestep)
    }

    /// Contacts generated by the last step.
    pub fn contacts(&self) -> &[Contact] {
        self.stepper.contacts()
    }

    /// Statistics of the last step.
    pub fn last_step_stats(&self) -> &StepStats {
        self.stepper.stats()
    }

    /// Total kinetic energy of all bodies.
    pub fn kinetic_energy(&self) -> f64 {
        self.bodies().map(|(_, b)| b.kinetic_energy()).sum()
    }

    // ---- bodies ---------------------------------------------------------

    /// Create a body at rest at `position`. It needs a mass before the
    /// next step.
    pub fn add_body(&mut self, position: Point3) -> Result<BodyId> {
        if !is_finite_vec(&position.coords) {
            return Err(self.fail(PhysicsError::InvalidConfig("body position must be finite".into())));
        }
        let id = self.store.bodies.insert(Body::new(position));
        self.store.body_order.push(id);
        debug!(body = ?id, "body added");
        Ok(id)
    }

    /// Remove a body. Its geoms stay in the world as static geoms at their
    /// current pose. Joints attached to it must be removed by the caller;
    /// until then they are skipped.
    pub fn remove_body(&mut self, id: BodyId) -> Result<()> {
        let Some(body) = self.store.bodies.remove(id) else {
            return Err(self.fail(PhysicsError::StaleBody));
        };
        self.store.body_order.retain(|&b| b != id);
        for geom in self.store.geoms.values_mut() {
            if geom.body == Some(id) {
                geom.offset = geom.world_pose(Some(&body));
                geom.body = None;
            }
        }
        Ok(())
    }

    /// Look up a body.
    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.store.bodies.get(id)
    }

    /// Bodies in creation order.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyId, &Body)> + '_ {
        self.store
            .body_order
            .iter()
            .filter_map(|&id| self.store.bodies.get(id).map(|b| (id, b)))
    }

    /// Number of bodies.
    pub fn body_count(&self) -> usize {
        self.store.bodies.len()
    }

    fn body_mut(&mut self, id: BodyId) -> Result<&mut Body> {
        if !self.store.bodies.contains_key(id) {
            return Err(self.fail(PhysicsError::StaleBody));
        }
        self.store.bodies.get_mut(id).ok_or(PhysicsError::StaleBody)
    }

    fn finite(&mut self, v: &Vec3, what: &str) -> Result<()> {
        if is_finite_vec(v) {
            Ok(())
        } else {
            Err(self.fail(PhysicsError::InvalidConfig(format!("{what} must be finite"))))
        }
    }

    /// Assign mass properties about the body's centre of mass.
    pub fn set_body_mass(&mut self, id: BodyId, mass: Mass) -> Result<()> {
        if let Err(e) = mass.check() {
            return Err(self.fail(PhysicsError::InvalidMass(e.to_string())));
        }
        self.body_mut(id)?.set_mass(mass);
        Ok(())
    }

    /// Move a body.
    pub fn set_position(&mut self, id: BodyId, position: Point3) -> Result<()> {
        self.finite(&position.coords, "position")?;
        self.body_mut(id)?.position = position;
        Ok(())
    }

    /// Set a body's orientation.
    pub fn set_orientation(&mut self, id: BodyId, orientation: Quat) -> Result<()> {
        if !orientation.coords.iter().all(|c| c.is_finite()) {
            return Err(self.fail(PhysicsError::InvalidConfig("orientation must be finite".into())));
        }
        self.body_mut(id)?.orientation = orientation;
        Ok(())
    }

    /// Set linear velocity. Wakes the body.
    pub fn set_linear_velocity(&mut self, id: BodyId, v: Vec3) -> Result<()> {
        self.finite(&v, "linear velocity")?;
        let body = self.body_mut(id)?;
        body.linear_velocity = v;
        body.wake();
        Ok(())
    }

    /// Set angular velocity. Wakes the body.
    pub fn set_angular_velocity(&mut self, id: BodyId, w: Vec3) -> Result<()> {
        self.finite(&w, "angular velocity")?;
        let body = self.body_mut(id)?;
        body.angular_velocity = w;
        body.wake();
        Ok(())
    }

    /// Let a body be stepped again.
    pub fn enable_body(&mut self, id: BodyId) -> Result<()> {
        self.body_mut(id)?.wake();
        Ok(())
    }

    /// Stop stepping a body. It stays in place and acts as static until a
    /// moving body touches it or it is enabled again.
    pub fn disable_body(&mut self, id: BodyId) -> Result<()> {
        self.body_mut(id)?.enabled = false;
        Ok(())
    }

    /// Whether world gravity acts on the body.
    pub fn set_gravity_enabled(&mut self, id: BodyId, enabled: bool) -> Result<()> {
        self.body_mut(id)?.gravity_enabled = enabled;
        Ok(())
    }

    /// Set linear and angular damping rates (1/s).
    pub fn set_damping(&mut self, id: BodyId, linear: f64, angular: f64) -> Result<()> {
        if !(linear >= 0.0 && angular >= 0.0) || !linear.is_finite() || !angular.is_finite() {
            return Err(self.fail(PhysicsError::InvalidConfig(
                "damping must be non-negative and finite".into(),
            )));
        }
        let body = self.body_mut(id)?;
        body.linear_damping = linear;
        body.angular_damping = angular;
        Ok(())
    }

    /// Choose how orientation is integrated.
    pub fn set_rotation_mode(&mut self, id: BodyId, mode: RotationMode) -> Result<()> {
        self.body_mut(id)?.rotation_mode = mode;
        Ok(())
    }

    /// Whether the body may be put to sleep when auto-disable is on.
    pub fn set_auto_disable(&mut self, id: BodyId, allowed: bool) -> Result<()> {
        let body = self.body_mut(id)?;
        body.auto_disable = allowed;
        body.idle_steps = 0;
        Ok(())
    }

    // ---- forces ---------------------------------------------------------
    //
    // Forces accumulate until the end of the next step and wake the body.
    // "rel" arguments are in the body frame, the others in the world frame.

    fn apply(&mut self, id: BodyId, f: impl FnOnce(&mut Body)) -> Result<()> {
        let body = self.body_mut(id)?;
        f(body);
        body.wake();
        Ok(())
    }

    /// Add a force at the centre of mass.
    pub fn add_force(&mut self, id: BodyId, f: Vec3) -> Result<()> {
        self.finite(&f, "force")?;
        self.apply(id, |b| b.force += f)
    }

    /// Add a torque.
    pub fn add_torque(&mut self, id: BodyId, t: Vec3) -> Result<()> {
        self.finite(&t, "torque")?;
        self.apply(id, |b| b.torque += t)
    }

    /// Add a body-frame force at the centre of mass.
    pub fn add_rel_force(&mut self, id: BodyId, f: Vec3) -> Result<()> {
        self.finite(&f, "force")?;
        self.apply(id, |b| b.force += b.orientation * f)
    }

    /// Add a body-frame torque.
    pub fn add_rel_torque(&mut self, id: BodyId, t: Vec3) -> Result<()> {
        self.finite(&t, "torque")?;
        self.apply(id, |b| b.torque += b.orientation * t)
    }

    /// Add a force at a world point.
    pub fn add_force_at_pos(&mut self, id: BodyId, f: Vec3, p: Point3) -> Result<()> {
        self.finite(&f, "force")?;
        self.finite(&p.coords, "point")?;
        self.apply(id, |b| b.add_force_at(f, p))
    }

    /// Add a force at a body-frame point.
    pub fn add_force_at_rel_pos(&mut self, id: BodyId, f: Vec3, p: Point3) -> Result<()> {
        self.finite(&f, "force")?;
        self.finite(&p.coords, "point")?;
        self.apply(id, |b| {
            let at = b.body_point_to_world(&p);
            b.add_force_at(f, at);
        })
    }

    /// Add a body-frame force at a world point.
    pub fn add_rel_force_at_pos(&mut self, id: BodyId, f: Vec3, p: Point3) -> Result<()> {
        self.finite(&f, "force")?;
        self.finite(&p.coords, "point")?;
        self.apply(id, |b| {
            let fw = b.orientation * f;
            b.add_force_at(fw, p);
        })
    }

    /// Add a body-frame force at a body-frame point.
    pub fn add_rel_force_at_rel_pos(&mut self, id: BodyId, f: Vec3, p: Point3) -> Result<()> {
        self.finite(&f, "force")?;
        self.finite(&p.coords, "point")?;
        self.apply(id, |b| {
            let fw = b.orientation * f;
            let at = b.body_point_to_world(&p);
            b.add_force_at(fw, at);
        })
    }

    /// Overwrite the accumulated force.
    pub fn set_force(&mut self, id: BodyId, f: Vec3) -> Result<()> {
        self.finite(&f, "force")?;
        self.apply(id, |b| b.force = f)
    }

    /// Overwrite the accumulated torque.
    pub fn set_torque(&mut self, id: BodyId, t: Vec3) -> Result<()> {
        self.finite(&t, "torque")?;
        self.apply(id, |b| b.torque = t)
    }

    // ---- geoms ----------------------------------------------------------

    /// Attach a shape to a body at `offset` from the body frame.
    pub fn add_geom(&mut self, body: BodyId, shape: Shape, offset: Pose) -> Result<GeomId> {
        if !self.store.bodies.contains_key(body) {
            return Err(self.fail(PhysicsError::StaleBody));
        }
        self.insert_geom(Geom::new(shape, Some(body), offset))
    }

    /// Place a shape in the world, attached to no body.
    pub fn add_static_geom(&mut self, shape: Shape, pose: Pose) -> Result<GeomId> {
        self.insert_geom(Geom::new(shape, None, pose))
    }

    fn insert_geom(&mut self, geom: Geom) -> Result<GeomId> {
        if geom.shape.is_degenerate() {
            return Err(self.fail(PhysicsError::Shape(CollideError::DegenerateShape(format!(
                "{:?} has a zero or non-finite dimension",
                geom.shape.kind()
            )))));
        }
        if !is_finite_pose(&geom.offset) {
            return Err(self.fail(PhysicsError::InvalidConfig("geom pose must be finite".into())));
        }
        let id = self.store.geoms.insert(geom);
        self.store.geom_order.push(id);
        Ok(id)
    }

    /// Remove a geom.
    pub fn remove_geom(&mut self, id: GeomId) -> Result<()> {
        if self.store.geoms.remove(id).is_none() {
            return Err(self.fail(PhysicsError::StaleGeom));
        }
        self.store.geom_order.retain(|&g| g != id);
        Ok(())
    }

    /// Look up a geom.
    pub fn geom(&self, id: GeomId) -> Option<&Geom> {
        self.store.geoms.get(id)
    }

    /// Geoms in creation order.
    pub fn geoms(&self) -> impl Iterator<Item = (GeomId, &Geom)> + '_ {
        self.store
            .geom_order
            .iter()
            .filter_map(|&id| self.store.geoms.get(id).map(|g| (id, g)))
    }

    /// World pose of a geom.
    pub fn geom_pose(&self, id: GeomId) -> Option<Pose> {
        let geom = self.store.geoms.get(id)?;
        let body = geom.body.and_then(|b| self.store.bodies.get(b));
        Some(geom.world_pose(body))
    }

    fn geom_mut(&mut self, id: GeomId) -> Result<&mut Geom> {
        if !self.store.geoms.contains_key(id) {
            return Err(self.fail(PhysicsError::StaleGeom));
        }
        self.store.geoms.get_mut(id).ok_or(PhysicsError::StaleGeom)
    }

    /// Include or exclude a geom from collision.
    pub fn set_geom_enabled(&mut self, id: GeomId, enabled: bool) -> Result<()> {
        self.geom_mut(id)?.enabled = enabled;
        Ok(())
    }

    /// Set collision bit masks. Two geoms are tested when either one's
    /// category meets the other's collide mask.
    pub fn set_geom_masks(&mut self, id: GeomId, category: u32, collide: u32) -> Result<()> {
        let geom = self.geom_mut(id)?;
        geom.category = category;
        geom.collide = collide;
        Ok(())
    }

    /// Override the surface of a geom; `None` uses the world default.
    pub fn set_geom_surface(&mut self, id: GeomId, surface: Option<SurfaceParams>) -> Result<()> {
        if let Some(Err(msg)) = surface.as_ref().map(SurfaceParams::validate) {
            return Err(self.fail(PhysicsError::InvalidConfig(msg)));
        }
        self.geom_mut(id)?.surface = surface;
        Ok(())
    }

    /// Set the offset from the body frame (or the world pose of a static geom).
    pub fn set_geom_offset(&mut self, id: GeomId, offset: Pose) -> Result<()> {
        if !is_finite_pose(&offset) {
            return Err(self.fail(PhysicsError::InvalidConfig("geom pose must be finite".into())));
        }
        self.geom_mut(id)?.offset = offset;
        Ok(())
    }

    /// First enabled geom hit by a ray within `max_len`. Ties keep the
    /// older geom.
    pub fn cast_ray(&self, origin: Point3, direction: Vec3, max_len: f64) -> Option<GeomHit> {
        let ray = Ray::new(origin, direction)?;
        let mut best: Option<GeomHit> = None;
        for (id, geom) in self.geoms() {
            if !geom.enabled {
                continue;
            }
            let body = geom.body.and_then(|b| self.store.bodies.get(b));
            let limit = best.map_or(max_len, |b| b.hit.distance);
            if let Some(hit) = cast_ray(&geom.shape, &geom.world_pose(body), &ray, limit) {
                if best.map_or(true, |b| hit.distance < b.hit.distance) {
                    best = Some(GeomHit { geom: id, hit });
                }
            }
        }
        best
    }

    // ---- joints ---------------------------------------------------------

    /// Both ends of a prospective joint, checked.
    fn attach(&mut self, body1: BodyId, body2: Option<BodyId>) -> Result<JointBodies> {
        if Some(body1) == body2 {
            return Err(self.fail(PhysicsError::SelfAttachment));
        }
        match self.frame(body1, body2) {
            Some(jb) => Ok(jb),
            None => Err(self.fail(PhysicsError::StaleBody)),
        }
    }

    fn frame(&self, body1: BodyId, body2: Option<BodyId>) -> Option<JointBodies> {
        let b1 = self.store.bodies.get(body1)?;
        let b2 = match body2 {
            Some(id) => Some(self.store.bodies.get(id)?),
            None => None,
        };
        Some(JointBodies::new(b1, b2))
    }

    fn unit_axis(&mut self, axis: &Vec3) -> Result<Vec3> {
        match axis.try_normalize(1e-12) {
            Some(a) if is_finite_vec(&a) => Ok(a),
            _ => Err(self.fail(PhysicsError::InvalidJoint(format!("axis {axis:?} has no direction")))),
        }
    }

    fn insert_joint(&mut self, kind: JointKind, body1: BodyId, body2: Option<BodyId>) -> JointId {
        let name = kind.name();
        let id = self.store.joints.insert(Joint::new(kind, body1, body2));
        self.store.joint_order.push(id);
        debug!(joint = ?id, kind = name, "joint added");
        id
    }

    /// Ball-and-socket joint at a world anchor. `body2 = None` pins
    /// `body1` to the world.
    pub fn add_ball_joint(&mut self, body1: BodyId, body2: Option<BodyId>, anchor: Point3) -> Result<JointId> {
        self.finite(&anchor.coords, "anchor")?;
        let jb = self.attach(body1, body2)?;
        Ok(self.insert_joint(JointKind::Ball(BallJoint::new(&jb, &anchor)), body1, body2))
    }

    /// Hinge about a world axis through a world anchor. The current pose
    /// is angle zero.
    pub fn add_hinge_joint(
        &mut self,
        body1: BodyId,
        body2: Option<BodyId>,
        anchor: Point3,
        axis: Vec3,
    ) -> Result<JointId> {
        self.finite(&anchor.coords, "anchor")?;
        let axis = self.unit_axis(&axis)?;
        let jb = self.attach(body1, body2)?;
        Ok(self.insert_joint(JointKind::Hinge(HingeJoint::new(&jb, &anchor, &axis)), body1, body2))
    }

    /// Slider along a world axis. The current placement is position zero.
    pub fn add_slider_joint(&mut self, body1: BodyId, body2: Option<BodyId>, axis: Vec3) -> Result<JointId> {
        let axis = self.unit_axis(&axis)?;
        let jb = self.attach(body1, body2)?;
        Ok(self.insert_joint(JointKind::Slider(SliderJoint::new(&jb, &axis)), body1, body2))
    }

    /// Lock the current relative pose.
    pub fn add_fixed_joint(&mut self, body1: BodyId, body2: Option<BodyId>) -> Result<JointId> {
        let jb = self.attach(body1, body2)?;
        Ok(self.insert_joint(JointKind::Fixed(FixedJoint::new(&jb)), body1, body2))
    }

    /// Universal joint: `axis1` turns with body 1, `axis2` with body 2.
    /// `axis2` is made perpendicular to `axis1`.
    pub fn add_universal_joint(
        &mut self,
        body1: BodyId,
        body2: Option<BodyId>,
        anchor: Point3,
        axis1: Vec3,
        axis2: Vec3,
    ) -> Result<JointId> {
        self.finite(&anchor.coords, "anchor")?;
        let a1 = self.unit_axis(&axis1)?;
        let a2 = self.unit_axis(&axis2)?;
        let Some(a2) = (a2 - a1 * a1.dot(&a2)).try_normalize(1e-6) else {
            return Err(self.fail(PhysicsError::InvalidJoint("universal axes are parallel".into())));
        };
        let jb = self.attach(body1, body2)?;
        Ok(self.insert_joint(
            JointKind::Universal(UniversalJoint::new(&jb, &anchor, &a1, &a2)),
            body1,
            body2,
        ))
    }

    fn motor_axes(&mut self, jb: &JointBodies, axes: &[(AxisFrame, Vec3)]) -> Result<Vec<MotorAxis>> {
        if axes.is_empty() || axes.len() > MAX_MOTOR_AXES {
            return Err(self.fail(PhysicsError::InvalidJoint(format!(
                "motor needs 1 to {MAX_MOTOR_AXES} axes, got {}",
                axes.len()
            ))));
        }
        let mut out = Vec::with_capacity(axes.len());
        for (frame, axis) in axes {
            let axis = self.unit_axis(axis)?;
            out.push(MotorAxis::new(jb, *frame, &axis));
        }
        Ok(out)
    }

    /// Rotational motor over up to three world axes, each fixed in the
    /// given frame. Axes start with no motor and no stops.
    pub fn add_angular_motor(
        &mut self,
        body1: BodyId,
        body2: Option<BodyId>,
        axes: &[(AxisFrame, Vec3)],
    ) -> Result<JointId> {
        let jb = self.attach(body1, body2)?;
        let axes = self.motor_axes(&jb, axes)?;
        Ok(self.insert_joint(JointKind::AngularMotor(AngularMotor::new(axes)), body1, body2))
    }

    /// Translational motor over up to three world axes.
    pub fn add_linear_motor(
        &mut self,
        body1: BodyId,
        body2: Option<BodyId>,
        axes: &[(AxisFrame, Vec3)],
    ) -> Result<JointId> {
        let jb = self.attach(body1, body2)?;
        let axes = self.motor_axes(&jb, axes)?;
        Ok(self.insert_joint(JointKind::LinearMotor(LinearMotor::new(&jb, axes)), body1, body2))
    }

    /// Remove a joint.
    pub fn remove_joint(&mut self, id: JointId) -> Result<()> {
        if self.store.joints.remove(id).is_none() {
            return Err(self.fail(PhysicsError::StaleJoint));
        }
        self.store.joint_order.retain(|&j| j != id);
        Ok(())
    }

    /// Look up a joint.
    pub fn joint(&self, id: JointId) -> Option<&Joint> {
        self.store.joints.get(id)
    }

    /// Joints in creation order.
    pub fn joints(&self) -> impl Iterator<Item = (JointId, &Joint)> + '_ {
        self.store
            .joint_order
            .iter()
            .filter_map(|&id| self.store.joints.get(id).map(|j| (id, j)))
    }

    fn joint_mut(&mut self, id: JointId) -> Result<&mut Joint> {
        if !self.store.joints.contains_key(id) {
            return Err(self.fail(PhysicsError::StaleJoint));
        }
        self.store.joints.get_mut(id).ok_or(PhysicsError::StaleJoint)
    }

    /// Current frame of a joint's bodies, checked.
    fn joint_frame(&self, id: JointId) -> Result<(&Joint, JointBodies)> {
        let joint = self.store.joints.get(id).ok_or(PhysicsError::StaleJoint)?;
        let jb = self.frame(joint.body1, joint.body2).ok_or(PhysicsError::StaleBody)?;
        Ok((joint, jb))
    }

    /// Set a stop or motor parameter on axis `axis` of a joint.
    pub fn set_joint_param(&mut self, id: JointId, axis: usize, param: JointParam, value: f64) -> Result<()> {
        let joint = self.joint_mut(id)?;
        let name = joint.kind.name();
        let result = match joint.kind.limit_motor_mut(axis) {
            Some(limit) => limit.set_param(param, value),
            None => Err(format!("{name} joint has no axis {axis}")),
        };
        result.map_err(|msg| self.fail(PhysicsError::InvalidJoint(msg)))
    }

    /// Drive axis `axis` toward `velocity` with at most `fmax` force.
    /// `fmax = 0` turns the motor off.
    /// Both values are checked before either is applied.
    pub fn set_motor(&mut self, id: JointId, axis: usize, velocity: f64, fmax: f64) -> Result<()> {
        let joint = self.joint_mut(id)?;
        let name = joint.kind.name();
        let result = match joint.kind.limit_motor_mut(axis) {
            Some(limit) => {
                let mut staged = *limit;
                staged
                    .set_param(JointParam::Velocity, velocity)
                    .and_then(|()| staged.set_param(JointParam::FMax, fmax))
                    .map(|()| *limit = staged)
            }
            None => Err(format!("{name} joint has no axis {axis}")),
        };
        result.map_err(|msg| self.fail(PhysicsError::InvalidJoint(msg)))
    }

    /// Feed the current angle of an angular motor axis, used by its stops.
    pub fn set_amotor_angle(&mut self, id: JointId, axis: usize, angle: f64) -> Result<()> {
        if !angle.is_finite() {
            return Err(self.fail(PhysicsError::InvalidJoint("angle must be finite".into())));
        }
        let joint = self.joint_mut(id)?;
        let name = joint.kind.name();
        let set = match &mut joint.kind {
            JointKind::AngularMotor(m) if axis < m.angles.len() => {
                m.angles[axis] = angle;
                true
            }
            _ => false,
        };
        if !set {
            return Err(self.fail(PhysicsError::InvalidJoint(format!("{name} joint has no angle {axis}"))));
        }
        Ok(())
    }

    /// Override the error reduction and softness of a joint's rows. `None`
    /// uses the world values.
    pub fn set_joint_erp_cfm(&mut self, id: JointId, erp: Option<f64>, cfm: Option<f64>) -> Result<()> {
        if erp.is_some_and(|e| !(0.0..=1.0).contains(&e)) || cfm.is_some_and(|c| !(c >= 0.0) || !c.is_finite()) {
            return Err(self.fail(PhysicsError::InvalidJoint(
                "joint erp must be in [0, 1] and cfm non-negative".into(),
            )));
        }
        let joint = self.joint_mut(id)?;
        joint.erp = erp;
        joint.cfm = cfm;
        Ok(())
    }

    /// Record the constraint forces of a joint after each step.
    pub fn set_joint_feedback(&mut self, id: JointId, enabled: bool) -> Result<()> {
        let joint = self.joint_mut(id)?;
        joint.feedback = enabled.then(JointFeedback::default);
        Ok(())
    }

    /// Move the anchor of a ball, hinge or universal joint to a world point.
    pub fn set_joint_anchor(&mut self, id: JointId, anchor: Point3) -> Result<()> {
        self.finite(&anchor.coords, "anchor")?;
        let jb = match self.joint_frame(id) {
            Ok((_, jb)) => jb,
            Err(e) => return Err(self.fail(e)),
        };
        let joint = self.joint_mut(id)?;
        let name = joint.kind.name();
        let set = match &mut joint.kind {
            JointKind::Ball(j) => {
                *j = BallJoint::new(&jb, &anchor);
                true
            }
            JointKind::Hinge(j) => {
                j.set_anchor(&jb, &anchor);
                true
            }
            JointKind::Universal(j) => {
                j.set_anchor(&jb, &anchor);
                true
            }
            _ => false,
        };
        if !set {
            return Err(self.fail(PhysicsError::InvalidJoint(format!("{name} joint has no anchor"))));
        }
        Ok(())
    }

    /// Set the world axis of a hinge or slider. The current pose becomes
    /// coordinate zero.
    pub fn set_joint_axis(&mut self, id: JointId, axis: Vec3) -> Result<()> {
        let axis = self.unit_axis(&axis)?;
        let jb = match self.joint_frame(id) {
            Ok((_, jb)) => jb,
            Err(e) => return Err(self.fail(e)),
        };
        let joint = self.joint_mut(id)?;
        let name = joint.kind.name();
        let set = match &mut joint.kind {
            JointKind::Hinge(j) => {
                j.set_axis(&jb, &axis);
                true
            }
            JointKind::Slider(j) => {
                j.set_axis(&jb, &axis);
                true
            }
            _ => false,
        };
        if !set {
            return Err(self.fail(PhysicsError::InvalidJoint(format!("{name} joint has no single axis"))));
        }
        Ok(())
    }

    /// Hinge angle in radians, `(-pi, pi]`.
    pub fn hinge_angle(&self, id: JointId) -> Result<f64> {
        match self.joint_frame(id)? {
            (Joint { kind: JointKind::Hinge(h), .. }, jb) => Ok(h.angle(&jb)),
            (j, _) => Err(not_a(j, "hinge")),
        }
    }

    /// Hinge angular rate.
    pub fn hinge_angle_rate(&self, id: JointId) -> Result<f64> {
        match self.joint_frame(id)? {
            (Joint { kind: JointKind::Hinge(h), .. }, jb) => Ok(h.angle_rate(&jb)),
            (j, _) => Err(not_a(j, "hinge")),
        }
    }

    /// Slider displacement along its axis.
    pub fn slider_position(&self, id: JointId) -> Result<f64> {
        match self.joint_frame(id)? {
            (Joint { kind: JointKind::Slider(s), .. }, jb) => Ok(s.position(&jb)),
            (j, _) => Err(not_a(j, "slider")),
        }
    }

    /// Slider rate.
    pub fn slider_position_rate(&self, id: JointId) -> Result<f64> {
        match self.joint_frame(id)? {
            (Joint { kind: JointKind::Slider(s), .. }, jb) => Ok(s.position_rate(&jb)),
            (j, _) => Err(not_a(j, "slider")),
        }
    }

    /// Displacement along axis `axis` of a linear motor.
    pub fn linear_motor_position(&self, id: JointId, axis: usize) -> Result<f64> {
        match self.joint_frame(id)? {
            (Joint { kind: JointKind::LinearMotor(m), .. }, jb) if axis < m.axes.len() => Ok(m.position(&jb, axis)),
            (j, _) => Err(not_a(j, "linear motor with that axis")),
        }
    }

    /// World anchor points on body 1 and body 2 (or the world). They
    /// coincide while the joint holds.
    pub fn joint_anchors(&self, id: JointId) -> Result<(Point3, Point3)> {
        let (joint, jb) = self.joint_frame(id)?;
        joint.kind.anchors(&jb).ok_or_else(|| not_a(joint, "joint with an anchor"))
    }

    pub(crate) fn log_summary(&self) {
        info!(
            bodies = self.store.bodies.len(),
            geoms = self.store.geoms.len(),
            joints = self.store.joints.len(),
            "world restored"
        );
    }
}

fn not_a(joint: &Joint, expected: &str) -> PhysicsError {
    PhysicsError::InvalidJoint(format!("{} joint is not a {expected}", joint.kind.name()))
}
