//! Rigid bodies.
//!
//! A body's origin is its centre of mass. Bodies are created with zero
//! velocity and no mass; a mass must be assigned before the body is stepped.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use tumble_math::{Dir3, Mass, Mat3, Point3, Pose, Quat, Vec3};

new_key_type! {
    /// Generation-checked handle to a body.
    pub struct BodyId;
}

/// How orientation is advanced from angular velocity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum RotationMode {
    /// First-order quaternion update.
    #[default]
    Infinitesimal,
    /// Exact axis-angle update. With an axis, only the spin about that
    /// body-fixed axis is integrated exactly (useful for wheels).
    Finite {
        /// Body-frame axis for the exact part.
        axis: Option<Dir3>,
    },
}

/// A rigid body.
#[derive(Debug, Clone)]
pub struct Body {
    pub(crate) mass: Option<Mass>,
    pub(crate) inv_mass: f64,
    pub(crate) inv_inertia: Mat3,
    pub(crate) position: Point3,
    pub(crate) orientation: Quat,
    pub(crate) linear_velocity: Vec3,
    pub(crate) angular_velocity: Vec3,
    pub(crate) force: Vec3,
    pub(crate) torque: Vec3,
    pub(crate) gravity_enabled: bool,
    pub(crate) linear_damping: f64,
    pub(crate) angular_damping: f64,
    pub(crate) rotation_mode: RotationMode,
    pub(crate) enabled: bool,
    pub(crate) auto_disable: bool,
    pub(crate) idle_steps: u32,
}

impl Body {
    pub(crate) fn new(position: Point3) -> Self {
        Self {
            mass: None,
            inv_mass: 0.0,
            inv_inertia: Mat3::zeros(),
            position,
            orientation: Quat::identity(),
            linear_velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
            force: Vec3::zeros(),
            torque: Vec3::zeros(),
            gravity_enabled: true,
            linear_damping: 0.0,
            angular_damping: 0.0,
            rotation_mode: RotationMode::Infinitesimal,
            enabled: true,
            auto_disable: true,
            idle_steps: 0,
        }
    }

    /// Mass properties, if assigned.
    pub fn mass(&self) -> Option<&Mass> {
        self.mass.as_ref()
    }

    /// Centre of mass in world coordinates.
    pub fn position(&self) -> Point3 {
        self.position
    }

    /// Orientation.
    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    /// Position and orientation as a pose.
    pub fn pose(&self) -> Pose {
        Pose::from_parts(self.position.coords.into(), self.orientation)
    }

    /// Rotation matrix of the current orientation.
    pub fn rotation_matrix(&self) -> Mat3 {
        self.orientation.to_rotation_matrix().into_inner()
    }

    /// Linear velocity of the centre of mass.
    pub fn linear_velocity(&self) -> Vec3 {
        self.linear_velocity
    }

    /// Angular velocity in the world frame.
    pub fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    /// Force accumulated for the next step (world frame).
    pub fn force(&self) -> Vec3 {
        self.force
    }

    /// Torque accumulated for the next step (world frame).
    pub fn torque(&self) -> Vec3 {
        self.torque
    }

    /// Whether gravity acts on this body.
    pub fn gravity_enabled(&self) -> bool {
        self.gravity_enabled
    }

    /// Linear and angular damping coefficients.
    pub fn damping(&self) -> (f64, f64) {
        (self.linear_damping, self.angular_damping)
    }

    /// Orientation integration mode.
    pub fn rotation_mode(&self) -> RotationMode {
        self.rotation_mode
    }

    /// Whether the body is simulated.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether this body may be put to sleep automatically.
    pub fn auto_disable(&self) -> bool {
        self.auto_disable
    }

    /// Kinetic energy `0.5 m v^2 + 0.5 w^T I w`. Zero without mass.
    pub fn kinetic_energy(&self) -> f64 {
        match &self.mass {
            Some(m) => {
                let i_world = self.world_inertia(m);
                0.5 * m.mass * self.linear_velocity.norm_squared()
                    + 0.5 * self.angular_velocity.dot(&(i_world * self.angular_velocity))
            }
            None => 0.0,
        }
    }

    /// Body-frame point to world frame.
    pub fn body_point_to_world(&self, p: &Point3) -> Point3 {
        self.position + self.orientation * p.coords
    }

    /// World-frame point to body frame.
    pub fn world_point_to_body(&self, p: &Point3) -> Point3 {
        Point3::from(self.orientation.inverse_transform_vector(&(p - self.position)))
    }

    /// Body-frame vector to world frame.
    pub fn vector_to_world(&self, v: &Vec3) -> Vec3 {
        self.orientation * v
    }

    /// World-frame vector to body frame.
    pub fn vector_from_world(&self, v: &Vec3) -> Vec3 {
        self.orientation.inverse_transform_vector(v)
    }

    /// Velocity of a world-frame point rigidly attached to the body.
    pub fn point_velocity(&self, p: &Point3) -> Vec3 {
        self.linear_velocity + self.angular_velocity.cross(&(p - self.position))
    }

    pub(crate) fn set_mass(&mut self, mass: Mass) {
        self.inv_mass = 1.0 / mass.mass;
        self.inv_inertia = mass.inertia.try_inverse().unwrap_or_else(Mat3::zeros);
        self.mass = Some(mass);
    }

    fn world_inertia(&self, m: &Mass) -> Mat3 {
        let r = self.rotation_matrix();
        r * m.inertia * r.transpose()
    }

    /// World-frame inverse inertia `R I^-1 R^T`.
    pub(crate) fn world_inv_inertia(&self) -> Mat3 {
        let r = self.rotation_matrix();
        r * self.inv_inertia * r.transpose()
    }

    /// World-frame inertia; zero without mass.
    pub(crate) fn world_inertia_or_zero(&self) -> Mat3 {
        self.mass.as_ref().map_or_else(Mat3::zeros, |m| self.world_inertia(m))
    }

    pub(crate) fn add_force_at(&mut self, f: Vec3, at: Point3) {
        self.force += f;
        self.torque += (at - self.position).cross(&f);
    }

    pub(crate) fn wake(&mut self) {
        self.enabled = true;
        self.idle_steps = 0;
    }

    pub(crate) fn clear_accumulators(&mut self) {
        self.force = Vec3::zeros();
        self.torque = Vec3::zeros();
    }
}
