//! Checkpoint and resume of body state.
//!
//! A snapshot holds pose, velocity, pending forces, mass and sleep state
//! per body. It is meant for resuming a run in the same process or build,
//! not as a stable interchange format. Restoring requires the same bodies
//! to still exist; geoms, joints and configuration are not captured.

use serde::{Deserialize, Serialize};
use tumble_math::{Mass, Point3, Quat, Vec3};

use crate::body::BodyId;
use crate::error::{PhysicsError, Result};
use crate::world::World;

/// State of one body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodySnapshot {
    /// Body the state belongs to.
    pub id: BodyId,
    /// Centre of mass.
    pub position: Point3,
    /// Orientation.
    pub orientation: Quat,
    /// Linear velocity.
    pub linear_velocity: Vec3,
    /// Angular velocity.
    pub angular_velocity: Vec3,
    /// Force accumulated for the next step.
    pub force: Vec3,
    /// Torque accumulated for the next step.
    pub torque: Vec3,
    /// Mass properties.
    pub mass: Option<Mass>,
    /// Whether the body is stepped.
    pub enabled: bool,
    /// Idle counter for auto-disable.
    pub idle_steps: u32,
}

/// State of every body in a world.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Bodies in creation order.
    pub bodies: Vec<BodySnapshot>,
}

impl WorldSnapshot {
    /// Encode as JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| PhysicsError::Snapshot(e.to_string()))
    }

    /// Decode from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PhysicsError::Snapshot(e.to_string()))
    }
}

impl World {
    /// Capture the state of every body.
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            bodies: self
                .bodies()
                .map(|(id, b)| BodySnapshot {
                    id,
                    position: b.position,
                    orientation: b.orientation,
                    linear_velocity: b.linear_velocity,
                    angular_velocity: b.angular_velocity,
                    force: b.force,
                    torque: b.torque,
                    mass: b.mass,
                    enabled: b.enabled,
                    idle_steps: b.idle_steps,
                })
                .collect(),
        }
    }

    /// Put every body back to the captured state. Nothing is changed if
    /// any captured body no longer exists or carries invalid mass.
    pub fn restore(&mut self, snapshot: &WorldSnapshot) -> Result<()> {
        for s in &snapshot.bodies {
            if !self.store.bodies.contains_key(s.id) {
                return Err(PhysicsError::Snapshot(format!("body {:?} no longer exists", s.id)));
            }
            if let Some(Err(e)) = s.mass.as_ref().map(Mass::check) {
                return Err(PhysicsError::Snapshot(format!("body {:?}: {e}", s.id)));
            }
        }
        for s in &snapshot.bodies {
            let Some(body) = self.store.bodies.get_mut(s.id) else { continue };
            body.position = s.position;
            body.orientation = s.orientation;
            body.linear_velocity = s.linear_velocity;
            body.angular_velocity = s.angular_velocity;
            body.force = s.force;
            body.torque = s.torque;
            match s.mass {
                Some(m) => body.set_mass(m),
                None => {
                    body.mass = None;
                    body.inv_mass = 0.0;
                    body.inv_inertia = tumble_math::Mat3::zeros();
                }
            }
            body.enabled = s.enabled;
            body.idle_steps = s.idle_steps;
        }
        self.log_summary();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;

    #[test]
    fn test_snapshot_json_round_trip_restores_state() {
        let mut world = World::with_config(WorldConfig::zero_gravity()).unwrap();
        let b = world.add_body(Point3::new(1.0, 2.0, 3.0)).unwrap();
        world.set_body_mass(b, Mass::box_total(2.0, 1.0, 1.0, 1.0)).unwrap();
        world.set_linear_velocity(b, Vec3::new(0.5, 0.0, 0.0)).unwrap();
        let snap = world.snapshot();
        let json = snap.to_json().unwrap();

        world.step(0.1).unwrap();
        assert!((world.body(b).unwrap().position().x - 1.05).abs() < 1e-12);

        let decoded = WorldSnapshot::from_json(&json).unwrap();
        world.restore(&decoded).unwrap();
        let body = world.body(b).unwrap();
        assert_eq!(body.position(), Point3::new(1.0, 2.0, 3.0));
        assert_eq!(body.linear_velocity(), Vec3::new(0.5, 0.0, 0.0));
        assert_eq!(body.mass().map(|m| m.mass), Some(2.0));
    }

    #[test]
    fn test_json_preserves_every_bit() {
        let mut world = World::new();
        for i in 0..4 {
            let b = world.add_body(Point3::new(0.1 * i as f64, 1.0 / 3.0, 2.0 / 7.0)).unwrap();
            world.set_body_mass(b, Mass::box_total(0.7, 0.3, 0.5, 1.1)).unwrap();
            world.set_orientation(b, Quat::from_euler_angles(0.3, 0.1 * i as f64, 0.7)).unwrap();
            world.set_angular_velocity(b, Vec3::new(1.1, -0.3, 0.9)).unwrap();
        }
        for _ in 0..37 {
            world.step(0.013).unwrap();
        }
        let snap = world.snapshot();
        let decoded = WorldSnapshot::from_json(&snap.to_json().unwrap()).unwrap();
        assert_eq!(decoded, snap);
        for (a, b) in snap.bodies.iter().zip(&decoded.bodies) {
            let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
            assert_eq!(bits(a.position.coords.as_slice()), bits(b.position.coords.as_slice()));
            assert_eq!(bits(a.orientation.coords.as_slice()), bits(b.orientation.coords.as_slice()));
            assert_eq!(bits(a.angular_velocity.as_slice()), bits(b.angular_velocity.as_slice()));
        }
    }

    #[test]
    fn test_restore_rejects_missing_body() {
        let mut world = World::new();
        let b = world.add_body(Point3::origin()).unwrap();
        let snap = world.snapshot();
        world.remove_body(b).unwrap();
        assert!(matches!(world.restore(&snap), Err(PhysicsError::Snapshot(_))));
    }

    #[test]
    fn test_bad_json_is_a_snapshot_error() {
        assert!(matches!(WorldSnapshot::from_json("{"), Err(PhysicsError::Snapshot(_))));
    }
}
