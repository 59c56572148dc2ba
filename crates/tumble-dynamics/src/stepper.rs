//! One simulation step.
//!
//! The pipeline runs in a fixed order:
//!
//! 1. check every body has mass and gather the joint-linked body pairs
//! 2. broad phase over all enabled geoms
//! 3. narrow phase into [`Contact`]s
//! 4. wake disabled bodies touching moving ones, then load the simulated
//!    bodies and their unconstrained velocities
//! 5. joint rows (creation order), then contact rows (pair order)
//! 6. solve and apply the constraint impulses
//! 7. integrate positions and orientations, renormalize, auto-disable
//!
//! All scratch buffers are owned by the [`Stepper`] and reused across steps.

use std::collections::HashSet;
use std::ops::Range;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;
use tracing::{debug, warn};
use tumble_collide::{collide_reusing, ContactGeom, NarrowScratch};
use tumble_math::rotation::{integrate_finite, integrate_first_order, norm_drift, plane_space, renormalize};
use tumble_math::{is_finite_vec, Point3, Quat, Vec3};

use crate::body::{Body, BodyId, RotationMode};
use crate::broad::BroadPhase;
use crate::config::WorldConfig;
use crate::contact::Contact;
use crate::error::{PhysicsError, Result};
use crate::geom::GeomId;
use crate::joint::frame::JointBodies;
use crate::joint::{JointFeedback, JointId};
use crate::row::{ConstraintRow, RowJacobian, RowWriter, Velocity};
use crate::solver::{Solver, SolverBody, SolverPath};
use crate::surface::SurfaceParams;
use crate::world::Store;

/// Quaternion drift above this after integration is reported.
const LARGE_DRIFT: f64 = 1e-3;

/// Wall-clock time spent in each stage of a step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTimings {
    /// Broad phase.
    pub broad: Duration,
    /// Narrow phase.
    pub narrow: Duration,
    /// Body loading and row assembly.
    pub assemble: Duration,
    /// Constraint solve.
    pub solve: Duration,
    /// Integration.
    pub integrate: Duration,
}

impl StepTimings {
    /// Sum over all stages.
    pub fn total(&self) -> Duration {
        self.broad + self.narrow + self.assemble + self.solve + self.integrate
    }
}

/// Summary of the last step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StepStats {
    /// Bodies integrated.
    pub bodies: usize,
    /// Candidate pairs from the broad phase.
    pub pairs: usize,
    /// Contacts generated.
    pub contacts: usize,
    /// Rows contributed by joints.
    pub joint_rows: usize,
    /// Total constraint rows.
    pub rows: usize,
    /// Solve path, `None` when there were no rows.
    pub solver: Option<SolverPath>,
    /// Sweeps or pivots used by the solver.
    pub iterations: usize,
    /// Bodies reset after producing non-finite state.
    pub resets: usize,
    /// Per-stage timings, when enabled in the config.
    pub timings: Option<StepTimings>,
}

#[derive(Debug, Clone)]
struct JointRows {
    joint: JointId,
    rows: Range<usize>,
    swapped: bool,
}

/// Lap timer that does nothing unless enabled.
struct Clock(Option<Instant>);

impl Clock {
    fn start(enabled: bool) -> Self {
        Self(enabled.then(Instant::now))
    }

    fn lap(&mut self) -> Duration {
        match &mut self.0 {
            Some(t) => {
                let now = Instant::now();
                let d = now - *t;
                *t = now;
                d
            }
            None => Duration::ZERO,
        }
    }
}

/// Step pipeline and its scratch state.
#[derive(Debug, Default)]
pub(crate) struct Stepper {
    broad: BroadPhase,
    pairs: Vec<(GeomId, GeomId)>,
    jointed: HashSet<(BodyId, BodyId)>,
    contacts: Vec<Contact>,
    found: Vec<ContactGeom>,
    narrow: NarrowScratch,
    rows: Vec<ConstraintRow>,
    joint_rows: Vec<JointRows>,
    slots: SecondaryMap<BodyId, usize>,
    active: Vec<BodyId>,
    bodies: Vec<SolverBody>,
    vel: Vec<Velocity>,
    solver: Solver,
    stats: StepStats,
}

impl Stepper {
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn stats(&self) -> &StepStats {
        &self.stats
    }

    /// Advance `store` by `h`. Fails without touching any body when a
    /// body has no mass.
    pub fn step(&mut self, store: &mut Store, config: &WorldConfig, h: f64) -> Result<()> {
        for &id in &store.body_order {
            if store.bodies.get(id).is_some_and(|b| b.mass.is_none()) {
                return Err(PhysicsError::MissingMass(id));
            }
        }

        let mut clock = Clock::start(config.record_timings);
        let mut timings = StepTimings::default();

        self.collect_jointed(store);
        self.broad.find_pairs(store, &mut self.pairs);
        timings.broad = clock.lap();

        self.narrow(store, config);
        timings.narrow = clock.lap();

        wake_islands(store, &self.contacts);
        self.load_bodies(store, config, h);
        self.rows.clear();
        self.joint_rows.clear();
        self.add_joint_rows(store, config, h);
        let joint_rows = self.rows.len();
        self.add_contact_rows(store, config, h);
        timings.assemble = clock.lap();

        let solution = self.solver.solve(&self.rows, &self.bodies, &self.vel, &config.solver);
        self.solver.apply(&self.rows, &mut self.vel);
        self.record_feedback(store, h);
        timings.solve = clock.lap();

        let resets = self.integrate(store, config, h);
        for body in store.bodies.values_mut() {
            body.clear_accumulators();
        }
        timings.integrate = clock.lap();

        self.stats = StepStats {
            bodies: self.active.len(),
            pairs: self.pairs.len(),
            contacts: self.contacts.len(),
            joint_rows,
            rows: self.rows.len(),
            solver: solution.path,
            iterations: solution.iterations,
            resets,
            timings: config.record_timings.then_some(timings),
        };
        debug!(
            bodies = self.stats.bodies,
            contacts = self.stats.contacts,
            rows = self.stats.rows,
            solver = ?self.stats.solver,
            iterations = self.stats.iterations,
            "step"
        );
        Ok(())
    }

    fn collect_jointed(&mut self, store: &Store) {
        self.jointed.clear();
        for joint in store.joints.values() {
            if let Some(b2) = joint.body2 {
                self.jointed.insert(ordered(joint.body1, b2));
            }
        }
    }

    fn narrow(&mut self, store: &Store, config: &WorldConfig) {
        self.contacts.clear();
        let limits = config.contact.limits();
        for &(id1, id2) in &self.pairs {
            let (Some(g1), Some(g2)) = (store.geoms.get(id1), store.geoms.get(id2)) else {
                continue;
            };
            if let (Some(a), Some(b)) = (g1.body, g2.body) {
                if a == b || self.jointed.contains(&ordered(a, b)) {
                    continue;
                }
            }
            let body1 = g1.body.and_then(|b| store.bodies.get(b));
            let body2 = g2.body.and_then(|b| store.bodies.get(b));
            let moving = |b: Option<&Body>| b.is_some_and(|b| b.enabled);
            if !moving(body1) && !moving(body2) {
                continue;
            }
            if !g1.masks_allow(g2) {
                continue;
            }

            self.found.clear();
            let n = collide_reusing(
                &g1.shape,
                &g1.world_pose(body1),
                &g2.shape,
                &g2.world_pose(body2),
                &limits,
                &mut self.narrow,
                &mut self.found,
            );
            if n == 0 {
                continue;
            }
            let default = &config.contact.default_surface;
            let surface = SurfaceParams::combine(
                g1.surface.as_ref().unwrap_or(default),
                g2.surface.as_ref().unwrap_or(default),
            );
            self.contacts.extend(self.found.iter().map(|&geom| Contact {
                geom1: id1,
                geom2: id2,
                body1: g1.body,
                body2: g2.body,
                geom,
                surface,
            }));
        }
    }

    fn load_bodies(&mut self, store: &Store, config: &WorldConfig, h: f64) {
        self.active.clear();
        self.slots.clear();
        self.bodies.clear();
        self.vel.clear();
        let gravity = config.gravity_vec();
        for &id in &store.body_order {
            let Some(body) = store.bodies.get(id) else { continue };
            let Some(mass) = body.mass.as_ref().filter(|_| body.enabled) else {
                continue;
            };
            let inv_inertia = body.world_inv_inertia();
            let inertia = body.world_inertia_or_zero();
            let mut force = body.force;
            if body.gravity_enabled {
                force += gravity * mass.mass;
            }
            let w = body.angular_velocity;
            let torque = body.torque - w.cross(&(inertia * w));

            self.slots.insert(id, self.active.len());
            self.active.push(id);
            self.bodies.push(SolverBody {
                inv_mass: body.inv_mass,
                inv_inertia,
            });
            self.vel.push((
                body.linear_velocity + force * (body.inv_mass * h),
                w + inv_inertia * torque * h,
            ));
        }
    }

    fn add_joint_rows(&mut self, store: &Store, config: &WorldConfig, h: f64) {
        for &id in &store.joint_order {
            let Some(joint) = store.joints.get(id) else { continue };
            let Some(b1) = store.bodies.get(joint.body1) else {
                warn!(joint = ?id, "joint attached to a removed body, skipped");
                continue;
            };
            let b2 = match joint.body2 {
                Some(b) => match store.bodies.get(b) {
                    Some(body) => Some(body),
                    None => {
                        warn!(joint = ?id, "joint attached to a removed body, skipped");
                        continue;
                    }
                },
                None => None,
            };
            let slot1 = self.slots.get(joint.body1).copied();
            let slot2 = joint.body2.and_then(|b| self.slots.get(b).copied());
            let start = self.rows.len();
            let Some(mut w) = RowWriter::new(
                &mut self.rows,
                slot1,
                slot2,
                h,
                joint.erp.unwrap_or(config.erp),
                joint.cfm.unwrap_or(config.cfm),
            ) else {
                continue;
            };
            let jb = JointBodies::new(b1, b2);
            joint.kind.fill(&jb, &mut w);
            let swapped = w.swapped();
            debug_assert_eq!(self.rows.len() - start, joint.kind.row_count(&jb));
            self.joint_rows.push(JointRows {
                joint: id,
                rows: start..self.rows.len(),
                swapped,
            });
        }
    }

    fn add_contact_rows(&mut self, store: &Store, config: &WorldConfig, h: f64) {
        for c in &self.contacts {
            let slot1 = c.body1.and_then(|b| self.slots.get(b).copied());
            let slot2 = c.body2.and_then(|b| self.slots.get(b).copied());
            let s = &c.surface;
            let erp = s.soft_erp.unwrap_or(config.erp);
            let cfm = s.soft_cfm.unwrap_or(config.cfm);
            let Some(mut w) = RowWriter::new(&mut self.rows, slot1, slot2, h, erp, cfm) else {
                continue;
            };

            let point = c.geom.position;
            let n = c.geom.normal;
            let (r1, u1) = contact_arm(store, c.body1, slot1.is_some(), &point);
            let (r2, u2) = contact_arm(store, c.body2, slot2.is_some(), &point);
            let vn = n.dot(&(u2 - u1));

            let depth = (c.geom.depth - config.contact.surface_layer).max(0.0);
            let mut rhs = (w.k() * depth).min(config.contact.max_correcting_vel);
            if let Some(bounce) = s.bounce {
                if vn < -bounce.min_velocity {
                    rhs = rhs.max(-bounce.restitution * vn);
                }
            }
            let normal = w.bounded(contact_jacobian(&n, &r1, &r2), rhs, cfm, 0.0, f64::INFINITY);

            let (mu1, mu2) = (s.mu, s.mu2_or_mu());
            if mu1 <= 0.0 && mu2 <= 0.0 {
                continue;
            }
            let (t1, t2) = tangents(&n, s.friction_dir1.as_ref());
            if mu1 > 0.0 {
                w.friction(contact_jacobian(&t1, &r1, &r2), s.slip1, mu1, normal);
            }
            if mu2 > 0.0 {
                w.friction(contact_jacobian(&t2, &r1, &r2), s.slip2, mu2, normal);
            }
        }
    }

    fn record_feedback(&self, store: &mut Store, h: f64) {
        for joint in store.joints.values_mut() {
            if let Some(fb) = joint.feedback.as_mut() {
                *fb = JointFeedback::default();
            }
        }
        let lambda = self.solver.lambda();
        for jr in &self.joint_rows {
            let Some(fb) = store.joints.get_mut(jr.joint).and_then(|j| j.feedback.as_mut()) else {
                continue;
            };
            let mut out = JointFeedback::default();
            for i in jr.rows.clone() {
                let r = &self.rows[i];
                let f = lambda[i] / h;
                out.force1 += r.j1_lin * f;
                out.torque1 += r.j1_ang * f;
                out.force2 += r.j2_lin * f;
                out.torque2 += r.j2_ang * f;
            }
            if jr.swapped {
                out = JointFeedback {
                    force1: Vec3::zeros(),
                    torque1: Vec3::zeros(),
                    force2: out.force1,
                    torque2: out.torque1,
                };
            }
            *fb = out;
        }
    }

    /// Returns the number of bodies reset to their previous pose.
    fn integrate(&mut self, store: &mut Store, config: &WorldConfig, h: f64) -> usize {
        let ad = &config.auto_disable;
        let mut resets = 0;
        for (&id, &(v, w)) in self.active.iter().zip(&self.vel) {
            let Some(body) = store.bodies.get_mut(id) else { continue };
            let v = v * (1.0 - body.linear_damping * h).max(0.0);
            let w = w * (1.0 - body.angular_damping * h).max(0.0);
            let position = body.position + v * h;
            let orientation = advance_orientation(&body.orientation, &w, h, body.rotation_mode, config.quaternion_tolerance);

            match orientation {
                Some(q) if is_finite_vec(&v) && is_finite_vec(&w) && is_finite_vec(&position.coords) => {
                    body.linear_velocity = v;
                    body.angular_velocity = w;
                    body.position = position;
                    body.orientation = q;
                }
                _ => {
                    warn!(body = ?id, "non-finite body state, restoring previous pose");
                    body.linear_velocity = Vec3::zeros();
                    body.angular_velocity = Vec3::zeros();
                    resets += 1;
                    continue;
                }
            }

            if !(ad.enabled && body.auto_disable) {
                body.idle_steps = 0;
                continue;
            }
            if v.norm() < ad.linear_threshold && w.norm() < ad.angular_threshold {
                body.idle_steps += 1;
                if body.idle_steps >= ad.idle_steps {
                    debug!(body = ?id, "body disabled after idling");
                    body.enabled = false;
                    body.linear_velocity = Vec3::zeros();
                    body.angular_velocity = Vec3::zeros();
                }
            } else {
                body.idle_steps = 0;
            }
        }
        resets
    }
}

/// Re-enable disabled bodies linked by a contact or joint to a body that
/// moved during the last step, until no more wake up.
fn wake_islands(store: &mut Store, contacts: &[Contact]) {
    let links: Vec<(BodyId, BodyId)> = contacts
        .iter()
        .map(|c| (c.body1, c.body2))
        .chain(store.joints.values().map(|j| (Some(j.body1), j.body2)))
        .filter_map(|(a, b)| Some((a?, b?)))
        .collect();
    if links.is_empty() {
        return;
    }
    let bodies = &mut store.bodies;
    loop {
        let mut woke = false;
        for &(a, b) in &links {
            let moving = |id: BodyId| bodies.get(id).is_some_and(|x| x.enabled && x.idle_steps == 0);
            let asleep = |id: BodyId| bodies.get(id).is_some_and(|x| !x.enabled);
            let target = if moving(a) && asleep(b) {
                b
            } else if moving(b) && asleep(a) {
                a
            } else {
                continue;
            };
            if let Some(body) = bodies.get_mut(target) {
                body.wake();
                woke = true;
            }
        }
        if !woke {
            break;
        }
    }
}

fn ordered(a: BodyId, b: BodyId) -> (BodyId, BodyId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Lever arm from the body centre to `point`, and the body's velocity at
/// `point` (zero when the body is not simulated).
fn contact_arm(store: &Store, body: Option<BodyId>, simulated: bool, point: &Point3) -> (Vec3, Vec3) {
    let Some(b) = body.and_then(|id| store.bodies.get(id)) else {
        return (Vec3::zeros(), Vec3::zeros());
    };
    let r = point - b.position;
    let u = if simulated { b.linear_velocity + b.angular_velocity.cross(&r) } else { Vec3::zeros() };
    (r, u)
}

/// Jacobian of the relative velocity of the second body over the first
/// along `d`.
fn contact_jacobian(d: &Vec3, r1: &Vec3, r2: &Vec3) -> RowJacobian {
    RowJacobian {
        lin1: -d,
        ang1: -r1.cross(d),
        lin2: *d,
        ang2: r2.cross(d),
    }
}

/// Friction directions. The first follows `dir1` projected onto the
/// contact plane when it is usable.
fn tangents(n: &Vec3, dir1: Option<&Vec3>) -> (Vec3, Vec3) {
    if let Some(t) = dir1.and_then(|d| (d - n * n.dot(d)).try_normalize(1e-9)) {
        return (t, n.cross(&t));
    }
    plane_space(n)
}

/// New orientation after spinning at `w` for `h`, renormalized when the
/// norm drifts past `tolerance`. `None` if the result is unusable.
fn advance_orientation(q: &Quat, w: &Vec3, h: f64, mode: RotationMode, tolerance: f64) -> Option<Quat> {
    let raw = match mode {
        RotationMode::Infinitesimal => integrate_first_order(q, w, h),
        RotationMode::Finite { axis: None } => integrate_finite(q, w, h),
        RotationMode::Finite { axis: Some(axis) } => {
            let a = q * axis.into_inner();
            let spin = a * a.dot(w);
            let q = renormalize(&integrate_finite(q, &spin, h))?;
            integrate_first_order(&q, &(w - spin), h)
        }
    };
    if !raw.coords.iter().all(|c| c.is_finite()) {
        return None;
    }
    let drift = norm_drift(&raw);
    if drift <= tolerance {
        return Some(Quat::new_unchecked(raw));
    }
    if drift > LARGE_DRIFT {
        warn!(drift, "large quaternion drift corrected");
    }
    let q = renormalize(&raw)?;
    debug_assert!(norm_drift(q.quaternion()) <= tolerance);
    Some(q)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_jacobian_measures_separation() {
        let n = Vec3::z();
        let r1 = Vec3::new(0.0, 0.0, -0.5);
        let r2 = Vec3::new(1.0, 0.0, 0.5);
        let jac = contact_jacobian(&n, &r1, &r2);
        // Body 2 moving up separates; body 1 moving up closes.
        assert!((jac.lin2.dot(&Vec3::z()) - 1.0).abs() < 1e-12);
        assert!((jac.lin1.dot(&Vec3::z()) + 1.0).abs() < 1e-12);
        // Spin of body 2 about -y lifts its contact point at +x.
        let w2 = Vec3::new(0.0, -1.0, 0.0);
        assert!((jac.ang2.dot(&w2) - n.dot(&w2.cross(&r2))).abs() < 1e-12);
    }

    #[test]
    fn test_tangents_follow_friction_direction() {
        let n = Vec3::z();
        let (t1, t2) = tangents(&n, Some(&Vec3::new(1.0, 0.0, 5.0)));
        assert!((t1 - Vec3::x()).norm() < 1e-12);
        assert!((t2 - Vec3::y()).norm() < 1e-12);

        // A direction along the normal falls back to an arbitrary basis.
        let (t1, t2) = tangents(&n, Some(&Vec3::z()));
        assert!(t1.dot(&n).abs() < 1e-12 && t2.dot(&n).abs() < 1e-12);
        assert!(t1.dot(&t2).abs() < 1e-12);
    }

    #[test]
    fn test_orientation_stays_unit() {
        let mut q = Quat::identity();
        let w = Vec3::new(3.0, -2.0, 5.0);
        for _ in 0..1000 {
            q = advance_orientation(&q, &w, 0.01, RotationMode::Infinitesimal, 1e-6).unwrap();
            assert!(norm_drift(q.quaternion()) <= 1e-6);
        }
    }

    #[test]
    fn test_finite_rotation_is_exact() {
        let w = Vec3::new(0.0, 0.0, 2.0);
        let q = advance_orientation(&Quat::identity(), &w, 0.5, RotationMode::Finite { axis: None }, 1e-6)
            .unwrap();
        assert!((q.angle() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_orientation_rejected() {
        let w = Vec3::new(f64::NAN, 0.0, 0.0);
        assert!(advance_orientation(&Quat::identity(), &w, 0.01, RotationMode::Infinitesimal, 1e-6).is_none());
    }

    #[test]
    fn test_clock_disabled_reports_zero() {
        let mut c = Clock::start(false);
        assert_eq!(c.lap(), Duration::ZERO);
    }
}
