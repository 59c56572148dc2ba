//! Body state seen by joints, and row helpers shared between joint kinds.

use tumble_math::{Point3, Quat, Vec3};

use crate::body::Body;
use crate::row::{RowJacobian, RowWriter};

/// Pose and velocity of both ends of a joint. A missing second body is the
/// static world frame.
#[derive(Debug, Clone, Copy)]
pub(crate) struct JointBodies {
    pub p1: Point3,
    pub q1: Quat,
    pub v1: Vec3,
    pub w1: Vec3,
    pub p2: Point3,
    pub q2: Quat,
    pub v2: Vec3,
    pub w2: Vec3,
}

impl JointBodies {
    pub fn new(b1: &Body, b2: Option<&Body>) -> Self {
        let (p2, q2, v2, w2) = match b2 {
            Some(b) => (b.position, b.orientation, b.linear_velocity, b.angular_velocity),
            None => (Point3::origin(), Quat::identity(), Vec3::zeros(), Vec3::zeros()),
        };
        Self {
            p1: b1.position,
            q1: b1.orientation,
            v1: b1.linear_velocity,
            w1: b1.angular_velocity,
            p2,
            q2,
            v2,
            w2,
        }
    }

    /// Body-1 local point to world.
    pub fn world1(&self, local: &Point3) -> Point3 {
        self.p1 + self.q1 * local.coords
    }

    /// Body-2 (or world) local point to world.
    pub fn world2(&self, local: &Point3) -> Point3 {
        self.p2 + self.q2 * local.coords
    }

    /// World point to body-1 local.
    pub fn local1(&self, p: &Point3) -> Point3 {
        Point3::from(self.q1.inverse_transform_vector(&(p - self.p1)))
    }

    /// World point to body-2 (or world) local.
    pub fn local2(&self, p: &Point3) -> Point3 {
        Point3::from(self.q2.inverse_transform_vector(&(p - self.p2)))
    }

    /// Orientation of body 1 relative to body 2.
    pub fn relative_rotation(&self) -> Quat {
        self.q2.inverse() * self.q1
    }
}

/// Three rows making body-1 point `a1` (local) coincide with body-2 point
/// `a2` (local).
pub(crate) fn point_rows(w: &mut RowWriter<'_>, jb: &JointBodies, a1: &Point3, a2: &Point3) {
    let r1 = jb.q1 * a1.coords;
    let r2 = jb.q2 * a2.coords;
    let err = (jb.p2 + r2) - (jb.p1 + r1);
    let k = w.k();
    for e in [Vec3::x(), Vec3::y(), Vec3::z()] {
        let jac = RowJacobian {
            lin1: e,
            ang1: r1.cross(&e),
            lin2: -e,
            ang2: -r2.cross(&e),
        };
        w.equality(jac, k * e.dot(&err));
    }
}

/// Rotation vector (axis * angle) of body 1 away from its rest orientation
/// `q_rel0` relative to body 2, in the world frame.
pub(crate) fn orientation_error(jb: &JointBodies, q_rel0: &Quat) -> Vec3 {
    let q_err = jb.q1 * (jb.q2 * q_rel0).inverse();
    let q = q_err.quaternion();
    let v = q.vector().into_owned();
    if q.w < 0.0 {
        -2.0 * v
    } else {
        2.0 * v
    }
}

/// Three rows locking the relative orientation at `q_rel0`.
pub(crate) fn orientation_rows(w: &mut RowWriter<'_>, jb: &JointBodies, q_rel0: &Quat) {
    let err = orientation_error(jb, q_rel0);
    let k = w.k();
    for e in [Vec3::x(), Vec3::y(), Vec3::z()] {
        w.equality(RowJacobian::angular(e), -k * e.dot(&err));
    }
}

/// Angle of the relative rotation since `q_rel0` about `axis2` (a unit
/// axis in body-2 coordinates), wrapped to `(-pi, pi]`.
pub(crate) fn relative_angle(jb: &JointBodies, q_rel0: &Quat, axis2: &Vec3) -> f64 {
    let q_d = jb.relative_rotation() * q_rel0.inverse();
    let q = q_d.quaternion();
    let s = q.vector().dot(axis2);
    let mut angle = 2.0 * s.atan2(q.w);
    if angle > std::f64::consts::PI {
        angle -= 2.0 * std::f64::consts::PI;
    } else if angle <= -std::f64::consts::PI {
        angle += 2.0 * std::f64::consts::PI;
    }
    angle
}

#[cfg(test)]
mod tests {
    use super::*;
    use tumble_math::Mass;

    fn body_at(p: Point3, q: Quat) -> Body {
        let mut b = Body::new(p);
        b.orientation = q;
        b.set_mass(Mass::sphere_total(1.0, 0.1));
        b
    }

    #[test]
    fn test_relative_angle_about_axis() {
        let b1 = body_at(Point3::origin(), Quat::identity());
        let jb0 = JointBodies::new(&b1, None);
        let q_rel0 = jb0.relative_rotation();
        let b1 = body_at(Point3::origin(), Quat::from_axis_angle(&Vec3::z_axis(), 0.3));
        let jb = JointBodies::new(&b1, None);
        assert!((relative_angle(&jb, &q_rel0, &Vec3::z()) - 0.3).abs() < 1e-12);
        assert!((relative_angle(&jb, &q_rel0, &-Vec3::z()) + 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_orientation_error_small_rotation() {
        let b2 = body_at(Point3::origin(), Quat::from_axis_angle(&Vec3::x_axis(), 0.5));
        let b1 = body_at(Point3::origin(), Quat::from_axis_angle(&Vec3::x_axis(), 0.5));
        let q_rel0 = JointBodies::new(&b1, Some(&b2)).relative_rotation();
        let b1 = body_at(
            Point3::origin(),
            Quat::from_axis_angle(&Vec3::y_axis(), 0.01) * Quat::from_axis_angle(&Vec3::x_axis(), 0.5),
        );
        let err = orientation_error(&JointBodies::new(&b1, Some(&b2)), &q_rel0);
        assert!((err - Vec3::new(0.0, 0.01, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn test_point_rows_error_sign() {
        let b1 = body_at(Point3::new(-1.0, 0.0, 0.0), Quat::identity());
        let b2 = body_at(Point3::new(1.2, 0.0, 0.0), Quat::identity());
        let jb = JointBodies::new(&b1, Some(&b2));
        let mut rows = Vec::new();
        let mut w = RowWriter::new(&mut rows, Some(0), Some(1), 0.1, 0.5, 0.0).unwrap();
        point_rows(&mut w, &jb, &Point3::new(1.0, 0.0, 0.0), &Point3::new(-1.0, 0.0, 0.0));
        assert_eq!(rows.len(), 3);
        // Anchor on body 2 is 0.2 further along x: drive v1 - v2 positive.
        assert!((rows[0].rhs - 1.0).abs() < 1e-12);
        assert_eq!(rows[1].rhs, 0.0);
    }
}
