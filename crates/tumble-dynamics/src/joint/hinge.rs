//! Hinge joint: one rotational degree of freedom, with optional stops and
//! motor about the hinge axis.

use serde::{Deserialize, Serialize};
use tumble_math::rotation::plane_space;
use tumble_math::{Point3, Quat, Vec3};

use super::frame::{point_rows, relative_angle, JointBodies};
use super::limit::LimitMotor;
use crate::row::{RowJacobian, RowWriter};

/// Hinge joint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HingeJoint {
    /// Anchor in body-1 coordinates.
    pub anchor1: Point3,
    /// Anchor in body-2 (or world) coordinates.
    pub anchor2: Point3,
    /// Unit axis in body-1 coordinates.
    pub axis1: Vec3,
    /// Unit axis in body-2 (or world) coordinates.
    pub axis2: Vec3,
    /// Relative orientation at zero angle.
    pub q_rel0: Quat,
    /// Stops and motor about the axis.
    pub limit: LimitMotor,
}

impl HingeJoint {
    /// `axis` must be a unit vector in world coordinates.
    pub(crate) fn new(jb: &JointBodies, anchor: &Point3, axis: &Vec3) -> Self {
        let mut joint = Self {
            anchor1: jb.local1(anchor),
            anchor2: jb.local2(anchor),
            axis1: Vec3::z(),
            axis2: Vec3::z(),
            q_rel0: Quat::identity(),
            limit: LimitMotor::default(),
        };
        joint.set_axis(jb, axis);
        joint
    }

    /// Re-anchor at a world point.
    pub(crate) fn set_anchor(&mut self, jb: &JointBodies, anchor: &Point3) {
        self.anchor1 = jb.local1(anchor);
        self.anchor2 = jb.local2(anchor);
    }

    /// Set the world axis; the current pose becomes angle zero.
    pub(crate) fn set_axis(&mut self, jb: &JointBodies, axis: &Vec3) {
        self.axis1 = jb.q1.inverse_transform_vector(axis);
        self.axis2 = jb.q2.inverse_transform_vector(axis);
        self.q_rel0 = jb.relative_rotation();
    }

    /// Hinge angle in radians, `(-pi, pi]`.
    pub(crate) fn angle(&self, jb: &JointBodies) -> f64 {
        relative_angle(jb, &self.q_rel0, &self.axis2)
    }

    /// Hinge angular rate.
    pub(crate) fn angle_rate(&self, jb: &JointBodies) -> f64 {
        (jb.q1 * self.axis1).dot(&(jb.w1 - jb.w2))
    }

    pub(crate) fn row_count(&self, jb: &JointBodies) -> usize {
        5 + usize::from(self.limit.is_active(self.angle(jb)))
    }

    pub(crate) fn fill(&self, jb: &JointBodies, w: &mut RowWriter<'_>) {
        point_rows(w, jb, &self.anchor1, &self.anchor2);
        let ax1 = jb.q1 * self.axis1;
        let ax2 = jb.q2 * self.axis2;
        let (p, q) = plane_space(&ax1);
        let b = ax1.cross(&ax2);
        let k = w.k();
        w.equality(RowJacobian::angular(p), k * b.dot(&p));
        w.equality(RowJacobian::angular(q), k * b.dot(&q));

        let angle = self.angle(jb);
        if self.limit.is_active(angle) {
            self.limit
                .add_row(w, RowJacobian::angular(ax1), angle, self.angle_rate(jb));
        }
    }

    /// World anchors on body 1 and body 2.
    pub(crate) fn anchors(&self, jb: &JointBodies) -> (Point3, Point3) {
        (jb.world1(&self.anchor1), jb.world2(&self.anchor2))
    }
}
