//! Slider (prismatic) joint: one translational degree of freedom.

use serde::{Deserialize, Serialize};
use tumble_math::rotation::plane_space;
use tumble_math::{Point3, Quat, Vec3};

use super::frame::{orientation_rows, JointBodies};
use super::limit::LimitMotor;
use crate::row::{RowJacobian, RowWriter};

/// Slider joint. The axis is fixed in body 1; position is zero at creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliderJoint {
    /// Unit axis in body-1 coordinates.
    pub axis1: Vec3,
    /// Body-1 origin at zero position, in body-2 (or world) coordinates.
    pub offset: Point3,
    /// Relative orientation to hold.
    pub q_rel0: Quat,
    /// Stops and motor along the axis.
    pub limit: LimitMotor,
}

impl SliderJoint {
    /// `axis` must be a unit vector in world coordinates.
    pub(crate) fn new(jb: &JointBodies, axis: &Vec3) -> Self {
        let mut joint = Self {
            axis1: Vec3::z(),
            offset: Point3::origin(),
            q_rel0: Quat::identity(),
            limit: LimitMotor::default(),
        };
        joint.set_axis(jb, axis);
        joint
    }

    /// Set the world axis; the current pose becomes position zero.
    pub(crate) fn set_axis(&mut self, jb: &JointBodies, axis: &Vec3) {
        self.axis1 = jb.q1.inverse_transform_vector(axis);
        self.offset = jb.local2(&jb.p1);
        self.q_rel0 = jb.relative_rotation();
    }

    /// Displacement of body 1 from its zero position, world frame.
    fn displacement(&self, jb: &JointBodies) -> Vec3 {
        jb.p1 - jb.world2(&self.offset)
    }

    fn axis_jacobian(&self, jb: &JointBodies, t: &Vec3) -> RowJacobian {
        let r2 = jb.q2 * self.offset.coords;
        RowJacobian {
            lin1: *t,
            ang1: Vec3::zeros(),
            lin2: -t,
            ang2: -r2.cross(t),
        }
    }

    /// Position along the axis.
    pub(crate) fn position(&self, jb: &JointBodies) -> f64 {
        (jb.q1 * self.axis1).dot(&self.displacement(jb))
    }

    /// Rate of change of the position.
    pub(crate) fn position_rate(&self, jb: &JointBodies) -> f64 {
        let ax = jb.q1 * self.axis1;
        let r2 = jb.q2 * self.offset.coords;
        ax.dot(&(jb.v1 - jb.v2 - jb.w2.cross(&r2)))
    }

    pub(crate) fn row_count(&self, jb: &JointBodies) -> usize {
        5 + usize::from(self.limit.is_active(self.position(jb)))
    }

    pub(crate) fn fill(&self, jb: &JointBodies, w: &mut RowWriter<'_>) {
        orientation_rows(w, jb, &self.q_rel0);
        let ax = jb.q1 * self.axis1;
        let e = self.displacement(jb);
        let (p, q) = plane_space(&ax);
        let k = w.k();
        for t in [p, q] {
            w.equality(self.axis_jacobian(jb, &t), -k * t.dot(&e));
        }

        let pos = ax.dot(&e);
        if self.limit.is_active(pos) {
            self.limit
                .add_row(w, self.axis_jacobian(jb, &ax), pos, self.position_rate(jb));
        }
    }
}
