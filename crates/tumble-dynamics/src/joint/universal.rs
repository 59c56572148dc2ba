//! Universal joint: a ball joint that also keeps two axes perpendicular.

use serde::{Deserialize, Serialize};
use tumble_math::{Point3, Vec3};

use super::frame::{point_rows, JointBodies};
use crate::row::{RowJacobian, RowWriter};

/// Universal joint with axis 1 fixed in body 1 and axis 2 fixed in body 2.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UniversalJoint {
    /// Anchor in body-1 coordinates.
    pub anchor1: Point3,
    /// Anchor in body-2 (or world) coordinates.
    pub anchor2: Point3,
    /// Unit axis in body-1 coordinates.
    pub axis1: Vec3,
    /// Unit axis in body-2 (or world) coordinates.
    pub axis2: Vec3,
}

impl UniversalJoint {
    /// `axis1` and `axis2` must be perpendicular unit vectors in world
    /// coordinates.
    pub(crate) fn new(jb: &JointBodies, anchor: &Point3, axis1: &Vec3, axis2: &Vec3) -> Self {
        Self {
            anchor1: jb.local1(anchor),
            anchor2: jb.local2(anchor),
            axis1: jb.q1.inverse_transform_vector(axis1),
            axis2: jb.q2.inverse_transform_vector(axis2),
        }
    }

    /// Re-anchor at a world point.
    pub(crate) fn set_anchor(&mut self, jb: &JointBodies, anchor: &Point3) {
        self.anchor1 = jb.local1(anchor);
        self.anchor2 = jb.local2(anchor);
    }

    pub(crate) fn row_count(&self) -> usize {
        4
    }

    pub(crate) fn fill(&self, jb: &JointBodies, w: &mut RowWriter<'_>) {
        point_rows(w, jb, &self.anchor1, &self.anchor2);
        let ax1 = jb.q1 * self.axis1;
        let ax2 = jb.q2 * self.axis2;
        let k = w.k();
        w.equality(RowJacobian::angular(ax1.cross(&ax2)), -k * ax1.dot(&ax2));
    }

    /// World anchors on body 1 and body 2.
    pub(crate) fn anchors(&self, jb: &JointBodies) -> (Point3, Point3) {
        (jb.world1(&self.anchor1), jb.world2(&self.anchor2))
    }
}
