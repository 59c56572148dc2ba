//! Ball-and-socket joint: three rows keeping two anchor points together.

use serde::{Deserialize, Serialize};
use tumble_math::Point3;

use super::frame::{point_rows, JointBodies};
use crate::row::RowWriter;

/// Ball-and-socket joint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallJoint {
    /// Anchor in body-1 coordinates.
    pub anchor1: Point3,
    /// Anchor in body-2 (or world) coordinates.
    pub anchor2: Point3,
}

impl BallJoint {
    pub(crate) fn new(jb: &JointBodies, anchor: &Point3) -> Self {
        Self {
            anchor1: jb.local1(anchor),
            anchor2: jb.local2(anchor),
        }
    }

    pub(crate) fn row_count(&self) -> usize {
        3
    }

    pub(crate) fn fill(&self, jb: &JointBodies, w: &mut RowWriter<'_>) {
        point_rows(w, jb, &self.anchor1, &self.anchor2);
    }

    /// World anchors on body 1 and body 2.
    pub(crate) fn anchors(&self, jb: &JointBodies) -> (Point3, Point3) {
        (jb.world1(&self.anchor1), jb.world2(&self.anchor2))
    }
}
