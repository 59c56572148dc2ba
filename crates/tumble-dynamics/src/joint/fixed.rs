//! Fixed joint: no relative motion.

use serde::{Deserialize, Serialize};
use tumble_math::{Point3, Quat};

use super::frame::{orientation_rows, point_rows, JointBodies};
use crate::row::RowWriter;

/// Welds body 1 to body 2 (or the world) in their relative pose at creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedJoint {
    /// Body-1 origin in body-2 (or world) coordinates.
    pub offset: Point3,
    /// Relative orientation to hold.
    pub q_rel0: Quat,
}

impl FixedJoint {
    pub(crate) fn new(jb: &JointBodies) -> Self {
        Self {
            offset: jb.local2(&jb.p1),
            q_rel0: jb.relative_rotation(),
        }
    }

    pub(crate) fn row_count(&self) -> usize {
        6
    }

    pub(crate) fn fill(&self, jb: &JointBodies, w: &mut RowWriter<'_>) {
        point_rows(w, jb, &Point3::origin(), &self.offset);
        orientation_rows(w, jb, &self.q_rel0);
    }
}
