//! Contacts generated during a step.

use serde::{Deserialize, Serialize};
use tumble_collide::ContactGeom;
use tumble_math::{Point3, Vec3};

use crate::body::BodyId;
use crate::geom::GeomId;
use crate::surface::SurfaceParams;

/// One contact between two geoms, kept until the next step.
///
/// The normal points from `geom1` into `geom2`; the contact pushes the body
/// of `geom2` along `+normal`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// First geom.
    pub geom1: GeomId,
    /// Second geom.
    pub geom2: GeomId,
    /// Body of the first geom, `None` when static.
    pub body1: Option<BodyId>,
    /// Body of the second geom, `None` when static.
    pub body2: Option<BodyId>,
    /// Point, normal and depth.
    pub geom: ContactGeom,
    /// Combined surface of the two geoms.
    pub surface: SurfaceParams,
}

impl Contact {
    /// World-space contact point.
    pub fn position(&self) -> Point3 {
        self.geom.position
    }

    /// Unit normal from `geom1` into `geom2`.
    pub fn normal(&self) -> Vec3 {
        self.geom.normal
    }

    /// Penetration depth.
    pub fn depth(&self) -> f64 {
        self.geom.depth
    }

    /// Whether the contact touches `body`.
    pub fn involves(&self, body: BodyId) -> bool {
        self.body1 == Some(body) || self.body2 == Some(body)
    }
}
