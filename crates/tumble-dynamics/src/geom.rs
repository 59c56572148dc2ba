//! Collision geometry attached to bodies or placed statically.

use slotmap::new_key_type;
use tumble_collide::Shape;
use tumble_math::Pose;

use crate::body::{Body, BodyId};
use crate::surface::SurfaceParams;

new_key_type! {
    /// Generation-checked handle to a geom.
    pub struct GeomId;
}

/// A shape placed in the world.
///
/// An attached geom follows its body with a fixed local offset; a static
/// geom (no body) sits at its offset in world coordinates.
#[derive(Debug, Clone)]
pub struct Geom {
    pub(crate) shape: Shape,
    pub(crate) body: Option<BodyId>,
    pub(crate) offset: Pose,
    pub(crate) category: u32,
    pub(crate) collide: u32,
    pub(crate) enabled: bool,
    pub(crate) surface: Option<SurfaceParams>,
}

impl Geom {
    pub(crate) fn new(shape: Shape, body: Option<BodyId>, offset: Pose) -> Self {
        Self {
            shape,
            body,
            offset,
            category: u32::MAX,
            collide: u32::MAX,
            enabled: true,
            surface: None,
        }
    }

    /// The collision shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Owning body, or `None` for static geometry.
    pub fn body(&self) -> Option<BodyId> {
        self.body
    }

    /// Body-local offset (world pose for static geoms).
    pub fn offset(&self) -> Pose {
        self.offset
    }

    /// Category bits.
    pub fn category(&self) -> u32 {
        self.category
    }

    /// Collide bits.
    pub fn collide_mask(&self) -> u32 {
        self.collide
    }

    /// Whether the geom takes part in collision.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Surface override.
    pub fn surface(&self) -> Option<&SurfaceParams> {
        self.surface.as_ref()
    }

    /// World pose given the owning body.
    pub(crate) fn world_pose(&self, body: Option<&Body>) -> Pose {
        match body {
            Some(b) => b.pose() * self.offset,
            None => self.offset,
        }
    }

    /// Whether the category/collide masks allow testing against `other`.
    pub(crate) fn masks_allow(&self, other: &Geom) -> bool {
        (self.category & other.collide) != 0 || (other.category & self.collide) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tumble_math::{Point3, Vec3};

    #[test]
    fn test_world_pose_follows_body() {
        let g = Geom::new(
            Shape::sphere(0.1).unwrap(),
            None,
            Pose::translation(0.0, 0.0, 1.0),
        );
        let body = Body::new(Point3::new(2.0, 0.0, 0.0));
        let p = g.world_pose(Some(&body));
        assert!((p.translation.vector - Vec3::new(2.0, 0.0, 1.0)).norm() < 1e-12);
        assert!((g.world_pose(None).translation.vector - Vec3::z()).norm() < 1e-12);
    }

    #[test]
    fn test_masks() {
        let s = Shape::sphere(0.1).unwrap();
        let mut a = Geom::new(s.clone(), None, Pose::identity());
        let mut b = Geom::new(s, None, Pose::identity());
        assert!(a.masks_allow(&b));
        a.category = 0b01;
        a.collide = 0b00;
        b.category = 0b10;
        b.collide = 0b10;
        assert!(!a.masks_allow(&b));
        b.collide = 0b01;
        assert!(a.masks_allow(&b));
    }
}
