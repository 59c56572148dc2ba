//! Collision shapes.
//!
//! Every shape is expressed in its own local frame and placed in the world
//! by a [`Pose`]. Capsules are aligned with the local z axis and planes are
//! the half-space `normal · x <= offset`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tumble_bvh::Aabb;
use tumble_math::{Mass, Point3, Pose, Vec3};

use crate::error::{CollideError, Result};
use crate::mesh::TriMesh;

/// Sphere centred on the local origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    /// Radius.
    pub radius: f64,
}

/// Box centred on the local origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cuboid {
    /// Half side lengths along the local axes.
    pub half_extents: Vec3,
}

/// Infinite half-space. Points with `normal · x <= offset` are inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    /// Unit outward normal.
    pub normal: Vec3,
    /// Signed distance of the surface from the local origin along `normal`.
    pub offset: f64,
}

/// Line segment along local z swept by a sphere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Capsule {
    /// Sweep radius.
    pub radius: f64,
    /// Half length of the core segment (excluding the caps).
    pub half_length: f64,
}

impl Capsule {
    /// World-space endpoints of the core segment.
    pub fn segment(&self, pose: &Pose) -> (Point3, Point3) {
        let axis = pose.rotation * Vec3::new(0.0, 0.0, self.half_length);
        let c = Point3::from(pose.translation.vector);
        (c - axis, c + axis)
    }
}

impl Plane {
    /// World-space normal and offset after placing the plane with `pose`.
    pub fn world(&self, pose: &Pose) -> (Vec3, f64) {
        let n = pose.rotation * self.normal;
        (n, self.offset + n.dot(&pose.translation.vector))
    }
}

/// Discriminant of [`Shape`], also used to order pair dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    /// [`Sphere`].
    Sphere,
    /// [`Cuboid`].
    Cuboid,
    /// [`Capsule`].
    Capsule,
    /// [`TriMesh`].
    TriMesh,
    /// [`Plane`].
    Plane,
}

/// A collision shape.
#[derive(Debug, Clone)]
pub enum Shape {
    /// Sphere.
    Sphere(Sphere),
    /// Box.
    Cuboid(Cuboid),
    /// Infinite plane.
    Plane(Plane),
    /// Capsule along local z.
    Capsule(Capsule),
    /// Triangle mesh, shared between geoms.
    TriMesh(Arc<TriMesh>),
}

impl Shape {
    /// Sphere of the given radius.
    pub fn sphere(radius: f64) -> Result<Self> {
        if !(radius > 0.0) || !radius.is_finite() {
            return Err(CollideError::DegenerateShape(format!(
                "sphere radius must be positive, got {radius}"
            )));
        }
        Ok(Shape::Sphere(Sphere { radius }))
    }

    /// Box with the given side lengths.
    pub fn cuboid(lx: f64, ly: f64, lz: f64) -> Result<Self> {
        let half = Vec3::new(lx, ly, lz) * 0.5;
        if half.iter().any(|h| !(*h > 0.0) || !h.is_finite()) {
            return Err(CollideError::DegenerateShape(format!(
                "box sides must be positive, got {lx} x {ly} x {lz}"
            )));
        }
        Ok(Shape::Cuboid(Cuboid { half_extents: half }))
    }

    /// Plane `normal · x = offset`; the normal is normalized.
    pub fn plane(normal: Vec3, offset: f64) -> Result<Self> {
        let len = normal.norm();
        if !(len > 1e-12) || !len.is_finite() || !offset.is_finite() {
            return Err(CollideError::DegenerateShape(format!(
                "plane normal must be non-zero, got {normal:?}"
            )));
        }
        Ok(Shape::Plane(Plane {
            normal: normal / len,
            offset: offset / len,
        }))
    }

    /// Capsule with core segment `length` along local z and cap `radius`.
    pub fn capsule(radius: f64, length: f64) -> Result<Self> {
        if !(radius > 0.0) || !radius.is_finite() || !(length >= 0.0) || !length.is_finite() {
            return Err(CollideError::DegenerateShape(format!(
                "capsule needs radius > 0 and length >= 0, got r={radius} l={length}"
            )));
        }
        Ok(Shape::Capsule(Capsule {
            radius,
            half_length: 0.5 * length,
        }))
    }

    /// Triangle mesh shape.
    pub fn trimesh(mesh: TriMesh) -> Self {
        Shape::TriMesh(Arc::new(mesh))
    }

    /// Discriminant.
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Sphere(_) => ShapeKind::Sphere,
            Shape::Cuboid(_) => ShapeKind::Cuboid,
            Shape::Plane(_) => ShapeKind::Plane,
            Shape::Capsule(_) => ShapeKind::Capsule,
            Shape::TriMesh(_) => ShapeKind::TriMesh,
        }
    }

    /// Whether the shape has unbounded extent (planes).
    pub fn is_infinite(&self) -> bool {
        matches!(self, Shape::Plane(_))
    }

    /// World-space bounds, `None` for infinite shapes.
    pub fn aabb(&self, pose: &Pose) -> Option<Aabb> {
        let c = Point3::from(pose.translation.vector);
        match self {
            Shape::Sphere(s) => Some(Aabb::from_center_half_extents(
                c,
                Vec3::repeat(s.radius),
            )),
            Shape::Cuboid(b) => {
                Some(Aabb::from_center_half_extents(Point3::origin(), b.half_extents).transformed(pose))
            }
            Shape::Capsule(cap) => {
                let (p, q) = cap.segment(pose);
                let mut aabb = Aabb::from_points([&p, &q]);
                aabb.expand(cap.radius);
                Some(aabb)
            }
            Shape::TriMesh(mesh) => Some(mesh.local_aabb().transformed(pose)),
            Shape::Plane(_) => None,
        }
    }

    /// Mass properties of the solid at uniform density, centred on the local
    /// origin. `None` for planes and meshes.
    pub fn mass_properties(&self, density: f64) -> Option<Mass> {
        match self {
            Shape::Sphere(s) => Some(Mass::sphere(density, s.radius)),
            Shape::Cuboid(b) => {
                let s = b.half_extents * 2.0;
                Some(Mass::box_(density, s.x, s.y, s.z))
            }
            Shape::Capsule(c) => Some(Mass::capsule(density, c.radius, 2.0 * c.half_length)),
            Shape::Plane(_) | Shape::TriMesh(_) => None,
        }
    }

    /// Whether any dimension is zero, negative or non-finite.
    pub fn is_degenerate(&self) -> bool {
        let bad = |x: f64| !(x > 0.0) || !x.is_finite();
        match self {
            Shape::Sphere(s) => bad(s.radius),
            Shape::Cuboid(b) => b.half_extents.iter().any(|h| bad(*h)),
            Shape::Plane(p) => {
                !((p.normal.norm() - 1.0).abs() < 1e-6) || !p.offset.is_finite()
            }
            Shape::Capsule(c) => bad(c.radius) || !(c.half_length >= 0.0) || !c.half_length.is_finite(),
            Shape::TriMesh(m) => m.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tumble_math::Quat;

    #[test]
    fn test_constructors_reject_degenerate() {
        assert!(Shape::sphere(0.0).is_err());
        assert!(Shape::sphere(f64::NAN).is_err());
        assert!(Shape::cuboid(1.0, 0.0, 1.0).is_err());
        assert!(Shape::plane(Vec3::zeros(), 0.0).is_err());
        assert!(Shape::capsule(0.5, -1.0).is_err());
        assert!(Shape::capsule(0.5, 0.0).is_ok());
    }

    #[test]
    fn test_plane_is_normalized() {
        let Shape::Plane(p) = Shape::plane(Vec3::new(0.0, 0.0, 2.0), 4.0).unwrap() else {
            panic!("expected plane");
        };
        assert!((p.normal - Vec3::z()).norm() < 1e-12);
        assert!((p.offset - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_world_plane_offset() {
        let p = Plane {
            normal: Vec3::z(),
            offset: 0.0,
        };
        let pose = Pose::translation(0.0, 0.0, 3.0);
        let (n, d) = p.world(&pose);
        assert!((n - Vec3::z()).norm() < 1e-12);
        assert!((d - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_capsule_aabb() {
        let s = Shape::capsule(0.5, 2.0).unwrap();
        let pose = Pose::from_parts(
            Vec3::new(1.0, 0.0, 0.0).into(),
            Quat::from_axis_angle(&Vec3::y_axis(), std::f64::consts::FRAC_PI_2),
        );
        let b = s.aabb(&pose).unwrap();
        // Rotated onto x: spans 1 +- (1 + 0.5).
        assert!((b.min.x - -0.5).abs() < 1e-12);
        assert!((b.max.x - 2.5).abs() < 1e-12);
        assert!((b.max.z - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_plane_has_no_bounds() {
        let s = Shape::plane(Vec3::z(), 0.0).unwrap();
        assert!(s.is_infinite());
        assert!(s.aabb(&Pose::identity()).is_none());
        assert!(s.mass_properties(1.0).is_none());
    }

    #[test]
    fn test_box_mass_uses_full_sides() {
        let s = Shape::cuboid(1.0, 2.0, 3.0).unwrap();
        let m = s.mass_properties(2.0).unwrap();
        assert!((m.mass - 12.0).abs() < 1e-12);
    }
}
