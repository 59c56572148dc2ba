//! Axis-aligned bounding boxes.

use serde::{Deserialize, Serialize};
use tumble_math::{Point3, Pose, Vec3};

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Aabb {
    /// Create an AABB from min and max corners.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Create an empty (inverted) AABB suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Box with the given centre and half extents.
    pub fn from_center_half_extents(center: Point3, half: Vec3) -> Self {
        Self::new(center - half, center + half)
    }

    /// Smallest box containing all points.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3>) -> Self {
        let mut aabb = Self::empty();
        for p in points {
            aabb.include_point(p);
        }
        aabb
    }

    /// Expand this AABB to include a point.
    pub fn include_point(&mut self, p: &Point3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Expand this AABB to include another box.
    pub fn include_aabb(&mut self, other: &Aabb) {
        self.include_point(&other.min);
        self.include_point(&other.max);
    }

    /// Union of two boxes.
    pub fn merged(&self, other: &Aabb) -> Aabb {
        let mut out = *self;
        out.include_aabb(other);
        out
    }

    /// Test if two AABBs overlap (touching counts as overlap).
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Whether `other` lies entirely inside this box (boundaries inclusive).
    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.min.z <= other.min.z
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
            && self.max.z >= other.max.z
    }

    /// Whether a point lies inside the box (boundaries inclusive).
    pub fn contains_point(&self, p: &Point3) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    /// Expand the AABB by a tolerance in all directions.
    pub fn expand(&mut self, tol: f64) {
        self.min.x -= tol;
        self.min.y -= tol;
        self.min.z -= tol;
        self.max.x += tol;
        self.max.y += tol;
        self.max.z += tol;
    }

    /// Centre point.
    pub fn center(&self) -> Point3 {
        nalgebra::center(&self.min, &self.max)
    }

    /// Half extents.
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Edge lengths.
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Surface area (used to judge split quality).
    pub fn surface_area(&self) -> f64 {
        let d = self.size();
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    /// Index of the axis with the largest extent.
    pub fn longest_axis(&self) -> usize {
        let d = self.size();
        if d.x >= d.y && d.x >= d.z {
            0
        } else if d.y >= d.z {
            1
        } else {
            2
        }
    }

    /// Whether all coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.min.iter().chain(self.max.iter()).all(|c| c.is_finite())
    }

    /// Whether `min <= max` on every axis.
    pub fn is_valid(&self) -> bool {
        (0..3).all(|i| self.min[i] <= self.max[i])
    }

    /// World-space box enclosing this box after a rigid transform.
    pub fn transformed(&self, pose: &Pose) -> Aabb {
        let c = pose * self.center();
        let r = pose.rotation.to_rotation_matrix();
        let h = r.matrix().abs() * self.half_extents();
        Aabb::from_center_half_extents(c, h)
    }

    /// Slab test against a ray `origin + t * dir`, `t` in `[0, max_t]`.
    ///
    /// Returns the entry and exit parameters when the ray hits the box.
    pub fn intersect_ray(&self, origin: &Point3, dir: &Vec3, max_t: f64) -> Option<(f64, f64)> {
        let mut t_min = 0.0_f64;
        let mut t_max = max_t;
        for i in 0..3 {
            if dir[i].abs() < 1e-300 {
                if origin[i] < self.min[i] || origin[i] > self.max[i] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / dir[i];
            let mut t0 = (self.min[i] - origin[i]) * inv;
            let mut t1 = (self.max[i] - origin[i]) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some((t_min, t_max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tumble_math::Quat;

    fn unit() -> Aabb {
        Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_overlap_touching_counts() {
        let a = unit();
        let b = Aabb::new(Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        assert!(a.overlaps(&b));
        let c = Aabb::new(Point3::new(1.5, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_contains_and_merge() {
        let a = unit();
        let b = Aabb::new(Point3::new(2.0, 2.0, 2.0), Point3::new(3.0, 3.0, 3.0));
        let m = a.merged(&b);
        assert!(m.contains(&a));
        assert!(m.contains(&b));
        assert!(!a.contains(&m));
        assert_eq!(m.longest_axis(), 0);
    }

    #[test]
    fn test_empty_is_invalid_until_expanded() {
        let mut e = Aabb::empty();
        assert!(!e.is_valid());
        e.include_point(&Point3::new(1.0, 2.0, 3.0));
        assert!(e.is_valid());
        assert_eq!(e.size(), Vec3::zeros());
    }

    #[test]
    fn test_transformed_rotation_encloses() {
        let a = Aabb::from_center_half_extents(Point3::origin(), Vec3::new(1.0, 0.1, 0.1));
        let pose = Pose::from_parts(
            Vec3::new(5.0, 0.0, 0.0).into(),
            Quat::from_axis_angle(&Vec3::z_axis(), std::f64::consts::FRAC_PI_2),
        );
        let t = a.transformed(&pose);
        assert!((t.center() - Point3::new(5.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((t.half_extents().y - 1.0).abs() < 1e-12);
        assert!((t.half_extents().x - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_ray_slab() {
        let a = unit();
        let hit = a.intersect_ray(&Point3::new(0.5, 0.5, -1.0), &Vec3::z(), 10.0);
        let (t0, t1) = hit.unwrap();
        assert!((t0 - 1.0).abs() < 1e-12);
        assert!((t1 - 2.0).abs() < 1e-12);
        assert!(a
            .intersect_ray(&Point3::new(2.0, 0.5, -1.0), &Vec3::z(), 10.0)
            .is_none());
        assert!(a
            .intersect_ray(&Point3::new(0.5, 0.5, -1.0), &Vec3::z(), 0.5)
            .is_none());
    }
}
