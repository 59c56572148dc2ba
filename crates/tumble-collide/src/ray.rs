//! Ray casts against placed shapes.

use serde::{Deserialize, Serialize};
use tumble_math::{Dir3, Point3, Pose, Vec3};

use crate::mesh::{TriMesh, Triangle};
use crate::shape::{Capsule, Cuboid, Plane, Shape, Sphere};

/// A ray in 3D space defined by origin and direction.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// Origin point of the ray.
    pub origin: Point3,
    /// Unit direction of the ray.
    pub direction: Dir3,
}

impl Ray {
    /// Create a ray; the direction is normalized. `None` for a zero direction.
    pub fn new(origin: Point3, direction: Vec3) -> Option<Self> {
        let direction = Dir3::try_new(direction, 1e-12)?;
        Some(Self { origin, direction })
    }

    /// Evaluate the ray at parameter `t`: `origin + t * direction`.
    #[inline]
    pub fn at(&self, t: f64) -> Point3 {
        self.origin + self.direction.as_ref() * t
    }

    /// The same ray expressed in the local frame of `pose`.
    pub fn to_local(&self, pose: &Pose) -> Ray {
        Ray {
            origin: pose.inverse_transform_point(&self.origin),
            direction: Dir3::new_unchecked(pose.inverse_transform_vector(self.direction.as_ref())),
        }
    }
}

/// Closest intersection of a ray with a shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RayHit {
    /// World-space hit point.
    pub point: Point3,
    /// Unit surface normal facing the ray origin side.
    pub normal: Vec3,
    /// Distance from the ray origin.
    pub distance: f64,
}

/// Local-frame hit: `(t, normal)`.
type LocalHit = (f64, Vec3);

/// Cast `ray` against `shape` placed at `pose`, reporting the first hit
/// within `max_len`. A ray starting inside a solid reports the exit point
/// with an inward normal.
pub fn cast_ray(shape: &Shape, pose: &Pose, ray: &Ray, max_len: f64) -> Option<RayHit> {
    let local = ray.to_local(pose);
    let (t, n) = match shape {
        Shape::Sphere(s) => ray_sphere(&local, s, max_len),
        Shape::Cuboid(b) => ray_box(&local, b, max_len),
        Shape::Plane(p) => ray_plane(&local, p, max_len),
        Shape::Capsule(c) => ray_capsule(&local, c, max_len),
        Shape::TriMesh(m) => ray_mesh(&local, m, max_len),
    }?;
    Some(RayHit {
        point: ray.at(t),
        normal: pose.rotation * n,
        distance: t,
    })
}

fn sphere_at(ray: &Ray, center: &Point3, r: f64, max_len: f64) -> Option<LocalHit> {
    let oc = ray.origin - center;
    let d = ray.direction.as_ref();
    let b = oc.dot(d);
    let c = oc.norm_squared() - r * r;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let sq = disc.sqrt();
    let inside = c < 0.0;
    let t = if inside { -b + sq } else { -b - sq };
    if t < 0.0 || t > max_len {
        return None;
    }
    let n = (ray.at(t) - center) / r;
    Some((t, if inside { -n } else { n }))
}

fn ray_sphere(ray: &Ray, s: &Sphere, max_len: f64) -> Option<LocalHit> {
    sphere_at(ray, &Point3::origin(), s.radius, max_len)
}

fn ray_box(ray: &Ray, b: &Cuboid, max_len: f64) -> Option<LocalHit> {
    let h = &b.half_extents;
    let d = ray.direction.as_ref();
    let mut t_enter = f64::NEG_INFINITY;
    let mut t_exit = f64::INFINITY;
    let mut enter_axis = 0;
    let mut exit_axis = 0;
    for i in 0..3 {
        if d[i].abs() < 1e-300 {
            if ray.origin[i].abs() > h[i] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d[i];
        let mut t0 = (-h[i] - ray.origin[i]) * inv;
        let mut t1 = (h[i] - ray.origin[i]) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        if t0 > t_enter {
            t_enter = t0;
            enter_axis = i;
        }
        if t1 < t_exit {
            t_exit = t1;
            exit_axis = i;
        }
    }
    if t_enter > t_exit || t_exit < 0.0 {
        return None;
    }
    let (t, axis, inward) = if t_enter >= 0.0 {
        (t_enter, enter_axis, false)
    } else {
        (t_exit, exit_axis, true)
    };
    if t > max_len {
        return None;
    }
    // Outward normal of the face crossed is opposite the ray when entering.
    let mut n = Vec3::zeros();
    let toward = d[axis].signum();
    n[axis] = if inward { toward } else { -toward };
    Some((t, n))
}

fn ray_plane(ray: &Ray, p: &Plane, max_len: f64) -> Option<LocalHit> {
    let denom = p.normal.dot(ray.direction.as_ref());
    if denom.abs() < 1e-15 {
        return None;
    }
    let t = (p.offset - p.normal.dot(&ray.origin.coords)) / denom;
    if t < 0.0 || t > max_len {
        return None;
    }
    Some((t, if denom < 0.0 { p.normal } else { -p.normal }))
}

fn ray_capsule(ray: &Ray, c: &Capsule, max_len: f64) -> Option<LocalHit> {
    let hl = c.half_length;
    let r = c.radius;
    let mut best: Option<LocalHit> = None;
    let mut consider = |hit: Option<LocalHit>| {
        if let Some(h) = hit {
            if best.map_or(true, |b| h.0 < b.0) {
                best = Some(h);
            }
        }
    };

    // Cylinder wall, restricted to |z| <= hl.
    let (o, d) = (ray.origin, ray.direction.as_ref());
    let a = d.x * d.x + d.y * d.y;
    if a > 1e-15 {
        let b = o.x * d.x + o.y * d.y;
        let cc = o.x * o.x + o.y * o.y - r * r;
        let disc = b * b - a * cc;
        if disc >= 0.0 {
            let sq = disc.sqrt();
            let inside = cc < 0.0;
            let t = if inside { (-b + sq) / a } else { (-b - sq) / a };
            let p = ray.at(t);
            if t >= 0.0 && t <= max_len && p.z.abs() <= hl {
                let n = Vec3::new(p.x, p.y, 0.0) / r;
                consider(Some((t, if inside { -n } else { n })));
            }
        }
    }
    for z in [-hl, hl] {
        let hit = sphere_at(ray, &Point3::new(0.0, 0.0, z), r, max_len);
        // Cap hits only count on the outer half of each sphere.
        consider(hit.filter(|(t, _)| {
            let pz = ray.at(*t).z;
            if z < 0.0 { pz <= -hl } else { pz >= hl }
        }));
    }
    best
}

fn ray_triangle(ray: &Ray, tri: &Triangle) -> Option<f64> {
    // Moller-Trumbore, two-sided.
    let e1 = tri.b - tri.a;
    let e2 = tri.c - tri.a;
    let d = ray.direction.as_ref();
    let p = d.cross(&e2);
    let det = e1.dot(&p);
    if det.abs() < 1e-15 {
        return None;
    }
    let inv = 1.0 / det;
    let s = ray.origin - tri.a;
    let u = s.dot(&p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(&e1);
    let v = d.dot(&q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(&q) * inv;
    (t >= 0.0).then_some(t)
}

fn ray_mesh(ray: &Ray, mesh: &TriMesh, max_len: f64) -> Option<LocalHit> {
    let mut candidates = Vec::new();
    mesh.tree()
        .query_ray(&ray.origin, ray.direction.as_ref(), max_len, &mut candidates);
    let mut best: Option<LocalHit> = None;
    for i in candidates {
        let tri = mesh.triangle(i);
        let Some(t) = ray_triangle(ray, &tri) else {
            continue;
        };
        if t > max_len || best.is_some_and(|b| t >= b.0) {
            continue;
        }
        let Some(n) = tri.normal() else {
            continue;
        };
        let n = if n.dot(ray.direction.as_ref()) > 0.0 { -n } else { n };
        best = Some((t, n));
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use tumble_math::Quat;

    fn down_from(x: f64, y: f64, z: f64) -> Ray {
        Ray::new(Point3::new(x, y, z), -Vec3::z()).unwrap()
    }

    #[test]
    fn test_ray_sphere_from_outside_and_inside() {
        let s = Shape::sphere(1.0).unwrap();
        let hit = cast_ray(&s, &Pose::translation(0.0, 0.0, 0.0), &down_from(0.0, 0.0, 5.0), 10.0).unwrap();
        assert!((hit.distance - 4.0).abs() < 1e-12);
        assert!((hit.normal - Vec3::z()).norm() < 1e-12);

        let hit = cast_ray(&s, &Pose::identity(), &down_from(0.0, 0.0, 0.0), 10.0).unwrap();
        assert!((hit.distance - 1.0).abs() < 1e-12);
        // Exit point, normal pointing back inside.
        assert!((hit.normal - Vec3::z()).norm() < 1e-12);

        assert!(cast_ray(&s, &Pose::identity(), &down_from(0.0, 0.0, 5.0), 3.0).is_none());
    }

    #[test]
    fn test_ray_rotated_box() {
        let b = Shape::cuboid(2.0, 2.0, 2.0).unwrap();
        let pose = Pose::from_parts(
            Vec3::new(0.0, 0.0, 0.0).into(),
            Quat::from_axis_angle(&Vec3::z_axis(), 0.7),
        );
        let hit = cast_ray(&b, &pose, &down_from(0.1, 0.1, 4.0), 10.0).unwrap();
        assert!((hit.distance - 3.0).abs() < 1e-12);
        assert!((hit.normal - Vec3::z()).norm() < 1e-12);
    }

    #[test]
    fn test_ray_plane_faces_origin_side() {
        let p = Shape::plane(Vec3::z(), 0.0).unwrap();
        let hit = cast_ray(&p, &Pose::identity(), &down_from(1.0, 2.0, 3.0), 10.0).unwrap();
        assert!((hit.distance - 3.0).abs() < 1e-12);
        assert!((hit.point - Point3::new(1.0, 2.0, 0.0)).norm() < 1e-12);
        let up = Ray::new(Point3::new(0.0, 0.0, -1.0), Vec3::z()).unwrap();
        let hit = cast_ray(&p, &Pose::identity(), &up, 10.0).unwrap();
        assert!((hit.normal + Vec3::z()).norm() < 1e-12);
    }

    #[test]
    fn test_ray_capsule_cap_and_wall() {
        let c = Shape::capsule(0.5, 2.0).unwrap();
        let hit = cast_ray(&c, &Pose::identity(), &down_from(0.0, 0.0, 5.0), 10.0).unwrap();
        assert!((hit.distance - 3.5).abs() < 1e-12);
        let side = Ray::new(Point3::new(3.0, 0.0, 0.5), -Vec3::x()).unwrap();
        let hit = cast_ray(&c, &Pose::identity(), &side, 10.0).unwrap();
        assert!((hit.distance - 2.5).abs() < 1e-12);
        assert!((hit.normal - Vec3::x()).norm() < 1e-12);
    }

    #[test]
    fn test_ray_mesh() {
        let m = TriMesh::new(
            vec![
                Point3::new(-1.0, -1.0, 0.0),
                Point3::new(1.0, -1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
        .unwrap();
        let s = Shape::trimesh(m);
        let hit = cast_ray(&s, &Pose::translation(0.0, 0.0, 1.0), &down_from(0.0, 0.0, 3.0), 10.0).unwrap();
        assert!((hit.distance - 2.0).abs() < 1e-12);
        assert!((hit.normal - Vec3::z()).norm() < 1e-12);
        assert!(cast_ray(&s, &Pose::identity(), &down_from(5.0, 0.0, 3.0), 10.0).is_none());
    }

    #[test]
    fn test_zero_direction_rejected() {
        assert!(Ray::new(Point3::origin(), Vec3::zeros()).is_none());
    }
}
