//! Capsule routines and segment helpers.
//!
//! A capsule is a segment swept by a sphere, so each routine reduces to
//! finding the relevant points on the core segment and delegating to the
//! sphere tests.

use tumble_math::{Point3, Pose, Vec3};

use super::sphere::{sphere_box, sphere_plane, sphere_sphere};
use crate::contact::ContactGeom;

/// Segments closer to parallel than this (sine of the angle) use the
/// two-contact overlap path.
const PARALLEL_EPS: f64 = 1e-4;

/// Closest point to `p` on segment `a`-`b`.
pub fn closest_on_segment(p: &Point3, a: &Point3, b: &Point3) -> Point3 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 < 1e-24 {
        return *a;
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    a + ab * t
}

/// Closest points between segments `p1`-`q1` and `p2`-`q2`.
pub fn segment_segment(p1: &Point3, q1: &Point3, p2: &Point3, q2: &Point3) -> (Point3, Point3) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.norm_squared();
    let e = d2.norm_squared();
    let f = d2.dot(&r);
    let eps = 1e-24;

    let (s, t) = if a <= eps && e <= eps {
        (0.0, 0.0)
    } else if a <= eps {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(&r);
        if e <= eps {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(&d2);
            let denom = a * e - b * b;
            let mut s = if denom > eps {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };
    (p1 + d1 * s, p2 + d2 * t)
}

/// Capsule A (segment `a0`-`a1`, radius `ra`) against sphere B.
pub fn capsule_sphere(
    a0: &Point3,
    a1: &Point3,
    ra: f64,
    c: &Point3,
    rb: f64,
    out: &mut Vec<ContactGeom>,
) {
    let q = closest_on_segment(c, a0, a1);
    sphere_sphere(&q, ra, c, rb, out);
}

/// Capsule A against capsule B. Parallel overlapping capsules get a contact
/// at each end of the overlap.
#[allow(clippy::too_many_arguments)]
pub fn capsule_capsule(
    a0: &Point3,
    a1: &Point3,
    ra: f64,
    b0: &Point3,
    b1: &Point3,
    rb: f64,
    out: &mut Vec<ContactGeom>,
) {
    let da = a1 - a0;
    let db = b1 - b0;
    let (la, lb) = (da.norm(), db.norm());
    if la > 1e-12 && lb > 1e-12 && (da / la).cross(&(db / lb)).norm() < PARALLEL_EPS {
        let s0 = (b0 - a0).dot(&da) / (la * la);
        let s1 = (b1 - a0).dot(&da) / (la * la);
        let lo = s0.min(s1).max(0.0);
        let hi = s0.max(s1).min(1.0);
        if hi - lo > 1e-9 {
            let before = out.len();
            for s in [lo, hi] {
                let pa = a0 + da * s;
                let pb = closest_on_segment(&pa, b0, b1);
                sphere_sphere(&pa, ra, &pb, rb, out);
            }
            if out.len() > before {
                return;
            }
        }
    }
    let (pa, pb) = segment_segment(a0, a1, b0, b1);
    sphere_sphere(&pa, ra, &pb, rb, out);
}

/// Signed distance from a point to a box in the box frame (negative inside).
fn box_signed_distance(p: &Point3, half: &Vec3) -> f64 {
    let q = Vec3::new(p.x.abs() - half.x, p.y.abs() - half.y, p.z.abs() - half.z);
    let outside = Vec3::new(q.x.max(0.0), q.y.max(0.0), q.z.max(0.0)).norm();
    outside + q.max().min(0.0)
}

/// Capsule A against box B. The deepest point of the core segment and both
/// endpoints are tested as spheres.
pub fn capsule_box(
    a0: &Point3,
    a1: &Point3,
    r: f64,
    pose: &Pose,
    half: &Vec3,
    out: &mut Vec<ContactGeom>,
) {
    let l0 = pose.inverse_transform_point(a0);
    let l1 = pose.inverse_transform_point(a1);
    let f = |t: f64| box_signed_distance(&(l0 + (l1 - l0) * t), half);

    // Signed distance to a convex set is convex along a line.
    let g = 0.5 * (5.0_f64.sqrt() - 1.0);
    let (mut lo, mut hi) = (0.0, 1.0);
    let mut x1 = hi - g * (hi - lo);
    let mut x2 = lo + g * (hi - lo);
    let (mut f1, mut f2) = (f(x1), f(x2));
    for _ in 0..48 {
        if f1 < f2 {
            hi = x2;
            x2 = x1;
            f2 = f1;
            x1 = hi - g * (hi - lo);
            f1 = f(x1);
        } else {
            lo = x1;
            x1 = x2;
            f1 = f2;
            x2 = lo + g * (hi - lo);
            f2 = f(x2);
        }
    }
    let mut t = 0.5 * (lo + hi);
    for end in [0.0, 1.0] {
        if f(end) < f(t) {
            t = end;
        }
    }

    let start = out.len();
    let deepest = a0 + (a1 - a0) * t;
    sphere_box(&deepest, r, pose, half, out);
    for end in [a0, a1] {
        if (end - deepest).norm() < 1e-9 {
            continue;
        }
        let mut tmp = Vec::with_capacity(1);
        sphere_box(end, r, pose, half, &mut tmp);
        for c in tmp {
            let dup = out[start..]
                .iter()
                .any(|o| (o.position - c.position).norm() < 1e-9);
            if !dup {
                out.push(c);
            }
        }
    }
}

/// Capsule A against the world half-space `n · x <= d` (B).
pub fn capsule_plane(a0: &Point3, a1: &Point3, r: f64, n: &Vec3, d: f64, out: &mut Vec<ContactGeom>) {
    sphere_plane(a0, r, n, d, out);
    if (a1 - a0).norm() > 1e-12 {
        sphere_plane(a1, r, n, d, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_segment_crossing() {
        let (a, b) = segment_segment(
            &Point3::new(-1.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, -1.0, 1.0),
            &Point3::new(0.0, 1.0, 1.0),
        );
        assert!((a - Point3::origin()).norm() < 1e-12);
        assert!((b - Point3::new(0.0, 0.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_segment_segment_clamped() {
        let (a, b) = segment_segment(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(3.0, 1.0, 0.0),
            &Point3::new(3.0, 2.0, 0.0),
        );
        assert!((a - Point3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((b - Point3::new(3.0, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_parallel_capsules_two_contacts() {
        let mut out = Vec::new();
        capsule_capsule(
            &Point3::new(-1.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            0.5,
            &Point3::new(0.0, 0.0, 0.9),
            &Point3::new(2.0, 0.0, 0.9),
            0.5,
            &mut out,
        );
        assert_eq!(out.len(), 2);
        for c in &out {
            assert!((c.depth - 0.1).abs() < 1e-9);
            assert!((c.normal - Vec3::z()).norm() < 1e-9);
        }
        assert!((out[0].position.x - 0.0).abs() < 1e-9);
        assert!((out[1].position.x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_capsule_sphere() {
        let mut out = Vec::new();
        capsule_sphere(
            &Point3::new(0.0, 0.0, -1.0),
            &Point3::new(0.0, 0.0, 1.0),
            0.5,
            &Point3::new(0.8, 0.0, 0.3),
            0.5,
            &mut out,
        );
        assert_eq!(out.len(), 1);
        assert!((out[0].depth - 0.2).abs() < 1e-12);
        assert!((out[0].normal - Vec3::x()).norm() < 1e-12);
    }

    #[test]
    fn test_capsule_lying_on_box() {
        let mut out = Vec::new();
        // Capsule along x resting 0.05 into the top face of a 4 x 4 x 1 box.
        capsule_box(
            &Point3::new(-1.0, 0.0, 0.95),
            &Point3::new(1.0, 0.0, 0.95),
            0.5,
            &Pose::identity(),
            &Vec3::new(2.0, 2.0, 0.5),
            &mut out,
        );
        assert!(out.len() >= 2);
        for c in &out {
            assert!((c.depth - 0.05).abs() < 1e-6);
            assert!((c.normal + Vec3::z()).norm() < 1e-9);
        }
        assert!(out.iter().any(|c| (c.position.x + 1.0).abs() < 1e-9));
        assert!(out.iter().any(|c| (c.position.x - 1.0).abs() < 1e-9));
    }

    #[test]
    fn test_capsule_tip_into_box() {
        let mut out = Vec::new();
        capsule_box(
            &Point3::new(0.0, 0.0, 0.8),
            &Point3::new(0.0, 0.0, 2.8),
            0.5,
            &Pose::identity(),
            &Vec3::repeat(0.5),
            &mut out,
        );
        assert_eq!(out.len(), 1);
        assert!((out[0].depth - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_capsule_plane_both_ends() {
        let mut out = Vec::new();
        capsule_plane(
            &Point3::new(-1.0, 0.0, 0.45),
            &Point3::new(1.0, 0.0, 0.45),
            0.5,
            &Vec3::z(),
            0.0,
            &mut out,
        );
        assert_eq!(out.len(), 2);
        assert!((out[0].depth - 0.05).abs() < 1e-12);
    }
}
