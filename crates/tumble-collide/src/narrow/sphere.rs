//! Sphere against sphere, box and plane.

use tumble_math::{Point3, Pose, Vec3};

use crate::contact::ContactGeom;

/// Sphere A at `ca` against sphere B at `cb`.
pub fn sphere_sphere(ca: &Point3, ra: f64, cb: &Point3, rb: f64, out: &mut Vec<ContactGeom>) {
    let d = cb - ca;
    let dist = d.norm();
    if dist > ra + rb {
        return;
    }
    // Coincident centres: any direction separates them.
    let n = if dist > 1e-12 { d / dist } else { Vec3::z() };
    let depth = ra + rb - dist;
    out.push(ContactGeom::new(ca + n * (ra - 0.5 * depth), n, depth));
}

/// Sphere A at `c` against box B placed at `pose` with `half` extents.
pub fn sphere_box(c: &Point3, r: f64, pose: &Pose, half: &Vec3, out: &mut Vec<ContactGeom>) {
    let p = pose.inverse_transform_point(c);
    let q = Point3::new(
        p.x.clamp(-half.x, half.x),
        p.y.clamp(-half.y, half.y),
        p.z.clamp(-half.z, half.z),
    );
    let diff = p - q;
    let dist = diff.norm();

    if dist > 1e-12 {
        if dist > r {
            return;
        }
        // Outside the box: normal runs from the sphere centre to the surface.
        let n = pose.rotation * (-diff / dist);
        out.push(ContactGeom::new(pose * q, n, r - dist));
        return;
    }

    // Centre inside: leave through the nearest face.
    let mut axis = 0;
    let mut face_dist = f64::INFINITY;
    for i in 0..3 {
        let d = half[i] - p[i].abs();
        if d < face_dist {
            face_dist = d;
            axis = i;
        }
    }
    let mut outward = Vec3::zeros();
    outward[axis] = if p[axis] >= 0.0 { 1.0 } else { -1.0 };
    let n = pose.rotation * -outward;
    out.push(ContactGeom::new(*c, n, r + face_dist));
}

/// Sphere A at `c` against the world half-space `n · x <= d` (B).
pub fn sphere_plane(c: &Point3, r: f64, n: &Vec3, d: f64, out: &mut Vec<ContactGeom>) {
    let depth = r - (n.dot(&c.coords) - d);
    if depth < 0.0 {
        return;
    }
    out.push(ContactGeom::new(c - n * r, -n, depth));
}
