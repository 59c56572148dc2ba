//! Box against box and box against plane.
//!
//! Box-box runs a separating-axis test over the 15 candidate axes (three
//! face normals per box and nine edge cross products). A face axis yields a
//! contact patch by clipping the incident face against the side planes of
//! the reference face; an edge axis yields one contact at the closest points
//! of the two edges.

use tumble_math::{Mat3, Point3, Pose, Vec3};

use crate::contact::ContactGeom;

/// Edge axes must beat the best face axis by this factor to be chosen.
const EDGE_BIAS: f64 = 1.05;

#[derive(Debug, Clone, Copy)]
enum Axis {
    FaceA(usize),
    FaceB(usize),
    Edge(usize, usize),
}

/// Box A (`pa`, `ha`) against box B (`pb`, `hb`).
pub fn box_box(pa: &Pose, ha: &Vec3, pb: &Pose, hb: &Vec3, out: &mut Vec<ContactGeom>) {
    let ra = pa.rotation.to_rotation_matrix().into_inner();
    let rb = pb.rotation.to_rotation_matrix().into_inner();
    let ca = Point3::from(pa.translation.vector);
    let cb = Point3::from(pb.translation.vector);

    // R[i][j] = a_i . b_j, t in A's frame.
    let r = ra.transpose() * rb;
    let abs_r = r.abs().add_scalar(1e-12);
    let t_world = cb - ca;
    let t = ra.transpose() * t_world;

    let mut best_depth = f64::INFINITY;
    let mut best_axis = Axis::FaceA(0);
    let mut best_normal = Vec3::zeros();

    for i in 0..3 {
        let rb_proj = hb.x * abs_r[(i, 0)] + hb.y * abs_r[(i, 1)] + hb.z * abs_r[(i, 2)];
        let depth = ha[i] + rb_proj - t[i].abs();
        if depth < 0.0 {
            return;
        }
        if depth < best_depth {
            best_depth = depth;
            best_axis = Axis::FaceA(i);
            let s = if t[i] < 0.0 { -1.0 } else { 1.0 };
            best_normal = ra.column(i) * s;
        }
    }

    for j in 0..3 {
        let tb = r[(0, j)] * t.x + r[(1, j)] * t.y + r[(2, j)] * t.z;
        let ra_proj = ha.x * abs_r[(0, j)] + ha.y * abs_r[(1, j)] + ha.z * abs_r[(2, j)];
        let depth = hb[j] + ra_proj - tb.abs();
        if depth < 0.0 {
            return;
        }
        if depth < best_depth {
            best_depth = depth;
            best_axis = Axis::FaceB(j);
            let s = if tb < 0.0 { -1.0 } else { 1.0 };
            best_normal = rb.column(j) * s;
        }
    }

    let mut edge_depth = f64::INFINITY;
    let mut edge_axis = (0, 0);
    let mut edge_normal = Vec3::zeros();
    for i in 0..3 {
        let (i1, i2) = ((i + 1) % 3, (i + 2) % 3);
        for j in 0..3 {
            let (j1, j2) = ((j + 1) % 3, (j + 2) % 3);
            // Axis a_i x b_j expressed in A's frame.
            let len = (1.0 - r[(i, j)] * r[(i, j)]).max(0.0).sqrt();
            if len < 1e-6 {
                continue;
            }
            let proj_a = ha[i1] * abs_r[(i2, j)] + ha[i2] * abs_r[(i1, j)];
            let proj_b = hb[j1] * abs_r[(i, j2)] + hb[j2] * abs_r[(i, j1)];
            let dist = t[i2] * r[(i1, j)] - t[i1] * r[(i2, j)];
            let depth = (proj_a + proj_b - dist.abs()) / len;
            if depth < 0.0 {
                return;
            }
            if depth < edge_depth {
                let axis = ra.column(i).cross(&rb.column(j)) / len;
                let s = if axis.dot(&t_world) < 0.0 { -1.0 } else { 1.0 };
                edge_depth = depth;
                edge_axis = (i, j);
                edge_normal = axis * s;
            }
        }
    }
    if edge_depth * EDGE_BIAS < best_depth {
        best_depth = edge_depth;
        best_axis = Axis::Edge(edge_axis.0, edge_axis.1);
        best_normal = edge_normal;
    }

    match best_axis {
        Axis::Edge(i, j) => {
            edge_contact(&ca, &ra, ha, i, &cb, &rb, hb, j, &best_normal, best_depth, out)
        }
        Axis::FaceA(i) => {
            clip_faces(&ca, &ra, ha, i, &cb, &rb, hb, &best_normal, false, out);
        }
        Axis::FaceB(j) => {
            // Reference is B: its outward normal points toward A.
            clip_faces(&cb, &rb, hb, j, &ca, &ra, ha, &-best_normal, true, out);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn edge_contact(
    ca: &Point3,
    ra: &Mat3,
    ha: &Vec3,
    i: usize,
    cb: &Point3,
    rb: &Mat3,
    hb: &Vec3,
    j: usize,
    n: &Vec3,
    depth: f64,
    out: &mut Vec<ContactGeom>,
) {
    // Supporting edge of A toward B, and of B toward A.
    let mut pa = *ca;
    let mut pb = *cb;
    for k in 0..3 {
        if k != i {
            let s = if ra.column(k).dot(n) > 0.0 { 1.0 } else { -1.0 };
            pa += ra.column(k) * (s * ha[k]);
        }
        if k != j {
            let s = if rb.column(k).dot(n) > 0.0 { -1.0 } else { 1.0 };
            pb += rb.column(k) * (s * hb[k]);
        }
    }
    let ua = ra.column(i).into_owned();
    let ub = rb.column(j).into_owned();
    let (sa, sb) = line_closest_params(&pa, &ua, &pb, &ub);
    let qa = pa + ua * sa.clamp(-ha[i], ha[i]);
    let qb = pb + ub * sb.clamp(-hb[j], hb[j]);
    out.push(ContactGeom::new(nalgebra::center(&qa, &qb), *n, depth));
}

/// Parameters of the closest points on lines `pa + s ua` and `pb + t ub`.
fn line_closest_params(pa: &Point3, ua: &Vec3, pb: &Point3, ub: &Vec3) -> (f64, f64) {
    let p = pb - pa;
    let uaub = ua.dot(ub);
    let q1 = ua.dot(&p);
    let q2 = -ub.dot(&p);
    let d = 1.0 - uaub * uaub;
    if d <= 1e-12 {
        return (0.0, 0.0);
    }
    let d = 1.0 / d;
    ((q1 + uaub * q2) * d, (uaub * q1 + q2) * d)
}

/// Clip the incident box's most anti-parallel face against the reference
/// face `axis` of box R, whose outward normal is `nr`. Contacts are emitted
/// with the normal from A into B; `ref_is_b` says which box R is.
#[allow(clippy::too_many_arguments)]
fn clip_faces(
    cr: &Point3,
    rr: &Mat3,
    hr: &Vec3,
    axis: usize,
    ci: &Point3,
    ri: &Mat3,
    hi: &Vec3,
    nr: &Vec3,
    ref_is_b: bool,
    out: &mut Vec<ContactGeom>,
) {
    // Incident face: outward normal most opposed to nr.
    let mut k = 0;
    let mut best = 0.0;
    for m in 0..3 {
        let d = ri.column(m).dot(nr);
        if d.abs() > best {
            best = d.abs();
            k = m;
        }
    }
    let sign = if ri.column(k).dot(nr) > 0.0 { -1.0 } else { 1.0 };
    let face_c = ci + ri.column(k) * (sign * hi[k]);
    let (k1, k2) = ((k + 1) % 3, (k + 2) % 3);
    let u: Vec3 = ri.column(k1) * hi[k1];
    let v: Vec3 = ri.column(k2) * hi[k2];
    let mut poly = vec![face_c + u + v, face_c - u + v, face_c - u - v, face_c + u - v];

    let ref_c = cr + nr * hr[axis];
    let (a1, a2) = ((axis + 1) % 3, (axis + 2) % 3);
    for &(side, half) in &[(a1, hr[a1]), (a2, hr[a2])] {
        let dir = rr.column(side).into_owned();
        let off = dir.dot(&ref_c.coords);
        poly = clip_polygon(&poly, &dir, off + half);
        poly = clip_polygon(&poly, &-dir, -off + half);
        if poly.is_empty() {
            return;
        }
    }

    let n = if ref_is_b { -nr } else { *nr };
    for p in poly {
        let depth = (ref_c - p).dot(nr);
        if depth >= 0.0 {
            out.push(ContactGeom::new(p, n, depth));
        }
    }
}

/// Keep the part of `poly` with `n · x <= d` (Sutherland-Hodgman).
fn clip_polygon(poly: &[Point3], n: &Vec3, d: f64) -> Vec<Point3> {
    let mut out = Vec::with_capacity(poly.len() + 2);
    for (idx, p) in poly.iter().enumerate() {
        let q = &poly[(idx + 1) % poly.len()];
        let dp = n.dot(&p.coords) - d;
        let dq = n.dot(&q.coords) - d;
        if dp <= 0.0 {
            out.push(*p);
        }
        if (dp < 0.0 && dq > 0.0) || (dp > 0.0 && dq < 0.0) {
            let t = dp / (dp - dq);
            out.push(p + (q - p) * t);
        }
    }
    out
}

/// Box A against the world half-space `n · x <= d` (B): every corner below
/// the surface is a contact.
pub fn box_plane(pose: &Pose, half: &Vec3, n: &Vec3, d: f64, out: &mut Vec<ContactGeom>) {
    for sx in [-1.0, 1.0] {
        for sy in [-1.0, 1.0] {
            for sz in [-1.0, 1.0] {
                let corner = pose * Point3::new(sx * half.x, sy * half.y, sz * half.z);
                let depth = d - n.dot(&corner.coords);
                if depth >= 0.0 {
                    out.push(ContactGeom::new(corner, -n, depth));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tumble_math::Quat;

    fn unit() -> Vec3 {
        Vec3::repeat(0.5)
    }

    #[test]
    fn test_stacked_boxes_face_contact() {
        let mut out = Vec::new();
        let pa = Pose::identity();
        let pb = Pose::translation(0.0, 0.0, 0.9);
        box_box(&pa, &unit(), &pb, &unit(), &mut out);
        assert_eq!(out.len(), 4);
        for c in &out {
            assert!((c.normal - Vec3::z()).norm() < 1e-12);
            assert!((c.depth - 0.1).abs() < 1e-9);
        }
    }

    #[test]
    fn test_separated_boxes() {
        let mut out = Vec::new();
        box_box(
            &Pose::identity(),
            &unit(),
            &Pose::translation(1.2, 0.0, 0.0),
            &unit(),
            &mut out,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_box_box_swap_negates_normal() {
        let pa = Pose::identity();
        let pb = Pose::from_parts(
            Vec3::new(0.2, 0.1, 0.95).into(),
            Quat::from_axis_angle(&Vec3::z_axis(), 0.3),
        );
        let mut ab = Vec::new();
        let mut ba = Vec::new();
        box_box(&pa, &unit(), &pb, &unit(), &mut ab);
        box_box(&pb, &unit(), &pa, &unit(), &mut ba);
        assert!(!ab.is_empty());
        assert!(!ba.is_empty());
        assert!((ab[0].normal + ba[0].normal).norm() < 1e-9);
        // Normal from A (bottom) into B (top).
        assert!(ab[0].normal.z > 0.99);
    }

    #[test]
    fn test_edge_edge_contact() {
        // Two boxes rotated 45 degrees about orthogonal axes meet edge to edge.
        let pa = Pose::from_parts(
            Vec3::zeros().into(),
            Quat::from_axis_angle(&Vec3::x_axis(), std::f64::consts::FRAC_PI_4),
        );
        let reach = 0.5 * std::f64::consts::SQRT_2;
        let pb = Pose::from_parts(
            Vec3::new(0.0, 0.0, 2.0 * reach - 0.05).into(),
            Quat::from_axis_angle(&Vec3::y_axis(), std::f64::consts::FRAC_PI_4),
        );
        let mut out = Vec::new();
        box_box(&pa, &unit(), &pb, &unit(), &mut out);
        assert_eq!(out.len(), 1);
        assert!((out[0].depth - 0.05).abs() < 1e-9);
        assert!((out[0].normal - Vec3::z()).norm() < 1e-9);
        assert!((out[0].position - Point3::new(0.0, 0.0, reach - 0.025)).norm() < 1e-9);
    }

    #[test]
    fn test_box_resting_on_plane() {
        let mut out = Vec::new();
        let pose = Pose::translation(0.0, 0.0, 0.49);
        box_plane(&pose, &unit(), &Vec3::z(), 0.0, &mut out);
        assert_eq!(out.len(), 4);
        for c in &out {
            assert!((c.depth - 0.01).abs() < 1e-12);
            assert!((c.normal + Vec3::z()).norm() < 1e-12);
        }
    }
}
