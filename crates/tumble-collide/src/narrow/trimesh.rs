//! Triangle mesh routines.
//!
//! The mesh is always geom A. The other shape is brought into the mesh
//! frame, the mesh tree restricts the candidate triangles, and each
//! candidate runs an exact triangle test. Candidates are gathered up to the
//! caller's batch cap; reduction to the per-pair limit happens in the
//! dispatcher.

use tracing::trace;
use tumble_bvh::Aabb;
use tumble_math::{Point3, Pose, Vec3};

use super::capsule::segment_segment;
use crate::contact::{push_capped, ContactGeom};
use crate::mesh::{TriMesh, Triangle};

/// Edge axes must beat the best face axis by this factor to be chosen.
const EDGE_BIAS: f64 = 1.05;

/// Local-frame contact before mapping back to world.
type LocalContact = (Point3, Vec3, f64);

/// Tree traversal and candidate buffers kept between mesh queries.
#[derive(Debug, Clone, Default)]
pub struct MeshScratch {
    stack: Vec<u32>,
    tris: Vec<usize>,
    pair_stack: Vec<(u32, u32)>,
    pairs: Vec<(usize, usize)>,
    hits: Vec<LocalContact>,
}

impl MeshScratch {
    /// Triangles whose leaf boxes overlap `query`, left in `self.tris`.
    fn candidates(&mut self, mesh: &TriMesh, query: &Aabb) {
        self.tris.clear();
        mesh.tree().query_overlaps_with(query, &mut self.stack, &mut self.tris);
    }
}

/// Push a local contact mapped through `pose`, skipping duplicates of
/// contacts this call already produced. Returns `false` once `cap` is hit.
fn emit(out: &mut Vec<ContactGeom>, start: usize, cap: usize, pose: &Pose, c: LocalContact) -> bool {
    let position = pose * c.0;
    let normal = pose.rotation * c.1;
    let dup = out[start..].iter().any(|o| {
        (o.position - position).norm_squared() < 1e-18 && (o.normal - normal).norm_squared() < 1e-12
    });
    if dup {
        return out.len() < cap;
    }
    push_capped(out, cap, ContactGeom::new(position, normal, c.2))
}

/// Sphere at `c` (mesh frame) against one triangle. The normal points from
/// the triangle toward the sphere. Faces are one-sided: a centre behind the
/// face still resolves along the face normal.
fn sphere_triangle(tri: &Triangle, c: &Point3, r: f64) -> Option<LocalContact> {
    let nt = tri.normal()?;
    let (q, interior) = tri.closest_point(c);
    if interior {
        let sd = nt.dot(&(c - tri.a));
        if sd > r || sd < -r {
            return None;
        }
        return Some((q, nt, r - sd));
    }
    let d = c - q;
    let dist = d.norm();
    if dist > r {
        return None;
    }
    let n = if dist > 1e-12 { d / dist } else { nt };
    Some((q, n, r - dist))
}

/// Mesh A against sphere B.
pub fn mesh_sphere(
    mesh: &TriMesh,
    pose: &Pose,
    c: &Point3,
    r: f64,
    cap: usize,
    scratch: &mut MeshScratch,
    out: &mut Vec<ContactGeom>,
) {
    let start = out.len();
    let cl = pose.inverse_transform_point(c);
    let query = Aabb::from_center_half_extents(cl, Vec3::repeat(r));
    scratch.candidates(mesh, &query);
    for &t in &scratch.tris {
        if let Some(hit) = sphere_triangle(&mesh.triangle(t), &cl, r) {
            if !emit(out, start, cap, pose, hit) {
                break;
            }
        }
    }
    trace!(contacts = out.len() - start, "mesh-sphere");
}

/// Point on segment `p`-`q` closest to the triangle.
fn segment_point_nearest_triangle(tri: &Triangle, p: &Point3, q: &Point3) -> Point3 {
    if let Some(n) = tri.normal() {
        let dp = n.dot(&(p - tri.a));
        let dq = n.dot(&(q - tri.a));
        if (dp <= 0.0 && dq >= 0.0) || (dp >= 0.0 && dq <= 0.0) {
            let denom = dp - dq;
            if denom.abs() > 1e-15 {
                let x = p + (q - p) * (dp / denom);
                if tri.in_prism(&x) {
                    return x;
                }
            }
        }
    }
    let mut best = *p;
    let mut best_d = f64::INFINITY;
    for s in [*p, *q] {
        let d = (tri.closest_point(&s).0 - s).norm_squared();
        if d < best_d {
            best_d = d;
            best = s;
        }
    }
    for (u, v) in [(tri.a, tri.b), (tri.b, tri.c), (tri.c, tri.a)] {
        let (on_seg, on_edge) = segment_segment(p, q, &u, &v);
        let d = (on_seg - on_edge).norm_squared();
        if d < best_d {
            best_d = d;
            best = on_seg;
        }
    }
    best
}

/// Mesh A against capsule B (segment `b0`-`b1`, radius `r`).
pub fn mesh_capsule(
    mesh: &TriMesh,
    pose: &Pose,
    b0: &Point3,
    b1: &Point3,
    r: f64,
    cap: usize,
    scratch: &mut MeshScratch,
    out: &mut Vec<ContactGeom>,
) {
    let start = out.len();
    let p = pose.inverse_transform_point(b0);
    let q = pose.inverse_transform_point(b1);
    let mut query = Aabb::from_points([&p, &q]);
    query.expand(r);
    scratch.candidates(mesh, &query);
    'tris: for &t in &scratch.tris {
        let tri = mesh.triangle(t);
        let nearest = segment_point_nearest_triangle(&tri, &p, &q);
        for s in [nearest, p, q] {
            if let Some(hit) = sphere_triangle(&tri, &s, r) {
                if !emit(out, start, cap, pose, hit) {
                    break 'tris;
                }
            }
        }
    }
    trace!(contacts = out.len() - start, "mesh-capsule");
}

/// Mesh A against box B.
pub fn mesh_box(
    mesh: &TriMesh,
    pose: &Pose,
    box_pose: &Pose,
    half: &Vec3,
    cap: usize,
    scratch: &mut MeshScratch,
    out: &mut Vec<ContactGeom>,
) {
    let start = out.len();
    // Box placement in the mesh frame.
    let local = pose.inverse() * box_pose;
    let query = Aabb::from_center_half_extents(Point3::origin(), *half).transformed(&local);
    scratch.candidates(mesh, &query);
    let MeshScratch { tris, hits, .. } = scratch;
    'tris: for &t in tris.iter() {
        hits.clear();
        triangle_box(&mesh.triangle(t), &local, half, hits);
        for &(x, n, depth) in hits.iter() {
            let c = (local * x, local.rotation * n, depth);
            if !emit(out, start, cap, pose, c) {
                break 'tris;
            }
        }
    }
    trace!(contacts = out.len() - start, "mesh-box");
}

/// Box-frame projection radius of a box with `half` extents onto `axis`.
fn box_radius(half: &Vec3, axis: &Vec3) -> f64 {
    half.x * axis.x.abs() + half.y * axis.y.abs() + half.z * axis.z.abs()
}

/// Separating-axis test of one triangle against a box, with vertex
/// contacts. Results are in the box frame with normals from the triangle
/// into the box.
fn triangle_box(tri: &Triangle, box_pose: &Pose, half: &Vec3, out: &mut Vec<LocalContact>) {
    let v = [
        box_pose.inverse_transform_point(&tri.a),
        box_pose.inverse_transform_point(&tri.b),
        box_pose.inverse_transform_point(&tri.c),
    ];
    let local = Triangle::new(v[0], v[1], v[2]);
    let Some(nt) = local.normal() else {
        return;
    };

    // The face axis is one-sided: the box must sit on the outward side.
    let face_depth = nt.dot(&v[0].coords) + box_radius(half, &nt);
    if face_depth < 0.0 {
        return;
    }
    let mut best = (face_depth, nt);

    let centroid = (v[0].coords + v[1].coords + v[2].coords) / 3.0;
    // Depth along `axis` oriented from the triangle toward the box, or
    // `None` when the axis separates them.
    let project = |axis: Vec3| -> Option<(f64, Vec3)> {
        let axis = if axis.dot(&centroid) > 0.0 { -axis } else { axis };
        let tmax = v.iter().map(|p| axis.dot(&p.coords)).fold(f64::NEG_INFINITY, f64::max);
        let tmin = v.iter().map(|p| axis.dot(&p.coords)).fold(f64::INFINITY, f64::min);
        let rb = box_radius(half, &axis);
        let depth = tmax + rb;
        (tmin <= rb && depth >= 0.0).then_some((depth, axis))
    };

    for k in 0..3 {
        let mut axis = Vec3::zeros();
        axis[k] = 1.0;
        let Some(hit) = project(axis) else {
            return;
        };
        if hit.0 < best.0 {
            best = hit;
        }
    }

    let mut edge_best = (f64::INFINITY, Vec3::zeros());
    for m in 0..3 {
        let f = v[(m + 1) % 3] - v[m];
        for k in 0..3 {
            let mut e = Vec3::zeros();
            e[k] = 1.0;
            let axis = e.cross(&f);
            let len = axis.norm();
            if len < 1e-9 {
                continue;
            }
            let Some(hit) = project(axis / len) else {
                return;
            };
            if hit.0 < edge_best.0 {
                edge_best = hit;
            }
        }
    }
    if edge_best.0 * EDGE_BIAS < best.0 {
        best = edge_best;
    }
    let (sat_depth, n) = best;

    let tri_max = v.iter().map(|p| n.dot(&p.coords)).fold(f64::NEG_INFINITY, f64::max);
    let rb = box_radius(half, &n);
    let before = out.len();

    // Box corners under the triangle.
    for sx in [-1.0, 1.0] {
        for sy in [-1.0, 1.0] {
            for sz in [-1.0, 1.0] {
                let x = Point3::new(sx * half.x, sy * half.y, sz * half.z);
                let sd = nt.dot(&(x - v[0]));
                if sd < 0.0 && local.in_prism(&x) {
                    let depth = (tri_max - n.dot(&x.coords)).min(sat_depth);
                    if depth > 0.0 {
                        out.push((x, n, depth));
                    }
                }
            }
        }
    }

    // Triangle corners inside the box.
    for p in &v {
        if p.x.abs() <= half.x && p.y.abs() <= half.y && p.z.abs() <= half.z {
            let depth = (n.dot(&p.coords) + rb).min(sat_depth);
            if depth > 0.0 {
                out.push((*p, n, depth));
            }
        }
    }

    if out.len() == before {
        let (q, _) = local.closest_point(&Point3::origin());
        out.push((q, n, sat_depth));
    }
}

/// Mesh A against the world half-space `n · x <= d` (B).
pub fn mesh_plane(
    mesh: &TriMesh,
    pose: &Pose,
    n: &Vec3,
    d: f64,
    cap: usize,
    out: &mut Vec<ContactGeom>,
) {
    for v in mesh.vertices() {
        let w = pose * v;
        let depth = d - n.dot(&w.coords);
        if depth >= 0.0 && !push_capped(out, cap, ContactGeom::new(w, -n, depth)) {
            break;
        }
    }
}

/// Mesh A against mesh B: the trees are walked against each other and
/// every overlapping triangle pair runs vertex-under-face tests both ways.
pub fn mesh_mesh(
    a: &TriMesh,
    pa: &Pose,
    b: &TriMesh,
    pb: &Pose,
    cap: usize,
    scratch: &mut MeshScratch,
    out: &mut Vec<ContactGeom>,
) {
    let start = out.len();
    let b_to_a = pa.inverse() * pb;
    scratch.pairs.clear();
    a.tree()
        .query_tree_overlaps_with(b.tree(), &b_to_a, &mut scratch.pair_stack, &mut scratch.pairs);

    'pairs: for &(ia, ib) in &scratch.pairs {
        let ta = a.triangle(ia);
        let tb = b.triangle(ib);
        let tb = Triangle::new(b_to_a * tb.a, b_to_a * tb.b, b_to_a * tb.c);
        let (Some(na), Some(nb)) = (ta.normal(), tb.normal()) else {
            continue;
        };
        let reach = ta.aabb().size().norm().min(tb.aabb().size().norm());

        for p in tb.vertices() {
            let sd = na.dot(&(p - ta.a));
            if sd < 0.0 && -sd <= reach && ta.in_prism(&p) && !emit(out, start, cap, pa, (p, na, -sd)) {
                break 'pairs;
            }
        }
        for p in ta.vertices() {
            let sd = nb.dot(&(p - tb.a));
            if sd < 0.0 && -sd <= reach && tb.in_prism(&p) && !emit(out, start, cap, pa, (p, -nb, -sd)) {
                break 'pairs;
            }
        }
    }
    trace!(contacts = out.len() - start, "mesh-mesh");
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 4 x 4 ground quad at z = 0 split into two triangles, normal +z.
    fn ground() -> TriMesh {
        TriMesh::new(
            vec![
                Point3::new(-2.0, -2.0, 0.0),
                Point3::new(2.0, -2.0, 0.0),
                Point3::new(2.0, 2.0, 0.0),
                Point3::new(-2.0, 2.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
        .unwrap()
    }

    #[test]
    fn test_sphere_on_mesh_face() {
        let mut out = Vec::new();
        mesh_sphere(
            &ground(),
            &Pose::identity(),
            &Point3::new(0.5, -0.3, 0.4),
            0.5,
            32,
            &mut MeshScratch::default(),
            &mut out,
        );
        assert_eq!(out.len(), 1);
        assert!((out[0].depth - 0.1).abs() < 1e-12);
        assert!((out[0].normal - Vec3::z()).norm() < 1e-12);
    }

    #[test]
    fn test_sphere_on_shared_edge_deduplicated() {
        let mut out = Vec::new();
        // Centre above the diagonal shared by both triangles.
        mesh_sphere(
            &ground(),
            &Pose::identity(),
            &Point3::new(0.5, 0.5, 0.4),
            0.5,
            32,
            &mut MeshScratch::default(),
            &mut out,
        );
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_sphere_deep_behind_face_pushes_out() {
        let mut out = Vec::new();
        mesh_sphere(
            &ground(),
            &Pose::identity(),
            &Point3::new(0.5, -0.3, -0.2),
            0.5,
            32,
            &mut MeshScratch::default(),
            &mut out,
        );
        assert_eq!(out.len(), 1);
        assert!((out[0].depth - 0.7).abs() < 1e-12);
        assert!(out[0].normal.z > 0.99);
    }

    #[test]
    fn test_box_on_mesh() {
        let mut out = Vec::new();
        let box_pose = Pose::translation(0.3, 0.2, 0.49);
        mesh_box(
            &ground(),
            &Pose::identity(),
            &box_pose,
            &Vec3::repeat(0.5),
            32,
            &mut MeshScratch::default(),
            &mut out,
        );
        assert!(out.len() >= 4);
        for c in &out {
            assert!((c.normal - Vec3::z()).norm() < 1e-9);
            assert!((c.depth - 0.01).abs() < 1e-9);
        }
    }

    #[test]
    fn test_box_above_mesh_no_contact() {
        let mut out = Vec::new();
        let box_pose = Pose::translation(0.0, 0.0, 0.6);
        mesh_box(
            &ground(),
            &Pose::identity(),
            &box_pose,
            &Vec3::repeat(0.5),
            32,
            &mut MeshScratch::default(),
            &mut out,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_capsule_on_mesh() {
        let mut out = Vec::new();
        mesh_capsule(
            &ground(),
            &Pose::identity(),
            &Point3::new(-1.0, 0.3, 0.45),
            &Point3::new(1.0, 0.3, 0.45),
            0.5,
            32,
            &mut MeshScratch::default(),
            &mut out,
        );
        assert!(out.len() >= 2);
        for c in &out {
            assert!((c.depth - 0.05).abs() < 1e-9);
            assert!((c.normal - Vec3::z()).norm() < 1e-9);
        }
    }

    #[test]
    fn test_mesh_plane_vertices() {
        let mut out = Vec::new();
        let pose = Pose::translation(0.0, 0.0, -0.1);
        mesh_plane(&ground(), &pose, &Vec3::z(), 0.0, 32, &mut out);
        assert_eq!(out.len(), 4);
        assert!((out[0].depth - 0.1).abs() < 1e-12);
        let mut capped = Vec::new();
        mesh_plane(&ground(), &pose, &Vec3::z(), 0.0, 2, &mut capped);
        assert_eq!(capped.len(), 2);
    }

    #[test]
    fn test_mesh_mesh_corner_under_face() {
        // A small downward-pointing tetrahedron tip poking into the ground.
        let tip = TriMesh::new(
            vec![
                Point3::new(0.0, 0.0, -0.05),
                Point3::new(0.5, 0.0, 0.5),
                Point3::new(-0.25, 0.4, 0.5),
                Point3::new(-0.25, -0.4, 0.5),
            ],
            vec![[0, 2, 1], [0, 3, 2], [0, 1, 3], [1, 2, 3]],
        )
        .unwrap();
        let mut out = Vec::new();
        mesh_mesh(
            &ground(),
            &Pose::identity(),
            &tip,
            &Pose::translation(0.3, 0.3, 0.0),
            32,
            &mut MeshScratch::default(),
            &mut out,
        );
        assert!(!out.is_empty());
        let c = out.iter().find(|c| c.normal.z > 0.99).unwrap();
        assert!((c.depth - 0.05).abs() < 1e-9);
        assert!((c.position - Point3::new(0.3, 0.3, -0.05)).norm() < 1e-9);
    }
}
