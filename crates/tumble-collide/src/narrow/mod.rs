//! Narrow phase: exact contact generation between two placed shapes.
//!
//! Each shape pair has a dedicated routine that handles it in one canonical
//! order (by [`ShapeKind`]); the reversed order is answered by swapping the
//! operands and negating the normals, so results are symmetric under swap.
//! Two shapes of the same kind are ordered by pose, then by extent.

mod capsule;
mod cuboid;
mod sphere;
mod trimesh;

pub use capsule::{
    capsule_box, capsule_capsule, capsule_plane, capsule_sphere, closest_on_segment,
    segment_segment,
};
pub use cuboid::{box_box, box_plane};
pub use sphere::{sphere_box, sphere_plane, sphere_sphere};
pub use trimesh::{mesh_box, mesh_capsule, mesh_mesh, mesh_plane, mesh_sphere, MeshScratch};

use std::cmp::Ordering;

use tracing::trace;
use tumble_math::{is_finite_pose, Point3, Pose};

use crate::contact::{reduce_contacts, ContactGeom, ContactLimits};
use crate::shape::Shape;

/// Contacts between `a` at `pa` and `b` at `pb`, keeping at most
/// `max_contacts`. Appends to `out` and returns the number added.
///
/// `max_contacts = 1` gives first-contact queries.
pub fn collide(
    a: &Shape,
    pa: &Pose,
    b: &Shape,
    pb: &Pose,
    max_contacts: usize,
    out: &mut Vec<ContactGeom>,
) -> usize {
    let limits = ContactLimits {
        max_contacts,
        ..ContactLimits::default()
    };
    collide_with(a, pa, b, pb, &limits, out)
}

/// Buffers kept between narrow-phase calls.
#[derive(Debug, Clone, Default)]
pub struct NarrowScratch {
    found: Vec<ContactGeom>,
    mesh: MeshScratch,
}

/// [`collide`] with explicit per-pair and mesh batch limits.
pub fn collide_with(
    a: &Shape,
    pa: &Pose,
    b: &Shape,
    pb: &Pose,
    limits: &ContactLimits,
    out: &mut Vec<ContactGeom>,
) -> usize {
    collide_reusing(a, pa, b, pb, limits, &mut NarrowScratch::default(), out)
}

/// [`collide_with`] working in caller-owned scratch, for per-step use.
pub fn collide_reusing(
    a: &Shape,
    pa: &Pose,
    b: &Shape,
    pb: &Pose,
    limits: &ContactLimits,
    scratch: &mut NarrowScratch,
    out: &mut Vec<ContactGeom>,
) -> usize {
    if limits.max_contacts == 0
        || !is_finite_pose(pa)
        || !is_finite_pose(pb)
        || a.is_degenerate()
        || b.is_degenerate()
    {
        return 0;
    }

    let NarrowScratch { found, mesh } = scratch;
    found.clear();
    if canonical_order(a, pa, b, pb) != Ordering::Greater {
        dispatch(a, pa, b, pb, limits.batch_limit, mesh, found);
    } else {
        dispatch(b, pb, a, pa, limits.batch_limit, mesh, found);
        for c in found.iter_mut() {
            *c = c.flipped();
        }
    }
    found.retain(|c| c.depth >= 0.0 && c.depth.is_finite() && c.normal.iter().all(|x| x.is_finite()));
    reduce_contacts(found, limits.max_contacts);
    trace!(a = ?a.kind(), b = ?b.kind(), contacts = found.len(), "narrow phase");
    out.extend_from_slice(found);
    found.len()
}

/// Order of a pair for dispatch: by kind, then pose, then local extent.
fn canonical_order(a: &Shape, pa: &Pose, b: &Shape, pb: &Pose) -> Ordering {
    a.kind()
        .cmp(&b.kind())
        .then_with(|| compare_keys(&pose_key(pa), &pose_key(pb)))
        .then_with(|| compare_keys(&extent_key(a), &extent_key(b)))
}

fn pose_key(p: &Pose) -> [f64; 7] {
    let t = &p.translation.vector;
    let q = &p.rotation.coords;
    [t.x, t.y, t.z, q.x, q.y, q.z, q.w]
}

fn extent_key(shape: &Shape) -> [f64; 6] {
    match shape.aabb(&Pose::identity()) {
        Some(b) => [b.min.x, b.min.y, b.min.z, b.max.x, b.max.y, b.max.z],
        None => [0.0; 6],
    }
}

fn compare_keys(x: &[f64], y: &[f64]) -> Ordering {
    x.iter()
        .zip(y)
        .map(|(a, b)| a.total_cmp(b))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Run the routine for a pair already in canonical order.
fn dispatch(
    a: &Shape,
    pa: &Pose,
    b: &Shape,
    pb: &Pose,
    batch: usize,
    mesh: &mut MeshScratch,
    out: &mut Vec<ContactGeom>,
) {
    let ca = Point3::from(pa.translation.vector);
    let cb = Point3::from(pb.translation.vector);
    match (a, b) {
        (Shape::Sphere(sa), Shape::Sphere(sb)) => sphere_sphere(&ca, sa.radius, &cb, sb.radius, out),
        (Shape::Sphere(s), Shape::Cuboid(bx)) => sphere_box(&ca, s.radius, pb, &bx.half_extents, out),
        (Shape::Sphere(s), Shape::Capsule(c)) => {
            let (b0, b1) = c.segment(pb);
            // Capsule routines take the capsule as A.
            let start = out.len();
            capsule_sphere(&b0, &b1, c.radius, &ca, s.radius, out);
            flip_from(out, start);
        }
        (Shape::Sphere(s), Shape::TriMesh(m)) => {
            let start = out.len();
            mesh_sphere(m, pb, &ca, s.radius, batch, mesh, out);
            flip_from(out, start);
        }
        (Shape::Sphere(s), Shape::Plane(p)) => {
            let (n, d) = p.world(pb);
            sphere_plane(&ca, s.radius, &n, d, out);
        }
        (Shape::Cuboid(ba), Shape::Cuboid(bb)) => {
            box_box(pa, &ba.half_extents, pb, &bb.half_extents, out)
        }
        (Shape::Cuboid(bx), Shape::Capsule(c)) => {
            let (b0, b1) = c.segment(pb);
            let start = out.len();
            capsule_box(&b0, &b1, c.radius, pa, &bx.half_extents, out);
            flip_from(out, start);
        }
        (Shape::Cuboid(bx), Shape::TriMesh(m)) => {
            let start = out.len();
            mesh_box(m, pb, pa, &bx.half_extents, batch, mesh, out);
            flip_from(out, start);
        }
        (Shape::Cuboid(bx), Shape::Plane(p)) => {
            let (n, d) = p.world(pb);
            box_plane(pa, &bx.half_extents, &n, d, out);
        }
        (Shape::Capsule(cap_a), Shape::Capsule(cap_b)) => {
            let (a0, a1) = cap_a.segment(pa);
            let (b0, b1) = cap_b.segment(pb);
            capsule_capsule(&a0, &a1, cap_a.radius, &b0, &b1, cap_b.radius, out);
        }
        (Shape::Capsule(c), Shape::TriMesh(m)) => {
            let (a0, a1) = c.segment(pa);
            let start = out.len();
            mesh_capsule(m, pb, &a0, &a1, c.radius, batch, mesh, out);
            flip_from(out, start);
        }
        (Shape::Capsule(c), Shape::Plane(p)) => {
            let (a0, a1) = c.segment(pa);
            let (n, d) = p.world(pb);
            capsule_plane(&a0, &a1, c.radius, &n, d, out);
        }
        (Shape::TriMesh(ma), Shape::TriMesh(mb)) => mesh_mesh(ma, pa, mb, pb, batch, mesh, out),
        (Shape::TriMesh(m), Shape::Plane(p)) => {
            let (n, d) = p.world(pb);
            mesh_plane(m, pa, &n, d, batch, out);
        }
        // Plane-plane never touches; other orders are not canonical.
        _ => {}
    }
}

fn flip_from(out: &mut [ContactGeom], start: usize) {
    for c in &mut out[start..] {
        *c = c.flipped();
    }
}
