//! Triangle meshes and single-triangle geometry.

use tracing::debug;
use tumble_bvh::{Aabb, AabbTree, TreeConfig};
use tumble_math::{Point3, Vec3};

use crate::error::{CollideError, Result};

/// A triangle given by its three corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// First vertex.
    pub a: Point3,
    /// Second vertex.
    pub b: Point3,
    /// Third vertex.
    pub c: Point3,
}

impl Triangle {
    /// Create a triangle.
    pub fn new(a: Point3, b: Point3, c: Point3) -> Self {
        Self { a, b, c }
    }

    /// Unit normal following the counter-clockwise winding, or `None` for a
    /// zero-area triangle.
    pub fn normal(&self) -> Option<Vec3> {
        let n = (self.b - self.a).cross(&(self.c - self.a));
        let len = n.norm();
        (len > 1e-12).then(|| n / len)
    }

    /// Bounding box.
    pub fn aabb(&self) -> Aabb {
        Aabb::from_points([&self.a, &self.b, &self.c])
    }

    /// Vertices as an array.
    pub fn vertices(&self) -> [Point3; 3] {
        [self.a, self.b, self.c]
    }

    /// Closest point on the triangle to `p`, and whether it lies in the
    /// interior (face region) rather than on an edge or vertex.
    pub fn closest_point(&self, p: &Point3) -> (Point3, bool) {
        let (a, b, c) = (self.a, self.b, self.c);
        let ab = b - a;
        let ac = c - a;
        let ap = p - a;
        let d1 = ab.dot(&ap);
        let d2 = ac.dot(&ap);
        if d1 <= 0.0 && d2 <= 0.0 {
            return (a, false);
        }

        let bp = p - b;
        let d3 = ab.dot(&bp);
        let d4 = ac.dot(&bp);
        if d3 >= 0.0 && d4 <= d3 {
            return (b, false);
        }

        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            let v = d1 / (d1 - d3);
            return (a + ab * v, false);
        }

        let cp = p - c;
        let d5 = ab.dot(&cp);
        let d6 = ac.dot(&cp);
        if d6 >= 0.0 && d5 <= d6 {
            return (c, false);
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            let w = d2 / (d2 - d6);
            return (a + ac * w, false);
        }

        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
            return (b + (c - b) * w, false);
        }

        let denom = 1.0 / (va + vb + vc);
        let v = vb * denom;
        let w = vc * denom;
        (a + ab * v + ac * w, true)
    }

    /// Whether the projection of `p` along the normal falls inside the
    /// triangle.
    pub fn in_prism(&self, p: &Point3) -> bool {
        let Some(n) = self.normal() else {
            return false;
        };
        let edges = [(self.a, self.b), (self.b, self.c), (self.c, self.a)];
        edges
            .iter()
            .all(|(u, v)| (v - u).cross(&(p - u)).dot(&n) >= -1e-12)
    }
}

/// Indexed triangle mesh with a bounding-volume tree over its triangles.
///
/// Vertex positions may be updated in place as long as the index buffer
/// stays the same; the tree is then refit rather than rebuilt.
#[derive(Debug, Clone)]
pub struct TriMesh {
    vertices: Vec<Point3>,
    triangles: Vec<[u32; 3]>,
    tree: AabbTree,
}

impl TriMesh {
    /// Build a mesh with the default tree configuration.
    pub fn new(vertices: Vec<Point3>, triangles: Vec<[u32; 3]>) -> Result<Self> {
        Self::with_config(vertices, triangles, TreeConfig::default())
    }

    /// Build a mesh, validating the buffers and constructing the tree.
    pub fn with_config(
        vertices: Vec<Point3>,
        triangles: Vec<[u32; 3]>,
        config: TreeConfig,
    ) -> Result<Self> {
        if vertices.is_empty() || triangles.is_empty() {
            return Err(CollideError::InvalidMesh("empty vertex or index buffer".into()));
        }
        if let Some(i) = vertices.iter().position(|v| !v.iter().all(|c| c.is_finite())) {
            return Err(CollideError::InvalidMesh(format!("vertex {i} is not finite")));
        }
        let n = vertices.len() as u32;
        if let Some(t) = triangles.iter().position(|tri| tri.iter().any(|&i| i >= n)) {
            return Err(CollideError::InvalidMesh(format!(
                "triangle {t} references a vertex past {n}"
            )));
        }
        let bounds = triangle_bounds(&vertices, &triangles);
        let tree = AabbTree::build_with(&bounds, config)?;
        debug!(
            vertices = vertices.len(),
            triangles = triangles.len(),
            "built triangle mesh"
        );
        Ok(Self {
            vertices,
            triangles,
            tree,
        })
    }

    /// Replace vertex positions and refit the tree. The vertex count must
    /// not change.
    pub fn update_vertices(&mut self, vertices: Vec<Point3>) -> Result<()> {
        if vertices.len() != self.vertices.len() {
            return Err(CollideError::InvalidMesh(format!(
                "expected {} vertices, got {}",
                self.vertices.len(),
                vertices.len()
            )));
        }
        if let Some(i) = vertices.iter().position(|v| !v.iter().all(|c| c.is_finite())) {
            return Err(CollideError::InvalidMesh(format!("vertex {i} is not finite")));
        }
        let bounds = triangle_bounds(&vertices, &self.triangles);
        self.tree.refit(&bounds)?;
        self.vertices = vertices;
        Ok(())
    }

    /// Triangle `i` in the mesh frame.
    pub fn triangle(&self, i: usize) -> Triangle {
        let [a, b, c] = self.triangles[i];
        Triangle::new(
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        )
    }

    /// Vertex positions.
    pub fn vertices(&self) -> &[Point3] {
        &self.vertices
    }

    /// Index buffer.
    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// Triangle tree.
    pub fn tree(&self) -> &AabbTree {
        &self.tree
    }

    /// Number of triangles.
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    /// Whether the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Bounds in the mesh frame.
    pub fn local_aabb(&self) -> Aabb {
        self.tree.root_aabb()
    }
}

fn triangle_bounds(vertices: &[Point3], triangles: &[[u32; 3]]) -> Vec<Aabb> {
    triangles
        .iter()
        .map(|t| {
            Aabb::from_points(t.iter().map(|&i| &vertices[i as usize]))
        })
        .collect()
}
