//! Bounding-volume tree over a fixed primitive set.
//!
//! The tree is a complete binary tree stored flat in pre-order: every
//! internal node has exactly two children, and both children have larger
//! indices than their parent. Leaves reference a contiguous range of a
//! permuted primitive-index array, so the leaf ranges partition the
//! primitive set exactly once.

use serde::{Deserialize, Serialize};
use tracing::debug;
use tumble_math::{Point3, Pose, Vec3};

use crate::aabb::Aabb;
use crate::error::{BvhError, Result};

/// How a node's primitives are divided between its two children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SplitStrategy {
    /// Split at the middle of the node box along its longest axis.
    #[default]
    LargestAxis,
    /// Split at the mean primitive centre along the axis of greatest
    /// centre variance.
    GeometricCenter,
    /// Split at the median primitive along the longest axis, giving
    /// children of equal primitive count.
    Balanced,
}

/// Tree construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Split strategy.
    pub split: SplitStrategy,
    /// Maximum primitives per leaf.
    pub leaf_size: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            split: SplitStrategy::LargestAxis,
            leaf_size: 1,
        }
    }
}

/// Node payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Leaf covering `indices[start..start + count]`.
    Leaf {
        /// First slot in the permuted index array.
        start: u32,
        /// Number of primitives.
        count: u32,
    },
    /// Internal node with two children.
    Internal {
        /// Left child node index.
        left: u32,
        /// Right child node index.
        right: u32,
    },
}

/// A tree node.
#[derive(Debug, Clone, Copy)]
pub struct Node {
    /// Box enclosing everything below this node.
    pub aabb: Aabb,
    /// Leaf or internal payload.
    pub kind: NodeKind,
}

/// Bounding-volume tree over primitive boxes.
#[derive(Debug, Clone)]
pub struct AabbTree {
    nodes: Vec<Node>,
    indices: Vec<u32>,
    config: TreeConfig,
}

impl AabbTree {
    /// Build a tree over primitive bounding boxes with the default config.
    pub fn build(bounds: &[Aabb]) -> Result<Self> {
        Self::build_with(bounds, TreeConfig::default())
    }

    /// Build a tree over primitive bounding boxes.
    ///
    /// Fails on an empty primitive set, a non-finite primitive box or a zero
    /// leaf size.
    pub fn build_with(bounds: &[Aabb], config: TreeConfig) -> Result<Self> {
        if bounds.is_empty() {
            return Err(BvhError::Empty);
        }
        if config.leaf_size == 0 {
            return Err(BvhError::InvalidLeafSize);
        }
        check_finite(bounds)?;

        let mut items: Vec<(u32, Point3)> = bounds
            .iter()
            .enumerate()
            .map(|(i, b)| (i as u32, b.center()))
            .collect();
        let mut nodes = Vec::with_capacity(2 * bounds.len());
        build_node(&mut items, 0, bounds, &config, &mut nodes);
        let indices = items.into_iter().map(|(i, _)| i).collect();

        debug!(
            primitives = bounds.len(),
            nodes = nodes.len(),
            split = ?config.split,
            "built aabb tree"
        );
        Ok(Self {
            nodes,
            indices,
            config,
        })
    }

    /// Recompute node boxes bottom-up from updated primitive bounds without
    /// changing the partition. Only valid while primitive connectivity is
    /// unchanged.
    pub fn refit(&mut self, bounds: &[Aabb]) -> Result<()> {
        if bounds.len() != self.indices.len() {
            return Err(BvhError::PrimitiveCountMismatch {
                expected: self.indices.len(),
                actual: bounds.len(),
            });
        }
        check_finite(bounds)?;
        for i in (0..self.nodes.len()).rev() {
            let aabb = match self.nodes[i].kind {
                NodeKind::Leaf { start, count } => {
                    let mut b = Aabb::empty();
                    for &p in &self.indices[start as usize..(start + count) as usize] {
                        b.include_aabb(&bounds[p as usize]);
                    }
                    b
                }
                NodeKind::Internal { left, right } => self.nodes[left as usize]
                    .aabb
                    .merged(&self.nodes[right as usize].aabb),
            };
            self.nodes[i].aabb = aabb;
        }
        debug_assert!(self.first_uncontained(bounds).is_none());
        Ok(())
    }

    /// Index of the first node whose box does not contain its children (or,
    /// for a leaf, its primitives). `None` when the tree is consistent.
    pub fn first_uncontained(&self, bounds: &[Aabb]) -> Option<usize> {
        self.nodes.iter().enumerate().find_map(|(i, node)| {
            let ok = match node.kind {
                NodeKind::Leaf { start, count } => self.indices
                    [start as usize..(start + count) as usize]
                    .iter()
                    .all(|&p| {
                        bounds
                            .get(p as usize)
                            .is_some_and(|b| node.aabb.contains(b))
                    }),
                NodeKind::Internal { left, right } => {
                    node.aabb.contains(&self.nodes[left as usize].aabb)
                        && node.aabb.contains(&self.nodes[right as usize].aabb)
                }
            };
            (!ok).then_some(i)
        })
    }

    /// Re-box the tree if any node fails containment. Returns whether a
    /// repair was needed.
    pub fn repair(&mut self, bounds: &[Aabb]) -> Result<bool> {
        if self.first_uncontained(bounds).is_none() {
            return Ok(false);
        }
        self.refit(bounds)?;
        Ok(true)
    }

    /// Collect primitives of every leaf whose box overlaps `query`, in
    /// depth-first left-to-right order.
    pub fn query_overlaps(&self, query: &Aabb) -> Vec<usize> {
        let mut stack = Vec::new();
        let mut out = Vec::new();
        self.query_overlaps_with(query, &mut stack, &mut out);
        out
    }

    /// Like [`AabbTree::query_overlaps`] but with caller-owned scratch.
    /// `out` is appended to, not cleared.
    pub fn query_overlaps_with(&self, query: &Aabb, stack: &mut Vec<u32>, out: &mut Vec<usize>) {
        stack.clear();
        stack.push(0);
        while let Some(i) = stack.pop() {
            let node = &self.nodes[i as usize];
            if !node.aabb.overlaps(query) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf { start, count } => {
                    out.extend(
                        self.indices[start as usize..(start + count) as usize]
                            .iter()
                            .map(|&p| p as usize),
                    );
                }
                NodeKind::Internal { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
    }

    /// Collect primitives of every leaf whose box is hit by the ray
    /// `origin + t * dir`, `t` in `[0, max_t]`.
    pub fn query_ray(&self, origin: &Point3, dir: &Vec3, max_t: f64, out: &mut Vec<usize>) {
        self.query_ray_with(origin, dir, max_t, &mut Vec::new(), out);
    }

    /// Like [`AabbTree::query_ray`] but with a caller-owned stack.
    pub fn query_ray_with(
        &self,
        origin: &Point3,
        dir: &Vec3,
        max_t: f64,
        stack: &mut Vec<u32>,
        out: &mut Vec<usize>,
    ) {
        stack.clear();
        stack.push(0);
        while let Some(i) = stack.pop() {
            let node = &self.nodes[i as usize];
            if node.aabb.intersect_ray(origin, dir, max_t).is_none() {
                continue;
            }
            match node.kind {
                NodeKind::Leaf { start, count } => out.extend(
                    self.indices[start as usize..(start + count) as usize]
                        .iter()
                        .map(|&p| p as usize),
                ),
                NodeKind::Internal { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
    }

    /// Overlapping leaf primitive pairs `(self_prim, other_prim)` between two
    /// trees. `other_to_self` maps `other`'s frame into this tree's frame.
    pub fn query_tree_overlaps(
        &self,
        other: &AabbTree,
        other_to_self: &Pose,
        out: &mut Vec<(usize, usize)>,
    ) {
        self.query_tree_overlaps_with(other, other_to_self, &mut Vec::new(), out);
    }

    /// Like [`AabbTree::query_tree_overlaps`] but with a caller-owned stack.
    pub fn query_tree_overlaps_with(
        &self,
        other: &AabbTree,
        other_to_self: &Pose,
        stack: &mut Vec<(u32, u32)>,
        out: &mut Vec<(usize, usize)>,
    ) {
        stack.clear();
        stack.push((0, 0));
        while let Some((a, b)) = stack.pop() {
            let na = &self.nodes[a as usize];
            let nb = &other.nodes[b as usize];
            if !na.aabb.overlaps(&nb.aabb.transformed(other_to_self)) {
                continue;
            }
            match (na.kind, nb.kind) {
                (NodeKind::Leaf { start: sa, count: ca }, NodeKind::Leaf { start: sb, count: cb }) => {
                    for &pa in &self.indices[sa as usize..(sa + ca) as usize] {
                        for &pb in &other.indices[sb as usize..(sb + cb) as usize] {
                            out.push((pa as usize, pb as usize));
                        }
                    }
                }
                (NodeKind::Internal { left, right }, NodeKind::Leaf { .. }) => {
                    stack.push((right, b));
                    stack.push((left, b));
                }
                (NodeKind::Leaf { .. }, NodeKind::Internal { left, right }) => {
                    stack.push((a, right));
                    stack.push((a, left));
                }
                (
                    NodeKind::Internal { left: la, right: ra },
                    NodeKind::Internal { left: lb, right: rb },
                ) => {
                    // Descend the larger box first.
                    if na.aabb.surface_area() >= nb.aabb.surface_area() {
                        stack.push((ra, b));
                        stack.push((la, b));
                    } else {
                        stack.push((a, rb));
                        stack.push((a, lb));
                    }
                }
            }
        }
    }

    /// Box of the root node.
    pub fn root_aabb(&self) -> Aabb {
        self.nodes[0].aabb
    }

    /// All nodes in pre-order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Permuted primitive indices referenced by leaves.
    pub fn primitive_indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of primitives.
    pub fn primitive_count(&self) -> usize {
        self.indices.len()
    }

    /// Construction parameters.
    pub fn config(&self) -> TreeConfig {
        self.config
    }

    /// Length of the longest root-to-leaf path (root alone has depth 1).
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], i: usize) -> usize {
            match nodes[i].kind {
                NodeKind::Leaf { .. } => 1,
                NodeKind::Internal { left, right } => {
                    1 + walk(nodes, left as usize).max(walk(nodes, right as usize))
                }
            }
        }
        walk(&self.nodes, 0)
    }
}

fn check_finite(bounds: &[Aabb]) -> Result<()> {
    match bounds.iter().position(|b| !b.is_finite() || !b.is_valid()) {
        Some(index) => Err(BvhError::NonFiniteBounds { index }),
        None => Ok(()),
    }
}

/// Build the subtree over `items`, which occupy `indices[offset..]`.
/// Returns the index of the created node.
fn build_node(
    items: &mut [(u32, Point3)],
    offset: usize,
    bounds: &[Aabb],
    config: &TreeConfig,
    nodes: &mut Vec<Node>,
) -> u32 {
    let mut aabb = Aabb::empty();
    for (p, _) in items.iter() {
        aabb.include_aabb(&bounds[*p as usize]);
    }

    let idx = nodes.len() as u32;
    if items.len() <= config.leaf_size {
        nodes.push(Node {
            aabb,
            kind: NodeKind::Leaf {
                start: offset as u32,
                count: items.len() as u32,
            },
        });
        return idx;
    }

    // Reserve the slot so children land after the parent.
    nodes.push(Node {
        aabb,
        kind: NodeKind::Leaf { start: 0, count: 0 },
    });

    let mut mid = split_items(items, &aabb, config.split);
    if mid == 0 || mid == items.len() {
        mid = items.len() / 2;
    }
    let (left_items, right_items) = items.split_at_mut(mid);
    let left = build_node(left_items, offset, bounds, config, nodes);
    let right = build_node(right_items, offset + mid, bounds, config, nodes);
    nodes[idx as usize].kind = NodeKind::Internal { left, right };
    idx
}

/// Reorder `items` so the left child's primitives come first; returns the
/// split point.
fn split_items(items: &mut [(u32, Point3)], aabb: &Aabb, strategy: SplitStrategy) -> usize {
    match strategy {
        SplitStrategy::LargestAxis => {
            let axis = aabb.longest_axis();
            let value = aabb.center()[axis];
            partition(items, axis, value)
        }
        SplitStrategy::GeometricCenter => {
            let n = items.len() as f64;
            let mean = items.iter().fold(Vec3::zeros(), |acc, (_, c)| acc + c.coords) / n;
            let var = items.iter().fold(Vec3::zeros(), |acc, (_, c)| {
                let d = c.coords - mean;
                acc + d.component_mul(&d)
            });
            let axis = var.imax();
            partition(items, axis, mean[axis])
        }
        SplitStrategy::Balanced => {
            let axis = aabb.longest_axis();
            let mid = items.len() / 2;
            items.select_nth_unstable_by(mid, |a, b| {
                a.1[axis].total_cmp(&b.1[axis]).then(a.0.cmp(&b.0))
            });
            mid
        }
    }
}

/// Move centres below `value` on `axis` to the front; returns their count.
fn partition(items: &mut [(u32, Point3)], axis: usize, value: f64) -> usize {
    let mut left = 0;
    let mut right = items.len();
    while left < right {
        if items[left].1[axis] < value {
            left += 1;
        } else {
            right -= 1;
            items.swap(left, right);
        }
    }
    left
}
