//! Broad phase: candidate geom pairs from one AABB tree over all finite
//! geoms. Infinite geoms (planes) are paired with every finite geom.

use tracing::{debug, warn};
use tumble_bvh::{Aabb, AabbTree};

use crate::geom::GeomId;
use crate::world::Store;

/// Persistent broad-phase state. The tree is refit while the set of
/// finite geoms is unchanged and rebuilt otherwise.
#[derive(Debug, Default)]
pub(crate) struct BroadPhase {
    tree: Option<AabbTree>,
    /// Enabled geoms in creation order.
    entries: Vec<GeomId>,
    /// Entry index of each tree primitive.
    leaves: Vec<usize>,
    bounds: Vec<Aabb>,
    infinite: Vec<usize>,
    /// Geoms behind the tree's primitives, in primitive order.
    tree_geoms: Vec<GeomId>,
    stack: Vec<u32>,
    hits: Vec<usize>,
    candidates: Vec<(usize, usize)>,
}

impl BroadPhase {
    /// Collect candidate pairs, ordered by geom creation order.
    pub fn find_pairs(&mut self, store: &Store, out: &mut Vec<(GeomId, GeomId)>) {
        out.clear();
        self.gather(store);

        let same_set = self.leaves.len() == self.tree_geoms.len()
            && self
                .leaves
                .iter()
                .zip(&self.tree_geoms)
                .all(|(&e, id)| self.entries[e] == *id);
        self.tree_geoms.clear();
        self.tree_geoms.extend(self.leaves.iter().map(|&e| self.entries[e]));
        self.update_tree(same_set);

        self.candidates.clear();
        if let Some(tree) = &self.tree {
            for (i, bounds) in self.bounds.iter().enumerate() {
                self.hits.clear();
                tree.query_overlaps_with(bounds, &mut self.stack, &mut self.hits);
                for &j in &self.hits {
                    if j > i {
                        let (a, b) = (self.leaves[i], self.leaves[j]);
                        self.candidates.push((a.min(b), a.max(b)));
                    }
                }
            }
        }
        for &p in &self.infinite {
            for &e in &self.leaves {
                self.candidates.push((p.min(e), p.max(e)));
            }
        }
        self.candidates.sort_unstable();
        out.extend(
            self.candidates
                .iter()
                .map(|&(a, b)| (self.entries[a], self.entries[b])),
        );
    }

    fn gather(&mut self, store: &Store) {
        self.entries.clear();
        self.leaves.clear();
        self.bounds.clear();
        self.infinite.clear();
        for &id in &store.geom_order {
            let Some(geom) = store.geoms.get(id) else { continue };
            if !geom.enabled {
                continue;
            }
            let body = geom.body.and_then(|b| store.bodies.get(b));
            let pose = geom.world_pose(body);
            let entry = self.entries.len();
            self.entries.push(id);
            match geom.shape.aabb(&pose) {
                None => self.infinite.push(entry),
                Some(aabb) if aabb.is_finite() => {
                    self.leaves.push(entry);
                    self.bounds.push(aabb);
                }
                Some(_) => warn!(geom = ?id, "geom has non-finite bounds, skipped"),
            }
        }
    }

    fn update_tree(&mut self, same_set: bool) {
        if self.bounds.is_empty() {
            self.tree = None;
            return;
        }
        if same_set {
            if let Some(tree) = &mut self.tree {
                if tree.refit(&self.bounds).is_ok() {
                    let bad = tree.first_uncontained(&self.bounds);
                    debug_assert!(bad.is_none(), "refit left primitive {bad:?} outside its leaf");
                    if bad.is_some() {
                        warn!("broad-phase tree out of date, re-boxing");
                        if tree.repair(&self.bounds).is_ok() {
                            return;
                        }
                    } else {
                        return;
                    }
                }
            }
        }
        match AabbTree::build(&self.bounds) {
            Ok(tree) => {
                debug!(geoms = self.bounds.len(), depth = tree.depth(), "broad-phase tree rebuilt");
                self.tree = Some(tree);
            }
            Err(e) => {
                warn!(error = %e, "broad-phase tree build failed");
                self.tree = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::World;
    use tumble_collide::Shape;
    use tumble_math::{Point3, Pose, Vec3};

    fn sphere_at(world: &mut World, x: f64) -> GeomId {
        let b = world.add_body(Point3::new(x, 0.0, 0.0)).unwrap();
        world.add_geom(b, Shape::sphere(0.5).unwrap(), Pose::identity()).unwrap()
    }

    #[test]
    fn test_pairs_follow_moves_and_set_changes() {
        let mut world = World::new();
        let a = sphere_at(&mut world, 0.0);
        let b = sphere_at(&mut world, 0.8);
        let c = sphere_at(&mut world, 5.0);
        let mut broad = BroadPhase::default();
        let mut pairs = Vec::new();
        broad.find_pairs(&world.store, &mut pairs);
        assert_eq!(pairs, vec![(a, b)]);

        // Same geoms, moved: the tree is refit in place.
        let body_c = world.geom(c).unwrap().body().unwrap();
        world.set_position(body_c, Point3::new(0.4, 0.6, 0.0)).unwrap();
        broad.find_pairs(&world.store, &mut pairs);
        assert_eq!(pairs, vec![(a, b), (a, c), (b, c)]);
        assert_eq!(broad.tree_geoms, vec![a, b, c]);

        // A new geom changes the set and forces a rebuild.
        let plane = world.add_static_geom(Shape::plane(Vec3::z(), -1.0).unwrap(), Pose::identity()).unwrap();
        let d = sphere_at(&mut world, 20.0);
        broad.find_pairs(&world.store, &mut pairs);
        assert_eq!(broad.tree_geoms, vec![a, b, c, d]);
        assert_eq!(pairs.len(), 3 + 4);
        assert!(pairs.contains(&(plane, d)));
    }
}
