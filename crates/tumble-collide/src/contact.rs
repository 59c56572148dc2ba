//! Contact points produced by the narrow phase.

use serde::{Deserialize, Serialize};
use tumble_math::{Point3, Vec3};

/// One contact between geoms A and B.
///
/// `normal` is a unit vector pointing from A into B: separating the shapes
/// means moving B along `+normal` (or A along `-normal`). `depth` is the
/// penetration distance along the normal and is never negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactGeom {
    /// World-space contact point.
    pub position: Point3,
    /// Unit normal from A into B.
    pub normal: Vec3,
    /// Penetration depth.
    pub depth: f64,
}

impl ContactGeom {
    /// Create a contact.
    pub fn new(position: Point3, normal: Vec3, depth: f64) -> Self {
        Self {
            position,
            normal,
            depth,
        }
    }

    /// Same contact seen with A and B exchanged.
    pub fn flipped(self) -> Self {
        Self {
            normal: -self.normal,
            ..self
        }
    }
}

/// Limits on how many contacts a single pair may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactLimits {
    /// Contacts kept per pair after reduction.
    pub max_contacts: usize,
    /// Candidates gathered from a mesh pair before reduction.
    pub batch_limit: usize,
}

impl Default for ContactLimits {
    fn default() -> Self {
        Self {
            max_contacts: 4,
            batch_limit: 32,
        }
    }
}

/// Reduce `contacts` to at most `max` entries.
///
/// The deepest contact is kept first; each further pick is the candidate
/// farthest from every contact already kept, so the surviving set spans
/// the contact patch. Ties go to the earliest candidate.
pub fn reduce_contacts(contacts: &mut Vec<ContactGeom>, max: usize) {
    if contacts.len() <= max {
        return;
    }
    if max == 0 {
        contacts.clear();
        return;
    }

    let mut deepest = 0;
    for (i, c) in contacts.iter().enumerate() {
        if c.depth > contacts[deepest].depth {
            deepest = i;
        }
    }

    let mut keep = vec![deepest];
    let mut min_dist: Vec<f64> = contacts
        .iter()
        .map(|c| (c.position - contacts[deepest].position).norm_squared())
        .collect();
    while keep.len() < max {
        let mut best = None;
        let mut best_d = -1.0;
        for (i, &d) in min_dist.iter().enumerate() {
            if !keep.contains(&i) && d > best_d {
                best = Some(i);
                best_d = d;
            }
        }
        let Some(pick) = best else { break };
        keep.push(pick);
        let p = contacts[pick].position;
        for (i, d) in min_dist.iter_mut().enumerate() {
            *d = d.min((contacts[i].position - p).norm_squared());
        }
    }

    keep.sort_unstable();
    let mut i = 0;
    contacts.retain(|_| {
        let k = keep.binary_search(&i).is_ok();
        i += 1;
        k
    });
}

/// Append `c` unless `out` already holds `cap` contacts. Returns `false`
/// once the cap is reached. Contacts with negative or NaN depth are dropped.
pub(crate) fn push_capped(out: &mut Vec<ContactGeom>, cap: usize, c: ContactGeom) -> bool {
    if out.len() >= cap {
        return false;
    }
    if !(c.depth >= 0.0) || !c.position.iter().all(|x| x.is_finite()) {
        return true;
    }
    out.push(c);
    true
}
