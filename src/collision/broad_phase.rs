//! Broad-phase strategies pairing bodies whose bounding boxes overlap.

use crate::{
    collision::BodyPairKey,
    fph,
    rigid_body::RigidBody,
};
use nalgebra::{Vector3, vector};
use std::fmt;
use tumble_containers::{HashMap, HashSet};

/// A strategy producing the set of candidate body pairs whose world-space
/// bounding boxes overlap.
///
/// Implementations must emit each qualifying pair exactly once, with the
/// lower body ID first, must skip pairs of two static bodies, and must be
/// idempotent: running twice on unchanged bodies produces the same pair set.
pub trait BroadPhase: fmt::Debug {
    fn find_pairs(&mut self, bodies: &[RigidBody], pairs: &mut Vec<BodyPairKey>);
}

/// O(n²) all-pairs broad phase.
#[derive(Clone, Debug, Default)]
pub struct NaiveBroadPhase;

impl BroadPhase for NaiveBroadPhase {
    fn find_pairs(&mut self, bodies: &[RigidBody], pairs: &mut Vec<BodyPairKey>) {
        for (idx, body_a) in bodies.iter().enumerate() {
            for body_b in &bodies[idx + 1..] {
                if body_a.is_static() && body_b.is_static() {
                    continue;
                }
                if body_a.aabb().intersects(body_b.aabb()) {
                    pairs.push(BodyPairKey::new(body_a.id(), body_b.id()));
                }
            }
        }
    }
}

/// Sweep-and-prune along the x-axis: bodies are sorted by their bounding box
/// minimum and swept with a shrinking active list.
#[derive(Clone, Debug, Default)]
pub struct SweepAndPruneBroadPhase {
    order: Vec<usize>,
    active: Vec<usize>,
}

impl BroadPhase for SweepAndPruneBroadPhase {
    fn find_pairs(&mut self, bodies: &[RigidBody], pairs: &mut Vec<BodyPairKey>) {
        self.order.clear();
        self.order.extend(0..bodies.len());
        self.order.sort_unstable_by(|&idx_a, &idx_b| {
            bodies[idx_a]
                .aabb()
                .lower_corner()
                .x
                .total_cmp(&bodies[idx_b].aabb().lower_corner().x)
        });

        self.active.clear();

        for &body_idx in &self.order {
            let body_a = &bodies[body_idx];
            let sweep_line = body_a.aabb().lower_corner().x;

            self.active
                .retain(|&active_idx| bodies[active_idx].aabb().upper_corner().x >= sweep_line);

            for &active_idx in &self.active {
                let body_b = &bodies[active_idx];
                if body_a.is_static() && body_b.is_static() {
                    continue;
                }
                if body_a.aabb().intersects(body_b.aabb()) {
                    pairs.push(BodyPairKey::new(body_a.id(), body_b.id()));
                }
            }

            self.active.push(body_idx);
        }
    }
}

/// Uniform spatial hash with an anisotropic cell resolution. The x- and
/// z-resolutions are coarser than y to accommodate a wide floor.
#[derive(Clone, Debug)]
pub struct SpatialHashBroadPhase {
    resolution: Vector3<fph>,
    cells: HashMap<[i64; 3], Vec<usize>>,
    seen: HashSet<BodyPairKey>,
}

impl SpatialHashBroadPhase {
    pub fn new() -> Self {
        Self {
            resolution: vector![0.9, 1.0, 0.9],
            cells: HashMap::default(),
            seen: HashSet::default(),
        }
    }

    /// Creates a spatial hash with the given cells-per-unit resolution along
    /// each axis.
    pub fn with_resolution(resolution: Vector3<fph>) -> Self {
        Self {
            resolution,
            ..Self::new()
        }
    }

    fn insert_body(
        &mut self,
        body_idx: usize,
        bodies: &[RigidBody],
        pairs: &mut Vec<BodyPairKey>,
    ) {
        let body_a = &bodies[body_idx];
        let aabb = body_a.aabb();

        let scaled_min = aabb.lower_corner().coords.component_mul(&self.resolution);
        let scaled_max = aabb.upper_corner().coords.component_mul(&self.resolution);

        for cell_x in (scaled_min.x.floor() as i64)..=(scaled_max.x.floor() as i64) {
            for cell_y in (scaled_min.y.floor() as i64)..=(scaled_max.y.floor() as i64) {
                for cell_z in (scaled_min.z.floor() as i64)..=(scaled_max.z.floor() as i64) {
                    let cell = self.cells.entry([cell_x, cell_y, cell_z]).or_default();

                    for &other_idx in cell.iter() {
                        let body_b = &bodies[other_idx];
                        if body_a.is_static() && body_b.is_static() {
                            continue;
                        }
                        if body_a.aabb().intersects(body_b.aabb()) {
                            let key = BodyPairKey::new(body_a.id(), body_b.id());
                            if self.seen.insert(key) {
                                pairs.push(key);
                            }
                        }
                    }

                    cell.push(body_idx);
                }
            }
        }
    }
}

impl Default for SpatialHashBroadPhase {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadPhase for SpatialHashBroadPhase {
    fn find_pairs(&mut self, bodies: &[RigidBody], pairs: &mut Vec<BodyPairKey>) {
        self.cells.clear();
        self.seen.clear();

        for body_idx in 0..bodies.len() {
            self.insert_body(body_idx, bodies, pairs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rigid_body::{BodyDescriptor, RigidBodyManager};
    use nalgebra::point;

    fn chain_of_boxes() -> RigidBodyManager {
        let mut manager = RigidBodyManager::new();
        for (x, mass) in [(0.0, 1.0), (0.8, 1.0), (1.6, 0.0), (5.0, 1.0)] {
            manager
                .add_body(&BodyDescriptor {
                    position: point![x, 0.0, 0.0],
                    mass,
                    ..BodyDescriptor::default()
                })
                .unwrap();
        }
        manager
    }

    fn sorted_pairs(strategy: &mut impl BroadPhase, bodies: &[RigidBody]) -> Vec<BodyPairKey> {
        let mut pairs = Vec::new();
        strategy.find_pairs(bodies, &mut pairs);
        pairs.sort_unstable();
        pairs
    }

    #[test]
    fn strategies_agree_on_chain_of_boxes() {
        let manager = chain_of_boxes();
        let bodies = manager.rigid_bodies();

        let naive = sorted_pairs(&mut NaiveBroadPhase, bodies);
        let sweep = sorted_pairs(&mut SweepAndPruneBroadPhase::default(), bodies);
        let hashed = sorted_pairs(&mut SpatialHashBroadPhase::new(), bodies);

        assert_eq!(naive.len(), 2);
        assert_eq!(naive, sweep);
        assert_eq!(naive, hashed);
    }

    #[test]
    fn broad_phase_is_idempotent() {
        let manager = chain_of_boxes();
        let bodies = manager.rigid_bodies();

        let mut strategy = SweepAndPruneBroadPhase::default();
        let first = sorted_pairs(&mut strategy, bodies);
        let second = sorted_pairs(&mut strategy, bodies);
        assert_eq!(first, second);

        let mut hashed = SpatialHashBroadPhase::new();
        let first = sorted_pairs(&mut hashed, bodies);
        let second = sorted_pairs(&mut hashed, bodies);
        assert_eq!(first, second);
    }

    #[test]
    fn static_static_pairs_are_skipped() {
        let mut manager = RigidBodyManager::new();
        for x in [0.0, 0.5] {
            manager
                .add_body(&BodyDescriptor {
                    position: point![x, 0.0, 0.0],
                    mass: 0.0,
                    ..BodyDescriptor::default()
                })
                .unwrap();
        }
        let pairs = sorted_pairs(&mut NaiveBroadPhase, manager.rigid_bodies());
        assert!(pairs.is_empty());
    }
}
