//! Equivalence of the broad-phase strategies.

use nalgebra::point;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tumble::collision::{
    BodyPairKey,
    broad_phase::{BroadPhase, NaiveBroadPhase, SpatialHashBroadPhase, SweepAndPruneBroadPhase},
};
use tumble::rigid_body::{BodyDescriptor, RigidBody, RigidBodyManager};

fn random_bodies(count: usize, seed: u64) -> RigidBodyManager {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut manager = RigidBodyManager::new();

    for idx in 0..count {
        let descriptor = BodyDescriptor {
            position: point![
                rng.random_range(-10.0..10.0),
                rng.random_range(-10.0..10.0),
                rng.random_range(-10.0..10.0)
            ],
            scale: nalgebra::vector![
                rng.random_range(0.5..2.0),
                rng.random_range(0.5..2.0),
                rng.random_range(0.5..2.0)
            ],
            // A sprinkling of static bodies exercises the static-static skip
            mass: if idx % 10 == 0 { 0.0 } else { 1.0 },
            ..BodyDescriptor::default()
        };
        manager.add_body(&descriptor).unwrap();
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
fn all_strategies_report_the_same_pairs() {
    for seed in [7, 42, 1337] {
        let manager = random_bodies(200, seed);
        let bodies = manager.rigid_bodies();

        let naive = sorted_pairs(&mut NaiveBroadPhase, bodies);
        let sweep = sorted_pairs(&mut SweepAndPruneBroadPhase::default(), bodies);
        let hashed = sorted_pairs(&mut SpatialHashBroadPhase::new(), bodies);

        assert!(!naive.is_empty(), "seed {seed} produced no overlaps");
        assert_eq!(naive, sweep, "sweep-and-prune disagrees for seed {seed}");
        assert_eq!(naive, hashed, "spatial hash disagrees for seed {seed}");
    }
}

#[test]
fn every_reported_pair_actually_overlaps() {
    let manager = random_bodies(200, 99);
    let bodies = manager.rigid_bodies();

    let mut pairs = Vec::new();
    NaiveBroadPhase.find_pairs(bodies, &mut pairs);

    for pair in pairs {
        let (id_a, id_b) = pair.body_ids();
        assert!(id_a < id_b);
        let body_a = manager.rigid_body(id_a);
        let body_b = manager.rigid_body(id_b);
        assert!(body_a.aabb().intersects(body_b.aabb()));
        assert!(!(body_a.is_static() && body_b.is_static()));
    }
}
