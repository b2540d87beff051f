//! Collision detection: broad phase, narrow phase and manifold lifecycle.

pub mod broad_phase;
pub mod contact;
pub mod epa;
pub mod gjk;
pub mod manifold;

use crate::{
    diagnostics::SimulationDiagnostics,
    inactivity::InactivityDetector,
    rigid_body::{RigidBodyID, RigidBodyManager},
};
use broad_phase::BroadPhase;
use bytemuck::{Pod, Zeroable};
use manifold::{ContactManifold, ObjectPool};
use std::mem;
use tumble_containers::NoHashMap;

/// Canonically ordered key for a pair of bodies: the lower body ID always
/// comes first.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Zeroable, Pod)]
pub struct BodyPairKey(u64);

impl nohash_hasher::IsEnabled for BodyPairKey {}

impl BodyPairKey {
    /// Creates the key for the given pair of bodies, ordering the IDs.
    pub fn new(body_a: RigidBodyID, body_b: RigidBodyID) -> Self {
        let (min, max) = if body_a.0 <= body_b.0 {
            (body_a.0, body_b.0)
        } else {
            (body_b.0, body_a.0)
        };
        Self((u64::from(min) << 32) | u64::from(max))
    }

    /// Returns the two body IDs of the pair, lower ID first.
    pub fn body_ids(self) -> (RigidBodyID, RigidBodyID) {
        (
            RigidBodyID((self.0 >> 32) as u32),
            RigidBodyID(self.0 as u32),
        )
    }
}

/// Owns the persistent contact manifolds and funnels broad-phase candidate
/// pairs into the narrow phase.
#[derive(Debug)]
pub struct CollisionWorld<B> {
    broad_phase: B,
    manifolds: NoHashMap<BodyPairKey, ContactManifold>,
    active_pairs: Vec<BodyPairKey>,
    pair_buffer: Vec<BodyPairKey>,
    manifold_pool: ObjectPool<ContactManifold>,
}

impl<B: BroadPhase> CollisionWorld<B> {
    pub fn new(broad_phase: B) -> Self {
        Self {
            broad_phase,
            manifolds: NoHashMap::default(),
            active_pairs: Vec::new(),
            pair_buffer: Vec::new(),
            manifold_pool: ObjectPool::new(),
        }
    }

    /// Returns the manifold currently shared by the given pair of bodies, if
    /// any.
    pub fn get_manifold(
        &self,
        body_a: RigidBodyID,
        body_b: RigidBodyID,
    ) -> Option<&ContactManifold> {
        self.manifolds.get(&BodyPairKey::new(body_a, body_b))
    }

    /// Returns an iterator over all live contact manifolds.
    pub fn manifolds(&self) -> impl Iterator<Item = &ContactManifold> {
        self.manifolds.values()
    }

    /// Splits the world into the active pair list and the manifold storage
    /// for the constraint solver. The pair list is in discovery order, which
    /// is the order the solver visits contacts in.
    pub(crate) fn active_pairs_and_manifolds_mut(
        &mut self,
    ) -> (&[BodyPairKey], &mut NoHashMap<BodyPairKey, ContactManifold>) {
        (&self.active_pairs, &mut self.manifolds)
    }

    /// Updates the manifolds for the current positions of the bodies: runs
    /// the broad phase, the narrow phase for every candidate pair, and
    /// recycles manifolds of pairs that are no longer observed.
    pub fn find_collisions(
        &mut self,
        bodies: &mut RigidBodyManager,
        inactivity_detector: &mut InactivityDetector,
        diagnostics: &mut SimulationDiagnostics,
    ) {
        self.remove_nonpersistent_manifolds(bodies);
        self.active_pairs.clear();

        diagnostics.begin_collision_pass();

        self.pair_buffer.clear();
        self.broad_phase
            .find_pairs(bodies.rigid_bodies(), &mut self.pair_buffer);
        diagnostics.broad_phase_pair_count = self.pair_buffer.len();

        let pairs = mem::take(&mut self.pair_buffer);
        for &pair in &pairs {
            self.narrow_phase(pair, bodies, inactivity_detector, diagnostics);
        }
        self.pair_buffer = pairs;
    }

    /// Removes all stored collision state.
    pub fn clear(&mut self) {
        self.manifolds.clear();
        self.active_pairs.clear();
        self.pair_buffer.clear();
        self.manifold_pool.clear();
    }

    fn narrow_phase(
        &mut self,
        pair: BodyPairKey,
        bodies: &mut RigidBodyManager,
        inactivity_detector: &mut InactivityDetector,
        diagnostics: &mut SimulationDiagnostics,
    ) {
        let (id_a, id_b) = pair.body_ids();
        diagnostics.narrow_phase_test_count += 1;

        let both_sleeping =
            bodies.rigid_body(id_a).is_sleeping() && bodies.rigid_body(id_b).is_sleeping();

        // Reuse last frame's contacts unchanged if both bodies sleep
        if both_sleeping {
            if let Some(manifold) = self.manifolds.get_mut(&pair) {
                manifold.persistent = true;
                diagnostics.contacts_reused += manifold.contact_count() as u64;
                self.active_pairs.push(pair);
                register_partners(bodies, id_a, id_b);
                return;
            }
        }

        let manifold_pool = &mut self.manifold_pool;
        let manifold = self.manifolds.entry(pair).or_insert_with(|| {
            let mut manifold = manifold_pool.acquire();
            manifold.reset_for_pair(id_a, id_b);
            manifold
        });

        let [body_a, body_b] = bodies
            .get_two_rigid_bodies_mut(id_a, id_b)
            .expect("Broad phase emitted pair of missing bodies");

        manifold.update_persistence(body_a, body_b, diagnostics);

        if let Some(contact) = gjk::find_intersection(body_a, body_b, diagnostics) {
            manifold.add_contact(contact, diagnostics);
            manifold.persistent = true;
            self.active_pairs.push(pair);

            inactivity_detector.reactivate(id_a, bodies);
            inactivity_detector.reactivate(id_b, bodies);
            register_partners(bodies, id_a, id_b);
        }
    }

    /// Recycles every manifold that was not re-marked persistent during the
    /// last narrow-phase sweep and clears the keep-bit on the survivors.
    fn remove_nonpersistent_manifolds(&mut self, bodies: &mut RigidBodyManager) {
        let stale: Vec<BodyPairKey> = self
            .manifolds
            .iter()
            .filter(|(_, manifold)| !manifold.persistent)
            .map(|(&pair, _)| pair)
            .collect();

        for pair in stale {
            let mut manifold = self
                .manifolds
                .remove(&pair)
                .expect("Stale manifold disappeared");
            let (id_a, id_b) = pair.body_ids();
            if let Some(body_a) = bodies.get_rigid_body_mut(id_a) {
                body_a.remove_contact_partner(id_b);
            }
            if let Some(body_b) = bodies.get_rigid_body_mut(id_b) {
                body_b.remove_contact_partner(id_a);
            }
            manifold.clear();
            self.manifold_pool.recycle(manifold);
        }

        for manifold in self.manifolds.values_mut() {
            manifold.persistent = false;
        }
    }
}

fn register_partners(bodies: &mut RigidBodyManager, id_a: RigidBodyID, id_b: RigidBodyID) {
    bodies.rigid_body_mut(id_a).add_contact_partner(id_b);
    bodies.rigid_body_mut(id_b).add_contact_partner(id_a);
}
