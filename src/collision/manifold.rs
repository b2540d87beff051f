//! Persistent contact manifolds and their object pool.

use crate::{
    collision::contact::Contact,
    diagnostics::SimulationDiagnostics,
    fph,
    rigid_body::{RigidBody, RigidBodyID},
};
use nalgebra::Vector3;
use tinyvec::TinyVec;

/// Distance a cached contact may drift in either body's frame, and the
/// minimum spacing between the contacts of a manifold.
pub const PERSISTENCE_THRESHOLD: fph = 0.01;

/// The maximum number of contacts kept in a manifold.
pub const MAX_CONTACTS: usize = 4;

/// The persistent set of contact points shared by a pair of bodies, reduced
/// to at most [`MAX_CONTACTS`] contacts chosen to maximise contact area.
#[derive(Debug, Default)]
pub struct ContactManifold {
    body_a: RigidBodyID,
    body_b: RigidBodyID,
    contacts: TinyVec<[Contact; MAX_CONTACTS]>,
    normal: Vector3<fph>,
    /// Keep-bit marking the manifold as observed in the current step.
    pub(crate) persistent: bool,
}

impl ContactManifold {
    /// Re-initialises a (possibly recycled) manifold for the given body pair.
    pub(crate) fn reset_for_pair(&mut self, body_a: RigidBodyID, body_b: RigidBodyID) {
        self.body_a = body_a;
        self.body_b = body_b;
        self.contacts.clear();
        self.normal = Vector3::zeros();
        self.persistent = false;
    }

    /// Returns the IDs of the two bodies sharing the manifold.
    pub fn body_ids(&self) -> (RigidBodyID, RigidBodyID) {
        (self.body_a, self.body_b)
    }

    /// Returns the body of the pair that is not the given one.
    pub fn other_body(&self, body: RigidBodyID) -> RigidBodyID {
        if self.body_a == body {
            self.body_b
        } else {
            self.body_a
        }
    }

    /// The shared normal of the manifold (that of the most recent contact).
    pub fn normal(&self) -> &Vector3<fph> {
        &self.normal
    }

    /// Returns the contacts of the manifold.
    pub fn contacts(&self) -> &[Contact] {
        self.contacts.as_slice()
    }

    pub(crate) fn contacts_mut(&mut self) -> &mut [Contact] {
        self.contacts.as_mut_slice()
    }

    /// The number of contacts in the manifold.
    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Removes all contacts.
    pub(crate) fn clear(&mut self) {
        self.contacts.clear();
        self.persistent = false;
    }

    /// Drops cached contacts whose anchors have drifted too far from their
    /// original locations in either body's frame, or whose bodies are no
    /// longer penetrating at the contact.
    pub(crate) fn update_persistence(
        &mut self,
        body_a: &RigidBody,
        body_b: &RigidBody,
        diagnostics: &mut SimulationDiagnostics,
    ) {
        let threshold_squared = PERSISTENCE_THRESHOLD * PERSISTENCE_THRESHOLD;

        let mut idx = 0;
        while idx < self.contacts.len() {
            let contact = &self.contacts[idx];

            let new_location_a = body_a.local_to_global(&contact.local_location);
            let new_location_b = body_b.local_to_global(&contact.local_location_b);

            let penetrating = contact.normal.dot(&(new_location_b - new_location_a)) >= 0.0;

            let drift_a_small =
                (contact.location - new_location_a).norm_squared() < threshold_squared;
            let drift_b_small =
                (contact.location_b - new_location_b).norm_squared() < threshold_squared;

            if drift_a_small && drift_b_small && penetrating {
                idx += 1;
            } else {
                self.contacts.remove(idx);
                diagnostics.contacts_dropped += 1;
            }
        }
    }

    /// Adds the contact computed for the current step, promotes the shared
    /// normal, and reduces the manifold back to [`MAX_CONTACTS`] contacts if
    /// it now exceeds that.
    pub(crate) fn add_contact(&mut self, contact: Contact, diagnostics: &mut SimulationDiagnostics) {
        self.normal = contact.normal;

        let threshold_squared = PERSISTENCE_THRESHOLD * PERSISTENCE_THRESHOLD;
        let far_enough = self.contacts.iter().all(|existing| {
            (contact.location - existing.location).norm_squared() > threshold_squared
                && (contact.location_b - existing.location_b).norm_squared() > threshold_squared
        });

        if far_enough {
            self.contacts.push(contact);
            diagnostics.contacts_created += 1;
        }

        if self.contacts.len() > MAX_CONTACTS {
            self.reduce(diagnostics);
        }
    }

    /// Reduces the manifold to the four contacts spanning the largest area:
    /// the deepest contact, the contact farthest from it, the contact
    /// farthest from the line between those two, and the contact farthest
    /// from the triangle of the first three.
    fn reduce(&mut self, diagnostics: &mut SimulationDiagnostics) {
        let deepest = self
            .contacts
            .iter()
            .enumerate()
            .fold((0, 0.0), |(best, max_depth), (idx, contact)| {
                if contact.depth >= max_depth {
                    (idx, contact.depth)
                } else {
                    (best, max_depth)
                }
            })
            .0;
        let location_1 = self.contacts[deepest].location;

        let farthest = self.index_of_max(|contact| (contact.location - location_1).norm_squared());
        let location_2 = self.contacts[farthest].location;

        let line_direction = (location_2 - location_1).normalize();
        let farthest_from_line = self.index_of_max(|contact| {
            let q = location_1 - contact.location;
            (q - q.dot(&line_direction) * line_direction).norm_squared()
        });
        let location_3 = self.contacts[farthest_from_line].location;

        let farthest_from_triangle = self.index_of_max(|contact| {
            let v0 = location_2 - location_1;
            let v1 = location_3 - location_1;
            let v2 = contact.location - location_1;

            let d00 = v0.dot(&v0);
            let d01 = v0.dot(&v1);
            let d11 = v1.dot(&v1);
            let d20 = v2.dot(&v0);
            let d21 = v2.dot(&v1);

            let denom = d00 * d11 - d01 * d01;
            let v = ((d11 * d20 - d01 * d21) / denom).clamp(0.0, 1.0);
            let w = ((d00 * d21 - d01 * d20) / denom).clamp(0.0, 1.0);
            let u = (1.0 - v - w).clamp(0.0, 1.0);

            let projected =
                u * location_1.coords + v * location_2.coords + w * location_3.coords;
            (projected - contact.location.coords).norm_squared()
        });

        let keep = [deepest, farthest, farthest_from_line, farthest_from_triangle];
        let mut idx = self.contacts.len();
        while idx > 0 {
            idx -= 1;
            if !keep.contains(&idx) {
                self.contacts.remove(idx);
                diagnostics.contacts_dropped += 1;
            }
        }
    }

    fn index_of_max(&self, mut metric: impl FnMut(&Contact) -> fph) -> usize {
        self.contacts
            .iter()
            .enumerate()
            .fold((0, 0.0), |(best, max_value), (idx, contact)| {
                let value = metric(contact);
                if value >= max_value {
                    (idx, value)
                } else {
                    (best, max_value)
                }
            })
            .0
    }
}

/// A free list recycling objects so that their allocations are reused.
#[derive(Debug)]
pub(crate) struct ObjectPool<T> {
    free: Vec<T>,
    created: usize,
}

impl<T: Default> ObjectPool<T> {
    pub fn new() -> Self {
        Self {
            free: Vec::new(),
            created: 0,
        }
    }

    /// Takes an object from the free list, creating a new one if the list is
    /// empty.
    pub fn acquire(&mut self) -> T {
        self.free.pop().unwrap_or_else(|| {
            self.created += 1;
            T::default()
        })
    }

    /// Returns an object to the free list.
    pub fn recycle(&mut self, object: T) {
        self.free.push(object);
    }

    pub fn clear(&mut self) {
        self.free.clear();
        self.created = 0;
    }

    #[cfg(test)]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::point;

    fn contact_at(x: fph, y: fph, z: fph, depth: fph) -> Contact {
        let mut contact = Contact {
            location: point![x, y, z],
            location_b: point![x, y - depth, z],
            depth,
            ..Contact::default()
        };
        contact.set_normal(Vector3::y());
        contact
    }

    fn manifold_for_test() -> ContactManifold {
        let mut manifold = ContactManifold::default();
        manifold.reset_for_pair(RigidBodyID(0), RigidBodyID(1));
        manifold
    }

    #[test]
    fn adding_contact_promotes_shared_normal() {
        let mut diagnostics = SimulationDiagnostics::default();
        let mut manifold = manifold_for_test();
        manifold.add_contact(contact_at(0.0, 0.0, 0.0, 0.1), &mut diagnostics);
        assert_eq!(manifold.contact_count(), 1);
        assert_eq!(manifold.normal(), &Vector3::y());
    }

    #[test]
    fn nearby_contact_is_not_added() {
        let mut diagnostics = SimulationDiagnostics::default();
        let mut manifold = manifold_for_test();
        manifold.add_contact(contact_at(0.0, 0.0, 0.0, 0.1), &mut diagnostics);
        manifold.add_contact(contact_at(0.005, 0.0, 0.0, 0.1), &mut diagnostics);
        assert_eq!(manifold.contact_count(), 1);
    }

    #[test]
    fn reduction_keeps_at_most_four_contacts_including_deepest() {
        let mut diagnostics = SimulationDiagnostics::default();
        let mut manifold = manifold_for_test();
        manifold.add_contact(contact_at(0.0, 0.0, 0.0, 0.02), &mut diagnostics);
        manifold.add_contact(contact_at(1.0, 0.0, 0.0, 0.03), &mut diagnostics);
        manifold.add_contact(contact_at(1.0, 0.0, 1.0, 0.2), &mut diagnostics);
        manifold.add_contact(contact_at(0.0, 0.0, 1.0, 0.05), &mut diagnostics);
        manifold.add_contact(contact_at(0.5, 0.0, 0.5, 0.04), &mut diagnostics);

        assert!(manifold.contact_count() <= MAX_CONTACTS);
        assert!(
            manifold
                .contacts()
                .iter()
                .any(|contact| contact.depth == 0.2)
        );
    }

    #[test]
    fn pairwise_contact_spacing_exceeds_threshold_after_reduction() {
        let mut diagnostics = SimulationDiagnostics::default();
        let mut manifold = manifold_for_test();
        for (x, z) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.5, 0.5)] {
            manifold.add_contact(contact_at(x, 0.0, z, 0.05), &mut diagnostics);
        }
        let contacts = manifold.contacts();
        for (idx, contact_a) in contacts.iter().enumerate() {
            for contact_b in &contacts[idx + 1..] {
                assert!(
                    (contact_a.location - contact_b.location).norm()
                        > PERSISTENCE_THRESHOLD
                );
            }
        }
    }

    #[test]
    fn pool_recycles_objects() {
        let mut pool: ObjectPool<ContactManifold> = ObjectPool::new();
        let manifold = pool.acquire();
        pool.recycle(manifold);
        assert_eq!(pool.free_count(), 1);
        let _ = pool.acquire();
        assert_eq!(pool.free_count(), 0);
    }
}
