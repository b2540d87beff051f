//! Deactivation of connected components of sleeping bodies.

use crate::{
    fph,
    rigid_body::{RigidBodyID, RigidBodyManager},
};
use tumble_containers::{HashMap, NoHashSet};

/// Motion average assigned to reactivated bodies so they cannot fall back
/// asleep immediately.
const REACTIVATION_CHANGE_AVERAGE: fph = 20.0;

/// Finds connected sets of sleeping bodies resting on static geometry and
/// marks them inactive so the integrator and solver can skip them entirely.
/// Runs at its own fixed cadence, independent of the substep rate.
#[derive(Clone, Debug)]
pub struct InactivityDetector {
    inactive_sets: HashMap<u32, Vec<RigidBodyID>>,
    checked: NoHashSet<RigidBodyID>,
    update_period: fph,
    update_timer: fph,
}

impl InactivityDetector {
    pub fn new(update_period: fph) -> Self {
        Self {
            inactive_sets: HashMap::default(),
            checked: NoHashSet::default(),
            update_period,
            update_timer: 0.0,
        }
    }

    /// The number of inactive sets currently tracked.
    pub fn inactive_set_count(&self) -> usize {
        self.inactive_sets.len()
    }

    /// Removes all tracked sets and resets the update timer.
    pub fn clear(&mut self) {
        self.inactive_sets.clear();
        self.checked.clear();
        self.update_timer = 0.0;
    }

    /// Reactivates the given body together with every other member of its
    /// inactive set, and dissolves the set.
    pub fn reactivate(&mut self, body_id: RigidBodyID, bodies: &mut RigidBodyManager) {
        let Some(body) = bodies.get_rigid_body(body_id) else {
            return;
        };
        if !body.is_inactive() {
            return;
        }

        let set_id = body.inactive_set_id();
        let Some(members) = self.inactive_sets.remove(&set_id) else {
            return;
        };

        for member_id in members {
            let member = bodies.rigid_body_mut(member_id);
            member.set_inactive(false);
            member.set_sleeping(false);
            member.set_change_average(REACTIVATION_CHANGE_AVERAGE);
            member.set_inactive_set_id(0);
        }
    }

    /// Rebuilds the inactive sets if the update period has elapsed. The
    /// elapsed frame duration is accumulated between calls.
    pub fn update(&mut self, elapsed: fph, bodies: &mut RigidBodyManager) {
        self.update_timer -= elapsed;
        if self.update_timer > 0.0 {
            return;
        }
        self.update_timer = self.update_period;

        self.checked.clear();
        self.inactive_sets.clear();

        let mut next_set_id = 0;

        let body_ids: Vec<RigidBodyID> =
            bodies.rigid_bodies().iter().map(|body| body.id()).collect();

        // Candidate sets grow outward from bodies touching static geometry
        for &ground_id in &body_ids {
            bodies.rigid_body_mut(ground_id).set_inactive(false);

            if !bodies.rigid_body(ground_id).is_static() {
                continue;
            }

            let partners: Vec<RigidBodyID> = bodies
                .rigid_body(ground_id)
                .contact_partners()
                .iter()
                .copied()
                .collect();

            for partner_id in partners {
                let partner = bodies.rigid_body_mut(partner_id);
                partner.set_grounded(true);

                if !partner.is_sleeping() {
                    continue;
                }
                if !self.checked.insert(partner_id) {
                    continue;
                }

                if let Some(members) = self.collect_inactive_set(partner_id, bodies) {
                    self.inactive_sets.insert(next_set_id, members);
                    next_set_id += 1;
                }
            }
        }

        for (&set_id, members) in &self.inactive_sets {
            for &member_id in members {
                let member = bodies.rigid_body_mut(member_id);
                member.set_inactive(true);
                member.set_inactive_set_id(set_id);
            }
        }

        // Awake bodies not resting on anything static must re-prove
        // quiescence before they may sleep
        for &body_id in &body_ids {
            let body = bodies.rigid_body_mut(body_id);
            if !body.is_inactive() && !body.is_static() && !body.is_grounded() {
                body.revalidate_sleeping();
            }
            body.set_grounded(false);
        }
    }

    /// Grows the candidate set from the given sleeping body across manifold
    /// partners. The set is invalid if it reaches an awake non-static body.
    fn collect_inactive_set(
        &mut self,
        start: RigidBodyID,
        bodies: &mut RigidBodyManager,
    ) -> Option<Vec<RigidBodyID>> {
        let mut members = vec![start];
        let mut member_set = NoHashSet::default();
        member_set.insert(start);

        let mut stack = vec![start];
        let mut valid = true;

        while let Some(current_id) = stack.pop() {
            let partners: Vec<RigidBodyID> = bodies
                .rigid_body(current_id)
                .contact_partners()
                .iter()
                .copied()
                .collect();

            for partner_id in partners {
                let partner = bodies.rigid_body_mut(partner_id);

                if partner.is_static() {
                    continue;
                }

                partner.set_grounded(true);

                if self.checked.contains(&partner_id) {
                    // A previously checked body outside the growing set means
                    // the component was already found invalid
                    if !member_set.contains(&partner_id) {
                        valid = false;
                        break;
                    }
                    continue;
                }
                self.checked.insert(partner_id);

                if partner.is_sleeping() {
                    members.push(partner_id);
                    member_set.insert(partner_id);
                    stack.push(partner_id);
                } else {
                    // Abort right here so the remaining partners are left
                    // unchecked for searches seeded from other static bodies
                    valid = false;
                    break;
                }
            }

            if !valid {
                break;
            }
        }

        valid.then_some(members)
    }
}

impl Default for InactivityDetector {
    fn default() -> Self {
        Self::new(0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rigid_body::BodyDescriptor;
    use nalgebra::point;

    /// Ground at index 0, two dynamic boxes above it. Contact partner links
    /// are wired manually: ground–body1 and body1–body2.
    fn stacked_bodies() -> (RigidBodyManager, RigidBodyID, RigidBodyID, RigidBodyID) {
        let mut manager = RigidBodyManager::new();
        let ground = manager
            .add_body(&BodyDescriptor {
                mass: 0.0,
                ..BodyDescriptor::default()
            })
            .unwrap();
        let body_1 = manager
            .add_body(&BodyDescriptor {
                position: point![0.0, 1.0, 0.0],
                ..BodyDescriptor::default()
            })
            .unwrap();
        let body_2 = manager
            .add_body(&BodyDescriptor {
                position: point![0.0, 2.0, 0.0],
                ..BodyDescriptor::default()
            })
            .unwrap();

        manager.rigid_body_mut(ground).add_contact_partner(body_1);
        manager.rigid_body_mut(body_1).add_contact_partner(ground);
        manager.rigid_body_mut(body_1).add_contact_partner(body_2);
        manager.rigid_body_mut(body_2).add_contact_partner(body_1);

        (manager, ground, body_1, body_2)
    }

    #[test]
    fn sleeping_stack_on_ground_becomes_inactive() {
        let (mut bodies, _, body_1, body_2) = stacked_bodies();
        bodies.rigid_body_mut(body_1).set_sleeping(true);
        bodies.rigid_body_mut(body_2).set_sleeping(true);

        let mut detector = InactivityDetector::default();
        detector.update(1.0, &mut bodies);

        assert!(bodies.rigid_body(body_1).is_inactive());
        assert!(bodies.rigid_body(body_2).is_inactive());
        assert_eq!(
            bodies.rigid_body(body_1).inactive_set_id(),
            bodies.rigid_body(body_2).inactive_set_id()
        );
        assert_eq!(detector.inactive_set_count(), 1);
    }

    #[test]
    fn awake_body_in_component_prevents_deactivation() {
        let (mut bodies, _, body_1, body_2) = stacked_bodies();
        bodies.rigid_body_mut(body_1).set_sleeping(true);
        // body_2 stays awake

        let mut detector = InactivityDetector::default();
        detector.update(1.0, &mut bodies);

        assert!(!bodies.rigid_body(body_1).is_inactive());
        assert!(!bodies.rigid_body(body_2).is_inactive());
        assert_eq!(detector.inactive_set_count(), 0);
    }

    #[test]
    fn reactivation_dissolves_the_whole_set() {
        let (mut bodies, _, body_1, body_2) = stacked_bodies();
        bodies.rigid_body_mut(body_1).set_sleeping(true);
        bodies.rigid_body_mut(body_2).set_sleeping(true);

        let mut detector = InactivityDetector::default();
        detector.update(1.0, &mut bodies);
        assert!(bodies.rigid_body(body_2).is_inactive());

        detector.reactivate(body_2, &mut bodies);

        assert!(!bodies.rigid_body(body_1).is_inactive());
        assert!(!bodies.rigid_body(body_1).is_sleeping());
        assert!(!bodies.rigid_body(body_2).is_inactive());
        assert_eq!(detector.inactive_set_count(), 0);
    }

    #[test]
    fn failed_candidate_search_does_not_block_other_grounded_chains() {
        let mut bodies = RigidBodyManager::new();
        let ground_1 = bodies
            .add_body(&BodyDescriptor {
                mass: 0.0,
                ..BodyDescriptor::default()
            })
            .unwrap();
        let chained = bodies
            .add_body(&BodyDescriptor {
                position: point![0.0, 1.0, 0.0],
                ..BodyDescriptor::default()
            })
            .unwrap();
        let connector = bodies
            .add_body(&BodyDescriptor {
                position: point![0.0, 2.0, 0.0],
                ..BodyDescriptor::default()
            })
            .unwrap();
        let ground_2 = bodies
            .add_body(&BodyDescriptor {
                position: point![5.0, 0.0, 0.0],
                mass: 0.0,
                ..BodyDescriptor::default()
            })
            .unwrap();
        let isolated = bodies
            .add_body(&BodyDescriptor {
                position: point![5.0, 1.0, 0.0],
                ..BodyDescriptor::default()
            })
            .unwrap();

        bodies.rigid_body_mut(ground_1).add_contact_partner(chained);
        bodies.rigid_body_mut(chained).add_contact_partner(ground_1);
        bodies.rigid_body_mut(chained).add_contact_partner(connector);
        bodies.rigid_body_mut(connector).add_contact_partner(chained);
        bodies.rigid_body_mut(ground_2).add_contact_partner(isolated);
        bodies.rigid_body_mut(isolated).add_contact_partner(ground_2);

        bodies.rigid_body_mut(chained).set_sleeping(true);
        bodies.rigid_body_mut(isolated).set_sleeping(true);
        // The connector stays awake, invalidating the first chain

        let mut detector = InactivityDetector::default();
        detector.update(1.0, &mut bodies);

        assert!(!bodies.rigid_body(chained).is_inactive());
        assert!(!bodies.rigid_body(connector).is_inactive());
        assert!(bodies.rigid_body(isolated).is_inactive());
        assert_eq!(detector.inactive_set_count(), 1);
    }

    #[test]
    fn update_respects_its_cadence() {
        let (mut bodies, _, body_1, _) = stacked_bodies();
        bodies.rigid_body_mut(body_1).set_sleeping(true);

        let mut detector = InactivityDetector::new(0.5);
        // The first call runs immediately (the timer starts expired) and
        // clears the grounded flags at the end
        detector.update(0.1, &mut bodies);
        assert!(!bodies.rigid_body(body_1).is_grounded());

        // A call before the period has elapsed must not touch anything
        bodies.rigid_body_mut(body_1).set_grounded(true);
        detector.update(0.1, &mut bodies);
        assert!(bodies.rigid_body(body_1).is_grounded());
    }
}
