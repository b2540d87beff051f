//! Sequential-impulse constraint solving.

use crate::{
    collision::{BodyPairKey, manifold::ContactManifold},
    constraint::{UserConstraint, contact},
    fph,
    rigid_body::RigidBodyManager,
};
use serde::{Deserialize, Serialize};
use tumble_containers::NoHashMap;

/// Configuration parameters for the [`ConstraintSolver`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintSolverConfig {
    /// The number of sequential impulse iterations to perform per substep.
    pub n_iterations: u32,
    /// How to scale the still-valid accumulated impulses from the previous
    /// step before re-applying them. Set to zero to disable warm starting.
    pub warm_start_factor: fph,
    /// Strength of the positional bias pushing penetrating bodies apart.
    pub baumgarte_factor: fph,
    /// Penetration depth tolerated before the positional bias kicks in.
    pub penetration_slop: fph,
    /// Approach speed below which restitution is ignored, removing energy
    /// near rest.
    pub restitution_slop: fph,
}

impl Default for ConstraintSolverConfig {
    fn default() -> Self {
        Self {
            n_iterations: 4,
            warm_start_factor: 0.7,
            baumgarte_factor: 0.01,
            penetration_slop: 0.01,
            restitution_slop: 0.01,
        }
    }
}

/// A sequential impulse (projected Gauss-Seidel) solver over the dynamic
/// contact constraints and the persistent user constraints.
///
/// Each iteration visits every constraint, computes the impulse driving the
/// constraint velocity (plus bias) to zero, clamps the *accumulated* impulse
/// to the feasible set and applies the clamped increment. Dynamic constraints
/// are always processed before persistent ones, and the warm-start pass uses
/// the same order as the iterations.
#[derive(Debug, Default)]
pub struct ConstraintSolver {
    config: ConstraintSolverConfig,
    user_constraints: Vec<UserConstraint>,
    dynamic_pairs: Vec<BodyPairKey>,
}

impl ConstraintSolver {
    pub fn new(config: ConstraintSolverConfig) -> Self {
        Self {
            config,
            user_constraints: Vec::new(),
            dynamic_pairs: Vec::new(),
        }
    }

    pub fn config(&self) -> &ConstraintSolverConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConstraintSolverConfig {
        &mut self.config
    }

    /// Registers a persistent constraint.
    pub fn add_constraint(&mut self, constraint: UserConstraint) {
        self.user_constraints.push(constraint);
    }

    /// The number of registered persistent constraints.
    pub fn user_constraint_count(&self) -> usize {
        self.user_constraints.len()
    }

    /// Removes all persistent constraints.
    pub fn clear(&mut self) {
        self.user_constraints.clear();
        self.dynamic_pairs.clear();
    }

    /// Runs the warm-start pass and the solve iterations over all contacts of
    /// the active manifolds and all persistent constraints.
    pub fn solve(
        &mut self,
        dt: fph,
        bodies: &mut RigidBodyManager,
        active_pairs: &[BodyPairKey],
        manifolds: &mut NoHashMap<BodyPairKey, ContactManifold>,
    ) {
        // Contacts where nothing can move are skipped entirely
        self.dynamic_pairs.clear();
        for &pair in active_pairs {
            let (id_a, id_b) = pair.body_ids();
            let body_a = bodies.rigid_body(id_a);
            let body_b = bodies.rigid_body(id_b);

            let skip = (body_a.is_inactive() && body_b.is_inactive())
                || (body_a.is_inactive() && body_b.is_static())
                || (body_a.is_static() && body_b.is_inactive());
            if !skip {
                self.dynamic_pairs.push(pair);
            }
        }

        // Warm start
        for &pair in &self.dynamic_pairs {
            let Some(manifold) = manifolds.get_mut(&pair) else {
                continue;
            };
            let (id_a, id_b) = pair.body_ids();
            let Some([body_a, body_b]) = bodies.get_two_rigid_bodies_mut(id_a, id_b) else {
                continue;
            };
            for contact_point in manifold.contacts_mut() {
                contact::apply(contact_point, body_a, body_b, &self.config);
            }
        }
        for constraint in &mut self.user_constraints {
            constraint.apply(dt, bodies);
        }

        for _ in 0..self.config.n_iterations {
            for &pair in &self.dynamic_pairs {
                let Some(manifold) = manifolds.get_mut(&pair) else {
                    continue;
                };
                let (id_a, id_b) = pair.body_ids();
                let Some([body_a, body_b]) = bodies.get_two_rigid_bodies_mut(id_a, id_b) else {
                    continue;
                };
                for contact_point in manifold.contacts_mut() {
                    contact::solve(contact_point, body_a, body_b, dt, &self.config);
                }
            }
            for constraint in &mut self.user_constraints {
                constraint.solve(dt, bodies);
            }
        }
    }
}
