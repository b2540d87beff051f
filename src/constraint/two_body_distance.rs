//! Distance constraint between anchor points on two bodies.

use crate::{
    fph,
    quantities::Position,
    rigid_body::{RigidBodyID, RigidBodyManager},
};
use anyhow::{Result, anyhow, bail};

/// Constraint force mixing softening the distance constraint slightly.
const CFM: fph = 1e-5;

/// Baumgarte factor driving the positional error to zero.
const BETA: fph = 0.1;

/// Keeps the distance between a local anchor point on each of two bodies at
/// the value it had when the constraint was registered.
#[derive(Clone, Debug)]
pub struct TwoBodyDistanceConstraint {
    body_a: RigidBodyID,
    body_b: RigidBodyID,
    /// Anchor point in body A's local frame.
    anchor_a: Position,
    /// Anchor point in body B's local frame.
    anchor_b: Position,
    rest_length: fph,
}

impl TwoBodyDistanceConstraint {
    pub(crate) fn new(
        body_a: RigidBodyID,
        body_b: RigidBodyID,
        anchor_a: Position,
        anchor_b: Position,
        bodies: &mut RigidBodyManager,
    ) -> Result<Self> {
        if body_a == body_b {
            bail!("Tried to constrain body {body_a:?} to itself");
        }
        let rest_length = {
            let [first, second] = bodies
                .get_two_rigid_bodies_mut(body_a, body_b)
                .ok_or_else(|| anyhow!("No rigid body pair {body_a:?}, {body_b:?}"))?;
            first.set_sleeping_enabled(false);
            second.set_sleeping_enabled(false);
            (second.local_to_global(&anchor_b) - first.local_to_global(&anchor_a)).norm()
        };
        Ok(Self {
            body_a,
            body_b,
            anchor_a,
            anchor_b,
            rest_length,
        })
    }

    pub(crate) fn solve(&mut self, dt: fph, bodies: &mut RigidBodyManager) {
        let Some([body_a, body_b]) = bodies.get_two_rigid_bodies_mut(self.body_a, self.body_b)
        else {
            return;
        };

        let displacement = body_b.position() - body_a.position();

        let anchor_a_world = body_a.local_to_global(&self.anchor_a);
        let anchor_b_world = body_b.local_to_global(&self.anchor_b);

        let j1 = -displacement;
        let j2 = -(anchor_a_world - body_a.position()).cross(&displacement);
        let j3 = displacement;
        let j4 = (anchor_b_world - body_b.position()).cross(&displacement);

        let positional_error = (anchor_a_world - anchor_b_world).norm() - self.rest_length;

        let effective_mass = 1.0
            / (body_a.effective_mass_inverse(&j1, &j2)
                + body_b.effective_mass_inverse(&j3, &j4)
                + CFM / dt);

        let delta_v = body_a.velocity().dot(&j1)
            + body_a.angular_velocity().dot(&j2)
            + body_b.velocity().dot(&j3)
            + body_b.angular_velocity().dot(&j4)
            + BETA * positional_error;

        let lambda = -effective_mass * delta_v;

        body_a.apply_linear_impulse(&(j1 * lambda));
        body_a.apply_angular_impulse(&(j2 * lambda));
        body_b.apply_linear_impulse(&(j3 * lambda));
        body_b.apply_angular_impulse(&(j4 * lambda));
    }
}
