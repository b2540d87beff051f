//! Ball-and-socket joints pinning two bodies together at a point.

use crate::{
    fph,
    quantities::Position,
    rigid_body::{RigidBodyID, RigidBodyManager},
};
use anyhow::{Result, anyhow, bail};
use nalgebra::Matrix3;

/// Baumgarte factor driving the anchor separation to zero.
const BETA: fph = 0.01;

/// Pins a point on body A to a point on body B. The anchor points are the
/// projections of a common world-space point into each body's local frame at
/// registration time.
#[derive(Clone, Debug)]
pub struct BallJointConstraint {
    body_a: RigidBodyID,
    body_b: RigidBodyID,
    local_anchor_a: Position,
    local_anchor_b: Position,
}

impl BallJointConstraint {
    pub(crate) fn new(
        body_a: RigidBodyID,
        body_b: RigidBodyID,
        point: Position,
        bodies: &mut RigidBodyManager,
    ) -> Result<Self> {
        if body_a == body_b {
            bail!("Tried to constrain body {body_a:?} to itself");
        }
        let (local_anchor_a, local_anchor_b) = {
            let [first, second] = bodies
                .get_two_rigid_bodies_mut(body_a, body_b)
                .ok_or_else(|| anyhow!("No rigid body pair {body_a:?}, {body_b:?}"))?;
            first.set_sleeping_enabled(false);
            second.set_sleeping_enabled(false);
            (first.global_to_local(&point), second.global_to_local(&point))
        };
        Ok(Self {
            body_a,
            body_b,
            local_anchor_a,
            local_anchor_b,
        })
    }

    /// Solves the three positional rows `x₂ + r₂ − x₁ − r₁ = 0`.
    pub(crate) fn solve(&mut self, dt: fph, bodies: &mut RigidBodyManager) {
        let Some([body_a, body_b]) = bodies.get_two_rigid_bodies_mut(self.body_a, self.body_b)
        else {
            return;
        };

        let r1 = body_a.local_to_global(&self.local_anchor_a) - body_a.position();
        let r2 = body_b.local_to_global(&self.local_anchor_b) - body_b.position();

        let j1 = -Matrix3::identity();
        let j2 = r1.cross_matrix();
        let j3 = Matrix3::identity();
        let j4 = -r2.cross_matrix();

        let effective_mass_inverse = body_a.effective_mass_inverse_blocks(&j1, &j2)
            + body_b.effective_mass_inverse_blocks(&j3, &j4);
        let Some(effective_mass) = effective_mass_inverse.try_inverse() else {
            return;
        };

        let positional_error = (body_b.position() - body_a.position()) + r2 - r1;

        let delta_v = j1 * body_a.velocity()
            + j2 * body_a.angular_velocity()
            + j3 * body_b.velocity()
            + j4 * body_b.angular_velocity()
            + (BETA / dt) * positional_error;

        let lambda = -effective_mass * delta_v;

        // The angular impulses take the opposite sign of the raw Jacobian
        // product
        body_a.apply_linear_impulse(&(j1 * lambda));
        body_a.apply_angular_impulse(&(-(j2 * lambda)));
        body_b.apply_linear_impulse(&(j3 * lambda));
        body_b.apply_angular_impulse(&(-(j4 * lambda)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rigid_body::BodyDescriptor;
    use approx::assert_abs_diff_eq;
    use nalgebra::{point, vector};

    #[test]
    fn anchors_are_resolved_in_each_body_frame() {
        let mut bodies = RigidBodyManager::new();
        let body_a = bodies.add_body(&BodyDescriptor::default()).unwrap();
        let body_b = bodies
            .add_body(&BodyDescriptor {
                position: point![2.0, 0.0, 0.0],
                ..BodyDescriptor::default()
            })
            .unwrap();

        let constraint =
            BallJointConstraint::new(body_a, body_b, point![1.0, 0.0, 0.0], &mut bodies).unwrap();
        assert_abs_diff_eq!(constraint.local_anchor_a, point![1.0, 0.0, 0.0]);
        assert_abs_diff_eq!(constraint.local_anchor_b, point![-1.0, 0.0, 0.0]);
    }

    #[test]
    fn joint_damps_relative_anchor_velocity() {
        let mut bodies = RigidBodyManager::new();
        let body_a = bodies.add_body(&BodyDescriptor::default()).unwrap();
        let body_b = bodies
            .add_body(&BodyDescriptor {
                position: point![2.0, 0.0, 0.0],
                ..BodyDescriptor::default()
            })
            .unwrap();
        let mut constraint =
            BallJointConstraint::new(body_a, body_b, point![1.0, 0.0, 0.0], &mut bodies).unwrap();

        bodies
            .rigid_body_mut(body_b)
            .set_velocity(vector![0.0, 1.0, 0.0]);

        for _ in 0..10 {
            constraint.solve(1.0 / 60.0, &mut bodies);
        }

        let velocity_a = *bodies.rigid_body(body_a).velocity();
        let velocity_b = *bodies.rigid_body(body_b).velocity();
        // The bodies now move together at the anchor
        let anchor_velocity_a = velocity_a
            + bodies
                .rigid_body(body_a)
                .angular_velocity()
                .cross(&vector![1.0, 0.0, 0.0]);
        let anchor_velocity_b = velocity_b
            + bodies
                .rigid_body(body_b)
                .angular_velocity()
                .cross(&vector![-1.0, 0.0, 0.0]);
        assert_abs_diff_eq!(anchor_velocity_a, anchor_velocity_b, epsilon = 1e-2);
    }
}
