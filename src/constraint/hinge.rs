//! Hinge joints: a ball joint plus two rotational rows restricting relative
//! rotation to a single axis.

use crate::{
    constraint::orthogonal_vector,
    fph,
    quantities::Position,
    rigid_body::{RigidBodyID, RigidBodyManager},
};
use anyhow::{Result, anyhow, bail};
use nalgebra::{Matrix3, Vector2, Vector3};

/// Baumgarte factor driving the anchor separation to zero.
const BETA: fph = 0.01;

/// Constrains two bodies to rotate relative to each other only about a fixed
/// axis through a fixed anchor point. Axis and anchor are resolved into each
/// body's local frame at registration time.
#[derive(Clone, Debug)]
pub struct HingeConstraint {
    body_a: RigidBodyID,
    body_b: RigidBodyID,
    local_axis_a: Vector3<fph>,
    local_axis_b: Vector3<fph>,
    local_anchor_a: Position,
    local_anchor_b: Position,
}

impl HingeConstraint {
    pub(crate) fn new(
        body_a: RigidBodyID,
        body_b: RigidBodyID,
        axis: Vector3<fph>,
        point: Position,
        bodies: &mut RigidBodyManager,
    ) -> Result<Self> {
        if body_a == body_b {
            bail!("Tried to constrain body {body_a:?} to itself");
        }
        let [first, second] = bodies
            .get_two_rigid_bodies_mut(body_a, body_b)
            .ok_or_else(|| anyhow!("No rigid body pair {body_a:?}, {body_b:?}"))?;
        first.set_sleeping_enabled(false);
        second.set_sleeping_enabled(false);
        Ok(Self {
            body_a,
            body_b,
            local_axis_a: first.orientation().inverse_transform_vector(&axis).normalize(),
            local_axis_b: second
                .orientation()
                .inverse_transform_vector(&axis)
                .normalize(),
            local_anchor_a: first.global_to_local(&point),
            local_anchor_b: second.global_to_local(&point),
        })
    }

    /// Solves the three positional rows `x₂ + r₂ − x₁ − r₁ = 0` and the two
    /// rotational rows `a₁·b₂ = 0`, `a₁·c₂ = 0` where `(b₂, c₂)` is an
    /// orthonormal basis orthogonal to body B's world-space hinge axis.
    pub(crate) fn solve(&mut self, dt: fph, bodies: &mut RigidBodyManager) {
        let Some([body_a, body_b]) = bodies.get_two_rigid_bodies_mut(self.body_a, self.body_b)
        else {
            return;
        };

        let axis_a = (body_a.local_to_global(&Position::from(self.local_axis_a))
            - body_a.position())
        .normalize();
        let axis_b = (body_b.local_to_global(&Position::from(self.local_axis_b))
            - body_b.position())
        .normalize();

        let r1 = body_a.local_to_global(&self.local_anchor_a) - body_a.position();
        let r2 = body_b.local_to_global(&self.local_anchor_b) - body_b.position();

        let b2 = orthogonal_vector(&axis_b);
        let c2 = axis_b.cross(&b2);

        // Positional rows, identical to the ball joint
        let j1 = -Matrix3::identity();
        let j2 = r1.cross_matrix();
        let j3 = Matrix3::identity();
        let j4 = -r2.cross_matrix();

        let translational_mass_inverse = body_a.effective_mass_inverse_blocks(&j1, &j2)
            + body_b.effective_mass_inverse_blocks(&j3, &j4);

        // Rotational rows; the linear blocks are zero
        let j12 = -b2.cross(&axis_a);
        let j14 = b2.cross(&axis_a);
        let j22 = -c2.cross(&axis_a);
        let j24 = c2.cross(&axis_a);

        let zero = Vector3::zeros();
        let rotational_mass_inverse = body_a
            .effective_mass_inverse_pair(&zero, &j12, &zero, &j22)
            + body_b.effective_mass_inverse_pair(&zero, &j14, &zero, &j24);

        let positional_error = (body_b.position() - body_a.position()) + r2 - r1;
        let rotational_error = Vector2::new(axis_a.dot(&b2), axis_a.dot(&c2));

        let Some(translational_mass) = translational_mass_inverse.try_inverse() else {
            return;
        };
        let Some(rotational_mass) = rotational_mass_inverse.try_inverse() else {
            return;
        };

        let delta_v_translation = j1 * body_a.velocity()
            + j2 * body_a.angular_velocity()
            + j3 * body_b.velocity()
            + j4 * body_b.angular_velocity()
            + (BETA / dt) * positional_error;
        let lambda_translation = -translational_mass * delta_v_translation;

        let delta_v_rotation = Vector2::new(
            j12.dot(body_a.angular_velocity())
                + j14.dot(body_b.angular_velocity())
                + rotational_error.x,
            j22.dot(body_a.angular_velocity())
                + j24.dot(body_b.angular_velocity())
                + rotational_error.y,
        );
        let lambda_rotation = -rotational_mass * delta_v_rotation;

        // The translational angular impulses take the opposite sign of the
        // raw Jacobian product
        let angular_impulse_a =
            -(j2 * lambda_translation) + j12 * lambda_rotation.x + j22 * lambda_rotation.y;
        let angular_impulse_b =
            -(j4 * lambda_translation) + j14 * lambda_rotation.x + j24 * lambda_rotation.y;

        body_a.apply_linear_impulse(&(j1 * lambda_translation));
        body_a.apply_angular_impulse(&angular_impulse_a);
        body_b.apply_linear_impulse(&(j3 * lambda_translation));
        body_b.apply_angular_impulse(&angular_impulse_b);
    }
}
